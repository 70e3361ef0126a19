use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use anyhow::{Result, anyhow};
use log::{debug, warn};
use native_tls::{TlsConnector, TlsStream};

use crate::domain::email::{MessageId, MessageRecord};
use crate::mail::decoders::parse_message;

type ImapSession = imap::Session<TlsStream<TcpStream>>;

/// Blocking IMAP client. Every call opens its own session on INBOX and logs
/// out before returning.
pub struct ImapClient {
    pub server: String,
    pub port: u16,
    pub user: String,
    password: String,
    /// Applied to connect, read and write on the socket.
    pub timeout: Duration,
}

impl ImapClient {
    pub fn new(
        server: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        password: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            server: server.into(),
            port,
            user: user.into(),
            password: password.into(),
            timeout,
        }
    }

    fn connect_and_login(&self) -> Result<ImapSession> {
        let addr = (self.server.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| anyhow!("could not resolve {}:{}", self.server, self.port))?;

        let tcp = TcpStream::connect_timeout(&addr, self.timeout)?;
        tcp.set_read_timeout(Some(self.timeout))?;
        tcp.set_write_timeout(Some(self.timeout))?;

        let tls = TlsConnector::builder().build()?;
        let stream = tls
            .connect(self.server.as_str(), tcp)
            .map_err(|e| anyhow!("TLS handshake with {} failed: {e}", self.server))?;

        let mut client = imap::Client::new(stream);
        client.read_greeting()?;

        let mut session = client
            .login(&self.user, &self.password)
            .map_err(|(e, _client)| anyhow!("IMAP login as {} failed: {e}", self.user))?;
        session.select("INBOX")?;
        Ok(session)
    }

    fn sorted_uids(session: &mut ImapSession, query: &str) -> Result<Vec<u32>> {
        let mut uids: Vec<u32> = session.uid_search(query)?.into_iter().collect();
        uids.sort_unstable(); // ascending = mailbox order
        Ok(uids)
    }

    /// Fetch one message with `BODY.PEEK[]`, leaving its flags untouched.
    fn fetch_one(session: &mut ImapSession, uid: u32) -> Result<Option<MessageRecord>> {
        let fetches = session.uid_fetch(uid.to_string(), "(UID BODY.PEEK[])")?;
        let Some(raw) = fetches.iter().next().and_then(|f| f.body()) else {
            warn!("UID {uid} returned no body");
            return Ok(None);
        };
        Ok(Some(parse_message(MessageId::from(uid), raw)))
    }

    fn fetch_many(session: &mut ImapSession, uids: &[u32]) -> Result<Vec<MessageRecord>> {
        let mut out = Vec::with_capacity(uids.len());
        for &uid in uids {
            if let Some(rec) = Self::fetch_one(session, uid)? {
                out.push(rec);
            }
        }
        Ok(out)
    }

    /// The newest `limit` unseen messages, oldest first. They stay unseen on
    /// the server until [`ImapClient::mark_seen`] is called for them.
    pub fn fetch_unseen(&self, limit: usize) -> Result<Vec<MessageRecord>> {
        let mut session = self.connect_and_login()?;
        let uids = Self::sorted_uids(&mut session, "UNSEEN")?;
        let start = uids.len().saturating_sub(limit);
        debug!(
            "{} unseen on server, fetching {}",
            uids.len(),
            uids.len() - start
        );

        let out = Self::fetch_many(&mut session, &uids[start..])?;
        session.logout()?;
        Ok(out)
    }

    /// The newest `limit` messages in mailbox order (newest last).
    pub fn fetch_latest(&self, limit: usize) -> Result<Vec<MessageRecord>> {
        let mut session = self.connect_and_login()?;
        let uids = Self::sorted_uids(&mut session, "ALL")?;
        let start = uids.len().saturating_sub(limit);

        let out = Self::fetch_many(&mut session, &uids[start..])?;
        session.logout()?;
        Ok(out)
    }

    /// One page of the mailbox, newest first, plus the total message count.
    /// Page 0 = newest. Count and slice come from the same search.
    pub fn fetch_page(&self, page: u32, page_size: u32) -> Result<(Vec<MessageRecord>, usize)> {
        let mut session = self.connect_and_login()?;
        let mut uids = Self::sorted_uids(&mut session, "ALL")?;
        let total = uids.len();
        uids.reverse();

        let start = (page as usize).saturating_mul(page_size as usize);
        let page_uids: Vec<u32> = uids
            .iter()
            .skip(start)
            .take(page_size as usize)
            .copied()
            .collect();

        let out = Self::fetch_many(&mut session, &page_uids)?;
        session.logout()?;
        Ok((out, total))
    }

    pub fn fetch_by_id(&self, id: &MessageId) -> Result<Option<MessageRecord>> {
        let Ok(uid) = id.as_str().parse::<u32>() else {
            return Ok(None);
        };
        let mut session = self.connect_and_login()?;
        let out = Self::fetch_one(&mut session, uid)?;
        session.logout()?;
        Ok(out)
    }

    /// Set `\Seen` on every id in one STORE. Ids that are not UIDs are skipped.
    pub fn mark_seen(&self, ids: &[MessageId]) -> Result<()> {
        let uids: Vec<String> = ids
            .iter()
            .filter_map(|id| id.as_str().parse::<u32>().ok())
            .map(|uid| uid.to_string())
            .collect();
        if uids.is_empty() {
            return Ok(());
        }

        let mut session = self.connect_and_login()?;
        session.uid_store(uids.join(","), "+FLAGS (\\Seen)")?;
        debug!("marked {} message(s) seen", uids.len());
        session.logout()?;
        Ok(())
    }
}
