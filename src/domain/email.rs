use std::fmt;

/// Mailbox-scoped message identifier (an IMAP UID rendered as text).
///
/// Only meaningful within one mailbox session; never treated as a durable key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u32> for MessageId {
    fn from(uid: u32) -> Self {
        Self(uid.to_string())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub data: Vec<u8>,
    pub size: usize,
}

impl Attachment {
    pub fn new(filename: impl Into<String>, data: Vec<u8>) -> Self {
        let size = data.len();
        Self {
            filename: filename.into(),
            data,
            size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub id: MessageId,
    pub subject: String,
    pub sender: String,
    pub date: String,
    pub body: String,
    pub attachments: Vec<Attachment>,
}

impl MessageRecord {
    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }
}
