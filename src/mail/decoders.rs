use log::warn;
use mailparse::{DispositionType, MailHeaderMap, ParsedMail};

use crate::domain::email::{Attachment, MessageId, MessageRecord};

/// Attachments above this size are dropped (bot API upload cap).
pub const MAX_ATTACHMENT_BYTES: usize = 50 * 1024 * 1024;

const HTML_WRAP_WIDTH: usize = 1_000;

pub fn decode_mime_words(raw: &[u8]) -> String {
    // mailparse expects a full "Key: value" header line
    let mut line = b"X: ".to_vec();
    line.extend_from_slice(raw);
    line.extend_from_slice(b"\r\n");

    match mailparse::parse_header(&line) {
        Ok((h, _idx)) => h.get_value(),
        Err(_) => String::from_utf8_lossy(raw).into_owned(),
    }
}

/// Turn a raw RFC 822 message into a [`MessageRecord`].
///
/// Never fails: an unparseable message becomes a record whose body is the
/// lossy text of the raw bytes.
pub fn parse_message(id: MessageId, raw_rfc822: &[u8]) -> MessageRecord {
    let parsed = match mailparse::parse_mail(raw_rfc822) {
        Ok(p) => p,
        Err(e) => {
            warn!("message {id}: MIME parse failed ({e}); using raw text");
            return MessageRecord {
                id,
                subject: "(no subject)".to_string(),
                sender: String::new(),
                date: String::new(),
                body: String::from_utf8_lossy(raw_rfc822).trim().to_string(),
                attachments: Vec::new(),
            };
        }
    };

    let subject = parsed
        .headers
        .get_first_value("Subject")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "(no subject)".to_string());
    let sender = parsed
        .headers
        .get_first_value("From")
        .map(|s| s.trim().to_string())
        .unwrap_or_default();
    let date = parsed
        .headers
        .get_first_value("Date")
        .map(|s| s.trim().to_string())
        .unwrap_or_default();

    let mut attachments = Vec::new();
    collect_attachments(&id, &parsed, &mut attachments);

    MessageRecord {
        id,
        subject,
        sender,
        date,
        body: extract_body(&parsed),
        attachments,
    }
}

/// Prefer the last text/plain part, fall back to text/html rendered as text.
pub fn extract_body(parsed: &ParsedMail) -> String {
    let mut plain = None;
    let mut html = None;
    walk_text_parts(parsed, &mut plain, &mut html);

    if let Some(text) = plain.filter(|t: &String| !t.trim().is_empty()) {
        return text.trim().to_string();
    }
    html.map(|h| html_to_text(&h)).unwrap_or_default()
}

fn walk_text_parts(p: &ParsedMail, plain: &mut Option<String>, html: &mut Option<String>) {
    if !p.subparts.is_empty() {
        for sp in &p.subparts {
            walk_text_parts(sp, plain, html);
        }
        return;
    }

    if matches!(
        p.get_content_disposition().disposition,
        DispositionType::Attachment
    ) {
        return;
    }

    let mime = p.ctype.mimetype.to_ascii_lowercase();
    let Ok(body) = p.get_body() else {
        return;
    };
    if mime == "text/html" {
        *html = Some(body);
    } else if mime == "text/plain" || mime.is_empty() {
        *plain = Some(body);
    }
}

pub fn html_to_text(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }
    match html2text::from_read(html.as_bytes(), HTML_WRAP_WIDTH) {
        Ok(text) => text.trim().to_string(),
        Err(e) => {
            warn!("html2text failed ({e}); sending raw markup");
            html.trim().to_string()
        }
    }
}

fn attachment_filename(p: &ParsedMail) -> Option<String> {
    let disposition = p.get_content_disposition();
    disposition
        .params
        .get("filename")
        .or_else(|| p.ctype.params.get("name"))
        .map(|raw| decode_mime_words(raw.as_bytes()))
        .map(|s| s.trim().trim_matches('"').to_string())
        .filter(|s| !s.is_empty())
}

fn collect_attachments(id: &MessageId, p: &ParsedMail, out: &mut Vec<Attachment>) {
    for sp in &p.subparts {
        collect_attachments(id, sp, out);
    }
    if !p.subparts.is_empty() {
        return;
    }

    let disposition = p.get_content_disposition().disposition;
    if !matches!(
        disposition,
        DispositionType::Attachment | DispositionType::Inline
    ) {
        return;
    }
    let Some(filename) = attachment_filename(p) else {
        return;
    };

    match p.get_body_raw() {
        Ok(data) if data.len() <= MAX_ATTACHMENT_BYTES => {
            out.push(Attachment::new(filename, data));
        }
        Ok(data) => {
            warn!(
                "message {id}: skipping attachment {filename} ({} bytes, over limit)",
                data.len()
            );
        }
        Err(e) => warn!("message {id}: could not decode attachment {filename}: {e}"),
    }
}
