pub mod chat;
pub mod email;

pub use chat::{Ack, ChatId, EventKind, InboundEvent, Profile};
pub use email::{Attachment, MessageId, MessageRecord};
