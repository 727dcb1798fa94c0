// Public modules
pub mod chat_request;
pub mod display_segment;
pub mod message;
pub mod protocol_event;

// Re-exports
pub use chat_request::{Attachment, ChatRequest, FileData, mime_type_for};
pub use display_segment::{DisplaySegment, SpannedSegment};
pub use message::{Message, MessageId, MessageRole, MessageStatus};
pub use protocol_event::ProtocolEvent;
pub(crate) use protocol_event::StreamPayload;
