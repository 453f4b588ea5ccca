//! Conversation store for the Alice assistant.
//!
//! Every user and assistant message and every proposed command (approved or
//! not) is appended to a JSON-lines file, one record per line. Reopening the
//! file restores the records so ids keep increasing across restarts.

mod error;
mod record;
mod store;

pub use error::MemoryError;
pub use record::{CommandRecord, Record, StoredCommand, StoredMessage};
pub use store::Memory;
