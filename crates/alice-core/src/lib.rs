//! Session loop for the Alice assistant.
//!
//! [`Agent`] owns the conversation history, the command executor and the
//! conversation store. Each user message becomes a turn: the reply is
//! streamed to the [`UiWriter`], a non-streaming request asks the model for
//! tool calls, and any proposed command is validated, confirmed by the user
//! and run before the result goes back to the model.

pub mod agent;
pub mod context;
pub mod parsing;
pub mod prompt;
pub mod thinking;
pub mod tools;
pub mod ui_writer;

pub use agent::{new_session_id, Agent, TurnOutcome, UserInput, CANCELLED_MESSAGE, MAX_ITERATIONS};
pub use context::estimate_tokens;
pub use thinking::{ThinkingFilter, ThinkingMarkers};
pub use ui_writer::UiWriter;
