use std::path::Path;

use alice_execution::ExecutionResult;

use crate::thinking::ThinkingMarkers;

/// Everything the session loop shows to, or asks of, the user.
pub trait UiWriter: Send + Sync {
    fn println(&self, message: &str);

    /// Prefix printed before a streamed reply.
    fn print_agent_prompt(&self);

    /// Echo a piece of a reply as it arrives.
    fn print_agent_response(&self, content: &str);

    /// Text wrapped around `<think>` blocks when they are shown.
    fn thinking_markers(&self) -> ThinkingMarkers;

    /// Erase a streamed reply, including its prefix, once tool calls replace it.
    /// `shown` is exactly the text that was echoed.
    fn retract_agent_response(&self, shown: &str);

    fn print_tool_call(&self, tool_name: &str, command_line: &str);

    fn print_safety_rejection(&self, reason: &str);

    fn print_executing(&self);

    fn print_command_result(&self, result: &ExecutionResult);

    fn print_cwd_change(&self, cwd: &Path);

    fn print_notice(&self, message: &str);

    fn print_error(&self, message: &str);

    fn print_context_status(&self, used_tokens: u32, max_tokens: Option<u32>);

    /// Yes/no question. Anything but an explicit yes is a no.
    fn confirm(&self, prompt: &str) -> bool;

    fn flush(&self);
}
