use std::path::Path;
use std::time::Duration;

use alice_config::Config;
use alice_execution::{split_command_line, CommandExecutor, ExecutionResult};
use alice_memory::{CommandRecord, Memory};
use alice_providers::{LLMProvider, LlmClient, LlmClientConfig, Message, Tool, ToolCall};
use anyhow::Result;
use chrono::Local;
use tokio_stream::StreamExt;
use tracing::{debug, info, instrument, warn};

use crate::context::estimate_tokens;
use crate::parsing::{command_from_action, extract_command_from_text};
use crate::prompt::default_system_prompt;
use crate::thinking::ThinkingFilter;
use crate::tools::{command_line_from_args, create_tool_definitions, EXECUTE_COMMAND};
use crate::ui_writer::UiWriter;

/// Model round-trips allowed per user input.
pub const MAX_ITERATIONS: usize = 5;

pub const CANCELLED_MESSAGE: &str = "Command execution cancelled by user";

/// What a line typed at the prompt asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserInput {
    Empty,
    Exit,
    Clear,
    Message(String),
}

impl UserInput {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_lowercase().as_str() {
            "" => UserInput::Empty,
            "exit" | "quit" | "bye" => UserInput::Exit,
            "clear" => UserInput::Clear,
            _ => UserInput::Message(trimmed.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnOutcome {
    pub iterations: usize,
    pub hit_limit: bool,
}

/// `session_<YYYYmmdd_HHMMSS>_<8 hex>`
pub fn new_session_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "session_{}_{}",
        Local::now().format("%Y%m%d_%H%M%S"),
        &suffix[..8]
    )
}

struct StreamedReply {
    raw: String,
    shown: String,
}

pub struct Agent<W: UiWriter> {
    provider: Box<dyn LLMProvider>,
    executor: CommandExecutor,
    memory: Option<Memory>,
    history: Vec<Message>,
    tools: Vec<Tool>,
    config: Config,
    session_id: String,
    ui_writer: W,
}

impl<W: UiWriter> Agent<W> {
    /// Wire up the model client, executor and conversation store from configuration.
    pub fn new(config: Config, ui_writer: W) -> Result<Self> {
        let url = config.completions_url()?.to_string();

        let cwd = std::env::current_dir()?;
        let executor = CommandExecutor::new(
            Duration::from_secs(config.execution.timeout_secs),
            config.execution.max_output,
            cwd,
        );

        let system_prompt = config.agent.system_prompt.clone().unwrap_or_else(|| {
            default_system_prompt(executor.platform(), config.agent.use_function_calling)
        });

        let mut client_config = LlmClientConfig::new(url, config.llm.model.clone());
        client_config.system_prompt = Some(system_prompt);
        client_config.context_length = config.llm.context_length;
        client_config.verify_tls = config.llm.verify_tls;
        client_config.timeout = Duration::from_secs(config.llm.timeout_secs);
        if let Some((user, pass)) = config.llm.credentials() {
            client_config.username = Some(user.to_string());
            client_config.password = Some(pass.to_string());
        }
        let provider = LlmClient::new(client_config)?;

        let memory = match Memory::open(&config.memory.path) {
            Ok(memory) => Some(memory),
            Err(e) => {
                warn!("Conversation store unavailable, continuing without it: {}", e);
                None
            }
        };

        Ok(Self::with_components(
            config,
            ui_writer,
            Box::new(provider),
            executor,
            memory,
            new_session_id(),
        ))
    }

    pub fn with_components(
        config: Config,
        ui_writer: W,
        provider: Box<dyn LLMProvider>,
        executor: CommandExecutor,
        memory: Option<Memory>,
        session_id: String,
    ) -> Self {
        info!(
            "Session {} using {} model {}",
            session_id,
            provider.name(),
            provider.model()
        );
        Self {
            provider,
            executor,
            memory,
            history: Vec::new(),
            tools: create_tool_definitions(),
            config,
            session_id,
            ui_writer,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn provider(&self) -> &dyn LLMProvider {
        self.provider.as_ref()
    }

    pub fn executor(&self) -> &CommandExecutor {
        &self.executor
    }

    pub fn memory(&self) -> Option<&Memory> {
        self.memory.as_ref()
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn ui_writer(&self) -> &W {
        &self.ui_writer
    }

    pub fn clear_history(&mut self) {
        debug!("Clearing {} messages of history", self.history.len());
        self.history.clear();
    }

    /// Handle one user message.
    ///
    /// The turn works on a copy of the history, committed only once the turn
    /// finishes. Dropping the returned future leaves the history untouched.
    #[instrument(skip_all, fields(session = %self.session_id))]
    pub async fn run_turn(&mut self, input: &str) -> TurnOutcome {
        let mut history = self.history.clone();
        history.push(Message::user(input));
        self.log_message("user", input);

        self.ui_writer
            .print_context_status(estimate_tokens(&history), self.config.agent.max_context);

        let outcome = if self.config.agent.use_function_calling {
            self.run_tool_iterations(&mut history).await
        } else {
            self.run_inline_turn(&mut history).await
        };

        self.history = history;
        outcome
    }

    async fn run_tool_iterations(&mut self, history: &mut Vec<Message>) -> TurnOutcome {
        for iteration in 1..=MAX_ITERATIONS {
            debug!("Iteration {}/{}", iteration, MAX_ITERATIONS);

            let streamed = self.stream_reply(history).await;
            let checked = self
                .provider
                .chat(history, self.config.llm.temperature, Some(self.tools.as_slice()))
                .await;

            if checked.tool_calls.is_empty() {
                history.push(Message::assistant(streamed.raw.clone()));
                self.log_message("assistant", &streamed.raw);
                return TurnOutcome {
                    iterations: iteration,
                    hit_limit: false,
                };
            }

            debug!("Model requested {} tool call(s)", checked.tool_calls.len());
            self.ui_writer.retract_agent_response(&streamed.shown);
            if !checked.content.trim().is_empty() {
                self.show_text(&checked.content);
                self.log_message("assistant", &checked.content);
            }
            history.push(
                Message::assistant(checked.content.clone())
                    .with_tool_calls(checked.tool_calls.clone()),
            );

            for call in &checked.tool_calls {
                let content = self.handle_tool_call(call).await;
                self.log_message("system", &format!("Tool {}: {}", call.name, content));
                history.push(Message::tool(content, call.id.clone()));
            }
        }

        self.ui_writer.print_notice(&format!(
            "Reached the limit of {} tool iterations for this message.",
            MAX_ITERATIONS
        ));
        TurnOutcome {
            iterations: MAX_ITERATIONS,
            hit_limit: true,
        }
    }

    /// Function calling off: one streamed reply, then look for a command written into it.
    async fn run_inline_turn(&mut self, history: &mut Vec<Message>) -> TurnOutcome {
        let streamed = self.stream_reply(history).await;
        history.push(Message::assistant(streamed.raw.clone()));
        self.log_message("assistant", &streamed.raw);

        let action = self.provider.parse_action(&streamed.raw);
        let proposed =
            command_from_action(&action).or_else(|| extract_command_from_text(&streamed.raw));

        if let Some(line) = proposed {
            self.ui_writer.print_tool_call(EXECUTE_COMMAND, &line);
            let content = self.run_command_line(&line).await;
            debug!("Inline command finished: {}", content);
        }

        TurnOutcome {
            iterations: 1,
            hit_limit: false,
        }
    }

    async fn stream_reply(&self, history: &[Message]) -> StreamedReply {
        let mut filter = ThinkingFilter::with_markers(
            self.config.agent.show_thinking,
            self.ui_writer.thinking_markers(),
        );
        let mut raw = String::new();
        let mut shown = String::new();

        self.ui_writer.print_agent_prompt();
        let mut stream = self
            .provider
            .stream_chat(history, self.config.llm.temperature, None)
            .await;

        while let Some(fragment) = stream.next().await {
            let visible = filter.process_chunk(&fragment);
            if !visible.is_empty() {
                self.ui_writer.print_agent_response(&visible);
                shown.push_str(&visible);
            }
            raw.push_str(&fragment);
        }

        let tail = filter.finalize();
        if !tail.is_empty() {
            self.ui_writer.print_agent_response(&tail);
            shown.push_str(&tail);
        }
        self.ui_writer.println("");
        self.ui_writer.flush();

        StreamedReply { raw, shown }
    }

    /// Print a complete reply the way a streamed one would have looked.
    fn show_text(&self, text: &str) {
        let mut filter = ThinkingFilter::with_markers(
            self.config.agent.show_thinking,
            self.ui_writer.thinking_markers(),
        );
        let mut visible = filter.process_chunk(text);
        visible.push_str(&filter.finalize());

        self.ui_writer.print_agent_prompt();
        self.ui_writer.print_agent_response(&visible);
        self.ui_writer.println("");
        self.ui_writer.flush();
    }

    async fn handle_tool_call(&mut self, call: &ToolCall) -> String {
        if call.name != EXECUTE_COMMAND {
            warn!("Model called unknown tool '{}'", call.name);
            let content = format!("Unknown tool: {}", call.name);
            self.ui_writer.print_error(&content);
            return content;
        }

        let Some(line) = command_line_from_args(&call.args) else {
            warn!("execute_command called without a command: {:?}", call.args);
            self.ui_writer.print_error("Tool call is missing a command");
            return "Error: Missing command argument".to_string();
        };

        self.ui_writer.print_tool_call(&call.name, &line);
        self.run_command_line(&line).await
    }

    /// Validate, confirm, run and log one command line. Returns the text fed back to the model.
    async fn run_command_line(&mut self, line: &str) -> String {
        let mut tokens = split_command_line(line, self.executor.platform());
        if tokens.is_empty() {
            self.ui_writer.print_safety_rejection("Empty command");
            return "Error: Empty command".to_string();
        }
        let command = tokens.remove(0);
        let args = tokens;

        if let Err(reason) = self.executor.is_command_safe(&command, &args) {
            info!("Blocked command '{}': {}", line, reason);
            self.ui_writer.print_safety_rejection(&reason);
            self.log_command(CommandRecord::rejected(command, args));
            return format!("Error: {}", reason);
        }

        if !self.ui_writer.confirm("Execute this command?") {
            self.ui_writer.print_notice(CANCELLED_MESSAGE);
            self.log_command(CommandRecord::rejected(command, args));
            return CANCELLED_MESSAGE.to_string();
        }

        self.ui_writer.print_executing();
        let previous_cwd = self.executor.cwd().to_path_buf();
        let result = self.executor.execute(&command, &args).await;
        self.ui_writer.print_command_result(&result);
        self.announce_cwd_change(&previous_cwd, &result);

        self.log_command(CommandRecord {
            command,
            args,
            approved: true,
            exit_code: Some(result.exit_code),
            stdout: Some(result.stdout.clone()),
            stderr: Some(result.stderr.clone()),
        });

        result_message(&result)
    }

    /// The executor has already moved; only the announcement is left.
    fn announce_cwd_change(&self, previous: &Path, result: &ExecutionResult) {
        if result.cwd != previous {
            self.ui_writer.print_cwd_change(&result.cwd);
        }
    }

    fn log_message(&mut self, role: &str, content: &str) {
        if let Some(memory) = self.memory.as_mut() {
            if let Err(e) = memory.add_message(&self.session_id, role, content) {
                warn!("Failed to record message: {}", e);
            }
        }
    }

    fn log_command(&mut self, record: CommandRecord) {
        if let Some(memory) = self.memory.as_mut() {
            if let Err(e) = memory.add_command(&self.session_id, record) {
                warn!("Failed to record command: {}", e);
            }
        }
    }
}

/// Tool message content for a finished command.
fn result_message(result: &ExecutionResult) -> String {
    if result.success {
        format!("Success: {}", result.stdout.trim())
    } else {
        let stderr = result.stderr.trim();
        let detail = if !stderr.is_empty() {
            stderr.to_string()
        } else if let Some(error) = &result.error {
            error.clone()
        } else {
            format!("exit code {}", result.exit_code)
        };
        format!("Failed: {}", detail)
    }
}
