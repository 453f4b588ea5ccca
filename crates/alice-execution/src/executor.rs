use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::ExecutionError;
use crate::platform::Platform;
use crate::safety::SafetyGate;
use crate::tokenize::split_command_line;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_OUTPUT_SIZE: usize = 10_000;
pub const TRUNCATION_MARKER: &str = "\n... (output truncated)";

/// Outcome of one command attempt.
///
/// `success` is `exit_code == 0` for commands that ran. Attempts that never
/// produced an exit status (rejected, timed out, not found) report
/// `success = false` and `exit_code = -1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub success: bool,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub error: Option<String>,
    /// Executor working directory at the time the call returned.
    pub cwd: PathBuf,
}

impl ExecutionResult {
    fn completed(exit_code: i32, stdout: String, stderr: String, cwd: PathBuf) -> Self {
        Self {
            success: exit_code == 0,
            exit_code,
            stdout,
            stderr,
            error: None,
            cwd,
        }
    }

    fn failed(error: ExecutionError, cwd: PathBuf) -> Self {
        Self {
            success: false,
            exit_code: -1,
            stdout: String::new(),
            stderr: error.to_string(),
            error: Some(error.tag()),
            cwd,
        }
    }
}

/// Runs allowlisted commands and tracks the working directory between calls.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    gate: SafetyGate,
    timeout: Duration,
    max_output_size: usize,
    cwd: PathBuf,
}

impl CommandExecutor {
    pub fn new(timeout: Duration, max_output_size: usize, cwd: PathBuf) -> Self {
        Self::with_safety_gate(SafetyGate::default(), timeout, max_output_size, cwd)
    }

    pub fn with_safety_gate(
        gate: SafetyGate,
        timeout: Duration,
        max_output_size: usize,
        cwd: PathBuf,
    ) -> Self {
        info!(
            "Command executor ready: platform={}, timeout={}s, max_output={}, cwd={}",
            gate.platform().name(),
            timeout.as_secs(),
            max_output_size,
            cwd.display()
        );
        Self {
            gate,
            timeout,
            max_output_size,
            cwd,
        }
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn set_cwd(&mut self, cwd: PathBuf) {
        self.cwd = cwd;
    }

    pub fn platform(&self) -> Platform {
        self.gate.platform()
    }

    pub fn safety_gate(&self) -> &SafetyGate {
        &self.gate
    }

    pub fn is_command_safe(&self, command: &str, args: &[String]) -> Result<(), String> {
        self.gate.is_safe(command, args)
    }

    /// Tokenize a raw command line for this executor's platform and run it.
    pub async fn execute_line(&mut self, line: &str) -> ExecutionResult {
        let mut tokens = split_command_line(line, self.platform());
        if tokens.is_empty() {
            return ExecutionResult::failed(
                ExecutionError::Unsafe("Empty command".to_string()),
                self.cwd.clone(),
            );
        }
        let command = tokens.remove(0);
        self.execute(&command, &tokens).await
    }

    pub async fn execute(&mut self, command: &str, args: &[String]) -> ExecutionResult {
        if let Err(reason) = self.gate.is_safe(command, args) {
            warn!("Rejected command '{}': {}", command, reason);
            return ExecutionResult::failed(ExecutionError::Unsafe(reason), self.cwd.clone());
        }

        if self.platform().normalize(command) == "cd" {
            return self.change_directory(args);
        }

        debug!("Executing {} {:?} in {}", command, args, self.cwd.display());
        match self.run_process(command, args).await {
            Ok((exit_code, stdout, stderr)) => {
                debug!("'{}' exited with {}", command, exit_code);
                ExecutionResult::completed(
                    exit_code,
                    truncate_output(stdout, self.max_output_size),
                    truncate_output(stderr, self.max_output_size),
                    self.cwd.clone(),
                )
            }
            Err(e) => {
                warn!("Command '{}' failed: {}", command, e);
                ExecutionResult::failed(e, self.cwd.clone())
            }
        }
    }

    fn change_directory(&mut self, args: &[String]) -> ExecutionResult {
        let target = if args.is_empty() {
            match dirs::home_dir() {
                Some(home) => home,
                None => {
                    return ExecutionResult::completed(
                        1,
                        String::new(),
                        "cd: home directory is unknown".to_string(),
                        self.cwd.clone(),
                    )
                }
            }
        } else {
            let raw = args.join(" ");
            PathBuf::from(shellexpand::tilde(&raw).into_owned())
        };

        let candidate = if target.is_absolute() {
            target
        } else {
            self.cwd.join(target)
        };

        match std::fs::canonicalize(&candidate) {
            Ok(resolved) if resolved.is_dir() => {
                let resolved = simplify_path(resolved);
                info!("Working directory changed to {}", resolved.display());
                self.cwd = resolved;
                ExecutionResult::completed(
                    0,
                    format!("Changed directory to {}", self.cwd.display()),
                    String::new(),
                    self.cwd.clone(),
                )
            }
            Ok(resolved) => ExecutionResult::completed(
                1,
                String::new(),
                format!("cd: not a directory: {}", resolved.display()),
                self.cwd.clone(),
            ),
            Err(_) => ExecutionResult::completed(
                1,
                String::new(),
                format!("cd: no such directory: {}", candidate.display()),
                self.cwd.clone(),
            ),
        }
    }

    async fn run_process(
        &self,
        command: &str,
        args: &[String],
    ) -> Result<(i32, String, String), ExecutionError> {
        let (program, argv) = self.platform().invocation(command, args);

        let mut child = Command::new(&program)
            .args(&argv)
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ExecutionError::NotFound(command.to_string()),
                _ => ExecutionError::Io(e),
            })?;

        let read_stdout = read_pipe(child.stdout.take());
        let read_stderr = read_pipe(child.stderr.take());
        let wait = child.wait();

        let outcome = tokio::time::timeout(self.timeout, async move {
            let (status, stdout, stderr) = tokio::join!(wait, read_stdout, read_stderr);
            Ok::<_, std::io::Error>((status?, stdout?, stderr?))
        })
        .await;

        match outcome {
            Ok(Ok((status, stdout, stderr))) => Ok((status.code().unwrap_or(-1), stdout, stderr)),
            Ok(Err(e)) => Err(ExecutionError::Io(e)),
            Err(_) => {
                warn!(
                    "'{}' exceeded {}s, terminating",
                    command,
                    self.timeout.as_secs()
                );
                if let Err(e) = child.kill().await {
                    warn!("Failed to terminate timed out process: {}", e);
                }
                Err(ExecutionError::Timeout(self.timeout))
            }
        }
    }
}

impl Default for CommandExecutor {
    fn default() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::new(DEFAULT_TIMEOUT, DEFAULT_MAX_OUTPUT_SIZE, cwd)
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> std::io::Result<String> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Keep the first `max_chars` characters and mark the cut.
fn truncate_output(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => {
            let mut truncated = text[..byte_idx].to_string();
            truncated.push_str(TRUNCATION_MARKER);
            truncated
        }
        None => text,
    }
}

/// `cmd.exe` refuses verbatim (`\\?\`) working directories.
fn simplify_path(path: PathBuf) -> PathBuf {
    if cfg!(windows) {
        if let Some(stripped) = path.to_str().and_then(|s| s.strip_prefix(r"\\?\")) {
            if !stripped.starts_with("UNC") {
                return PathBuf::from(stripped);
            }
        }
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tempfile::TempDir;

    fn canonical_tempdir() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = simplify_path(std::fs::canonicalize(dir.path()).unwrap());
        (dir, path)
    }

    fn executor_in(cwd: PathBuf) -> CommandExecutor {
        CommandExecutor::new(DEFAULT_TIMEOUT, DEFAULT_MAX_OUTPUT_SIZE, cwd)
    }

    #[test]
    fn truncation_appends_marker() {
        let out = truncate_output("abcdefghij".to_string(), 4);
        assert_eq!(out, format!("abcd{}", TRUNCATION_MARKER));
        assert_eq!(truncate_output("abc".to_string(), 3), "abc");
        assert_eq!(truncate_output("ééééé".to_string(), 2), format!("éé{}", TRUNCATION_MARKER));
    }

    #[tokio::test]
    async fn cd_to_parent_updates_cwd() {
        let (_dir, root) = canonical_tempdir();
        let child = root.join("child");
        std::fs::create_dir(&child).unwrap();

        let mut executor = executor_in(child);
        let result = executor.execute("cd", &["..".to_string()]).await;

        assert!(result.success);
        assert_eq!(result.exit_code, 0);
        assert_eq!(executor.cwd(), root.as_path());
        assert_eq!(result.cwd, root);
        assert!(result.stdout.contains(&root.display().to_string()));
    }

    #[tokio::test]
    async fn set_cwd_applies_to_later_commands() {
        let (_dir, root) = canonical_tempdir();
        let mut executor = executor_in(std::env::temp_dir());

        executor.set_cwd(root.clone());
        let result = executor.execute("cd", &[".".to_string()]).await;

        assert!(result.success);
        assert_eq!(result.cwd, root);
    }

    #[tokio::test]
    async fn cd_to_missing_directory_leaves_cwd_unchanged() {
        let (_dir, root) = canonical_tempdir();
        let mut executor = executor_in(root.clone());

        let result = executor
            .execute("cd", &["/nonexistent-xyz".to_string()])
            .await;

        assert!(!result.success);
        assert_ne!(result.exit_code, 0);
        assert_eq!(executor.cwd(), root.as_path());
        assert_eq!(result.cwd, root);
    }

    #[tokio::test]
    async fn cd_into_a_file_is_rejected() {
        let (_dir, root) = canonical_tempdir();
        std::fs::write(root.join("notes.txt"), "x").unwrap();
        let mut executor = executor_in(root.clone());

        let result = executor.execute("cd", &["notes.txt".to_string()]).await;

        assert!(!result.success);
        assert!(result.stderr.contains("not a directory"));
        assert_eq!(executor.cwd(), root.as_path());
    }

    #[tokio::test]
    async fn cd_relative_and_with_spaces() {
        let (_dir, root) = canonical_tempdir();
        std::fs::create_dir(root.join("my docs")).unwrap();
        let mut executor = executor_in(root.clone());

        let result = executor.execute_line("cd \"my docs\"").await;

        assert!(result.success, "{:?}", result);
        assert_eq!(executor.cwd(), root.join("my docs").as_path());
    }

    #[tokio::test]
    async fn unsafe_commands_are_rejected_before_spawning() {
        let (_dir, root) = canonical_tempdir();
        let mut executor = executor_in(root.clone());

        let result = executor
            .execute("ls", &["-la;".to_string(), "rm".to_string(), "-rf".to_string()])
            .await;

        assert!(!result.success);
        assert_eq!(result.exit_code, -1);
        assert!(result.stdout.is_empty());
        assert_eq!(result.stderr, "Arguments contain blocked pattern: ;");
        assert_eq!(result.error.as_deref(), Some("Arguments contain blocked pattern: ;"));
        assert_eq!(result.cwd, root);
    }

    #[tokio::test]
    async fn execute_line_rejects_chained_commands() {
        let mut executor = CommandExecutor::default();
        let result = executor.execute_line("ls; rm -rf /").await;
        assert!(!result.success);
        assert_eq!(result.exit_code, -1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn echo_runs_directly() {
        let (_dir, root) = canonical_tempdir();
        let mut executor = executor_in(root.clone());

        let result = executor.execute_line("echo \"hello   world\"").await;

        assert!(result.success);
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, "hello   world\n");
        assert!(result.stderr.is_empty());
        assert_eq!(result.error, None);
        assert_eq!(result.cwd, root);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn processes_run_in_the_tracked_directory() {
        let (_dir, root) = canonical_tempdir();
        std::fs::create_dir(root.join("inner")).unwrap();
        let mut executor = executor_in(root.clone());

        assert!(executor.execute("cd", &["inner".to_string()]).await.success);
        let result = executor.execute("pwd", &[]).await;

        assert!(result.success);
        assert_eq!(result.stdout.trim(), root.join("inner").display().to_string());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_reported() {
        let (_dir, root) = canonical_tempdir();
        let mut executor = executor_in(root);

        let result = executor
            .execute("ls", &["/nonexistent-xyz-alice".to_string()])
            .await;

        assert!(!result.success);
        assert_ne!(result.exit_code, 0);
        assert_eq!(result.success, result.exit_code == 0);
        assert!(!result.stderr.is_empty());
        assert_eq!(result.error, None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn output_is_truncated_to_the_budget() {
        let (_dir, root) = canonical_tempdir();
        let mut executor = CommandExecutor::new(DEFAULT_TIMEOUT, 10, root);
        let long = "x".repeat(50);

        let result = executor.execute("echo", &[long]).await;

        assert!(result.success);
        assert_eq!(result.stdout, format!("{}{}", "x".repeat(10), TRUNCATION_MARKER));
        assert_eq!(
            result.stdout.chars().count(),
            10 + TRUNCATION_MARKER.chars().count()
        );
    }

    #[tokio::test]
    async fn missing_executable_is_command_not_found() {
        let (_dir, root) = canonical_tempdir();
        let gate = SafetyGate::new(Platform::current()).allowing("alice-no-such-binary-xyz");
        let mut executor =
            CommandExecutor::with_safety_gate(gate, DEFAULT_TIMEOUT, DEFAULT_MAX_OUTPUT_SIZE, root);

        let result = executor.execute("alice-no-such-binary-xyz", &[]).await;

        assert!(!result.success);
        assert_eq!(result.exit_code, -1);
        assert_eq!(result.error.as_deref(), Some("Command not found"));
        assert_eq!(result.stderr, "Command 'alice-no-such-binary-xyz' not found");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_commands_time_out() {
        let (_dir, root) = canonical_tempdir();
        let gate = SafetyGate::new(Platform::Unix).allowing("sleep");
        let mut executor = CommandExecutor::with_safety_gate(
            gate,
            Duration::from_millis(300),
            DEFAULT_MAX_OUTPUT_SIZE,
            root,
        );

        let started = Instant::now();
        let result = executor.execute("sleep", &["5".to_string()]).await;

        assert!(started.elapsed() < Duration::from_secs(4));
        assert!(!result.success);
        assert_eq!(result.exit_code, -1);
        assert_eq!(result.error.as_deref(), Some("Timeout"));
        assert!(result.stderr.starts_with("Command timed out after"));
    }
}
