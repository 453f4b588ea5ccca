/// The two command-execution models the executor knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Unix,
    Windows,
}

/// Verbs that only exist inside `cmd.exe` and therefore cannot be spawned directly.
const WINDOWS_BUILTINS: &[&str] = &[
    "dir", "type", "copy", "move", "del", "echo", "mkdir", "md", "rmdir", "rd", "ren", "cls",
    "ver", "vol", "set",
];

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Platform::Unix => "Unix",
            Platform::Windows => "Windows",
        }
    }

    /// Normalize a command name for lookups. Windows command names are case-insensitive.
    pub(crate) fn normalize(&self, command: &str) -> String {
        match self {
            Platform::Unix => command.to_string(),
            Platform::Windows => command.to_ascii_lowercase(),
        }
    }

    /// Whether `command` has to be run through the system command interpreter.
    pub fn is_interpreter_builtin(&self, command: &str) -> bool {
        match self {
            Platform::Unix => false,
            Platform::Windows => WINDOWS_BUILTINS.contains(&self.normalize(command).as_str()),
        }
    }

    /// Resolve the program and argument vector used to launch `command`.
    pub fn invocation(&self, command: &str, args: &[String]) -> (String, Vec<String>) {
        if self.is_interpreter_builtin(command) {
            let mut argv = Vec::with_capacity(args.len() + 2);
            argv.push("/C".to_string());
            argv.push(command.to_string());
            argv.extend(args.iter().cloned());
            ("cmd".to_string(), argv)
        } else {
            (command.to_string(), args.to_vec())
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::current()
    }
}
