use tracing::debug;

use crate::platform::Platform;

/// Split a raw command line into tokens using the quoting rules of `platform`.
///
/// POSIX lines go through `shlex`; Windows lines through `winsplit`. When the
/// tokenizer rejects the input (an unterminated quote, for example) the line
/// is split on whitespace instead.
pub fn split_command_line(line: &str, platform: Platform) -> Vec<String> {
    let tokens = match platform {
        Platform::Unix => shlex::split(line),
        Platform::Windows => {
            let tokens = winsplit::split(line);
            if tokens.is_empty() && !line.trim().is_empty() {
                None
            } else {
                Some(tokens)
            }
        }
    };

    tokens.unwrap_or_else(|| {
        debug!("Falling back to whitespace splitting for: {}", line);
        line.split_whitespace().map(String::from).collect()
    })
}
