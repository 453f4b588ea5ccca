//! Hides (or marks) `<think>…</think>` reasoning blocks in streamed model output.
//!
//! Each chunk is scanned on its own, so a tag split across two chunks passes
//! through as plain text.

const OPEN_TAG: &str = "<think>";
const CLOSE_TAG: &str = "</think>";

/// Text written around a thinking block when display is enabled. Styling is up
/// to the UI, see [`UiWriter::thinking_markers`](crate::UiWriter::thinking_markers).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThinkingMarkers {
    pub open: String,
    pub close: String,
}

impl ThinkingMarkers {
    pub fn plain() -> Self {
        Self {
            open: "[thinking: ".to_string(),
            close: "]".to_string(),
        }
    }
}

impl Default for ThinkingMarkers {
    fn default() -> Self {
        Self::plain()
    }
}

#[derive(Debug, Clone)]
pub struct ThinkingFilter {
    show_thinking: bool,
    in_thinking: bool,
    markers: ThinkingMarkers,
}

impl ThinkingFilter {
    pub fn new(show_thinking: bool) -> Self {
        Self::with_markers(show_thinking, ThinkingMarkers::default())
    }

    pub fn with_markers(show_thinking: bool, markers: ThinkingMarkers) -> Self {
        Self {
            show_thinking,
            in_thinking: false,
            markers,
        }
    }

    pub fn is_thinking(&self) -> bool {
        self.in_thinking
    }

    /// Returns the displayable part of `chunk`.
    pub fn process_chunk(&mut self, chunk: &str) -> String {
        let mut output = String::with_capacity(chunk.len());
        let mut rest = chunk;

        loop {
            if self.in_thinking {
                match rest.find(CLOSE_TAG) {
                    Some(pos) => {
                        if self.show_thinking {
                            output.push_str(&rest[..pos]);
                            output.push_str(&self.markers.close);
                        }
                        self.in_thinking = false;
                        rest = &rest[pos + CLOSE_TAG.len()..];
                    }
                    None => {
                        if self.show_thinking {
                            output.push_str(rest);
                        }
                        break;
                    }
                }
            } else {
                match rest.find(OPEN_TAG) {
                    Some(pos) => {
                        output.push_str(&rest[..pos]);
                        if self.show_thinking {
                            output.push_str(&self.markers.open);
                        }
                        self.in_thinking = true;
                        rest = &rest[pos + OPEN_TAG.len()..];
                    }
                    None => {
                        output.push_str(rest);
                        break;
                    }
                }
            }
        }

        output
    }

    /// Close a block left open at the end of the stream.
    pub fn finalize(&mut self) -> String {
        let was_thinking = std::mem::replace(&mut self.in_thinking, false);
        if was_thinking && self.show_thinking {
            self.markers.close.clone()
        } else {
            String::new()
        }
    }
}
