use alice_providers::Message;

/// Rough token count of a conversation: one token per four characters, rounded up.
pub fn estimate_tokens(messages: &[Message]) -> u32 {
    let chars: usize = messages.iter().map(|m| m.content.chars().count()).sum();
    u32::try_from(chars.div_ceil(4)).unwrap_or(u32::MAX)
}

/// Share of `max_tokens` in use, as a percentage.
pub fn percentage_used(used_tokens: u32, max_tokens: u32) -> f32 {
    if max_tokens == 0 {
        0.0
    } else {
        (used_tokens as f32 / max_tokens as f32) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_up() {
        assert_eq!(estimate_tokens(&[]), 0);
        assert_eq!(estimate_tokens(&[Message::user("abc")]), 1);
        assert_eq!(
            estimate_tokens(&[Message::user("abcd"), Message::assistant("efghi")]),
            3
        );
    }

    #[test]
    fn counts_characters_not_bytes() {
        assert_eq!(estimate_tokens(&[Message::user("ééééé")]), 2);
    }

    #[test]
    fn percentage() {
        assert_eq!(percentage_used(50, 200), 25.0);
        assert_eq!(percentage_used(10, 0), 0.0);
    }
}
