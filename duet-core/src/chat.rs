use duet_types::RoomError;
use regex::Regex;

pub const DEFAULT_CHAT_MAX_LENGTH: usize = 200;

/// Content rules for in-room chat
pub struct ChatPolicy {
    max_length: usize,
    unsafe_content: Regex,
}

impl ChatPolicy {
    pub fn new(max_length: usize) -> Self {
        // Tags, script URLs, inline event handlers and HTML data URIs
        let unsafe_content = Regex::new(
            r"(?i)<\s*/?\s*[a-z!]|javascript\s*:|vbscript\s*:|data\s*:\s*text/html|\bon[a-z]+\s*=",
        )
        .expect("chat filter pattern is valid");

        Self {
            max_length,
            unsafe_content,
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Validates a message and returns the text to broadcast
    pub fn check(&self, text: &str) -> Result<String, RoomError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(Self::rejected("message is empty"));
        }
        if trimmed.chars().count() > self.max_length {
            return Err(Self::rejected(&format!(
                "message is longer than {} characters",
                self.max_length
            )));
        }
        if self.unsafe_content.is_match(trimmed) {
            return Err(Self::rejected("message contains disallowed content"));
        }

        let sanitized = Self::sanitize(trimmed);
        if sanitized.is_empty() {
            return Err(Self::rejected("message is empty"));
        }
        Ok(sanitized)
    }

    /// Strips residual angle brackets and control characters
    pub fn sanitize(text: &str) -> String {
        text.chars()
            .filter(|c| *c != '<' && *c != '>' && !c.is_control())
            .collect::<String>()
            .trim()
            .to_string()
    }

    fn rejected(reason: &str) -> RoomError {
        RoomError::ChatRejected {
            reason: reason.to_string(),
        }
    }
}

impl Default for ChatPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_CHAT_MAX_LENGTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_message_passes() {
        let policy = ChatPolicy::default();
        assert_eq!(policy.check("  hello there  ").unwrap(), "hello there");
        assert_eq!(policy.check("3 > 2 is true").unwrap(), "3  2 is true");
    }

    #[test]
    fn test_empty_and_long_messages_rejected() {
        let policy = ChatPolicy::new(10);
        assert!(policy.check("   ").is_err());
        assert!(policy.check("0123456789").is_ok());
        assert!(policy.check("0123456789x").is_err());
    }

    #[test]
    fn test_markup_rejected() {
        let policy = ChatPolicy::default();
        for text in [
            "<script>alert(1)</script>",
            "hi <img src=x>",
            "click javascript:alert(1)",
            "x onerror=alert(1)",
            "data:text/html;base64,AAAA",
            "</div>",
        ] {
            assert!(
                matches!(policy.check(text), Err(RoomError::ChatRejected { .. })),
                "should reject {}",
                text
            );
        }
    }

    #[test]
    fn test_sanitize_strips_control_characters() {
        assert_eq!(ChatPolicy::sanitize("a\u{0007}b\u{0000}c"), "abc");
    }
}
