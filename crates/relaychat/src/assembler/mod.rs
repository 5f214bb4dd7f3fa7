//! Folds streamed tokens into one reply and segments the finished text

mod segment;

pub use segment::{PLAINTEXT, Segment, segment};

/// Running text buffer for one exchange
#[derive(Debug, Default)]
pub struct MessageAssembler {
    buffer: String,
    tokens: usize,
}

impl MessageAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a token in arrival order
    pub fn push(&mut self, token: &str) {
        self.buffer.push_str(token);
        self.tokens += 1;
    }

    /// The live, in-progress render target
    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn token_count(&self) -> usize {
        self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Close the buffer and produce the terminal render shape
    pub fn finish(self) -> AssembledMessage {
        let segments = segment(&self.buffer);
        AssembledMessage {
            text: self.buffer,
            segments,
        }
    }
}

/// Final text of a reply together with its segmented view
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledMessage {
    pub text: String,
    pub segments: Vec<Segment>,
}

impl AssembledMessage {
    /// Build from text that arrived whole rather than streamed
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let segments = segment(&text);
        Self { text, segments }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_concatenates_in_order() {
        let tokens = ["Hel", "lo", ",", " ", "wor", "ld", "\n", "```", "rs\nx", "\n```"];
        let mut assembler = MessageAssembler::new();
        let mut expected = String::new();

        for token in tokens {
            assembler.push(token);
            expected.push_str(token);
            assert_eq!(assembler.text(), expected);
        }

        assert_eq!(assembler.token_count(), tokens.len());
    }

    #[test]
    fn test_streamed_and_whole_agree() {
        let text = "Intro line\n```python\nprint('hi')\n```\nDone.";
        let mut assembler = MessageAssembler::new();
        for ch in text.chars() {
            assembler.push(&ch.to_string());
        }

        assert_eq!(assembler.finish(), AssembledMessage::from_text(text));
    }

    #[test]
    fn test_empty_assembler() {
        let assembler = MessageAssembler::new();
        assert!(assembler.is_empty());
        let message = assembler.finish();
        assert!(message.text.is_empty());
        assert!(message.segments.is_empty());
    }
}
