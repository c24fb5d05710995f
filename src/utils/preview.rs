use serde_json::{json, Map, Value};

/// Appended to a preview that was cut short.
pub const TRUNCATION_MARKER: &str = " … [truncated]";

/// A bounded slice of a potentially long text, sized for speech output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub text: String,
    pub truncated: bool,
    /// Length of the full text, in characters.
    pub total_chars: usize,
}

impl Preview {
    /// Keeps at most `limit` characters of `text`, plus the marker when cut.
    pub fn new(text: &str, limit: usize) -> Self {
        let total_chars = text.chars().count();
        let head = match text.char_indices().nth(limit) {
            Some((cut, _)) => &text[..cut],
            None => text,
        };
        Self::from_head(head.to_string(), total_chars, limit)
    }

    fn from_head(head: String, total_chars: usize, limit: usize) -> Self {
        if total_chars <= limit {
            return Self {
                text: head,
                truncated: false,
                total_chars,
            };
        }

        let mut preview = head.trim_end().to_string();
        preview.push_str(TRUNCATION_MARKER);
        Self {
            text: preview,
            truncated: true,
            total_chars,
        }
    }

    /// Writes `text`, `truncated` and `total_chars` into a payload, using
    /// `key` for the text field.
    pub fn write_into(self, payload: &mut Map<String, Value>, key: &str) {
        payload.insert(key.to_string(), json!(self.text));
        payload.insert("truncated".to_string(), json!(self.truncated));
        payload.insert("total_chars".to_string(), json!(self.total_chars));
    }
}

/// Builds a [`Preview`] from text that arrives in pieces, holding at most
/// `limit` characters. Leading and trailing whitespace is not counted.
#[derive(Debug)]
pub struct PreviewBuilder {
    limit: usize,
    head: String,
    head_chars: usize,
    total_chars: usize,
    /// Whitespace seen since the last visible character.
    pending_space: usize,
}

impl PreviewBuilder {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            head: String::new(),
            head_chars: 0,
            total_chars: 0,
            pending_space: 0,
        }
    }

    pub fn push_str(&mut self, chunk: &str) {
        for c in chunk.chars() {
            if c.is_whitespace() {
                if self.total_chars > 0 {
                    self.pending_space += 1;
                    self.keep(c);
                }
                continue;
            }
            self.total_chars += self.pending_space + 1;
            self.pending_space = 0;
            self.keep(c);
        }
    }

    fn keep(&mut self, c: char) {
        if self.head_chars < self.limit {
            self.head.push(c);
            self.head_chars += 1;
        }
    }

    pub fn finish(self) -> Preview {
        let head = self.head.trim_end().to_string();
        Preview::from_head(head, self.total_chars, self.limit)
    }
}
