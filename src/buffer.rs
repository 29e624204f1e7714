use bytes::Bytes;

const SEPARATOR: char = '\n';

/// Newline-joined text waiting to be flushed.
#[derive(Debug, Default)]
pub struct LineBuffer {
    content: String,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Length in bytes, separators included.
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// Size the buffer would reach if `payload` were pushed now.
    pub fn len_after(&self, payload: &str) -> usize {
        if self.content.is_empty() {
            payload.len()
        } else {
            self.content.len() + SEPARATOR.len_utf8() + payload.len()
        }
    }

    pub fn push(&mut self, payload: &str) {
        if !self.content.is_empty() {
            self.content.push(SEPARATOR);
        }
        self.content.push_str(payload);
    }

    /// Take the content out, leaving the buffer empty.
    pub fn take(&mut self) -> Bytes {
        Bytes::from(std::mem::take(&mut self.content))
    }

    #[cfg(test)]
    pub fn as_str(&self) -> &str {
        &self.content
    }
}
