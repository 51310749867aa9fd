use ropey::Rope;

/// The authoritative text of one host document, backed by a rope.
///
/// Edits from the surface always replace the whole content; the rope keeps
/// large documents cheap to compare and to hand out line counts for.
pub struct DocumentBuffer {
    rope: Rope,
    dirty: bool,
}

impl DocumentBuffer {
    /// Create a new buffer from a string.
    pub fn from_text(text: &str) -> Self {
        Self {
            rope: Rope::from_str(text),
            dirty: false,
        }
    }

    /// Create an empty buffer.
    pub fn empty() -> Self {
        Self::from_text("")
    }

    /// Whether the buffer has been modified since creation or last save.
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Mark the buffer as clean (e.g., after saving).
    pub const fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Total number of lines in the buffer.
    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    pub fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }

    /// The full text content of the buffer.
    pub fn text(&self) -> String {
        self.rope.to_string()
    }

    /// Compare against `text` without materializing the rope.
    pub fn content_eq(&self, text: &str) -> bool {
        self.rope == text
    }

    /// Replace the entire range `(0,0)..(line_count,0)` with `text`.
    ///
    /// Returns `false` and leaves the buffer untouched when the content is
    /// already identical.
    pub fn replace_all(&mut self, text: &str) -> bool {
        if self.content_eq(text) {
            return false;
        }
        let end = self.rope.len_chars();
        self.rope.remove(0..end);
        self.rope.insert(0, text);
        self.dirty = true;
        true
    }
}

impl Default for DocumentBuffer {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for DocumentBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentBuffer")
            .field("lines", &self.line_count())
            .field("chars", &self.len_chars())
            .field("dirty", &self.dirty)
            .finish()
    }
}
