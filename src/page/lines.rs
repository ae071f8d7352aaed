//! Scrollable line buffer behind a display page

use std::collections::VecDeque;

use super::DISPLAY_ROWS;

/// Newest-first list of text lines with a scroll position
///
/// With `max_lines > 0` the oldest line is evicted once the bound is reached.
/// The scroll offset is the index of the top visible line and never goes past
/// the point where the last line sits on the bottom row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineBuffer {
    lines: VecDeque<String>,
    max_lines: usize,
    scroll_offset: usize,
}

impl LineBuffer {
    /// Create an empty buffer; `max_lines == 0` means unbounded
    pub fn new(max_lines: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            max_lines,
            scroll_offset: 0,
        }
    }

    /// Insert a line at the top, returning the evicted oldest line if any
    pub fn push(&mut self, text: impl Into<String>) -> Option<String> {
        let evicted = if self.max_lines > 0 && self.lines.len() >= self.max_lines {
            self.lines.pop_back()
        } else {
            None
        };
        self.lines.push_front(text.into());
        self.scroll_offset = self.scroll_offset.min(self.max_scroll());
        evicted
    }

    /// Move the view one line towards the newest entry
    ///
    /// Returns whether the offset changed.
    pub fn scroll_up(&mut self) -> bool {
        let before = self.scroll_offset;
        self.scroll_offset = self.scroll_offset.saturating_sub(1);
        before != self.scroll_offset
    }

    /// Move the view one line towards the oldest entry
    pub fn scroll_down(&mut self) -> bool {
        let before = self.scroll_offset;
        self.scroll_offset = (self.scroll_offset + 1).min(self.max_scroll());
        before != self.scroll_offset
    }

    /// Largest valid scroll offset for the current contents
    pub fn max_scroll(&self) -> usize {
        self.lines.len().saturating_sub(DISPLAY_ROWS)
    }

    /// Text for each display row, empty where the buffer runs out
    pub fn visible_rows(&self) -> [String; DISPLAY_ROWS] {
        std::array::from_fn(|row| {
            self.lines
                .get(self.scroll_offset + row)
                .cloned()
                .unwrap_or_default()
        })
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    pub fn max_lines(&self) -> usize {
        self.max_lines
    }
}
