//! Display pages: lines, scroll position and indicator LEDs
//!
//! A `Page` is plain data owned by the session worker. Nothing here talks to
//! the driver; the session decides when a page is pushed to the hardware.

mod indicator;
mod leds;
mod lines;

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

pub use indicator::{Indicator, LedColor};
pub use leds::LedTable;
pub use lines::LineBuffer;

/// Number of text rows on the multi-function display
pub const DISPLAY_ROWS: usize = 3;

/// LED number as understood by the driver
pub type LedId = u32;

/// Device page number, assigned in creation order
pub type PageIndex = u32;

/// One logical display page
#[derive(Debug, Clone)]
pub struct Page {
    title: String,
    lines: LineBuffer,
    leds: LedTable,
}

impl Page {
    pub fn new(title: impl Into<String>, max_lines: usize) -> Self {
        Self {
            title: title.into(),
            lines: LineBuffer::new(max_lines),
            leds: LedTable::new(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Insert a line at the top of the page
    pub fn add_line(&mut self, text: impl Into<String>) {
        self.lines.push(text);
    }

    pub fn scroll_up(&mut self) -> bool {
        self.lines.scroll_up()
    }

    pub fn scroll_down(&mut self) -> bool {
        self.lines.scroll_down()
    }

    pub fn set_led(&mut self, led: LedId, on: bool) {
        self.leds.set(led, on);
    }

    /// Apply a colour to an indicator, returning how many LEDs were written
    pub fn set_color(&mut self, indicator: Indicator, color: LedColor) -> usize {
        let writes = indicator.writes(color);
        for (led, on) in &writes {
            self.leds.set(*led, *on);
        }
        writes.len()
    }

    pub fn lines(&self) -> &LineBuffer {
        &self.lines
    }

    pub fn leds(&self) -> &LedTable {
        &self.leds
    }

    pub fn leds_mut(&mut self) -> &mut LedTable {
        &mut self.leds
    }

    pub fn visible_rows(&self) -> [String; DISPLAY_ROWS] {
        self.lines.visible_rows()
    }

    pub fn snapshot(&self, index: PageIndex) -> PageSnapshot {
        PageSnapshot {
            index,
            title: self.title.clone(),
            lines: self.lines.lines().map(str::to_string).collect(),
            scroll_offset: self.lines.scroll_offset(),
            max_lines: self.lines.max_lines(),
            leds: self.leds.states().clone(),
            dirty_leds: self.leds.dirty().clone(),
        }
    }
}

/// Point-in-time copy of a page, safe to hand out of the worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageSnapshot {
    pub index: PageIndex,
    pub title: String,
    /// Newest first
    pub lines: Vec<String>,
    pub scroll_offset: usize,
    pub max_lines: usize,
    pub leds: BTreeMap<LedId, bool>,
    pub dirty_leds: BTreeSet<LedId>,
}
