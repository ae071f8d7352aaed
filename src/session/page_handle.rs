//! Application-side handle to one page
//!
//! Every mutator only enqueues a job and returns; the page itself lives on
//! the session worker. Mutators return `&Self` so calls can be chained:
//!
//! ```ignore
//! page.amber(X52Button::FireA)?
//!     .red(X52Button::Toggle1_2)?
//!     .on(X52Button::Throttle)?;
//! ```

use std::fmt;
use std::sync::Arc;

use super::state::{Scroll, SessionState};
use crate::error::Result;
use crate::page::{Indicator, LedColor, LedId, PageIndex, PageSnapshot};
use crate::serializer::Serializer;

#[derive(Clone)]
pub struct PageHandle {
    index: PageIndex,
    title: Arc<str>,
    serializer: Serializer<SessionState>,
}

impl PageHandle {
    pub(crate) fn new(index: PageIndex, title: &str, serializer: Serializer<SessionState>) -> Self {
        Self {
            index,
            title: Arc::from(title),
            serializer,
        }
    }

    /// Device page number
    pub fn index(&self) -> PageIndex {
        self.index
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Insert a line at the top of the page and queue a redraw
    pub fn add_line(&self, text: impl Into<String>) -> Result<&Self> {
        let index = self.index;
        let text = text.into();
        self.serializer
            .submit("add-line", move |state| state.add_line(index, text))?;
        Ok(self)
    }

    pub fn scroll_up(&self) -> Result<&Self> {
        self.scroll(Scroll::Up)
    }

    pub fn scroll_down(&self) -> Result<&Self> {
        self.scroll(Scroll::Down)
    }

    fn scroll(&self, direction: Scroll) -> Result<&Self> {
        let index = self.index;
        self.serializer
            .submit("scroll", move |state| state.scroll(index, direction))?;
        Ok(self)
    }

    /// Switch a single LED by driver id
    pub fn set_led(&self, led: LedId, on: bool) -> Result<&Self> {
        let index = self.index;
        self.serializer
            .submit("set-led", move |state| state.set_led(index, led, on))?;
        Ok(self)
    }

    /// Apply a colour to an indicator; colours that do not fit it are ignored
    pub fn set_color(&self, indicator: impl Into<Indicator>, color: LedColor) -> Result<&Self> {
        let index = self.index;
        let indicator = indicator.into();
        self.serializer.submit("set-color", move |state| {
            state.set_color(index, indicator, color)
        })?;
        Ok(self)
    }

    /// Bicolor: green only
    pub fn green(&self, indicator: impl Into<Indicator>) -> Result<&Self> {
        self.set_color(indicator, LedColor::Green)
    }

    /// Bicolor: red only
    pub fn red(&self, indicator: impl Into<Indicator>) -> Result<&Self> {
        self.set_color(indicator, LedColor::Red)
    }

    /// Bicolor: red and green
    pub fn amber(&self, indicator: impl Into<Indicator>) -> Result<&Self> {
        self.set_color(indicator, LedColor::Amber)
    }

    /// Both kinds: all LEDs off
    pub fn off(&self, indicator: impl Into<Indicator>) -> Result<&Self> {
        self.set_color(indicator, LedColor::Off)
    }

    /// Toggle: LED on
    pub fn on(&self, indicator: impl Into<Indicator>) -> Result<&Self> {
        self.set_color(indicator, LedColor::On)
    }

    /// Queue a full redraw of lines and all LEDs
    pub fn update(&self) -> Result<&Self> {
        let index = self.index;
        self.serializer
            .submit("update", move |state| state.refresh(index))?;
        Ok(self)
    }

    /// Current page contents, or `None` once the page was removed
    ///
    /// Blocks until every job queued before it has run.
    pub fn snapshot(&self) -> Result<Option<PageSnapshot>> {
        let index = self.index;
        self.serializer
            .call("snapshot", move |state| state.snapshot(index))
    }

    pub async fn snapshot_async(&self) -> Result<Option<PageSnapshot>> {
        let index = self.index;
        self.serializer
            .call_async("snapshot", move |state| state.snapshot(index))
            .await
    }
}

impl fmt::Debug for PageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageHandle")
            .field("index", &self.index)
            .field("title", &self.title)
            .finish_non_exhaustive()
    }
}
