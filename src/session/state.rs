//! Worker-side session state
//!
//! Everything in here runs on the serializer thread. Mutations update the
//! in-memory pages first, then queue a redraw or LED flush as a separate job;
//! those jobs read whatever the page looks like when they run, so a burst of
//! updates ends with the latest state on the display.

use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, trace, warn};

use super::callbacks::RegisteredCallbacks;
use super::events::SessionEvent;
use super::SessionOptions;
use crate::device::{
    DeviceHandle, DirectOutput, FLAG_SET_AS_ACTIVE, SOFT_BUTTON_DOWN, SOFT_BUTTON_SELECT,
    SOFT_BUTTON_UP,
};
use crate::error::{DriverError, DriverOp, Result, SessionError};
use crate::page::{Indicator, LedColor, LedId, Page, PageIndex, PageSnapshot};
use crate::registry::PageRegistry;
use crate::serializer::Serializer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scroll {
    Up,
    Down,
}

/// Which LEDs a flush pushes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LedFlush {
    Dirty,
    All,
}

pub(crate) struct SessionState {
    driver: Box<dyn DirectOutput>,
    options: SessionOptions,
    initialized: bool,
    device: Option<DeviceHandle>,
    registry: PageRegistry,
    callbacks: Option<RegisteredCallbacks>,
    serializer: Serializer<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionState {
    pub fn new(
        driver: Box<dyn DirectOutput>,
        options: SessionOptions,
        serializer: Serializer<SessionState>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            driver,
            options,
            initialized: false,
            device: None,
            registry: PageRegistry::new(),
            callbacks: None,
            serializer,
            events,
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Initialize the driver, find the device and hook up the callbacks
    pub fn start(&mut self) -> Result<DeviceHandle> {
        let plugin_name = self.options.plugin_name.clone();
        self.driver
            .initialize(&plugin_name)
            .map_err(|e| SessionError::driver(DriverOp::Initialize, e))?;
        self.initialized = true;

        let device = self.discover()?;
        self.device = Some(device);
        self.register_callbacks(device);
        Ok(device)
    }

    /// First connected device whose class matches the configured one
    fn discover(&mut self) -> Result<DeviceHandle> {
        let expected = self.options.device_class;
        let devices = self
            .driver
            .enumerate()
            .map_err(|e| SessionError::driver(DriverOp::Enumerate, e))?;
        debug!(count = devices.len(), "Enumerated devices");

        for device in devices {
            match self.driver.device_type(device) {
                Ok(class) if class == expected => {
                    info!(?device, %class, "Found supported device");
                    return Ok(device);
                }
                Ok(class) => debug!(?device, %class, "Skipping unsupported device"),
                Err(error) => self.report(DriverOp::GetDeviceType, None, error),
            }
        }

        warn!(%expected, "No supported device found");
        Err(SessionError::DeviceNotFound { expected })
    }

    fn register_callbacks(&mut self, device: DeviceHandle) {
        let callbacks = RegisteredCallbacks::new(&self.serializer);

        if let Err(error) = self
            .driver
            .register_page_callback(device, Some(callbacks.page.clone()))
        {
            self.report(DriverOp::RegisterPageCallback, None, error);
        }
        if let Err(error) = self
            .driver
            .register_soft_button_callback(device, Some(callbacks.soft_button.clone()))
        {
            self.report(DriverOp::RegisterSoftButtonCallback, None, error);
        }
        self.callbacks = Some(callbacks);
    }

    /// Release pages, callbacks and the driver, in that order
    pub fn shutdown(&mut self) {
        if !self.registry.is_empty() {
            debug!(pages = self.registry.len(), "Releasing pages");
        }
        for index in self.registry.indices() {
            self.device_call(DriverOp::RemovePage, Some(index), |driver, device| {
                driver.remove_page(device, index)
            });
        }
        self.registry.clear();

        if let Some(callbacks) = self.callbacks.take() {
            self.device_call(DriverOp::RegisterPageCallback, None, |driver, device| {
                driver.register_page_callback(device, None)
            });
            self.device_call(DriverOp::RegisterSoftButtonCallback, None, |driver, device| {
                driver.register_soft_button_callback(device, None)
            });
            drop(callbacks);
        }

        self.deinitialize();
        info!("Session closed");
        let _ = self.events.send(SessionEvent::Closed);
    }

    /// Undo a partial start after discovery failed
    pub fn abandon(&mut self) {
        self.deinitialize();
    }

    fn deinitialize(&mut self) {
        if !self.initialized {
            return;
        }
        if let Err(error) = self.driver.deinitialize() {
            self.report(DriverOp::Deinitialize, None, error);
        }
        self.initialized = false;
        self.device = None;
    }

    // =========================================================================
    // Page management
    // =========================================================================

    /// Register a new page and make it the foreground page
    pub fn add_page(&mut self, title: String, max_lines: usize) -> PageIndex {
        let index = self.registry.insert(Page::new(title.clone(), max_lines));
        self.device_call(DriverOp::AddPage, Some(index), |driver, device| {
            driver.add_page(device, index, &title, FLAG_SET_AS_ACTIVE)
        });
        self.registry.set_active(index);
        info!(page = index, %title, max_lines, "Page added");
        index
    }

    pub fn remove_page(&mut self, index: PageIndex) {
        if !self.registry.contains(index) {
            warn!(page = index, "Cannot remove unknown page");
            return;
        }
        self.device_call(DriverOp::RemovePage, Some(index), |driver, device| {
            driver.remove_page(device, index)
        });
        self.registry.remove(index);
        info!(page = index, "Page removed");
    }

    pub fn active_page(&self) -> Option<PageIndex> {
        self.registry.active()
    }

    pub fn snapshot(&self, index: PageIndex) -> Option<PageSnapshot> {
        self.registry.get(index).map(|page| page.snapshot(index))
    }

    // =========================================================================
    // Page content
    // =========================================================================

    pub fn add_line(&mut self, index: PageIndex, text: String) {
        let Some(page) = self.page_mut(index) else {
            return;
        };
        page.add_line(text);
        self.request_redraw(index);
    }

    pub fn scroll(&mut self, index: PageIndex, direction: Scroll) {
        let Some(page) = self.page_mut(index) else {
            return;
        };
        if page.lines().is_empty() {
            trace!(page = index, ?direction, "Nothing to scroll");
            return;
        }
        let moved = match direction {
            Scroll::Up => page.scroll_up(),
            Scroll::Down => page.scroll_down(),
        };
        trace!(page = index, ?direction, moved, "Scrolled");
        self.request_redraw(index);
    }

    pub fn set_led(&mut self, index: PageIndex, led: LedId, on: bool) {
        let Some(page) = self.page_mut(index) else {
            return;
        };
        page.set_led(led, on);
        self.request_led_flush(index, LedFlush::Dirty);
    }

    pub fn set_color(&mut self, index: PageIndex, indicator: Indicator, color: LedColor) {
        let Some(page) = self.page_mut(index) else {
            return;
        };
        if page.set_color(indicator, color) == 0 {
            debug!(page = index, ?indicator, ?color, "Colour does not apply to indicator");
            return;
        }
        self.request_led_flush(index, LedFlush::Dirty);
    }

    /// Queue a redraw of the lines and every LED of a page
    pub fn refresh(&mut self, index: PageIndex) {
        self.request_redraw(index);
        self.request_led_flush(index, LedFlush::All);
    }

    // =========================================================================
    // Hardware events
    // =========================================================================

    /// The device brought `index` to the foreground
    pub fn activate(&mut self, index: PageIndex) {
        if !self.registry.set_active(index) {
            return;
        }
        debug!(page = index, "Page activated");
        let _ = self.events.send(SessionEvent::PageActivated { page: index });
        self.refresh(index);
    }

    /// Soft buttons scroll the foreground page; "up" wins over "down"
    pub fn soft_buttons(&mut self, buttons: u32) {
        let Some(active) = self.registry.active() else {
            debug!(buttons, "Soft buttons pressed with no active page");
            return;
        };
        if buttons & SOFT_BUTTON_UP != 0 {
            self.scroll(active, Scroll::Up);
        } else if buttons & SOFT_BUTTON_DOWN != 0 {
            self.scroll(active, Scroll::Down);
        } else if buttons & SOFT_BUTTON_SELECT != 0 {
            debug!(page = active, "Select soft button has no action");
        }
    }

    // =========================================================================
    // Output
    // =========================================================================

    fn request_redraw(&self, index: PageIndex) {
        let _ = self.serializer.defer("redraw", move |state| state.redraw(index));
    }

    fn request_led_flush(&self, index: PageIndex, which: LedFlush) {
        let _ = self
            .serializer
            .defer("flush-leds", move |state| state.flush_leds(index, which));
    }

    /// Push the visible rows of the page, if it is in the foreground
    fn redraw(&mut self, index: PageIndex) {
        if !self.registry.is_active(index) {
            trace!(page = index, "Skipping redraw of background page");
            return;
        }
        let Some(rows) = self.registry.get(index).map(Page::visible_rows) else {
            return;
        };
        for (row, text) in rows.iter().enumerate() {
            let row = row as u32;
            self.device_call(DriverOp::SetString, Some(index), |driver, device| {
                driver.set_string(device, index, row, text)
            });
        }
    }

    /// Push LEDs of the page, if it is in the foreground
    ///
    /// Background pages keep their dirty set until they are activated.
    fn flush_leds(&mut self, index: PageIndex, which: LedFlush) {
        if !self.registry.is_active(index) {
            trace!(page = index, "Deferring LED flush of background page");
            return;
        }
        let writes = match self.registry.get(index) {
            Some(page) if which == LedFlush::All => page.leds().all(),
            Some(page) => page.leds().pending(),
            None => return,
        };
        for (led, on) in writes {
            let pushed = self.device_call(DriverOp::SetLed, Some(index), |driver, device| {
                driver.set_led(device, index, led, on)
            });
            if pushed {
                if let Some(page) = self.registry.get_mut(index) {
                    page.leds_mut().mark_clean(led);
                }
            }
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Fire `signal` after everything queued so far, including follow-ups
    pub fn defer_signal(&self, signal: oneshot::Sender<()>) {
        let _ = self.serializer.defer("settled", move |_| {
            let _ = signal.send(());
        });
    }

    fn page_mut(&mut self, index: PageIndex) -> Option<&mut Page> {
        let page = self.registry.get_mut(index);
        if page.is_none() {
            warn!(page = index, "Ignoring update for unknown page");
        }
        page
    }

    /// Make one driver call against the session device
    ///
    /// Failures are reported and swallowed. Returns whether the call succeeded.
    fn device_call<F>(&mut self, op: DriverOp, page: Option<PageIndex>, call: F) -> bool
    where
        F: FnOnce(&mut dyn DirectOutput, DeviceHandle) -> Result<(), DriverError>,
    {
        let Some(device) = self.device else {
            warn!(%op, "No device attached, skipping driver call");
            return false;
        };
        match call(self.driver.as_mut(), device) {
            Ok(()) => true,
            Err(error) => {
                self.report(op, page, error);
                false
            }
        }
    }

    fn report(&self, op: DriverOp, page: Option<PageIndex>, error: DriverError) {
        warn!(%op, ?page, %error, "Driver call failed");
        let _ = self
            .events
            .send(SessionEvent::DriverCallFailed { op, page, error });
    }
}
