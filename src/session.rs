//! Device session controller
//!
//! A `Session` owns the worker thread that owns the driver, the page registry
//! and the registered callbacks. Application calls and hardware callbacks
//! both become jobs on the same queue, so every state change and every driver
//! call happens in one total order on one thread.
//!
//! # Blocking vs fire-and-forget
//! - `add_page`, `active_page`, `settle`, `close`, `PageHandle::snapshot`
//!   wait for the worker (async variants exist for use inside a runtime)
//! - everything else on `PageHandle` only enqueues

mod callbacks;
mod events;
mod page_handle;
mod state;

#[cfg(test)]
mod tests;

use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info};

use crate::device::{DeviceClassId, DeviceHandle, DirectOutput, X52_PRO};
use crate::error::{Result, SessionError};
use crate::page::PageIndex;
use crate::serializer::Serializer;

pub use events::{SessionEvent, EVENT_CAPACITY};
pub use page_handle::PageHandle;

use state::SessionState;

/// Name of the worker thread
const WORKER_NAME: &str = "x52-session";

/// Plugin name passed to `DirectOutput_Initialize`
pub const DEFAULT_PLUGIN_NAME: &str = "Saitek";

/// What to look for when a session starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub plugin_name: String,
    pub device_class: DeviceClassId,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            plugin_name: DEFAULT_PLUGIN_NAME.to_string(),
            device_class: X52_PRO,
        }
    }
}

/// Open connection to one physical device
pub struct Session {
    serializer: Serializer<SessionState>,
    events: broadcast::Sender<SessionEvent>,
    device: DeviceHandle,
}

impl Session {
    /// Start the worker, build the driver on it and discover the device
    ///
    /// `factory` runs on the worker thread, so the driver type does not have
    /// to be `Send`. When no matching device is connected the driver is
    /// released again and `DeviceNotFound` is returned; plug the device in
    /// and open a new session to retry.
    pub fn open<D, F>(options: SessionOptions, factory: F) -> Result<Self>
    where
        D: DirectOutput + 'static,
        F: FnOnce() -> D + Send + 'static,
    {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let worker_events = events.clone();
        let serializer = Serializer::spawn(WORKER_NAME, move |serializer| {
            SessionState::new(Box::new(factory()), options, serializer, worker_events)
        })?;

        match serializer.call("discover", |state| state.start()) {
            Ok(Ok(device)) => {
                info!(?device, "Session open");
                Ok(Self {
                    serializer,
                    events,
                    device,
                })
            }
            Ok(Err(error)) | Err(error) => {
                if let Ok(done) = serializer.close("abandon", |state| state.abandon()) {
                    let _ = done.blocking_recv();
                }
                Err(error)
            }
        }
    }

    /// Handle of the device this session drives
    pub fn device(&self) -> DeviceHandle {
        self.device
    }

    /// Create a page in the next slot and bring it to the foreground
    pub fn add_page(&self, title: impl Into<String>, max_lines: usize) -> Result<PageHandle> {
        let title = title.into();
        let job_title = title.clone();
        let index = self
            .serializer
            .call("add-page", move |state| state.add_page(job_title, max_lines))?;
        Ok(PageHandle::new(index, &title, self.serializer.clone()))
    }

    pub async fn add_page_async(
        &self,
        title: impl Into<String>,
        max_lines: usize,
    ) -> Result<PageHandle> {
        let title = title.into();
        let job_title = title.clone();
        let index = self
            .serializer
            .call_async("add-page", move |state| state.add_page(job_title, max_lines))
            .await?;
        Ok(PageHandle::new(index, &title, self.serializer.clone()))
    }

    /// Release a page slot; its index is not reused
    pub fn remove_page(&self, index: PageIndex) -> Result<()> {
        self.serializer
            .submit("remove-page", move |state| state.remove_page(index))
    }

    /// Page currently in the foreground
    pub fn active_page(&self) -> Result<Option<PageIndex>> {
        self.serializer
            .call("active-page", |state| state.active_page())
    }

    /// Block until all queued work, and the redraws and LED flushes it
    /// triggered, has run
    pub fn settle(&self) -> Result<()> {
        self.settle_signal()?
            .blocking_recv()
            .map_err(|_| SessionError::WorkerFailed("settle"))
    }

    pub async fn settle_async(&self) -> Result<()> {
        self.settle_signal()?
            .await
            .map_err(|_| SessionError::WorkerFailed("settle"))
    }

    /// Output jobs are queued one level deep, so a second hop lands behind them
    fn settle_signal(&self) -> Result<oneshot::Receiver<()>> {
        let (tx, rx) = oneshot::channel();
        self.serializer.submit("settle", move |state| {
            state.defer_signal(tx);
        })?;
        Ok(rx)
    }

    /// Status events: page activations, driver failures, close
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.serializer.is_closed()
    }

    /// Release everything and stop the worker
    ///
    /// Work queued before the call still runs first.
    pub fn close(&self) -> Result<()> {
        self.begin_close()?
            .blocking_recv()
            .map_err(|_| SessionError::WorkerFailed("close"))
    }

    pub async fn close_async(&self) -> Result<()> {
        self.begin_close()?
            .await
            .map_err(|_| SessionError::WorkerFailed("close"))
    }

    fn begin_close(&self) -> Result<oneshot::Receiver<()>> {
        self.serializer.close("close", |state| state.shutdown())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.is_closed() {
            debug!("Session dropped while open, closing");
            let _ = self.begin_close();
        }
    }
}
