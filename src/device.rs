//! DirectOutput device driver seam
//!
//! The vendor driver is a synchronous, non re-entrant API. Everything in this
//! crate calls it from the session worker thread only; the two callback entry
//! points are the sole way the driver talks back, from a thread it owns.

pub mod buttons;
pub mod guid;
#[cfg(all(windows, feature = "directoutput"))]
pub mod native;
pub mod simulated;

use std::fmt;
use std::sync::Arc;

use crate::error::DriverError;

pub use buttons::X52Button;
pub use guid::{DeviceClassId, GuidParseError, X52_PRO};
pub use simulated::{DriverCall, SimulatedController, SimulatedDevice};

/// `DirectOutput_AddPage` flag making the new page the foreground page
pub const FLAG_SET_AS_ACTIVE: u32 = 0x0000_0001;

/// Soft button bits delivered to the soft-button callback
pub const SOFT_BUTTON_SELECT: u32 = 0x0000_0001;
pub const SOFT_BUTTON_UP: u32 = 0x0000_0002;
pub const SOFT_BUTTON_DOWN: u32 = 0x0000_0004;

/// Opaque handle to a connected device, as handed out by enumeration
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub usize);

impl fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceHandle({:#x})", self.0)
    }
}

/// Page-changed callback: `(page, became_active)`
///
/// Invoked on a driver-owned thread. Must return quickly and never call back
/// into the driver.
pub type PageCallback = Arc<dyn Fn(u32, bool) + Send + Sync>;

/// Soft-button callback: bitmask of pressed buttons
///
/// Same threading rules as [`PageCallback`].
pub type SoftButtonCallback = Arc<dyn Fn(u32) + Send + Sync>;

/// DirectOutput driver operations
///
/// One method per driver entry point. Each call is a single attempt; callers
/// decide what to do with failures. Implementations are created on, and only
/// ever used from, the session worker thread, so they need not be `Send`.
pub trait DirectOutput {
    /// Initialize the driver for a plugin name
    fn initialize(&mut self, plugin_name: &str) -> Result<(), DriverError>;

    /// List connected devices
    fn enumerate(&mut self) -> Result<Vec<DeviceHandle>, DriverError>;

    /// Class id of a device
    fn device_type(&mut self, device: DeviceHandle) -> Result<DeviceClassId, DriverError>;

    /// Register a page slot with the device
    fn add_page(
        &mut self,
        device: DeviceHandle,
        page: u32,
        title: &str,
        flags: u32,
    ) -> Result<(), DriverError>;

    /// Release a page slot
    fn remove_page(&mut self, device: DeviceHandle, page: u32) -> Result<(), DriverError>;

    /// Write one display row of a page
    fn set_string(
        &mut self,
        device: DeviceHandle,
        page: u32,
        row: u32,
        text: &str,
    ) -> Result<(), DriverError>;

    /// Switch one LED of a page
    fn set_led(
        &mut self,
        device: DeviceHandle,
        page: u32,
        led: u32,
        on: bool,
    ) -> Result<(), DriverError>;

    /// Install (`Some`) or clear (`None`) the page-changed callback
    fn register_page_callback(
        &mut self,
        device: DeviceHandle,
        callback: Option<PageCallback>,
    ) -> Result<(), DriverError>;

    /// Install (`Some`) or clear (`None`) the soft-button callback
    fn register_soft_button_callback(
        &mut self,
        device: DeviceHandle,
        callback: Option<SoftButtonCallback>,
    ) -> Result<(), DriverError>;

    /// Release the driver
    fn deinitialize(&mut self) -> Result<(), DriverError>;
}

impl<T: DirectOutput + ?Sized> DirectOutput for Box<T> {
    fn initialize(&mut self, plugin_name: &str) -> Result<(), DriverError> {
        (**self).initialize(plugin_name)
    }

    fn enumerate(&mut self) -> Result<Vec<DeviceHandle>, DriverError> {
        (**self).enumerate()
    }

    fn device_type(&mut self, device: DeviceHandle) -> Result<DeviceClassId, DriverError> {
        (**self).device_type(device)
    }

    fn add_page(
        &mut self,
        device: DeviceHandle,
        page: u32,
        title: &str,
        flags: u32,
    ) -> Result<(), DriverError> {
        (**self).add_page(device, page, title, flags)
    }

    fn remove_page(&mut self, device: DeviceHandle, page: u32) -> Result<(), DriverError> {
        (**self).remove_page(device, page)
    }

    fn set_string(
        &mut self,
        device: DeviceHandle,
        page: u32,
        row: u32,
        text: &str,
    ) -> Result<(), DriverError> {
        (**self).set_string(device, page, row, text)
    }

    fn set_led(
        &mut self,
        device: DeviceHandle,
        page: u32,
        led: u32,
        on: bool,
    ) -> Result<(), DriverError> {
        (**self).set_led(device, page, led, on)
    }

    fn register_page_callback(
        &mut self,
        device: DeviceHandle,
        callback: Option<PageCallback>,
    ) -> Result<(), DriverError> {
        (**self).register_page_callback(device, callback)
    }

    fn register_soft_button_callback(
        &mut self,
        device: DeviceHandle,
        callback: Option<SoftButtonCallback>,
    ) -> Result<(), DriverError> {
        (**self).register_soft_button_callback(device, callback)
    }

    fn deinitialize(&mut self) -> Result<(), DriverError> {
        (**self).deinitialize()
    }
}
