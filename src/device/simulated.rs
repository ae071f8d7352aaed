//! Simulated DirectOutput driver
//!
//! Stands in for the vendor driver when no hardware (or no Windows) is
//! around. The device half is handed to the session; the cloneable
//! controller half stays with the caller to inspect what the "hardware"
//! received and to fire page/soft-button callbacks from any thread, the way
//! the real driver does from its own thread.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use super::{
    DeviceClassId, DeviceHandle, DirectOutput, PageCallback, SoftButtonCallback,
    FLAG_SET_AS_ACTIVE,
};
use crate::error::{DriverError, DriverOp};
use crate::page::DISPLAY_ROWS;

/// `E_FAIL`, used for injected failures
pub const E_FAIL: u32 = 0x8000_4005;
/// `E_INVALIDARG`, returned for unknown pages and rows
pub const E_INVALIDARG: u32 = 0x8007_0057;

/// First handle value given to plugged-in devices
const FIRST_HANDLE: usize = 0x100;

/// One recorded driver call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    Initialize { plugin_name: String },
    Enumerate,
    DeviceType { device: DeviceHandle },
    AddPage { page: u32, title: String, flags: u32 },
    RemovePage { page: u32 },
    SetString { page: u32, row: u32, text: String },
    SetLed { page: u32, led: u32, on: bool },
    RegisterPageCallback { installed: bool },
    RegisterSoftButtonCallback { installed: bool },
    Deinitialize,
}

impl DriverCall {
    pub fn is_output(&self) -> bool {
        matches!(self, DriverCall::SetString { .. } | DriverCall::SetLed { .. })
    }
}

/// What one page slot currently shows
#[derive(Debug, Clone, Default)]
struct PanelPage {
    title: String,
    rows: [String; DISPLAY_ROWS],
    leds: BTreeMap<u32, bool>,
}

#[derive(Default)]
struct Inner {
    devices: Vec<(DeviceHandle, DeviceClassId)>,
    calls: Vec<DriverCall>,
    failures: HashMap<DriverOp, u32>,
    pages: BTreeMap<u32, PanelPage>,
    active_page: Option<u32>,
    page_callback: Option<PageCallback>,
    soft_button_callback: Option<SoftButtonCallback>,
    initialized: bool,
}

impl Inner {
    /// Record a call and apply any injected failure for it
    fn record(&mut self, op: DriverOp, call: DriverCall) -> Result<(), DriverError> {
        self.calls.push(call);
        match self.failures.get(&op) {
            Some(&code) => Err(DriverError::Status { op, code }),
            None => Ok(()),
        }
    }

    fn check_device(&self, device: DeviceHandle) -> Result<(), DriverError> {
        if self.devices.iter().any(|(handle, _)| *handle == device) {
            Ok(())
        } else {
            Err(DriverError::InvalidDevice(device.0))
        }
    }

    fn page_mut(&mut self, op: DriverOp, page: u32) -> Result<&mut PanelPage, DriverError> {
        self.pages.get_mut(&page).ok_or(DriverError::Status {
            op,
            code: E_INVALIDARG,
        })
    }
}

/// Inspection and stimulus side of the simulated driver
#[derive(Clone, Default)]
pub struct SimulatedController {
    inner: Arc<Mutex<Inner>>,
}

impl SimulatedController {
    /// Controller with no devices plugged in
    pub fn new() -> Self {
        Self::default()
    }

    /// Controller with a single device of the given class
    pub fn with_device(class: DeviceClassId) -> Self {
        let controller = Self::new();
        controller.plug_in(class);
        controller
    }

    /// Connect another device and return its handle
    pub fn plug_in(&self, class: DeviceClassId) -> DeviceHandle {
        let mut inner = self.inner.lock();
        let handle = DeviceHandle(FIRST_HANDLE + inner.devices.len());
        inner.devices.push((handle, class));
        handle
    }

    /// Driver half to hand to the session
    pub fn device(&self) -> SimulatedDevice {
        SimulatedDevice {
            controller: self.clone(),
        }
    }

    /// All calls received so far, in order
    pub fn calls(&self) -> Vec<DriverCall> {
        self.inner.lock().calls.clone()
    }

    /// Calls that write rows or LEDs
    pub fn output_calls(&self) -> Vec<DriverCall> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|call| call.is_output())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    /// Make every following call of `op` fail with `E_FAIL`
    pub fn fail(&self, op: DriverOp) {
        self.fail_with(op, E_FAIL);
    }

    pub fn fail_with(&self, op: DriverOp, code: u32) {
        self.inner.lock().failures.insert(op, code);
    }

    /// Stop failing `op`
    pub fn heal(&self, op: DriverOp) {
        self.inner.lock().failures.remove(&op);
    }

    /// Rows currently shown for a page slot
    pub fn rows(&self, page: u32) -> Option<[String; DISPLAY_ROWS]> {
        self.inner.lock().pages.get(&page).map(|p| p.rows.clone())
    }

    /// LED state currently shown for a page slot
    pub fn led(&self, page: u32, led: u32) -> Option<bool> {
        self.inner
            .lock()
            .pages
            .get(&page)
            .and_then(|p| p.leds.get(&led).copied())
    }

    pub fn page_title(&self, page: u32) -> Option<String> {
        self.inner.lock().pages.get(&page).map(|p| p.title.clone())
    }

    /// Page the device currently shows in the foreground
    pub fn active_page(&self) -> Option<u32> {
        self.inner.lock().active_page
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.lock().initialized
    }

    pub fn has_callbacks(&self) -> bool {
        let inner = self.inner.lock();
        inner.page_callback.is_some() || inner.soft_button_callback.is_some()
    }

    /// Simulate the user flipping the display to `page`
    ///
    /// Fires the page callback for the page going to the background and for
    /// the new one, on the calling thread.
    pub fn select_page(&self, page: u32) {
        let (previous, callback) = {
            let mut inner = self.inner.lock();
            let previous = inner.active_page.replace(page);
            (previous, inner.page_callback.clone())
        };

        let Some(callback) = callback else {
            debug!(page, "Page selected with no callback registered");
            return;
        };
        if let Some(previous) = previous.filter(|p| *p != page) {
            callback(previous, false);
        }
        callback(page, true);
    }

    /// Fire the page callback directly with arbitrary arguments
    pub fn fire_page_changed(&self, page: u32, active: bool) {
        let callback = self.inner.lock().page_callback.clone();
        if let Some(callback) = callback {
            callback(page, active);
        }
    }

    /// Simulate soft buttons being pressed
    pub fn press_soft_buttons(&self, mask: u32) {
        let callback = self.inner.lock().soft_button_callback.clone();
        match callback {
            Some(callback) => callback(mask),
            None => debug!(mask, "Soft buttons pressed with no callback registered"),
        }
    }
}

/// Driver half of the simulation, owned by the session worker
pub struct SimulatedDevice {
    controller: SimulatedController,
}

impl DirectOutput for SimulatedDevice {
    fn initialize(&mut self, plugin_name: &str) -> Result<(), DriverError> {
        let mut inner = self.controller.inner.lock();
        inner.record(
            DriverOp::Initialize,
            DriverCall::Initialize {
                plugin_name: plugin_name.to_string(),
            },
        )?;
        inner.initialized = true;
        debug!(plugin_name, "Simulated driver initialized");
        Ok(())
    }

    fn enumerate(&mut self) -> Result<Vec<DeviceHandle>, DriverError> {
        let mut inner = self.controller.inner.lock();
        inner.record(DriverOp::Enumerate, DriverCall::Enumerate)?;
        Ok(inner.devices.iter().map(|(handle, _)| *handle).collect())
    }

    fn device_type(&mut self, device: DeviceHandle) -> Result<DeviceClassId, DriverError> {
        let mut inner = self.controller.inner.lock();
        inner.record(DriverOp::GetDeviceType, DriverCall::DeviceType { device })?;
        inner
            .devices
            .iter()
            .find(|(handle, _)| *handle == device)
            .map(|(_, class)| *class)
            .ok_or(DriverError::InvalidDevice(device.0))
    }

    fn add_page(
        &mut self,
        device: DeviceHandle,
        page: u32,
        title: &str,
        flags: u32,
    ) -> Result<(), DriverError> {
        let mut inner = self.controller.inner.lock();
        inner.record(
            DriverOp::AddPage,
            DriverCall::AddPage {
                page,
                title: title.to_string(),
                flags,
            },
        )?;
        inner.check_device(device)?;
        if inner.pages.contains_key(&page) {
            return Err(DriverError::Status {
                op: DriverOp::AddPage,
                code: E_INVALIDARG,
            });
        }
        inner.pages.insert(
            page,
            PanelPage {
                title: title.to_string(),
                ..PanelPage::default()
            },
        );
        if flags & FLAG_SET_AS_ACTIVE != 0 {
            inner.active_page = Some(page);
        }
        debug!(page, title, flags, "Simulated page added");
        Ok(())
    }

    fn remove_page(&mut self, device: DeviceHandle, page: u32) -> Result<(), DriverError> {
        let mut inner = self.controller.inner.lock();
        inner.record(DriverOp::RemovePage, DriverCall::RemovePage { page })?;
        inner.check_device(device)?;
        inner
            .pages
            .remove(&page)
            .ok_or(DriverError::Status {
                op: DriverOp::RemovePage,
                code: E_INVALIDARG,
            })?;
        if inner.active_page == Some(page) {
            inner.active_page = None;
        }
        Ok(())
    }

    fn set_string(
        &mut self,
        device: DeviceHandle,
        page: u32,
        row: u32,
        text: &str,
    ) -> Result<(), DriverError> {
        let mut inner = self.controller.inner.lock();
        inner.record(
            DriverOp::SetString,
            DriverCall::SetString {
                page,
                row,
                text: text.to_string(),
            },
        )?;
        inner.check_device(device)?;
        let slot = inner.page_mut(DriverOp::SetString, page)?;
        let cell = slot.rows.get_mut(row as usize).ok_or(DriverError::Status {
            op: DriverOp::SetString,
            code: E_INVALIDARG,
        })?;
        *cell = text.to_string();
        info!(page, row, text, "MFD");
        Ok(())
    }

    fn set_led(
        &mut self,
        device: DeviceHandle,
        page: u32,
        led: u32,
        on: bool,
    ) -> Result<(), DriverError> {
        let mut inner = self.controller.inner.lock();
        inner.record(DriverOp::SetLed, DriverCall::SetLed { page, led, on })?;
        inner.check_device(device)?;
        inner.page_mut(DriverOp::SetLed, page)?.leds.insert(led, on);
        debug!(page, led, on, "Simulated LED set");
        Ok(())
    }

    fn register_page_callback(
        &mut self,
        device: DeviceHandle,
        callback: Option<PageCallback>,
    ) -> Result<(), DriverError> {
        let mut inner = self.controller.inner.lock();
        inner.record(
            DriverOp::RegisterPageCallback,
            DriverCall::RegisterPageCallback {
                installed: callback.is_some(),
            },
        )?;
        inner.check_device(device)?;
        inner.page_callback = callback;
        Ok(())
    }

    fn register_soft_button_callback(
        &mut self,
        device: DeviceHandle,
        callback: Option<SoftButtonCallback>,
    ) -> Result<(), DriverError> {
        let mut inner = self.controller.inner.lock();
        inner.record(
            DriverOp::RegisterSoftButtonCallback,
            DriverCall::RegisterSoftButtonCallback {
                installed: callback.is_some(),
            },
        )?;
        inner.check_device(device)?;
        inner.soft_button_callback = callback;
        Ok(())
    }

    fn deinitialize(&mut self) -> Result<(), DriverError> {
        let mut inner = self.controller.inner.lock();
        inner.record(DriverOp::Deinitialize, DriverCall::Deinitialize)?;
        inner.initialized = false;
        inner.pages.clear();
        inner.active_page = None;
        debug!("Simulated driver deinitialized");
        Ok(())
    }
}
