//! Native DirectOutput backend
//!
//! Loads `DirectOutput.dll` at runtime and calls its exports directly. The
//! driver delivers callbacks on its own thread through `extern "system"`
//! trampolines; the context pointer handed to the driver is a boxed
//! [`PageCallback`]/[`SoftButtonCallback`] kept alive here until it has been
//! replaced or deregistered.

use std::ffi::c_void;
use std::iter;
use std::os::windows::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::ptr;

use tracing::{debug, info, warn};
use windows::core::{s, HRESULT, PCWSTR};
use windows::Win32::Foundation::{FreeLibrary, HMODULE};
use windows::Win32::System::LibraryLoader::{GetProcAddress, LoadLibraryW};

use super::{DeviceClassId, DeviceHandle, DirectOutput, PageCallback, SoftButtonCallback};
use crate::error::{DriverError, DriverOp};

pub const LIBRARY_NAME: &str = "DirectOutput.dll";

type EnumerateCallbackFn = unsafe extern "system" fn(device: *mut c_void, context: *mut c_void);
type PageChangeFn =
    unsafe extern "system" fn(device: *mut c_void, page: u32, active: bool, context: *mut c_void);
type SoftButtonChangeFn =
    unsafe extern "system" fn(device: *mut c_void, buttons: u32, context: *mut c_void);

/// Resolved exports of `DirectOutput.dll`
struct Exports {
    initialize: unsafe extern "system" fn(plugin_name: *const u16) -> HRESULT,
    deinitialize: unsafe extern "system" fn() -> HRESULT,
    enumerate: unsafe extern "system" fn(EnumerateCallbackFn, *mut c_void) -> HRESULT,
    get_device_type: unsafe extern "system" fn(*mut c_void, *mut [u8; 16]) -> HRESULT,
    add_page: unsafe extern "system" fn(*mut c_void, u32, *const u16, u32) -> HRESULT,
    remove_page: unsafe extern "system" fn(*mut c_void, u32) -> HRESULT,
    set_led: unsafe extern "system" fn(*mut c_void, u32, u32, u32) -> HRESULT,
    set_string: unsafe extern "system" fn(*mut c_void, u32, u32, u32, *const u16) -> HRESULT,
    register_page_callback:
        unsafe extern "system" fn(*mut c_void, Option<PageChangeFn>, *mut c_void) -> HRESULT,
    register_soft_button_callback:
        unsafe extern "system" fn(*mut c_void, Option<SoftButtonChangeFn>, *mut c_void) -> HRESULT,
}

/// Look up one export, bailing out of the enclosing function when missing
macro_rules! export {
    ($module:expr, $name:literal) => {{
        // SAFETY: the name is a NUL-terminated literal and the module is loaded
        match unsafe { GetProcAddress($module, s!($name)) } {
            // SAFETY: the target signature matches the DirectOutput SDK header
            Some(proc) => unsafe { std::mem::transmute(proc) },
            None => {
                return Err(DriverError::Unavailable(format!(
                    "{} does not export {}",
                    LIBRARY_NAME, $name
                )))
            }
        }
    }};
}

impl Exports {
    fn resolve(module: HMODULE) -> Result<Self, DriverError> {
        Ok(Self {
            initialize: export!(module, "DirectOutput_Initialize"),
            deinitialize: export!(module, "DirectOutput_Deinitialize"),
            enumerate: export!(module, "DirectOutput_Enumerate"),
            get_device_type: export!(module, "DirectOutput_GetDeviceType"),
            add_page: export!(module, "DirectOutput_AddPage"),
            remove_page: export!(module, "DirectOutput_RemovePage"),
            set_led: export!(module, "DirectOutput_SetLed"),
            set_string: export!(module, "DirectOutput_SetString"),
            register_page_callback: export!(module, "DirectOutput_RegisterPageCallback"),
            register_soft_button_callback: export!(
                module,
                "DirectOutput_RegisterSoftButtonCallback"
            ),
        })
    }
}

/// `DirectOutput.dll` bound to the [`DirectOutput`] trait
pub struct NativeDirectOutput {
    module: HMODULE,
    exports: Exports,
    page_callback: Option<Box<PageCallback>>,
    soft_button_callback: Option<Box<SoftButtonCallback>>,
}

// SAFETY: the module handle is process-wide and the exports are plain
// function pointers. The session only ever uses the driver from its worker.
unsafe impl Send for NativeDirectOutput {}

impl NativeDirectOutput {
    /// Load the library from the first directory that has a loadable copy
    pub fn load(directories: &[PathBuf]) -> Result<Self, DriverError> {
        for directory in directories {
            let path = directory.join(LIBRARY_NAME);
            match load_library(&path) {
                Ok(module) => {
                    info!(path = %path.display(), "Loaded DirectOutput driver");
                    return Self::bind(module);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Unable to load DirectOutput driver"),
            }
        }
        Err(DriverError::Unavailable(format!(
            "{} could not be loaded from any of {} path(s)",
            LIBRARY_NAME,
            directories.len()
        )))
    }

    fn bind(module: HMODULE) -> Result<Self, DriverError> {
        match Exports::resolve(module) {
            Ok(exports) => Ok(Self {
                module,
                exports,
                page_callback: None,
                soft_button_callback: None,
            }),
            Err(e) => {
                // SAFETY: nothing from the module is referenced any more
                let _ = unsafe { FreeLibrary(module) };
                Err(e)
            }
        }
    }
}

impl DirectOutput for NativeDirectOutput {
    fn initialize(&mut self, plugin_name: &str) -> Result<(), DriverError> {
        let name = wide_nul(plugin_name);
        // SAFETY: `name` is NUL-terminated and outlives the call
        check(DriverOp::Initialize, unsafe {
            (self.exports.initialize)(name.as_ptr())
        })
    }

    fn enumerate(&mut self) -> Result<Vec<DeviceHandle>, DriverError> {
        let mut devices: Vec<DeviceHandle> = Vec::new();
        // SAFETY: the context points at `devices`, which outlives the call;
        // the driver only invokes the callback before returning
        check(DriverOp::Enumerate, unsafe {
            (self.exports.enumerate)(
                enumerate_trampoline,
                ptr::addr_of_mut!(devices).cast::<c_void>(),
            )
        })?;
        debug!(count = devices.len(), "Native enumerate");
        Ok(devices)
    }

    fn device_type(&mut self, device: DeviceHandle) -> Result<DeviceClassId, DriverError> {
        let mut raw = [0u8; 16];
        // SAFETY: `raw` has room for one GUID
        check(DriverOp::GetDeviceType, unsafe {
            (self.exports.get_device_type)(raw_handle(device), &mut raw)
        })?;
        Ok(DeviceClassId::from_bytes(raw))
    }

    fn add_page(
        &mut self,
        device: DeviceHandle,
        page: u32,
        title: &str,
        flags: u32,
    ) -> Result<(), DriverError> {
        let title = wide_nul(title);
        // SAFETY: `title` is NUL-terminated and outlives the call
        check(DriverOp::AddPage, unsafe {
            (self.exports.add_page)(raw_handle(device), page, title.as_ptr(), flags)
        })
    }

    fn remove_page(&mut self, device: DeviceHandle, page: u32) -> Result<(), DriverError> {
        // SAFETY: plain value arguments
        check(DriverOp::RemovePage, unsafe {
            (self.exports.remove_page)(raw_handle(device), page)
        })
    }

    fn set_string(
        &mut self,
        device: DeviceHandle,
        page: u32,
        row: u32,
        text: &str,
    ) -> Result<(), DriverError> {
        let text = wide_nul(text);
        let len = (text.len() - 1) as u32;
        // SAFETY: `text` holds `len` code units plus a terminator
        check(DriverOp::SetString, unsafe {
            (self.exports.set_string)(raw_handle(device), page, row, len, text.as_ptr())
        })
    }

    fn set_led(
        &mut self,
        device: DeviceHandle,
        page: u32,
        led: u32,
        on: bool,
    ) -> Result<(), DriverError> {
        // SAFETY: plain value arguments
        check(DriverOp::SetLed, unsafe {
            (self.exports.set_led)(raw_handle(device), page, led, u32::from(on))
        })
    }

    fn register_page_callback(
        &mut self,
        device: DeviceHandle,
        callback: Option<PageCallback>,
    ) -> Result<(), DriverError> {
        let boxed = callback.map(Box::new);
        let (function, context): (Option<PageChangeFn>, *mut c_void) = match &boxed {
            Some(callback) => (Some(page_trampoline), context_of(callback.as_ref())),
            None => (None, ptr::null_mut()),
        };
        // SAFETY: the context stays alive in `self` until replaced below, and
        // the old one is only dropped after the driver stopped using it
        check(DriverOp::RegisterPageCallback, unsafe {
            (self.exports.register_page_callback)(raw_handle(device), function, context)
        })?;
        self.page_callback = boxed;
        Ok(())
    }

    fn register_soft_button_callback(
        &mut self,
        device: DeviceHandle,
        callback: Option<SoftButtonCallback>,
    ) -> Result<(), DriverError> {
        let boxed = callback.map(Box::new);
        let (function, context): (Option<SoftButtonChangeFn>, *mut c_void) = match &boxed {
            Some(callback) => (Some(soft_button_trampoline), context_of(callback.as_ref())),
            None => (None, ptr::null_mut()),
        };
        // SAFETY: same lifetime rules as the page callback
        check(DriverOp::RegisterSoftButtonCallback, unsafe {
            (self.exports.register_soft_button_callback)(raw_handle(device), function, context)
        })?;
        self.soft_button_callback = boxed;
        Ok(())
    }

    fn deinitialize(&mut self) -> Result<(), DriverError> {
        // SAFETY: no arguments
        check(DriverOp::Deinitialize, unsafe {
            (self.exports.deinitialize)()
        })?;
        // The driver no longer calls back after deinitializing
        self.page_callback = None;
        self.soft_button_callback = None;
        Ok(())
    }
}

impl Drop for NativeDirectOutput {
    fn drop(&mut self) {
        // SAFETY: the exports are not used after this point
        if let Err(e) = unsafe { FreeLibrary(self.module) } {
            warn!(error = %e, "Failed to unload DirectOutput driver");
        }
    }
}

// ============================================================================
// Trampolines
// ============================================================================

unsafe extern "system" fn enumerate_trampoline(device: *mut c_void, context: *mut c_void) {
    // SAFETY: `enumerate` passes a pointer to its live device list
    if let Some(devices) = unsafe { context.cast::<Vec<DeviceHandle>>().as_mut() } {
        devices.push(DeviceHandle(device as usize));
    }
}

unsafe extern "system" fn page_trampoline(
    _device: *mut c_void,
    page: u32,
    active: bool,
    context: *mut c_void,
) {
    // SAFETY: the context is a boxed callback owned by the driver wrapper
    if let Some(callback) = unsafe { context.cast::<PageCallback>().as_ref() } {
        callback(page, active);
    }
}

unsafe extern "system" fn soft_button_trampoline(
    _device: *mut c_void,
    buttons: u32,
    context: *mut c_void,
) {
    // SAFETY: the context is a boxed callback owned by the driver wrapper
    if let Some(callback) = unsafe { context.cast::<SoftButtonCallback>().as_ref() } {
        callback(buttons);
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn load_library(path: &Path) -> windows::core::Result<HMODULE> {
    let wide: Vec<u16> = path.as_os_str().encode_wide().chain(iter::once(0)).collect();
    // SAFETY: `wide` is NUL-terminated and outlives the call
    unsafe { LoadLibraryW(PCWSTR(wide.as_ptr())) }
}

fn wide_nul(text: &str) -> Vec<u16> {
    text.encode_utf16().chain(iter::once(0)).collect()
}

fn raw_handle(device: DeviceHandle) -> *mut c_void {
    device.0 as *mut c_void
}

fn context_of<T>(value: &T) -> *mut c_void {
    (value as *const T).cast_mut().cast()
}

fn check(op: DriverOp, result: HRESULT) -> Result<(), DriverError> {
    if result.is_ok() {
        Ok(())
    } else {
        Err(DriverError::Status {
            op,
            code: result.0 as u32,
        })
    }
}
