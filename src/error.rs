//! Error types for the panel session and the device driver seam

use std::fmt;

use thiserror::Error;

use crate::device::DeviceClassId;

/// Driver entry points, used to label failures in logs and events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverOp {
    Initialize,
    Enumerate,
    GetDeviceType,
    AddPage,
    RemovePage,
    SetString,
    SetLed,
    RegisterPageCallback,
    RegisterSoftButtonCallback,
    Deinitialize,
}

impl DriverOp {
    pub fn as_str(self) -> &'static str {
        match self {
            DriverOp::Initialize => "initialize",
            DriverOp::Enumerate => "enumerate",
            DriverOp::GetDeviceType => "get_device_type",
            DriverOp::AddPage => "add_page",
            DriverOp::RemovePage => "remove_page",
            DriverOp::SetString => "set_string",
            DriverOp::SetLed => "set_led",
            DriverOp::RegisterPageCallback => "register_page_callback",
            DriverOp::RegisterSoftButtonCallback => "register_soft_button_callback",
            DriverOp::Deinitialize => "deinitialize",
        }
    }
}

impl fmt::Display for DriverOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a driver backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// The driver returned a failure status (an `HRESULT` on the native backend)
    #[error("{op} returned status 0x{code:08X}")]
    Status { op: DriverOp, code: u32 },

    /// The driver library could not be loaded or is missing an entry point
    #[error("driver unavailable: {0}")]
    Unavailable(String),

    /// The device handle is unknown to the driver (e.g. it was unplugged)
    #[error("device handle {0:#x} is not valid")]
    InvalidDevice(usize),
}

/// Errors surfaced by the session controller
#[derive(Debug, Error)]
pub enum SessionError {
    /// Discovery found no connected device of the supported class
    #[error("no device of class {expected} found, plug it in and try again")]
    DeviceNotFound { expected: DeviceClassId },

    /// A driver call failed
    #[error("driver call {op} failed: {source}")]
    DriverCallFailed {
        op: DriverOp,
        #[source]
        source: DriverError,
    },

    /// The session no longer accepts work
    #[error("session is closed")]
    SessionClosed,

    /// A job panicked or the worker went away before answering
    #[error("session worker failed while running '{0}'")]
    WorkerFailed(&'static str),

    /// The worker thread could not be started
    #[error("failed to start session worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),
}

impl SessionError {
    pub fn driver(op: DriverOp, source: DriverError) -> Self {
        SessionError::DriverCallFailed { op, source }
    }
}

pub type Result<T, E = SessionError> = std::result::Result<T, E>;
