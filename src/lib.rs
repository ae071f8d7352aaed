//! X52 Panel - page, line and LED manager for the Saitek X52 Pro MFD
//!
//! Drives the multi-function display and button LEDs of an X52 Pro through
//! the DirectOutput driver. Applications create pages, push lines and set
//! LED colours; the soft buttons on the device scroll the foreground page.

pub mod config;
pub mod device;
pub mod error;
pub mod page;
pub mod registry;
pub mod serializer;
pub mod session;

pub use device::{DeviceClassId, DeviceHandle, DirectOutput, X52Button, X52_PRO};
pub use error::{DriverError, DriverOp, Result, SessionError};
pub use page::{Indicator, LedColor, LedId, PageIndex, PageSnapshot};
pub use session::{PageHandle, Session, SessionEvent, SessionOptions};
