//! Hardware callback translation
//!
//! The driver invokes these closures on its own thread. They never touch
//! session state: each one wraps the event into a job and queues it on the
//! serializer, then returns.

use std::sync::Arc;

use tracing::{debug, trace};

use super::state::SessionState;
use crate::device::{PageCallback, SoftButtonCallback};
use crate::serializer::Serializer;

/// Callbacks currently registered with the driver
///
/// Holding them here keeps them alive for as long as the driver may call
/// them; they are only dropped after being deregistered.
pub(crate) struct RegisteredCallbacks {
    pub page: PageCallback,
    pub soft_button: SoftButtonCallback,
}

impl RegisteredCallbacks {
    pub fn new(serializer: &Serializer<SessionState>) -> Self {
        Self {
            page: page_changed(serializer.clone()),
            soft_button: soft_button(serializer.clone()),
        }
    }
}

/// Only activations matter; the matching deactivation is implied
fn page_changed(serializer: Serializer<SessionState>) -> PageCallback {
    Arc::new(move |page: u32, active: bool| {
        if !active {
            trace!(page, "Page moved to background");
            return;
        }
        if let Err(error) = serializer.submit("page-changed", move |state| state.activate(page)) {
            debug!(page, %error, "Dropping page change");
        }
    })
}

fn soft_button(serializer: Serializer<SessionState>) -> SoftButtonCallback {
    Arc::new(move |buttons: u32| {
        if let Err(error) =
            serializer.submit("soft-button", move |state| state.soft_buttons(buttons))
        {
            debug!(buttons, %error, "Dropping soft button press");
        }
    })
}
