//! Session observer: the display surface of a [`crate::Session`].
//!
//! A session reports loading, inline errors, results and whether
//! processing is currently possible through this trait. A terminal shell
//! drives a spinner from it; a GUI would toggle sections and buttons.
//!
//! # Example
//!
//! ```rust
//! use cv_adapter::SessionObserver;
//! use std::sync::Mutex;
//!
//! #[derive(Default)]
//! struct ErrorLog(Mutex<Vec<String>>);
//!
//! impl SessionObserver for ErrorLog {
//!     fn on_error(&self, message: &str) {
//!         self.0.lock().unwrap().push(message.to_string());
//!     }
//! }
//! ```

use crate::config::ActionKind;
use crate::output::ProcessOutput;

/// Receives session events. All methods default to no-ops.
///
/// Implementations must be `Send + Sync`; events may arrive from whichever
/// task drives the session.
pub trait SessionObserver: Send + Sync {
    /// A request for `action` was sent; show its loading message.
    fn on_loading_start(&self, action: ActionKind) {
        let _ = action;
    }

    /// The request finished, successfully or not.
    fn on_loading_end(&self) {}

    /// Show an inline error. Replaces any previous one.
    fn on_error(&self, message: &str) {
        let _ = message;
    }

    /// Hide the inline error.
    fn on_error_cleared(&self) {}

    /// A result was rendered.
    fn on_result(&self, output: &ProcessOutput) {
        let _ = output;
    }

    /// Whether `process` would currently run (file selected and URL valid).
    fn on_process_enabled(&self, enabled: bool) {
        let _ = enabled;
    }
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}
