//! Headless browser sessions for JavaScript-heavy pages.
//!
//! Provides isolated, per-call Chromium sessions with a fixed viewport and
//! user agent, plus the traits the dynamic render strategy drives.

pub mod actions;
pub mod engine;
pub mod error;
pub mod fingerprint;

pub use actions::{BrowserActions, NavigationInfo, SessionLauncher};
pub use engine::{BrowserEngine, BrowserSession};
pub use error::{BrowserError, Result};
pub use fingerprint::FingerprintConfig;
