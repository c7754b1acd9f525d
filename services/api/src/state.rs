//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources like the practice backend and the speech capability.

use crate::config::Config;
use salescoach_core::{PracticeBackend, SpeechCapture};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all
/// handlers. Services are trait objects injected at construction so tests
/// can substitute fakes without touching global state.
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn PracticeBackend>,
    pub speech: Arc<dyn SpeechCapture>,
    pub config: Arc<Config>,
}
