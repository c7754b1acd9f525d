//! Salescoach API Library Crate
//!
//! This library contains all the logic for the practice gateway service:
//! configuration, application state, REST handlers, the WebSocket practice
//! session loop, and routing. The `api` binary is a thin wrapper around it.

pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod ws;
