//! Multiplayer quiz session coordinator.
//!
//! Hosts quiz rooms over WebSocket: participants create and join rooms, the host
//! starts a timed multiple-choice session, and the results are ranked and
//! persisted once the session finishes.

pub mod config;

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;
