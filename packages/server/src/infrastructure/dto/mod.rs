//! Data Transfer Objects (DTOs) for the quiz coordinator.
//!
//! DTOs are organized by protocol:
//! - `websocket`: WebSocket message DTOs
//! - `http`: HTTP API response DTOs
//! - `question`: question payloads of the local pool and the generation service

pub mod conversion;
pub mod http;
pub mod question;
pub mod websocket;
