//! Utilities shared by the quizroom packages.

pub mod logger;
pub mod time;
