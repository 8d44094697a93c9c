//! QuestionGenerator implementations

pub mod http;

pub use http::HttpQuestionGenerator;
