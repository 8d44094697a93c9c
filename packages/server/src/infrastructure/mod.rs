//! Infrastructure layer
//!
//! ドメイン層が定義する trait の具体的な実装と、外部とやり取りする DTO を提供します。

pub mod connection_registry;
pub mod dto;
pub mod question_bank;
pub mod question_source;
pub mod result_store;

pub use connection_registry::ConnectionRegistry;
pub use question_bank::{QuestionBankError, load_default_pool};
pub use question_source::HttpQuestionGenerator;
pub use result_store::InMemoryResultStore;
