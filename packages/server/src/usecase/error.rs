//! UseCase layer errors

use thiserror::Error;

use crate::domain::ValueObjectError;

/// 参加者接続のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("invalid identity: {0}")]
    InvalidIdentity(#[from] ValueObjectError),
}
