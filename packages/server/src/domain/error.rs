//! Domain errors

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Value Object / Entity のバリデーションエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    #[error("participant id must not be empty")]
    ParticipantIdEmpty,
    #[error("participant id must be at most {0} characters")]
    ParticipantIdTooLong(usize),
    #[error("display name must not be empty")]
    DisplayNameEmpty,
    #[error("display name must be at most {0} characters")]
    DisplayNameTooLong(usize),
    #[error("room name must not be empty")]
    RoomNameEmpty,
    #[error("room name must be at most {0} characters")]
    RoomNameTooLong(usize),
    #[error("room id must not be empty")]
    RoomIdEmpty,
    #[error("unknown difficulty '{0}'")]
    UnknownDifficulty(String),
    #[error("question count must be between 1 and {0}")]
    QuestionCountOutOfRange(u32),
    #[error("time per question must be between 1 and {0} seconds")]
    TimePerQuestionOutOfRange(u32),
    #[error("question must have exactly {expected} options, got {actual}")]
    OptionCount { expected: usize, actual: usize },
    #[error("question must have exactly one correct option, got {0}")]
    CorrectOptionCount(usize),
    #[error("question text must not be empty")]
    QuestionTextEmpty,
    #[error("question pool must contain at least one question")]
    EmptyQuestionPool,
}

/// クライアントへ返すエラーコード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    RoomNotFound,
    RoomFull,
    RoomNotJoinable,
    NotHost,
    DuplicateAnswer,
    SessionClosed,
    NotInProgress,
    QuestionClosed,
    InvalidOption,
    NotEnoughPlayers,
    InvalidSettings,
    NotAMember,
    AlreadyInRoom,
    AlreadyStarted,
    MalformedRequest,
}

/// Room に対する操作のエラー
///
/// プロトコルエラーと容量・参照エラーを表します。いずれも状態を変更せずに
/// 同期的に拒否されます。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("room not found")]
    RoomNotFound,
    #[error("room is full ({0} members)")]
    RoomFull(usize),
    #[error("room is not accepting new members")]
    RoomNotJoinable,
    #[error("only the host can do this")]
    NotHost,
    #[error("answer for question {0} was already submitted")]
    DuplicateAnswer(usize),
    #[error("session is closed")]
    SessionClosed,
    #[error("quiz is not in progress")]
    NotInProgress,
    #[error("question {0} is not open for answers")]
    QuestionClosed(usize),
    #[error("option {0} does not exist")]
    InvalidOption(usize),
    #[error("at least {required} players besides the host are required, got {actual}")]
    NotEnoughPlayers { required: usize, actual: usize },
    #[error("invalid settings: {0}")]
    InvalidSettings(#[from] ValueObjectError),
    #[error("not a member of this room")]
    NotAMember,
    #[error("already in this room")]
    AlreadyInRoom,
    #[error("quiz has already started")]
    AlreadyStarted,
}

impl RoomError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::RoomNotFound => ErrorCode::RoomNotFound,
            Self::RoomFull(_) => ErrorCode::RoomFull,
            Self::RoomNotJoinable => ErrorCode::RoomNotJoinable,
            Self::NotHost => ErrorCode::NotHost,
            Self::DuplicateAnswer(_) => ErrorCode::DuplicateAnswer,
            Self::SessionClosed => ErrorCode::SessionClosed,
            Self::NotInProgress => ErrorCode::NotInProgress,
            Self::QuestionClosed(_) => ErrorCode::QuestionClosed,
            Self::InvalidOption(_) => ErrorCode::InvalidOption,
            Self::NotEnoughPlayers { .. } => ErrorCode::NotEnoughPlayers,
            Self::InvalidSettings(_) => ErrorCode::InvalidSettings,
            Self::NotAMember => ErrorCode::NotAMember,
            Self::AlreadyInRoom => ErrorCode::AlreadyInRoom,
            Self::AlreadyStarted => ErrorCode::AlreadyStarted,
        }
    }
}

/// 外部の問題生成ソースのエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("question generation unavailable: {0}")]
    GenerationUnavailable(String),
}

/// 外部の得点・メダルストアへの永続化エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    #[error("result store unreachable: {0}")]
    Unreachable(String),
    #[error("result store rejected the record: {0}")]
    Rejected(String),
}

/// メッセージ送信のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessagePushError {
    #[error("participant '{0}' has no live connection")]
    ClientNotFound(String),
    #[error("failed to push message: {0}")]
    PushFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_error_maps_to_wire_code() {
        // テスト項目: RoomError が対応するエラーコードに変換される
        // given (前提条件):
        let errors = [
            (RoomError::RoomFull(8), ErrorCode::RoomFull),
            (RoomError::DuplicateAnswer(0), ErrorCode::DuplicateAnswer),
            (RoomError::SessionClosed, ErrorCode::SessionClosed),
            (
                RoomError::InvalidSettings(ValueObjectError::QuestionTextEmpty),
                ErrorCode::InvalidSettings,
            ),
        ];

        // when (操作) / then (期待する結果):
        for (error, code) in errors {
            assert_eq!(error.code(), code);
        }
    }
}
