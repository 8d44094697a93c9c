//! Domain layer
//!
//! クイズセッションのビジネスルールと、外部とのインターフェース（trait）を定義します。
//! この層はトランスポートや永続化の実装に依存しません。

pub mod entity;
pub mod error;
pub mod event;
pub mod message_pusher;
pub mod question_pool;
pub mod question_source;
pub mod repository;
pub mod scoring;
pub mod value_object;

pub use entity::{
    Advance, Answer, LeaveOutcome, Member, OPTION_COUNT, Participant, Question, QuestionOption,
    Room, RoomPhase, RoomSettings, SessionResult, SettingsLimits,
};
pub use error::{
    ErrorCode, GenerationError, MessagePushError, PersistenceError, RoomError, ValueObjectError,
};
pub use event::{
    CloseReason, MemberView, MembershipChange, PublicQuestion, QuestionResolution, RoomEvent,
    RoomSnapshot,
};
pub use message_pusher::{MessagePusher, PusherChannel};
pub use question_pool::QuestionPool;
pub use question_source::QuestionGenerator;
pub use repository::{ResultRecord, ResultStore};
pub use value_object::{
    ConnectionId, Difficulty, DisplayName, ParticipantId, RoomId, RoomIdFactory, RoomName,
    Timestamp,
};

#[cfg(test)]
pub use question_source::MockQuestionGenerator;
#[cfg(test)]
pub use repository::MockResultStore;
