//! UseCase layer
//!
//! クライアントの操作を Room のアクターへ届け、セッションの終了処理を行います。

pub mod connect_participant;
pub mod disconnect_participant;
pub mod error;
pub mod question_sequencer;
pub mod room_machine;
pub mod room_store;
pub mod session_finalizer;

#[cfg(test)]
pub(crate) mod testing;

pub use connect_participant::ConnectParticipantUseCase;
pub use disconnect_participant::DisconnectParticipantUseCase;
pub use error::ConnectError;
pub use question_sequencer::QuestionSequencer;
pub use room_machine::{AnswerReceipt, RoomHandle};
pub use room_store::{RoomDeps, RoomStore};
pub use session_finalizer::{
    OperatorChannel, PersistenceFailure, PersistenceReport, RetryPolicy, SessionFinalizer,
};
