//! Entities
//!
//! ライフサイクルを持ち、ID によって同一性が決まるドメインの型。

mod answer;
mod participant;
mod question;
mod room;
mod session_result;
mod settings;

pub use answer::Answer;
pub use participant::Participant;
pub use question::{OPTION_COUNT, Question, QuestionOption};
pub use room::{Advance, LeaveOutcome, Member, Room, RoomPhase};
pub use session_result::SessionResult;
pub use settings::{RoomSettings, SettingsLimits};
