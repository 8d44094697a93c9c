//! Room から参加者へ配信されるイベント
//!
//! 各イベントは型付きのブロードキャストとして Room のメンバー全員に送られ、
//! Room ごとの順序が保たれます。

use serde::Serialize;

use super::{
    entity::{Question, RoomPhase, RoomSettings, SessionResult},
    error::ErrorCode,
    value_object::{Difficulty, DisplayName, ParticipantId, RoomId, RoomName, Timestamp},
};

/// メンバー構成の変化
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MembershipChange {
    Created(ParticipantId),
    Joined(ParticipantId),
    Left(ParticipantId),
    Disconnected(ParticipantId),
    Reconnected(ParticipantId),
    HostChanged {
        previous: ParticipantId,
        new_host: ParticipantId,
    },
}

/// メンバーの公開情報
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberView {
    pub participant_id: ParticipantId,
    pub display_name: DisplayName,
    pub is_host: bool,
    pub present: bool,
}

/// Room の状態のスナップショット
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub name: RoomName,
    pub host_id: ParticipantId,
    pub phase: RoomPhase,
    pub settings: RoomSettings,
    pub members: Vec<MemberView>,
    pub current_question_index: Option<usize>,
    pub created_at: Timestamp,
}

/// 正解情報を取り除いた問題
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicQuestion {
    pub id: String,
    pub text: String,
    pub options: Vec<String>,
    pub category: Option<String>,
    pub difficulty: Difficulty,
}

impl From<&Question> for PublicQuestion {
    fn from(question: &Question) -> Self {
        Self {
            id: question.id().to_string(),
            text: question.text().to_string(),
            options: question.options().iter().map(|o| o.text.clone()).collect(),
            category: question.category().map(str::to_string),
            difficulty: question.difficulty(),
        }
    }
}

/// 1 問の締め切り結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionResolution {
    pub index: usize,
    pub correct_option: usize,
    /// 回答しなかったメンバーは 0 点
    pub points: Vec<(ParticipantId, u32)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CloseReason {
    IdleTimeout,
    Empty,
}

/// サーバーからクライアントへのイベント
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RoomEvent {
    RoomUpdated {
        change: MembershipChange,
        room: RoomSnapshot,
    },
    QuestionRevealed {
        room_id: RoomId,
        index: usize,
        total: usize,
        question: PublicQuestion,
        deadline: Timestamp,
        time_limit_secs: u32,
    },
    /// 回答者本人への受理通知。締め切りより先に届く。
    AnswerAccepted {
        room_id: RoomId,
        question_index: usize,
    },
    QuestionResolved {
        room_id: RoomId,
        resolution: QuestionResolution,
    },
    SessionFinished(SessionResult),
    RoomClosed {
        room_id: RoomId,
        reason: CloseReason,
    },
    Error {
        code: ErrorCode,
        message: String,
    },
}
