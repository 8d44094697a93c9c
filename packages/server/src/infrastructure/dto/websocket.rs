//! WebSocket message DTOs.
//!
//! Every frame is a JSON object tagged by `type` with camelCase field names.

use serde::{Deserialize, Serialize};

use crate::domain::ErrorCode;

/// Commands sent by a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    CreateRoom {
        name: String,
        settings: RoomSettingsDto,
    },
    JoinRoom {
        room_id: String,
    },
    LeaveRoom,
    StartQuiz,
    SubmitAnswer {
        question_index: usize,
        chosen_option: usize,
    },
}

/// Events sent by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    RoomCreated {
        room: RoomSnapshotDto,
    },
    RoomJoined {
        room: RoomSnapshotDto,
    },
    RoomLeft {
        room_id: String,
    },
    AnswerAccepted {
        room_id: String,
        question_index: usize,
    },
    RoomUpdated {
        change: MembershipChangeDto,
        room: RoomSnapshotDto,
    },
    QuestionRevealed {
        room_id: String,
        index: usize,
        total: usize,
        question: PublicQuestionDto,
        /// Unix milliseconds
        deadline: i64,
        time_limit_secs: u32,
    },
    QuestionResolved {
        room_id: String,
        index: usize,
        correct_option: usize,
        points: Vec<PlayerPointsDto>,
    },
    SessionFinished {
        result: SessionResultDto,
    },
    RoomClosed {
        room_id: String,
        reason: String,
    },
    Error {
        code: ErrorCode,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSettingsDto {
    pub question_count: u32,
    pub time_per_question_secs: u32,
    #[serde(default)]
    pub categories: Vec<String>,
    pub difficulty: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberDto {
    pub participant_id: String,
    pub display_name: String,
    pub is_host: bool,
    pub present: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshotDto {
    pub room_id: String,
    pub name: String,
    pub host_id: String,
    /// `waiting`, `inProgress` or `finished`
    pub phase: String,
    pub settings: RoomSettingsDto,
    pub members: Vec<MemberDto>,
    pub current_question_index: Option<usize>,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum MembershipChangeDto {
    Created { participant_id: String },
    Joined { participant_id: String },
    Left { participant_id: String },
    Disconnected { participant_id: String },
    Reconnected { participant_id: String },
    HostChanged { previous: String, new_host: String },
}

/// A question without its correct-option flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestionDto {
    pub id: String,
    pub text: String,
    pub options: Vec<String>,
    pub category: Option<String>,
    pub difficulty: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerPointsDto {
    pub participant_id: String,
    pub points: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedPlayerDto {
    pub rank: usize,
    pub participant_id: String,
    pub total_points: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResultDto {
    pub room_id: String,
    pub ranking: Vec<RankedPlayerDto>,
    /// RFC 3339 (UTC)
    pub finalized_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_parses_camel_case_commands() {
        // テスト項目: クライアントのコマンドが type タグと camelCase で解釈される
        // given (前提条件):
        let submit = r#"{"type":"submitAnswer","questionIndex":2,"chosenOption":1}"#;
        let leave = r#"{"type":"leaveRoom"}"#;
        let create = r#"{"type":"createRoom","name":"friday","settings":{"questionCount":5,"timePerQuestionSecs":20,"difficulty":"hard"}}"#;

        // when (操作):
        let submit: ClientMessage = serde_json::from_str(submit).unwrap();
        let leave: ClientMessage = serde_json::from_str(leave).unwrap();
        let create: ClientMessage = serde_json::from_str(create).unwrap();

        // then (期待する結果):
        assert_eq!(
            submit,
            ClientMessage::SubmitAnswer {
                question_index: 2,
                chosen_option: 1
            }
        );
        assert_eq!(leave, ClientMessage::LeaveRoom);
        let ClientMessage::CreateRoom { settings, .. } = create else {
            panic!("expected createRoom");
        };
        assert!(settings.categories.is_empty());
        assert_eq!(settings.difficulty, "hard");
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        // テスト項目: 未知のコマンドはパースエラーになる
        // given (前提条件):
        let raw = r#"{"type":"chat","content":"hi"}"#;

        // when (操作):
        let result = serde_json::from_str::<ClientMessage>(raw);

        // then (期待する結果):
        assert!(result.is_err());
    }

    #[test]
    fn test_error_message_shape() {
        // テスト項目: エラーイベントは type と code を持つ
        // given (前提条件):
        let message = ServerMessage::Error {
            code: ErrorCode::RoomFull,
            message: "room is full".to_string(),
        };

        // when (操作):
        let json: serde_json::Value = serde_json::to_value(&message).unwrap();

        // then (期待する結果):
        assert_eq!(json["type"], "error");
        assert_eq!(json["code"], "RoomFull");
    }
}
