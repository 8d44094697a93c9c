//! HTTP API response DTOs.

use serde::{Deserialize, Serialize};

use super::websocket::MemberDto;

/// Room summary for list endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummaryDto {
    pub id: String,
    pub name: String,
    pub phase: String,
    pub host_id: String,
    pub member_count: usize,
    pub created_at: String,
}

/// Room detail for detail endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomDetailDto {
    pub id: String,
    pub name: String,
    pub phase: String,
    pub host_id: String,
    pub question_count: u32,
    pub time_per_question_secs: u32,
    pub difficulty: String,
    pub current_question_index: Option<usize>,
    pub members: Vec<MemberDto>,
    pub created_at: String,
}

/// Persisted result of one player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecordDto {
    pub participant_id: String,
    pub points: u32,
    pub rank: usize,
    pub finalized_at: String,
}
