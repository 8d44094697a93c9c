use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::value_object::{ParticipantId, RoomId, Timestamp};

/// 終了したセッションの最終結果。作成後は変更されません。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionResult {
    pub room_id: RoomId,
    pub per_player_total: BTreeMap<ParticipantId, u32>,
    /// 先頭が 1 位
    pub ranking: Vec<ParticipantId>,
    pub finalized_at: Timestamp,
}

impl SessionResult {
    /// 1 始まりの順位
    pub fn rank_of(&self, participant_id: &ParticipantId) -> Option<usize> {
        self.ranking
            .iter()
            .position(|id| id == participant_id)
            .map(|i| i + 1)
    }

    pub fn total_of(&self, participant_id: &ParticipantId) -> u32 {
        self.per_player_total
            .get(participant_id)
            .copied()
            .unwrap_or_default()
    }
}
