use serde::Serialize;

use crate::domain::value_object::{ConnectionId, DisplayName, ParticipantId, Timestamp};

/// 外部 ID に紐づいた接続中のプレイヤー
///
/// Connection Registry が所有し、Room からは参照されるだけです。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Participant {
    pub connection_id: ConnectionId,
    pub id: ParticipantId,
    pub display_name: DisplayName,
    pub is_host: bool,
    pub connected_at: Timestamp,
}

impl Participant {
    pub fn new(
        connection_id: ConnectionId,
        id: ParticipantId,
        display_name: DisplayName,
        connected_at: Timestamp,
    ) -> Self {
        Self {
            connection_id,
            id,
            display_name,
            is_host: false,
            connected_at,
        }
    }
}
