//! Repository trait 定義
//!
//! Session Finalizer が結果を書き込む外部の得点・メダルストアへのインターフェース。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。

use async_trait::async_trait;
use serde::Serialize;

use super::{ParticipantId, PersistenceError, RoomId, Timestamp};

/// 1 セッション・1 参加者ぶんの確定結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultRecord {
    pub room_id: RoomId,
    pub participant_id: ParticipantId,
    pub points: u32,
    /// 1 始まり
    pub rank: usize,
    pub finalized_at: Timestamp,
}

/// Result Store trait
///
/// ## 冪等性
///
/// `record_result` は (room_id, participant_id) 単位で冪等であることを期待します。
/// Finalizer はリトライ時に同じレコードを再送します。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// 結果を記録
    async fn record_result(&self, record: ResultRecord) -> Result<(), PersistenceError>;

    /// Room の記録済み結果を順位順に取得
    async fn results_for_room(
        &self,
        room_id: RoomId,
    ) -> Result<Vec<ResultRecord>, PersistenceError>;
}
