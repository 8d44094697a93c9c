//! UseCase: 参加者切断処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - DisconnectParticipantUseCase::execute() メソッド
//! - 接続の登録解除と、参加中の Room への切断通知
//!
//! ### なぜこのテストが必要か
//! - 置き換え済みの古い接続が閉じても、新しい接続で再参加した参加者を Room から外さないことを保証
//! - 接続を張り直した参加者が、最後の接続を閉じたときに確実に absent になることを保証
//!
//! ### どのような状況を想定しているか
//! - 正常系：Room に参加中の参加者の切断
//! - エッジケース：セッション中の接続の張り直し、再参加しないままの古い接続の切断、
//!   Room に参加していない接続の切断

use std::sync::Arc;

use super::room_store::RoomStore;
use crate::domain::{MessagePusher, Participant, RoomId};

/// 参加者切断のユースケース
pub struct DisconnectParticipantUseCase {
    /// MessagePusher（接続の登録解除）
    message_pusher: Arc<dyn MessagePusher>,
    room_store: RoomStore,
}

impl DisconnectParticipantUseCase {
    pub fn new(message_pusher: Arc<dyn MessagePusher>, room_store: RoomStore) -> Self {
        Self {
            message_pusher,
            room_store,
        }
    }

    /// 参加者切断を実行
    ///
    /// # Arguments
    ///
    /// * `participant` - 閉じた接続の参加者
    /// * `room_id` - その接続が参加していた Room
    ///
    /// # Returns
    ///
    /// その接続が参加者の現在の接続だった場合は `true`。
    /// Room への通知は常に行い、Room 側でメンバーが付いている接続と照合する。
    pub async fn execute(&self, participant: &Participant, room_id: Option<&RoomId>) -> bool {
        let live = self
            .message_pusher
            .unregister_client(participant.connection_id)
            .await
            .is_some();
        if let Some(room_id) = room_id {
            self.room_store.disconnect(room_id, participant).await;
        }
        live
    }
}
