//! UseCase: 参加者接続処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - ConnectParticipantUseCase::execute() メソッド
//! - 外部 ID の検証と Connection Registry への登録
//!
//! ### なぜこのテストが必要か
//! - 不正な ID の接続を受け付けないことを保証
//! - 同じユーザーの新しい接続が古い接続を置き換えることを確認
//!
//! ### どのような状況を想定しているか
//! - 正常系：新規参加者の接続
//! - 異常系：空の user_id / 長すぎる表示名
//! - エッジケース：同じ user_id での再接続

use std::sync::Arc;

use quizroom_shared::time::Clock;

use super::error::ConnectError;
use crate::domain::{
    ConnectionId, DisplayName, MessagePusher, Participant, ParticipantId, PusherChannel,
    Timestamp,
};

/// 参加者接続のユースケース
pub struct ConnectParticipantUseCase {
    /// MessagePusher（接続の登録先）
    message_pusher: Arc<dyn MessagePusher>,
    clock: Arc<dyn Clock>,
}

impl ConnectParticipantUseCase {
    pub fn new(message_pusher: Arc<dyn MessagePusher>, clock: Arc<dyn Clock>) -> Self {
        Self {
            message_pusher,
            clock,
        }
    }

    /// 参加者接続を実行
    ///
    /// # Arguments
    ///
    /// * `user_id` - 上流で認証済みの外部ユーザー ID
    /// * `display_name` - 表示名
    /// * `sender` - クライアントへのメッセージ送信用チャンネル
    ///
    /// # Returns
    ///
    /// * `Ok(Participant)` - 接続成功（新しい ConnectionId を持つ参加者）
    /// * `Err(ConnectError)` - ID または表示名が不正
    pub async fn execute(
        &self,
        user_id: String,
        display_name: String,
        sender: PusherChannel,
    ) -> Result<Participant, ConnectError> {
        let id = ParticipantId::new(user_id)?;
        let display_name = DisplayName::new(display_name)?;
        let participant = Participant::new(
            ConnectionId::generate(),
            id,
            display_name,
            Timestamp::new(self.clock.now_millis()),
        );

        if let Some(replaced) = self
            .message_pusher
            .register_client(participant.clone(), sender)
            .await
        {
            tracing::info!(
                "Connection {} of '{}' replaced by {}",
                replaced,
                participant.id,
                participant.connection_id
            );
        }

        Ok(participant)
    }
}
