//! MessagePusher trait 定義
//!
//! 接続中の参加者へイベントを届けるためのインターフェース。
//! 接続と参加者 ID の対応付け（Connection Registry）もこの trait の責務です。

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{ConnectionId, MessagePushError, Participant, ParticipantId, RoomEvent};

/// 接続ごとの送信チャンネル（シリアライズ済みのメッセージを流す）
pub type PusherChannel = mpsc::UnboundedSender<String>;

#[async_trait]
pub trait MessagePusher: Send + Sync {
    /// 接続を登録する。同じ参加者の既存接続を置き換えた場合はその接続 ID を返す。
    async fn register_client(
        &self,
        participant: Participant,
        sender: PusherChannel,
    ) -> Option<ConnectionId>;

    /// 接続を登録解除する。その接続が参加者の現在の接続だった場合のみ参加者を返す。
    async fn unregister_client(&self, connection_id: ConnectionId) -> Option<Participant>;

    /// 特定の参加者にイベントを送信
    async fn push_to(
        &self,
        participant_id: &ParticipantId,
        event: &RoomEvent,
    ) -> Result<(), MessagePushError>;

    /// 複数の参加者にイベントを送信。一部の送信失敗は許容する。
    async fn broadcast(
        &self,
        targets: &[ParticipantId],
        event: &RoomEvent,
    ) -> Result<(), MessagePushError>;
}
