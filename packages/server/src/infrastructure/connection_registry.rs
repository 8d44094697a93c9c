//! Connection Registry（WebSocket を使った MessagePusher 実装）
//!
//! ## 責務
//!
//! - 接続ごとの `UnboundedSender` と参加者の対応付け
//! - 参加者へのイベント送信（push_to, broadcast）
//!
//! ## 設計ノート
//!
//! WebSocket の生成は UI 層（`ui/handler/websocket.rs`）で行われます。
//! この実装は生成された `UnboundedSender` を受け取り、イベントを JSON にして送信します。
//! 1 人の参加者が持てる接続は 1 つだけで、新しい接続は古い接続を置き換えます。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::dto::websocket::ServerMessage;
use crate::domain::{
    ConnectionId, MessagePushError, MessagePusher, Participant, ParticipantId, PusherChannel,
    RoomEvent,
};

struct Connection {
    participant: Participant,
    sender: PusherChannel,
}

#[derive(Default)]
struct Connections {
    by_connection: HashMap<ConnectionId, Connection>,
    /// 参加者ごとの現在の接続
    by_participant: HashMap<ParticipantId, ConnectionId>,
}

/// 接続中の参加者と WebSocket sender を管理する MessagePusher 実装
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: Mutex<Connections>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 接続中の参加者数
    pub async fn count(&self) -> usize {
        self.connections.lock().await.by_participant.len()
    }
}

fn encode(event: &RoomEvent) -> Result<String, MessagePushError> {
    serde_json::to_string(&ServerMessage::from(event))
        .map_err(|e| MessagePushError::PushFailed(e.to_string()))
}

#[async_trait]
impl MessagePusher for ConnectionRegistry {
    async fn register_client(
        &self,
        participant: Participant,
        sender: PusherChannel,
    ) -> Option<ConnectionId> {
        let mut connections = self.connections.lock().await;
        let connection_id = participant.connection_id;
        let replaced = connections
            .by_participant
            .insert(participant.id.clone(), connection_id);
        if let Some(old) = replaced {
            // 古い接続にはもう配信しない
            connections.by_connection.remove(&old);
        }
        tracing::debug!(
            "Connection {} registered for '{}'",
            connection_id,
            participant.id
        );
        connections.by_connection.insert(
            connection_id,
            Connection {
                participant,
                sender,
            },
        );
        replaced
    }

    async fn unregister_client(&self, connection_id: ConnectionId) -> Option<Participant> {
        let mut connections = self.connections.lock().await;
        let connection = connections.by_connection.remove(&connection_id)?;
        let id = &connection.participant.id;
        if connections.by_participant.get(id) == Some(&connection_id) {
            connections.by_participant.remove(id);
        }
        tracing::debug!("Connection {} of '{}' unregistered", connection_id, id);
        Some(connection.participant)
    }

    async fn push_to(
        &self,
        participant_id: &ParticipantId,
        event: &RoomEvent,
    ) -> Result<(), MessagePushError> {
        let payload = encode(event)?;
        let connections = self.connections.lock().await;
        let connection = connections
            .by_participant
            .get(participant_id)
            .and_then(|id| connections.by_connection.get(id))
            .ok_or_else(|| MessagePushError::ClientNotFound(participant_id.to_string()))?;

        connection
            .sender
            .send(payload)
            .map_err(|e| MessagePushError::PushFailed(e.to_string()))?;
        tracing::debug!("Pushed event to '{}'", participant_id);
        Ok(())
    }

    async fn broadcast(
        &self,
        targets: &[ParticipantId],
        event: &RoomEvent,
    ) -> Result<(), MessagePushError> {
        let payload = encode(event)?;
        let connections = self.connections.lock().await;

        for target in targets {
            let connection = connections
                .by_participant
                .get(target)
                .and_then(|id| connections.by_connection.get(id));
            match connection {
                // ブロードキャストでは一部の送信失敗を許容
                Some(connection) => {
                    if let Err(e) = connection.sender.send(payload.clone()) {
                        tracing::warn!("Failed to push event to '{}': {}", target, e);
                    }
                }
                None => {
                    tracing::warn!("'{}' not connected during broadcast, skipping", target);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::domain::{DisplayName, ErrorCode, Timestamp};

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - push_to: 特定の参加者への送信
    // - broadcast: 複数の参加者への送信（未接続の参加者はスキップ）
    // - 同じ参加者の再接続による置き換え
    //
    // 【なぜこのテストが必要か】
    // - Room のイベントは必ずこのレジストリを通って届く
    // - 古い接続の切断で新しい接続が消えてはならない
    // ========================================

    fn participant(id: &str) -> Participant {
        Participant::new(
            ConnectionId::generate(),
            ParticipantId::new(id.to_string()).unwrap(),
            DisplayName::new(id.to_string()).unwrap(),
            Timestamp::new(0),
        )
    }

    fn event() -> RoomEvent {
        RoomEvent::Error {
            code: ErrorCode::NotHost,
            message: "only the host can do this".to_string(),
        }
    }

    #[tokio::test]
    async fn test_push_to_success() {
        // テスト項目: 特定の参加者に JSON のイベントを送信できる
        // given (前提条件):
        let registry = ConnectionRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let alice = participant("alice");
        registry.register_client(alice.clone(), tx).await;

        // when (操作):
        let result = registry.push_to(&alice.id, &event()).await;

        // then (期待する結果):
        assert!(result.is_ok());
        let received: serde_json::Value =
            serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(received["type"], "error");
        assert_eq!(received["code"], "NotHost");
    }

    #[tokio::test]
    async fn test_push_to_unknown_participant() {
        // テスト項目: 未接続の参加者への送信は ClientNotFound
        // given (前提条件):
        let registry = ConnectionRegistry::new();
        let ghost = ParticipantId::new("ghost".to_string()).unwrap();

        // when (操作):
        let result = registry.push_to(&ghost, &event()).await;

        // then (期待する結果):
        assert!(matches!(result, Err(MessagePushError::ClientNotFound(_))));
    }

    #[tokio::test]
    async fn test_broadcast_skips_missing_targets() {
        // テスト項目: broadcast は未接続の参加者をスキップして残りに届ける
        // given (前提条件):
        let registry = ConnectionRegistry::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let alice = participant("alice");
        let bob = participant("bob");
        registry.register_client(alice.clone(), tx_a).await;
        registry.register_client(bob.clone(), tx_b).await;
        let ghost = ParticipantId::new("ghost".to_string()).unwrap();

        // when (操作):
        let result = registry
            .broadcast(&[alice.id.clone(), ghost, bob.id.clone()], &event())
            .await;

        // then (期待する結果):
        assert!(result.is_ok());
        assert!(rx_a.recv().await.is_some());
        assert!(rx_b.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_replaced_connection_is_dropped() {
        // テスト項目: 再接続で古い接続は置き換えられ、その解除は現在の接続に影響しない
        // given (前提条件):
        let registry = ConnectionRegistry::new();
        let (tx_old, mut rx_old) = mpsc::unbounded_channel();
        let (tx_new, _rx_new) = mpsc::unbounded_channel();
        let old = participant("alice");
        let new = participant("alice");

        // when (操作):
        registry.register_client(old.clone(), tx_old).await;
        let replaced = registry.register_client(new.clone(), tx_new).await;

        // then (期待する結果):
        assert_eq!(replaced, Some(old.connection_id));
        assert!(rx_old.recv().await.is_none());
        assert_eq!(registry.unregister_client(old.connection_id).await, None);
        assert_eq!(registry.count().await, 1);
        assert_eq!(
            registry.unregister_client(new.connection_id).await,
            Some(new)
        );
        assert_eq!(registry.count().await, 0);
    }
}
