//! UseCase テスト用の共通部品

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use crate::domain::{
    ConnectionId, Difficulty, MessagePushError, MessagePusher, Participant, ParticipantId,
    PusherChannel, Question, QuestionOption, QuestionPool, RoomEvent,
};

/// 配信されたイベントを記録し、テスト側のチャンネルにも流す MessagePusher
pub struct RecordingPusher {
    events: Mutex<Vec<(Vec<ParticipantId>, RoomEvent)>>,
    tap: mpsc::UnboundedSender<RoomEvent>,
}

impl RecordingPusher {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<RoomEvent>) {
        let (tap, rx) = mpsc::unbounded_channel();
        let pusher = Arc::new(Self {
            events: Mutex::new(Vec::new()),
            tap,
        });
        (pusher, rx)
    }

    pub async fn events(&self) -> Vec<(Vec<ParticipantId>, RoomEvent)> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl MessagePusher for RecordingPusher {
    async fn register_client(
        &self,
        _participant: Participant,
        _sender: PusherChannel,
    ) -> Option<ConnectionId> {
        None
    }

    async fn unregister_client(&self, _connection_id: ConnectionId) -> Option<Participant> {
        None
    }

    async fn push_to(
        &self,
        participant_id: &ParticipantId,
        event: &RoomEvent,
    ) -> Result<(), MessagePushError> {
        self.broadcast(std::slice::from_ref(participant_id), event)
            .await
    }

    async fn broadcast(
        &self,
        targets: &[ParticipantId],
        event: &RoomEvent,
    ) -> Result<(), MessagePushError> {
        self.events
            .lock()
            .await
            .push((targets.to_vec(), event.clone()));
        let _ = self.tap.send(event.clone());
        Ok(())
    }
}

/// 正解が常に 0 番目の medium 問題だけのプール
pub fn medium_pool(size: usize) -> Arc<QuestionPool> {
    let questions = (0..size)
        .map(|i| {
            let options = (0..4)
                .map(|o| QuestionOption {
                    text: format!("answer {o}"),
                    is_correct: o == 0,
                })
                .collect();
            Question::new(
                format!("pool-{i}"),
                format!("question {i}"),
                options,
                Some("general".to_string()),
                Difficulty::Medium,
            )
            .unwrap()
        })
        .collect();
    Arc::new(QuestionPool::new(questions).unwrap())
}
