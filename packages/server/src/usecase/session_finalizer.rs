//! Session Finalizer
//!
//! 終了した Room の最終順位を確定し、全メンバーに配信してから外部ストアへ
//! 永続化します。永続化の失敗は配信を妨げません。

use std::{sync::Arc, time::Duration};

use futures_util::future::join_all;
use quizroom_shared::time::Clock;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::domain::{
    MessagePusher, PersistenceError, ResultRecord, ResultStore, Room, RoomEvent, SessionResult,
    Timestamp, scoring,
};

/// 永続化のリトライ方針
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// n 回目の失敗の後は `backoff * n` 待つ
    pub backoff: Duration,
}

/// リトライを使い切った永続化の失敗（オペレーター向け）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceFailure {
    pub record: ResultRecord,
    pub attempts: u32,
    pub error: PersistenceError,
}

/// バックグラウンドの永続化処理の結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistenceReport {
    pub persisted: usize,
    pub failures: Vec<PersistenceFailure>,
}

/// オペレーター通知チャンネル
pub type OperatorChannel = mpsc::UnboundedSender<PersistenceFailure>;

pub struct SessionFinalizer {
    message_pusher: Arc<dyn MessagePusher>,
    result_store: Arc<dyn ResultStore>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    operator: Option<OperatorChannel>,
}

impl SessionFinalizer {
    pub fn new(
        message_pusher: Arc<dyn MessagePusher>,
        result_store: Arc<dyn ResultStore>,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            message_pusher,
            result_store,
            clock,
            retry,
            operator: None,
        }
    }

    pub fn with_operator_channel(mut self, operator: OperatorChannel) -> Self {
        self.operator = Some(operator);
        self
    }

    /// 合計点と順位を計算する
    pub fn compute_result(&self, room: &Room) -> SessionResult {
        let ranked = scoring::rank(room.tallies());
        SessionResult {
            room_id: room.id().clone(),
            per_player_total: ranked
                .iter()
                .map(|t| (t.participant_id.clone(), t.total_points))
                .collect(),
            ranking: ranked.into_iter().map(|t| t.participant_id).collect(),
            finalized_at: Timestamp::new(self.clock.now_millis()),
        }
    }

    /// 結果を確定・配信し、永続化をバックグラウンドで開始する
    ///
    /// 返される `JoinHandle` は永続化の完了を待ちたい場合のみ使います。
    pub async fn finalize(&self, room: &Room) -> (SessionResult, JoinHandle<PersistenceReport>) {
        let result = self.compute_result(room);
        tracing::info!(
            "Room {} finalized with {} players",
            result.room_id,
            result.ranking.len()
        );

        let targets = room.present_member_ids();
        if let Err(e) = self
            .message_pusher
            .broadcast(&targets, &RoomEvent::SessionFinished(result.clone()))
            .await
        {
            tracing::warn!("Failed to broadcast session result: {}", e);
        }

        let records = result
            .ranking
            .iter()
            .enumerate()
            .map(|(i, participant_id)| ResultRecord {
                room_id: result.room_id.clone(),
                participant_id: participant_id.clone(),
                points: result.total_of(participant_id),
                rank: i + 1,
                finalized_at: result.finalized_at,
            })
            .collect();
        let persistence = tokio::spawn(persist_all(
            self.result_store.clone(),
            records,
            self.retry,
            self.operator.clone(),
        ));

        (result, persistence)
    }
}

async fn persist_all(
    store: Arc<dyn ResultStore>,
    records: Vec<ResultRecord>,
    retry: RetryPolicy,
    operator: Option<OperatorChannel>,
) -> PersistenceReport {
    let outcomes = join_all(
        records
            .into_iter()
            .map(|record| persist_with_retry(store.as_ref(), record, retry)),
    )
    .await;

    let mut report = PersistenceReport::default();
    for outcome in outcomes {
        match outcome {
            Ok(()) => report.persisted += 1,
            Err(failure) => {
                tracing::error!(
                    target: "operator",
                    "Giving up persisting result of '{}' in room {} after {} attempts: {}",
                    failure.record.participant_id,
                    failure.record.room_id,
                    failure.attempts,
                    failure.error
                );
                if let Some(operator) = &operator {
                    let _ = operator.send(failure.clone());
                }
                report.failures.push(failure);
            }
        }
    }
    report
}

async fn persist_with_retry(
    store: &dyn ResultStore,
    record: ResultRecord,
    retry: RetryPolicy,
) -> Result<(), PersistenceFailure> {
    let max_attempts = retry.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match store.record_result(record.clone()).await {
            Ok(()) => return Ok(()),
            Err(error) if attempt >= max_attempts => {
                return Err(PersistenceFailure {
                    record,
                    attempts: attempt,
                    error,
                });
            }
            Err(error) => {
                tracing::warn!(
                    "Persisting result of '{}' failed (attempt {}/{}): {}",
                    record.participant_id,
                    attempt,
                    max_attempts,
                    error
                );
                tokio::time::sleep(retry.backoff * attempt).await;
                attempt += 1;
            }
        }
    }
}
