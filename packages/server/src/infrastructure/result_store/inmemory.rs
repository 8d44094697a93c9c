//! InMemory Result Store 実装
//!
//! ドメイン層が定義する ResultStore trait の具体的な実装。
//! (room_id, participant_id) をキーにした BTreeMap をインメモリ DB として使用します。
//! 同じキーへの書き込みは上書きされるので、リトライされても記録は 1 件のままです。

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{ParticipantId, PersistenceError, ResultRecord, ResultStore, RoomId};

#[derive(Default)]
pub struct InMemoryResultStore {
    records: Mutex<BTreeMap<(RoomId, ParticipantId), ResultRecord>>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn record_result(&self, record: ResultRecord) -> Result<(), PersistenceError> {
        let key = (record.room_id.clone(), record.participant_id.clone());
        self.records.lock().await.insert(key, record);
        Ok(())
    }

    async fn results_for_room(
        &self,
        room_id: RoomId,
    ) -> Result<Vec<ResultRecord>, PersistenceError> {
        let records = self.records.lock().await;
        let mut results: Vec<ResultRecord> = records
            .values()
            .filter(|r| r.room_id == room_id)
            .cloned()
            .collect();
        results.sort_by_key(|r| r.rank);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Timestamp;

    fn record(room: &str, participant: &str, rank: usize, points: u32) -> ResultRecord {
        ResultRecord {
            room_id: RoomId::new(room.to_string()).unwrap(),
            participant_id: ParticipantId::new(participant.to_string()).unwrap(),
            points,
            rank,
            finalized_at: Timestamp::new(0),
        }
    }

    #[tokio::test]
    async fn test_record_is_idempotent_per_room_and_participant() {
        // テスト項目: 同じ (Room, 参加者) への再送は記録を増やさない
        // given (前提条件):
        let store = InMemoryResultStore::new();

        // when (操作):
        store.record_result(record("r1", "alice", 1, 30)).await.unwrap();
        store.record_result(record("r1", "alice", 1, 30)).await.unwrap();

        // then (期待する結果):
        let room_id = RoomId::new("r1".to_string()).unwrap();
        assert_eq!(store.results_for_room(room_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_results_are_filtered_by_room_and_ordered_by_rank() {
        // テスト項目: 指定 Room の結果だけが順位順に返る
        // given (前提条件):
        let store = InMemoryResultStore::new();
        store.record_result(record("r1", "bob", 2, 10)).await.unwrap();
        store.record_result(record("r2", "carol", 1, 50)).await.unwrap();
        store.record_result(record("r1", "alice", 1, 30)).await.unwrap();

        // when (操作):
        let room_id = RoomId::new("r1".to_string()).unwrap();
        let results = store.results_for_room(room_id).await.unwrap();

        // then (期待する結果):
        let ids: Vec<&str> = results.iter().map(|r| r.participant_id.as_str()).collect();
        assert_eq!(ids, vec!["alice", "bob"]);
    }
}
