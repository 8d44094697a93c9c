//! UseCase: Room Store
//!
//! 稼働中の Room を ID で管理し、クライアントからの操作を各 Room のアクターへ
//! 振り分けます。Room の状態そのものには触れず、表の更新だけを Mutex で守ります。
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - Room の作成・参加・開始・回答・退出の一連の操作
//! - タイマー（制限時間、結果表示の間、アイドル）による遷移
//!
//! ### なぜこのテストが必要か
//! - 同時に届いた回答で問題が二重に締め切られないことを保証する
//! - 終了後の回答が黙って捨てられず、エラーとして返ることを保証する
//!
//! ### どのような状況を想定しているか
//! - 正常系：2 人で最後まで遊ぶ
//! - 異常系：満員、ホスト以外の開始、終了後の回答
//! - エッジケース：全員同時の回答、ゲストの全員切断、放置された Room

use std::{collections::HashMap, sync::Arc};

use quizroom_shared::time::Clock;
use tokio::sync::{Mutex, mpsc};

use super::{
    question_sequencer::QuestionSequencer,
    room_machine::{AnswerReceipt, ROOM_MAILBOX_CAPACITY, RoomHandle, RoomMachine},
    session_finalizer::SessionFinalizer,
};
use crate::{
    config::CoordinatorConfig,
    domain::{
        MessagePusher, Participant, ParticipantId, Room, RoomError, RoomId, RoomIdFactory,
        RoomName, RoomSettings, RoomSnapshot, Timestamp,
    },
};

/// Room アクターが共有する依存
pub struct RoomDeps {
    pub config: CoordinatorConfig,
    pub message_pusher: Arc<dyn MessagePusher>,
    pub sequencer: Arc<QuestionSequencer>,
    pub finalizer: Arc<SessionFinalizer>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone)]
enum RoomSlot {
    Active(RoomHandle),
    /// 終了済み。猶予期間が過ぎるまで `SessionClosed` を返す
    Finished,
}

/// Room ID からアクターへの表
#[derive(Clone, Default)]
pub(crate) struct RoomTable {
    slots: Arc<Mutex<HashMap<RoomId, RoomSlot>>>,
}

impl RoomTable {
    async fn lookup(&self, room_id: &RoomId) -> Result<RoomHandle, RoomError> {
        match self.slots.lock().await.get(room_id) {
            Some(RoomSlot::Active(handle)) => Ok(handle.clone()),
            Some(RoomSlot::Finished) => Err(RoomError::SessionClosed),
            None => Err(RoomError::RoomNotFound),
        }
    }

    async fn active_handles(&self) -> Vec<RoomHandle> {
        self.slots
            .lock()
            .await
            .values()
            .filter_map(|slot| match slot {
                RoomSlot::Active(handle) => Some(handle.clone()),
                RoomSlot::Finished => None,
            })
            .collect()
    }

    pub(crate) async fn retire(&self, room_id: &RoomId) {
        self.slots
            .lock()
            .await
            .insert(room_id.clone(), RoomSlot::Finished);
    }

    pub(crate) async fn remove(&self, room_id: &RoomId) {
        self.slots.lock().await.remove(room_id);
    }

    /// 猶予期間の過ぎた終了済み Room を忘れる
    pub(crate) async fn prune(&self, room_id: &RoomId) {
        let mut slots = self.slots.lock().await;
        if matches!(slots.get(room_id), Some(RoomSlot::Finished)) {
            slots.remove(room_id);
        }
    }
}

/// 稼働中の Room を管理するユースケース
#[derive(Clone)]
pub struct RoomStore {
    deps: Arc<RoomDeps>,
    table: RoomTable,
}

impl RoomStore {
    pub fn new(deps: RoomDeps) -> Self {
        Self {
            deps: Arc::new(deps),
            table: RoomTable::default(),
        }
    }

    /// Room を作成し、ホストを最初のメンバーとして登録する
    pub async fn create_room(
        &self,
        host: Participant,
        name: String,
        settings: RoomSettings,
    ) -> Result<RoomSnapshot, RoomError> {
        let name = RoomName::new(name)?;
        settings.validate(&self.deps.config.settings_limits())?;

        let mut slots = self.table.slots.lock().await;
        let room_id = loop {
            let candidate = RoomIdFactory::generate();
            if !slots.contains_key(&candidate) {
                break candidate;
            }
        };

        let room = Room::new(
            room_id.clone(),
            name,
            host,
            settings,
            self.deps.config.max_members,
            Timestamp::new(self.deps.clock.now_millis()),
        );
        let snapshot = room.snapshot();

        let (tx, rx) = mpsc::channel(ROOM_MAILBOX_CAPACITY);
        let machine = RoomMachine::new(room, rx, self.deps.clone(), self.table.clone());
        slots.insert(room_id, RoomSlot::Active(RoomHandle::new(tx)));
        drop(slots);

        tokio::spawn(machine.run());
        Ok(snapshot)
    }

    pub async fn join_room(
        &self,
        room_id: &RoomId,
        participant: Participant,
    ) -> Result<RoomSnapshot, RoomError> {
        self.table.lookup(room_id).await?.join(participant).await
    }

    pub async fn leave_room(
        &self,
        room_id: &RoomId,
        participant_id: ParticipantId,
    ) -> Result<(), RoomError> {
        self.table.lookup(room_id).await?.leave(participant_id).await
    }

    /// 接続断を Room に伝える。Room がもう無ければ何もしない。
    pub async fn disconnect(&self, room_id: &RoomId, participant: &Participant) {
        if let Ok(handle) = self.table.lookup(room_id).await {
            handle.disconnect(participant.id.clone(), participant.connection_id);
        }
    }

    pub async fn start_quiz(
        &self,
        room_id: &RoomId,
        requester: ParticipantId,
    ) -> Result<(), RoomError> {
        self.table.lookup(room_id).await?.start(requester).await
    }

    pub async fn submit_answer(
        &self,
        room_id: &RoomId,
        participant_id: ParticipantId,
        question_index: usize,
        chosen_option: usize,
    ) -> Result<AnswerReceipt, RoomError> {
        self.table
            .lookup(room_id)
            .await?
            .submit(participant_id, question_index, chosen_option)
            .await
    }

    pub async fn snapshot(&self, room_id: &RoomId) -> Result<RoomSnapshot, RoomError> {
        self.table.lookup(room_id).await?.snapshot().await
    }

    /// 稼働中の Room の一覧（作成順）
    pub async fn list_rooms(&self) -> Vec<RoomSnapshot> {
        let mut snapshots = Vec::new();
        for handle in self.table.active_handles().await {
            if let Ok(snapshot) = handle.snapshot().await {
                snapshots.push(snapshot);
            }
        }
        snapshots.sort_by_key(|s| s.created_at.value());
        snapshots
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use quizroom_shared::time::FixedClock;
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::{
        domain::{
            CloseReason, ConnectionId, Difficulty, DisplayName, MembershipChange,
            MockResultStore, RoomEvent, RoomPhase,
        },
        usecase::{
            session_finalizer::RetryPolicy,
            testing::{RecordingPusher, medium_pool},
        },
    };

    fn participant(id: &str) -> Participant {
        Participant::new(
            ConnectionId::generate(),
            ParticipantId::new(id.to_string()).unwrap(),
            DisplayName::new(id.to_string()).unwrap(),
            Timestamp::new(0),
        )
    }

    fn pid(id: &str) -> ParticipantId {
        ParticipantId::new(id.to_string()).unwrap()
    }

    fn settings(question_count: u32) -> RoomSettings {
        RoomSettings::new(question_count, 20, Vec::new(), Difficulty::Medium)
    }

    fn config() -> CoordinatorConfig {
        CoordinatorConfig {
            max_members: 3,
            reveal_pause: Duration::from_secs(2),
            idle_timeout: Duration::from_secs(60),
            finished_room_grace: Duration::from_secs(30),
            ..CoordinatorConfig::default()
        }
    }

    fn store_with(
        config: CoordinatorConfig,
    ) -> (RoomStore, Arc<RecordingPusher>, UnboundedReceiver<RoomEvent>) {
        let (pusher, events) = RecordingPusher::new();
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(1_000));
        let mut result_store = MockResultStore::new();
        result_store.expect_record_result().returning(|_| Ok(()));
        let finalizer = SessionFinalizer::new(
            pusher.clone(),
            Arc::new(result_store),
            clock.clone(),
            RetryPolicy {
                max_attempts: config.persist_max_attempts,
                backoff: config.persist_retry_backoff,
            },
        );
        let store = RoomStore::new(RoomDeps {
            config,
            message_pusher: pusher.clone(),
            sequencer: Arc::new(QuestionSequencer::new(medium_pool(10))),
            finalizer: Arc::new(finalizer),
            clock,
        });
        (store, pusher, events)
    }

    async fn room_with_guest(store: &RoomStore, question_count: u32) -> RoomId {
        room_with(store, participant("bob"), question_count).await
    }

    async fn room_with(store: &RoomStore, guest: Participant, question_count: u32) -> RoomId {
        let snapshot = store
            .create_room(
                participant("alice"),
                "quiz night".to_string(),
                settings(question_count),
            )
            .await
            .unwrap();
        store.join_room(&snapshot.room_id, guest).await.unwrap();
        snapshot.room_id
    }

    /// 条件に合うイベントが届くまで読み進める
    async fn next_matching(
        events: &mut UnboundedReceiver<RoomEvent>,
        predicate: impl Fn(&RoomEvent) -> bool,
    ) -> RoomEvent {
        loop {
            let event = events.recv().await.unwrap();
            if predicate(&event) {
                return event;
            }
        }
    }

    fn is_revealed(index: usize) -> impl Fn(&RoomEvent) -> bool {
        move |e: &RoomEvent| matches!(e, RoomEvent::QuestionRevealed { index: i, .. } if *i == index)
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_room_rejects_invalid_settings() {
        // テスト項目: 不正な設定の Room は作成されない
        // given (前提条件):
        let (store, _pusher, _events) = store_with(config());

        // when (操作):
        let result = store
            .create_room(participant("alice"), "quiz".to_string(), settings(0))
            .await;

        // then (期待する結果):
        assert!(matches!(result, Err(RoomError::InvalidSettings(_))));
        assert!(store.list_rooms().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_full_room_is_rejected() {
        // テスト項目: 定員に達した Room への参加は RoomFull
        // given (前提条件): 定員 3 の Room に 3 人
        let (store, _pusher, _events) = store_with(config());
        let room_id = room_with_guest(&store, 2).await;
        store.join_room(&room_id, participant("carol")).await.unwrap();

        // when (操作):
        let result = store.join_room(&room_id, participant("dave")).await;

        // then (期待する結果):
        assert_eq!(result, Err(RoomError::RoomFull(3)));
        let snapshot = store.snapshot(&room_id).await.unwrap();
        assert_eq!(snapshot.members.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_room_is_not_found() {
        // テスト項目: 存在しない Room への操作は RoomNotFound
        // given (前提条件):
        let (store, _pusher, _events) = store_with(config());
        let room_id = RoomId::new("missing".to_string()).unwrap();

        // when (操作):
        let result = store.join_room(&room_id, participant("bob")).await;

        // then (期待する結果):
        assert_eq!(result, Err(RoomError::RoomNotFound));
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_host_can_start() {
        // テスト項目: ホスト以外の開始要求は NotHost で、Room は Waiting のまま
        // given (前提条件):
        let (store, _pusher, _events) = store_with(config());
        let room_id = room_with_guest(&store, 2).await;

        // when (操作):
        let result = store.start_quiz(&room_id, pid("bob")).await;

        // then (期待する結果):
        assert_eq!(result, Err(RoomError::NotHost));
        let snapshot = store.snapshot(&room_id).await.unwrap();
        assert_eq!(snapshot.phase, RoomPhase::Waiting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_requires_a_guest() {
        // テスト項目: ゲストがいないと開始できない
        // given (前提条件):
        let (store, _pusher, _events) = store_with(config());
        let snapshot = store
            .create_room(participant("alice"), "quiz".to_string(), settings(2))
            .await
            .unwrap();

        // when (操作):
        let result = store.start_quiz(&snapshot.room_id, pid("alice")).await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(RoomError::NotEnoughPlayers {
                required: 1,
                actual: 0
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_answers_resolve_question_once() {
        // テスト項目: 全員が同時に回答しても締め切りは 1 回だけ起きる
        // given (前提条件):
        let (store, pusher, mut events) = store_with(config());
        let room_id = room_with_guest(&store, 2).await;
        store.start_quiz(&room_id, pid("alice")).await.unwrap();
        next_matching(&mut events, is_revealed(0)).await;

        // when (操作):
        let (a, b) = tokio::join!(
            store.submit_answer(&room_id, pid("alice"), 0, 0),
            store.submit_answer(&room_id, pid("bob"), 0, 1),
        );

        // then (期待する結果):
        assert_eq!(a, Ok(AnswerReceipt { question_index: 0 }));
        assert_eq!(b, Ok(AnswerReceipt { question_index: 0 }));
        next_matching(&mut events, is_revealed(1)).await;
        let resolutions: Vec<_> = pusher
            .events()
            .await
            .into_iter()
            .filter_map(|(_, e)| match e {
                RoomEvent::QuestionResolved { resolution, .. } => Some(resolution),
                _ => None,
            })
            .collect();
        assert_eq!(resolutions.len(), 1);
        assert_eq!(resolutions[0].index, 0);
        assert_eq!(resolutions[0].correct_option, 0);
        assert_eq!(resolutions[0].points, vec![(pid("alice"), 15), (pid("bob"), 0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_answer_is_acknowledged_before_resolution() {
        // テスト項目: 最後の回答者にも、締め切り結果より先に受理通知が届く
        // given (前提条件):
        let (store, pusher, mut events) = store_with(config());
        let room_id = room_with_guest(&store, 2).await;
        store.start_quiz(&room_id, pid("alice")).await.unwrap();
        next_matching(&mut events, is_revealed(0)).await;
        store.submit_answer(&room_id, pid("alice"), 0, 0).await.unwrap();

        // when (操作):
        store.submit_answer(&room_id, pid("bob"), 0, 1).await.unwrap();
        next_matching(&mut events, |e| {
            matches!(e, RoomEvent::QuestionResolved { .. })
        })
        .await;

        // then (期待する結果):
        let to_bob: Vec<_> = pusher
            .events()
            .await
            .into_iter()
            .filter(|(targets, _)| targets.contains(&pid("bob")))
            .map(|(_, e)| e)
            .filter(|e| {
                matches!(
                    e,
                    RoomEvent::AnswerAccepted { .. } | RoomEvent::QuestionResolved { .. }
                )
            })
            .collect();
        assert_eq!(to_bob.len(), 2);
        assert!(matches!(
            to_bob[0],
            RoomEvent::AnswerAccepted {
                question_index: 0,
                ..
            }
        ));
        assert!(matches!(to_bob[1], RoomEvent::QuestionResolved { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_answer_is_rejected() {
        // テスト項目: 同じ問題への 2 回目の回答は DuplicateAnswer
        // given (前提条件):
        let (store, _pusher, mut events) = store_with(config());
        let room_id = room_with_guest(&store, 2).await;
        store.start_quiz(&room_id, pid("alice")).await.unwrap();
        next_matching(&mut events, is_revealed(0)).await;
        store.submit_answer(&room_id, pid("bob"), 0, 0).await.unwrap();

        // when (操作):
        let result = store.submit_answer(&room_id, pid("bob"), 0, 2).await;

        // then (期待する結果):
        assert_eq!(result, Err(RoomError::DuplicateAnswer(0)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_question_timer_resolves_with_missing_answers() {
        // テスト項目: 制限時間が過ぎると未回答のまま締め切られ、未回答者は 0 点
        // given (前提条件):
        let (store, _pusher, mut events) = store_with(config());
        let room_id = room_with_guest(&store, 2).await;
        store.start_quiz(&room_id, pid("alice")).await.unwrap();
        next_matching(&mut events, is_revealed(0)).await;
        tokio::time::sleep(Duration::from_secs(7)).await;
        store.submit_answer(&room_id, pid("alice"), 0, 0).await.unwrap();

        // when (操作): bob は回答しない
        let event = next_matching(&mut events, |e| {
            matches!(e, RoomEvent::QuestionResolved { .. })
        })
        .await;

        // then (期待する結果): alice は 7 秒で正解 (10 + 3)
        let RoomEvent::QuestionResolved { resolution, .. } = event else {
            unreachable!()
        };
        assert_eq!(resolution.points, vec![(pid("alice"), 13), (pid("bob"), 0)]);
        let late = store.submit_answer(&room_id, pid("bob"), 0, 0).await;
        assert_eq!(late, Err(RoomError::QuestionClosed(0)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_session_finishes_with_ranking() {
        // テスト項目: 全問終了後に最終結果が配信され、その後の回答は SessionClosed
        // given (前提条件):
        let (store, _pusher, mut events) = store_with(config());
        let room_id = room_with_guest(&store, 2).await;
        store.start_quiz(&room_id, pid("alice")).await.unwrap();

        // when (操作): 2 問とも bob だけが正解
        for index in 0..2 {
            next_matching(&mut events, is_revealed(index)).await;
            store.submit_answer(&room_id, pid("alice"), index, 3).await.unwrap();
            store.submit_answer(&room_id, pid("bob"), index, 0).await.unwrap();
        }
        let finished = next_matching(&mut events, |e| {
            matches!(e, RoomEvent::SessionFinished(_))
        })
        .await;

        // then (期待する結果):
        let RoomEvent::SessionFinished(result) = finished else {
            unreachable!()
        };
        assert_eq!(result.ranking, vec![pid("bob"), pid("alice")]);
        assert_eq!(result.total_of(&pid("bob")), 30);
        assert_eq!(result.total_of(&pid("alice")), 0);
        let late = store.submit_answer(&room_id, pid("bob"), 1, 0).await;
        assert_eq!(late, Err(RoomError::SessionClosed));
        let rejoin = store.join_room(&room_id, participant("bob")).await;
        assert_eq!(rejoin, Err(RoomError::SessionClosed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_guests_disconnecting_finishes_exactly_once() {
        // テスト項目: 全ゲストが切断すると、その場で 1 回だけ終了処理が走る
        // given (前提条件):
        let (store, pusher, mut events) = store_with(config());
        let bob = participant("bob");
        let room_id = room_with(&store, bob.clone(), 3).await;
        store.start_quiz(&room_id, pid("alice")).await.unwrap();
        next_matching(&mut events, is_revealed(0)).await;

        // when (操作):
        store.disconnect(&room_id, &bob).await;
        next_matching(&mut events, |e| matches!(e, RoomEvent::SessionFinished(_))).await;
        tokio::time::sleep(Duration::from_secs(120)).await;

        // then (期待する結果):
        let all = pusher.events().await;
        let finished = all
            .iter()
            .filter(|(_, e)| matches!(e, RoomEvent::SessionFinished(_)))
            .count();
        assert_eq!(finished, 1);
        let reveals = all
            .iter()
            .filter(|(_, e)| matches!(e, RoomEvent::QuestionRevealed { .. }))
            .count();
        assert_eq!(reveals, 1);
        // 猶予期間が過ぎた Room は忘れられる
        let late = store.submit_answer(&room_id, pid("alice"), 0, 0).await;
        assert_eq!(late, Err(RoomError::RoomNotFound));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnected_guest_can_reconnect_mid_session() {
        // テスト項目: InProgress 中に切断したメンバーは再参加でき、現在の問題を受け取り直す
        // given (前提条件): 3 人で開始し、bob が切断
        let (store, pusher, mut events) = store_with(config());
        let room_id = room_with_guest(&store, 2).await;
        store.join_room(&room_id, participant("carol")).await.unwrap();
        store.start_quiz(&room_id, pid("alice")).await.unwrap();
        next_matching(&mut events, is_revealed(0)).await;
        store.leave_room(&room_id, pid("bob")).await.unwrap();

        // when (操作):
        let snapshot = store.join_room(&room_id, participant("bob")).await.unwrap();

        // then (期待する結果):
        assert!(snapshot.members.iter().all(|m| m.present));
        next_matching(&mut events, |e| {
            matches!(
                e,
                RoomEvent::RoomUpdated {
                    change: MembershipChange::Reconnected(_),
                    ..
                }
            )
        })
        .await;
        next_matching(&mut events, is_revealed(0)).await;
        let replayed = pusher
            .events()
            .await
            .into_iter()
            .any(|(targets, e)| {
                targets == vec![pid("bob")] && matches!(e, RoomEvent::QuestionRevealed { .. })
            });
        assert!(replayed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_host_leaving_waiting_room_promotes_guest() {
        // テスト項目: Waiting 中にホストが抜けると次のメンバーがホストになる
        // given (前提条件):
        let (store, _pusher, _events) = store_with(config());
        let room_id = room_with_guest(&store, 2).await;

        // when (操作):
        store.leave_room(&room_id, pid("alice")).await.unwrap();

        // then (期待する結果):
        let snapshot = store.snapshot(&room_id).await.unwrap();
        assert_eq!(snapshot.host_id, pid("bob"));
        assert_eq!(
            store.start_quiz(&room_id, pid("alice")).await,
            Err(RoomError::NotHost)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_waiting_room_is_torn_down() {
        // テスト項目: 操作のない Waiting の Room はアイドルタイムアウトで閉じられる
        // given (前提条件):
        let (store, _pusher, mut events) = store_with(config());
        let room_id = room_with_guest(&store, 2).await;

        // when (操作):
        let closed =
            next_matching(&mut events, |e| matches!(e, RoomEvent::RoomClosed { .. })).await;

        // then (期待する結果):
        assert!(matches!(
            closed,
            RoomEvent::RoomClosed {
                reason: CloseReason::IdleTimeout,
                ..
            }
        ));
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(store.snapshot(&room_id).await, Err(RoomError::RoomNotFound));
        assert!(store.list_rooms().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_member_leaving_closes_room() {
        // テスト項目: 最後のメンバーが抜けた Room は閉じられる
        // given (前提条件):
        let (store, _pusher, mut events) = store_with(config());
        let snapshot = store
            .create_room(participant("alice"), "quiz".to_string(), settings(2))
            .await
            .unwrap();

        // when (操作):
        store
            .leave_room(&snapshot.room_id, pid("alice"))
            .await
            .unwrap();
        next_matching(&mut events, |e| matches!(e, RoomEvent::RoomClosed { .. })).await;

        // then (期待する結果):
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(
            store.snapshot(&snapshot.room_id).await,
            Err(RoomError::RoomNotFound)
        );
    }
}
