//! Room State Machine
//!
//! Room ごとに 1 つの tokio タスク（アクター）が Room を所有し、メールボックスに
//! 届いたコマンドとタイマーを 1 つずつ順番に処理します。
//! これにより、同時に届いた回答やタイマー満了が競合しても、問題の締め切りや
//! 次の問題への遷移が二重に起きることはありません。

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{mpsc, oneshot},
    time::Instant,
};

use super::room_store::{RoomDeps, RoomTable};
use crate::domain::{
    Advance, CloseReason, ConnectionId, LeaveOutcome, MembershipChange, Participant,
    ParticipantId, PublicQuestion, Room, RoomError, RoomEvent, RoomPhase, RoomSnapshot,
    Timestamp,
};

/// Room ごとのメールボックスの容量
pub const ROOM_MAILBOX_CAPACITY: usize = 256;

type Reply<T> = oneshot::Sender<Result<T, RoomError>>;

/// 受理された回答の通知内容。正誤は締め切りまで明かさない。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerReceipt {
    pub question_index: usize,
}

pub(crate) enum RoomCommand {
    Join {
        participant: Participant,
        reply: Reply<RoomSnapshot>,
    },
    Leave {
        participant_id: ParticipantId,
        reply: Reply<()>,
    },
    /// 接続断。メンバーが今その接続に付いている場合だけ退出扱いにする。
    Disconnect {
        participant_id: ParticipantId,
        connection_id: ConnectionId,
    },
    Start {
        requester: ParticipantId,
        reply: Reply<()>,
    },
    Submit {
        participant_id: ParticipantId,
        question_index: usize,
        chosen_option: usize,
        reply: Reply<AnswerReceipt>,
    },
    Snapshot {
        reply: oneshot::Sender<RoomSnapshot>,
    },
}

impl RoomCommand {
    /// Room が処理できなくなったコマンドにエラーを返す
    fn reject(self, error: RoomError) {
        match self {
            Self::Join { reply, .. } => {
                let _ = reply.send(Err(error));
            }
            Self::Leave { reply, .. } => {
                let _ = reply.send(Err(error));
            }
            Self::Disconnect { .. } => {}
            Self::Start { reply, .. } => {
                let _ = reply.send(Err(error));
            }
            Self::Submit { reply, .. } => {
                let _ = reply.send(Err(error));
            }
            // 応答しないことで呼び出し側にエラーを伝える
            Self::Snapshot { .. } => {}
        }
    }
}

/// Room アクターへの送信口
#[derive(Debug, Clone)]
pub struct RoomHandle {
    tx: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub(crate) fn new(tx: mpsc::Sender<RoomCommand>) -> Self {
        Self { tx }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| RoomError::SessionClosed)?;
        rx.await.map_err(|_| RoomError::SessionClosed)?
    }

    pub async fn join(&self, participant: Participant) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::Join { participant, reply })
            .await
    }

    pub async fn leave(&self, participant_id: ParticipantId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Leave {
            participant_id,
            reply,
        })
        .await
    }

    pub async fn start(&self, requester: ParticipantId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Start { requester, reply })
            .await
    }

    pub async fn submit(
        &self,
        participant_id: ParticipantId,
        question_index: usize,
        chosen_option: usize,
    ) -> Result<AnswerReceipt, RoomError> {
        self.request(|reply| RoomCommand::Submit {
            participant_id,
            question_index,
            chosen_option,
            reply,
        })
        .await
    }

    pub async fn snapshot(&self) -> Result<RoomSnapshot, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RoomCommand::Snapshot { reply })
            .await
            .map_err(|_| RoomError::SessionClosed)?;
        rx.await.map_err(|_| RoomError::SessionClosed)
    }

    /// 切断を通知する。応答は待たない。
    pub fn disconnect(&self, participant_id: ParticipantId, connection_id: ConnectionId) {
        let command = RoomCommand::Disconnect {
            participant_id,
            connection_id,
        };
        match self.tx.try_send(command) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(command)) => {
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let _ = tx.send(command).await;
                });
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    /// Waiting 中に操作がないまま経過した
    Idle,
    /// 問題の制限時間
    QuestionDeadline(usize),
    /// 締め切り後、次の問題を出すまでの間
    RevealPause(usize),
}

#[derive(Debug, Clone, Copy)]
struct Timer {
    deadline: Instant,
    kind: TimerKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Finished,
    Closed,
}

pub(crate) struct RoomMachine {
    room: Room,
    inbox: mpsc::Receiver<RoomCommand>,
    deps: Arc<RoomDeps>,
    table: RoomTable,
    /// Room ごとに高々 1 つ
    timer: Option<Timer>,
    revealed_at: Instant,
    last_reveal: Option<RoomEvent>,
}

impl RoomMachine {
    pub(crate) fn new(
        room: Room,
        inbox: mpsc::Receiver<RoomCommand>,
        deps: Arc<RoomDeps>,
        table: RoomTable,
    ) -> Self {
        Self {
            room,
            inbox,
            deps,
            table,
            timer: None,
            revealed_at: Instant::now(),
            last_reveal: None,
        }
    }

    pub(crate) async fn run(mut self) {
        tracing::info!("Room {} opened by '{}'", self.room.id(), self.room.host_id());
        let host = self.room.host_id().clone();
        self.broadcast_update(MembershipChange::Created(host)).await;
        self.arm_idle();

        let flow = loop {
            let deadline = self.timer.map(|t| t.deadline);
            let flow = tokio::select! {
                command = self.inbox.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => Flow::Closed,
                },
                _ = sleep_until_opt(deadline) => match self.timer.take() {
                    Some(timer) => self.on_timer(timer.kind).await,
                    None => Flow::Continue,
                },
            };
            if flow != Flow::Continue {
                break flow;
            }
        };

        self.shutdown(flow).await;
    }

    async fn handle(&mut self, command: RoomCommand) -> Flow {
        let is_activity = !matches!(command, RoomCommand::Snapshot { .. });
        let flow = match command {
            RoomCommand::Join { participant, reply } => self.on_join(participant, reply).await,
            RoomCommand::Leave {
                participant_id,
                reply,
            } => {
                let outcome = self.room.leave(&participant_id);
                self.on_leave(participant_id, outcome, Some(reply)).await
            }
            RoomCommand::Disconnect {
                participant_id,
                connection_id,
            } => {
                let outcome = self.room.disconnect(&participant_id, connection_id);
                self.on_leave(participant_id, outcome, None).await
            }
            RoomCommand::Start { requester, reply } => self.on_start(requester, reply).await,
            RoomCommand::Submit {
                participant_id,
                question_index,
                chosen_option,
                reply,
            } => {
                self.on_submit(participant_id, question_index, chosen_option, reply)
                    .await
            }
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(self.room.snapshot());
                Flow::Continue
            }
        };

        if is_activity && flow == Flow::Continue && self.room.phase() == RoomPhase::Waiting {
            self.arm_idle();
        }
        flow
    }

    async fn on_join(&mut self, participant: Participant, reply: Reply<RoomSnapshot>) -> Flow {
        let participant_id = participant.id.clone();
        match self.room.join(participant) {
            Ok(change) => {
                tracing::info!("'{}' joined room {}", participant_id, self.room.id());
                let _ = reply.send(Ok(self.room.snapshot()));
                let reconnected = matches!(change, MembershipChange::Reconnected(_));
                self.broadcast_update(change).await;
                if reconnected && let Some(reveal) = &self.last_reveal {
                    self.push_to(&participant_id, reveal).await;
                }
            }
            Err(e) => {
                let _ = reply.send(Err(e));
            }
        }
        Flow::Continue
    }

    async fn on_leave(
        &mut self,
        participant_id: ParticipantId,
        outcome: Result<LeaveOutcome, RoomError>,
        reply: Option<Reply<()>>,
    ) -> Flow {
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                if let Some(reply) = reply {
                    let _ = reply.send(Err(e));
                }
                return Flow::Continue;
            }
        };
        tracing::info!(
            "'{}' left room {} ({:?})",
            participant_id,
            self.room.id(),
            outcome
        );
        if let Some(reply) = reply {
            let _ = reply.send(Ok(()));
        }

        match outcome.change(&participant_id) {
            Some(change) => self.broadcast_update(change).await,
            None => return self.close(CloseReason::Empty).await,
        }

        if self.room.should_end_early() {
            tracing::info!("Room {} has no opponents left", self.room.id());
            if let Some(resolution) = self.room.resolve_current() {
                self.broadcast(RoomEvent::QuestionResolved {
                    room_id: self.room.id().clone(),
                    resolution,
                })
                .await;
            }
            self.room.finish();
            return Flow::Finished;
        }
        if self.room.all_present_answered() {
            self.close_question().await;
        }
        Flow::Continue
    }

    async fn on_start(&mut self, requester: ParticipantId, reply: Reply<()>) -> Flow {
        if let Err(e) = self
            .room
            .ensure_can_start(&requester, self.deps.config.min_players)
        {
            let _ = reply.send(Err(e));
            return Flow::Continue;
        }

        let questions = self.deps.sequencer.materialize(self.room.settings()).await;
        if let Err(e) = self.room.start(questions) {
            let _ = reply.send(Err(e));
            return Flow::Continue;
        }
        tracing::info!(
            "Room {} started with {} members",
            self.room.id(),
            self.room.members().len()
        );
        let _ = reply.send(Ok(()));
        self.reveal_current().await;
        Flow::Continue
    }

    async fn on_submit(
        &mut self,
        participant_id: ParticipantId,
        question_index: usize,
        chosen_option: usize,
        reply: Reply<AnswerReceipt>,
    ) -> Flow {
        let elapsed_ms = u64::try_from(self.revealed_at.elapsed().as_millis()).unwrap_or(u64::MAX);
        match self
            .room
            .submit(&participant_id, question_index, chosen_option, elapsed_ms)
        {
            Ok(answer) => {
                tracing::debug!(
                    "'{}' answered question {} in {}ms",
                    participant_id,
                    question_index,
                    answer.submitted_at_offset_ms
                );
                let _ = reply.send(Ok(AnswerReceipt { question_index }));
                let accepted = RoomEvent::AnswerAccepted {
                    room_id: self.room.id().clone(),
                    question_index,
                };
                self.push_to(&participant_id, &accepted).await;
            }
            Err(e) => {
                let _ = reply.send(Err(e));
                return Flow::Continue;
            }
        }

        if self.room.all_present_answered() {
            self.close_question().await;
        }
        Flow::Continue
    }

    async fn on_timer(&mut self, kind: TimerKind) -> Flow {
        match kind {
            TimerKind::Idle => {
                if self.room.phase() != RoomPhase::Waiting {
                    return Flow::Continue;
                }
                tracing::info!("Room {} idle for too long", self.room.id());
                self.close(CloseReason::IdleTimeout).await
            }
            TimerKind::QuestionDeadline(index) => {
                if self.room.current_question_index() == Some(index) {
                    self.close_question().await;
                }
                Flow::Continue
            }
            TimerKind::RevealPause(_) => match self.room.advance() {
                Some(Advance::Next(_)) => {
                    self.reveal_current().await;
                    Flow::Continue
                }
                Some(Advance::Finished) => Flow::Finished,
                None => Flow::Continue,
            },
        }
    }

    /// 現在の問題を出題し、制限時間のタイマーをセットする
    async fn reveal_current(&mut self) {
        let Some(index) = self.room.current_question_index() else {
            return;
        };
        let Some(question) = self.room.current_question() else {
            return;
        };
        let limit = self.room.settings().time_per_question();
        let limit_ms = i64::try_from(limit.as_millis()).unwrap_or(i64::MAX);
        let event = RoomEvent::QuestionRevealed {
            room_id: self.room.id().clone(),
            index,
            total: self.room.questions().len(),
            question: PublicQuestion::from(question),
            deadline: Timestamp::new(self.deps.clock.now_millis().saturating_add(limit_ms)),
            time_limit_secs: self.room.settings().time_per_question_secs,
        };

        self.revealed_at = Instant::now();
        self.set_timer(limit, TimerKind::QuestionDeadline(index));
        tracing::info!("Room {} revealed question {}", self.room.id(), index);
        self.last_reveal = Some(event.clone());
        self.broadcast(event).await;
    }

    /// 現在の問題を締め切り、結果を配信する。締め切り済みなら何もしない。
    async fn close_question(&mut self) {
        let Some(resolution) = self.room.resolve_current() else {
            return;
        };
        let index = resolution.index;
        tracing::info!("Room {} resolved question {}", self.room.id(), index);
        self.last_reveal = None;
        self.set_timer(self.deps.config.reveal_pause, TimerKind::RevealPause(index));
        self.broadcast(RoomEvent::QuestionResolved {
            room_id: self.room.id().clone(),
            resolution,
        })
        .await;
    }

    async fn close(&mut self, reason: CloseReason) -> Flow {
        tracing::info!("Room {} closed ({:?})", self.room.id(), reason);
        self.broadcast(RoomEvent::RoomClosed {
            room_id: self.room.id().clone(),
            reason,
        })
        .await;
        Flow::Closed
    }

    /// ループを抜けた後の後始末。キューに残ったコマンドはすべて拒否する。
    async fn shutdown(mut self, flow: Flow) {
        self.timer = None;
        let room_id = self.room.id().clone();

        let error = if flow == Flow::Finished {
            self.table.retire(&room_id).await;
            let (_result, _persistence) = self.deps.finalizer.finalize(&self.room).await;
            let table = self.table.clone();
            let grace = self.deps.config.finished_room_grace;
            let id = room_id.clone();
            tokio::spawn(async move {
                tokio::time::sleep(grace).await;
                table.prune(&id).await;
            });
            RoomError::SessionClosed
        } else {
            self.table.remove(&room_id).await;
            RoomError::RoomNotFound
        };

        self.inbox.close();
        while let Ok(command) = self.inbox.try_recv() {
            command.reject(error.clone());
        }
        tracing::info!("Room {} shut down", room_id);
    }

    fn arm_idle(&mut self) {
        self.set_timer(self.deps.config.idle_timeout, TimerKind::Idle);
    }

    fn set_timer(&mut self, after: Duration, kind: TimerKind) {
        self.timer = Some(Timer {
            deadline: Instant::now() + after,
            kind,
        });
    }

    async fn broadcast_update(&self, change: MembershipChange) {
        self.broadcast(RoomEvent::RoomUpdated {
            change,
            room: self.room.snapshot(),
        })
        .await;
    }

    async fn broadcast(&self, event: RoomEvent) {
        let targets = self.room.present_member_ids();
        if let Err(e) = self.deps.message_pusher.broadcast(&targets, &event).await {
            tracing::warn!("Broadcast in room {} failed: {}", self.room.id(), e);
        }
    }

    async fn push_to(&self, participant_id: &ParticipantId, event: &RoomEvent) {
        if let Err(e) = self.deps.message_pusher.push_to(participant_id, event).await {
            tracing::warn!("Push to '{}' failed: {}", participant_id, e);
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
