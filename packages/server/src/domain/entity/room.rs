use std::collections::BTreeMap;

use serde::Serialize;

use super::{Answer, Participant, Question, RoomSettings};
use crate::domain::{
    error::{RoomError, ValueObjectError},
    event::{MemberView, MembershipChange, QuestionResolution, RoomSnapshot},
    scoring::{self, PlayerTally},
    value_object::{ConnectionId, ParticipantId, RoomId, RoomName, Timestamp},
};

/// Room のフェーズ。Finished は終端。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RoomPhase {
    Waiting,
    InProgress,
    Finished,
}

/// 現在の問題の受付状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RoundState {
    Idle,
    Open,
    Resolved,
}

/// Room のメンバー。切断したメンバーは Room が閉じるまで absent として残る。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub participant: Participant,
    pub present: bool,
}

/// 退出処理の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// Waiting 中のメンバーが抜けた
    Removed,
    /// Waiting 中にホストが抜け、最古参のメンバーがホストになった
    HostPromoted { new_host: ParticipantId },
    /// InProgress 中の退出。得点を保持するため absent として残す
    MarkedAbsent,
    /// 最後のメンバーが抜けた
    Emptied,
}

impl LeaveOutcome {
    pub fn change(&self, leaver: &ParticipantId) -> Option<MembershipChange> {
        match self {
            Self::Removed => Some(MembershipChange::Left(leaver.clone())),
            Self::HostPromoted { new_host } => Some(MembershipChange::HostChanged {
                previous: leaver.clone(),
                new_host: new_host.clone(),
            }),
            Self::MarkedAbsent => Some(MembershipChange::Disconnected(leaver.clone())),
            Self::Emptied => None,
        }
    }
}

/// 問題を締め切った後の遷移先
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Next(usize),
    Finished,
}

/// 1 つのマルチプレイヤークイズセッションの全状態
///
/// ## 不変条件
///
/// - メンバー数は `capacity` を超えない
/// - (参加者, 問題番号) ごとの回答は高々 1 つで、作成後は変更されない
/// - 問題の締め切りは 1 つの問題番号につき 1 回だけ起きる
/// - Finished に入った後は一切変更されない
#[derive(Debug, Clone)]
pub struct Room {
    id: RoomId,
    name: RoomName,
    host_id: ParticipantId,
    settings: RoomSettings,
    phase: RoomPhase,
    /// 参加順
    members: Vec<Member>,
    capacity: usize,
    questions: Vec<Question>,
    current_question_index: Option<usize>,
    round: RoundState,
    answers: BTreeMap<(ParticipantId, usize), Answer>,
    solo: bool,
    started_with_guests: bool,
    created_at: Timestamp,
}

impl Room {
    pub fn new(
        id: RoomId,
        name: RoomName,
        mut host: Participant,
        settings: RoomSettings,
        capacity: usize,
        created_at: Timestamp,
    ) -> Self {
        host.is_host = true;
        Self {
            id,
            name,
            host_id: host.id.clone(),
            settings,
            phase: RoomPhase::Waiting,
            members: vec![Member {
                participant: host,
                present: true,
            }],
            capacity,
            questions: Vec::new(),
            current_question_index: None,
            round: RoundState::Idle,
            answers: BTreeMap::new(),
            solo: false,
            started_with_guests: false,
            created_at,
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn host_id(&self) -> &ParticipantId {
        &self.host_id
    }

    pub fn settings(&self) -> &RoomSettings {
        &self.settings
    }

    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn current_question_index(&self) -> Option<usize> {
        self.current_question_index
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.current_question_index
            .and_then(|index| self.questions.get(index))
    }

    pub fn answer(&self, participant_id: &ParticipantId, question_index: usize) -> Option<&Answer> {
        self.answers.get(&(participant_id.clone(), question_index))
    }

    pub fn answers(&self) -> impl Iterator<Item = &Answer> {
        self.answers.values()
    }

    /// ブロードキャスト対象（接続中のメンバー）
    pub fn present_member_ids(&self) -> Vec<ParticipantId> {
        self.members
            .iter()
            .filter(|m| m.present)
            .map(|m| m.participant.id.clone())
            .collect()
    }

    fn member_position(&self, participant_id: &ParticipantId) -> Option<usize> {
        self.members
            .iter()
            .position(|m| &m.participant.id == participant_id)
    }

    fn present_guest_count(&self) -> usize {
        self.members
            .iter()
            .filter(|m| m.present && m.participant.id != self.host_id)
            .count()
    }

    /// メンバーを追加する
    ///
    /// 既存メンバーが別の接続から参加した場合は再接続として扱い、その接続に付け替える
    /// （InProgress 中の absent メンバー、または接続を張り直した present のメンバー）。
    pub fn join(&mut self, participant: Participant) -> Result<MembershipChange, RoomError> {
        if self.phase == RoomPhase::Finished {
            return Err(RoomError::SessionClosed);
        }

        if let Some(pos) = self.member_position(&participant.id) {
            let member = &mut self.members[pos];
            if member.present && member.participant.connection_id == participant.connection_id {
                return Err(RoomError::AlreadyInRoom);
            }
            let is_host = member.participant.is_host;
            member.participant = Participant {
                is_host,
                ..participant
            };
            member.present = true;
            return Ok(MembershipChange::Reconnected(member.participant.id.clone()));
        }

        if self.phase != RoomPhase::Waiting {
            return Err(RoomError::RoomNotJoinable);
        }
        if self.members.len() >= self.capacity {
            return Err(RoomError::RoomFull(self.capacity));
        }

        let id = participant.id.clone();
        self.members.push(Member {
            participant: Participant {
                is_host: false,
                ..participant
            },
            present: true,
        });
        Ok(MembershipChange::Joined(id))
    }

    /// メンバーを退出させる
    pub fn leave(&mut self, participant_id: &ParticipantId) -> Result<LeaveOutcome, RoomError> {
        if self.phase == RoomPhase::Finished {
            return Err(RoomError::SessionClosed);
        }
        let pos = self
            .member_position(participant_id)
            .ok_or(RoomError::NotAMember)?;

        match self.phase {
            RoomPhase::Waiting => {
                let removed = self.members.remove(pos);
                if self.members.is_empty() {
                    return Ok(LeaveOutcome::Emptied);
                }
                if removed.participant.is_host {
                    let successor = &mut self.members[0];
                    successor.participant.is_host = true;
                    self.host_id = successor.participant.id.clone();
                    return Ok(LeaveOutcome::HostPromoted {
                        new_host: self.host_id.clone(),
                    });
                }
                Ok(LeaveOutcome::Removed)
            }
            RoomPhase::InProgress | RoomPhase::Finished => {
                let member = &mut self.members[pos];
                if !member.present {
                    return Err(RoomError::NotAMember);
                }
                member.present = false;
                Ok(LeaveOutcome::MarkedAbsent)
            }
        }
    }

    /// 接続断による退出。メンバーが別の接続に付け替え済みなら何もしない。
    pub fn disconnect(
        &mut self,
        participant_id: &ParticipantId,
        connection_id: ConnectionId,
    ) -> Result<LeaveOutcome, RoomError> {
        let bound = self
            .member_position(participant_id)
            .map(|pos| self.members[pos].participant.connection_id);
        match bound {
            Some(bound) if bound != connection_id => Err(RoomError::NotAMember),
            _ => self.leave(participant_id),
        }
    }

    /// 開始できるかを検査する。状態は変更しない。
    pub fn ensure_can_start(
        &self,
        requester: &ParticipantId,
        min_players: usize,
    ) -> Result<(), RoomError> {
        if self.phase == RoomPhase::Finished {
            return Err(RoomError::SessionClosed);
        }
        if requester != &self.host_id {
            return Err(RoomError::NotHost);
        }
        if self.phase != RoomPhase::Waiting {
            return Err(RoomError::AlreadyStarted);
        }
        let guests = self.present_guest_count();
        if guests < min_players {
            return Err(RoomError::NotEnoughPlayers {
                required: min_players,
                actual: guests,
            });
        }
        Ok(())
    }

    /// 出題列を確定して InProgress に遷移する
    pub fn start(&mut self, questions: Vec<Question>) -> Result<(), RoomError> {
        if self.phase != RoomPhase::Waiting {
            return Err(RoomError::AlreadyStarted);
        }
        if questions.len() != self.settings.question_count as usize {
            return Err(RoomError::InvalidSettings(
                ValueObjectError::QuestionCountOutOfRange(self.settings.question_count),
            ));
        }
        self.questions = questions;
        self.phase = RoomPhase::InProgress;
        self.current_question_index = Some(0);
        self.round = RoundState::Open;
        self.solo = self.members.len() == 1;
        self.started_with_guests = self.present_guest_count() > 0;
        Ok(())
    }

    /// 回答を受理して得点を確定する
    ///
    /// `elapsed_ms` は出題からサーバーが受理するまでの経過時間。
    pub fn submit(
        &mut self,
        participant_id: &ParticipantId,
        question_index: usize,
        chosen_option: usize,
        elapsed_ms: u64,
    ) -> Result<&Answer, RoomError> {
        match self.phase {
            RoomPhase::Waiting => return Err(RoomError::NotInProgress),
            RoomPhase::Finished => return Err(RoomError::SessionClosed),
            RoomPhase::InProgress => {}
        }
        let pos = self
            .member_position(participant_id)
            .ok_or(RoomError::NotAMember)?;
        if !self.members[pos].present {
            return Err(RoomError::NotAMember);
        }

        let key = (participant_id.clone(), question_index);
        if self.answers.contains_key(&key) {
            return Err(RoomError::DuplicateAnswer(question_index));
        }
        if self.current_question_index != Some(question_index) || self.round != RoundState::Open
        {
            return Err(RoomError::QuestionClosed(question_index));
        }
        let question = self
            .questions
            .get(question_index)
            .ok_or(RoomError::QuestionClosed(question_index))?;
        if chosen_option >= question.options().len() {
            return Err(RoomError::InvalidOption(chosen_option));
        }

        let is_correct = question.is_correct(chosen_option);
        let is_last = question_index + 1 == self.questions.len();
        let perfect_run = self.solo
            && is_correct
            && is_last
            && (0..question_index).all(|i| {
                self.answers
                    .get(&(participant_id.clone(), i))
                    .is_some_and(|a| a.is_correct)
            });
        let points_awarded =
            scoring::score(question.difficulty(), elapsed_ms, is_correct, perfect_run);

        let answer = Answer {
            participant_id: participant_id.clone(),
            question_index,
            chosen_option,
            submitted_at_offset_ms: elapsed_ms,
            is_correct,
            points_awarded,
        };
        Ok(&*self.answers.entry(key).or_insert(answer))
    }

    /// 接続中のメンバー全員が現在の問題に回答済みか
    pub fn all_present_answered(&self) -> bool {
        let Some(index) = self.current_question_index else {
            return false;
        };
        if self.round != RoundState::Open {
            return false;
        }
        let mut present = self.members.iter().filter(|m| m.present).peekable();
        if present.peek().is_none() {
            return false;
        }
        present.all(|m| {
            self.answers
                .contains_key(&(m.participant.id.clone(), index))
        })
    }

    /// 現在の問題を締め切る。同じ問題に対して 2 回目以降は `None`。
    pub fn resolve_current(&mut self) -> Option<QuestionResolution> {
        if self.phase != RoomPhase::InProgress || self.round != RoundState::Open {
            return None;
        }
        let index = self.current_question_index?;
        let correct_option = self.questions.get(index)?.correct_option();
        self.round = RoundState::Resolved;

        let points = self
            .members
            .iter()
            .map(|m| {
                let id = m.participant.id.clone();
                let points = self
                    .answers
                    .get(&(id.clone(), index))
                    .map_or(0, |a| a.points_awarded);
                (id, points)
            })
            .collect();

        Some(QuestionResolution {
            index,
            correct_option,
            points,
        })
    }

    /// 締め切り済みの問題から次へ進む。最後の問題なら Finished に遷移する。
    pub fn advance(&mut self) -> Option<Advance> {
        if self.phase != RoomPhase::InProgress || self.round != RoundState::Resolved {
            return None;
        }
        let index = self.current_question_index?;
        if index + 1 >= self.questions.len() {
            self.phase = RoomPhase::Finished;
            return Some(Advance::Finished);
        }
        self.current_question_index = Some(index + 1);
        self.round = RoundState::Open;
        Some(Advance::Next(index + 1))
    }

    /// 残りの問題を打ち切って Finished に遷移する
    pub fn finish(&mut self) -> bool {
        if self.phase != RoomPhase::InProgress {
            return false;
        }
        self.phase = RoomPhase::Finished;
        self.round = RoundState::Resolved;
        true
    }

    /// 継続する相手がいなくなったか
    pub fn should_end_early(&self) -> bool {
        if self.phase != RoomPhase::InProgress {
            return false;
        }
        let nobody_present = self.members.iter().all(|m| !m.present);
        nobody_present || (self.started_with_guests && self.present_guest_count() == 0)
    }

    /// 順位付けのための集計。未回答の問題は制限時間いっぱいを使ったものとみなす。
    pub fn tallies(&self) -> Vec<PlayerTally> {
        let time_limit_ms = u64::from(self.settings.time_per_question_secs) * 1000;
        self.members
            .iter()
            .enumerate()
            .map(|(join_order, m)| {
                let id = &m.participant.id;
                let (total_points, total_elapsed_ms) = (0..self.questions.len()).fold(
                    (0u32, 0u64),
                    |(points, elapsed), index| match self.answers.get(&(id.clone(), index)) {
                        Some(a) => (points + a.points_awarded, elapsed + a.submitted_at_offset_ms),
                        None => (points, elapsed + time_limit_ms),
                    },
                );
                PlayerTally {
                    participant_id: id.clone(),
                    total_points,
                    total_elapsed_ms,
                    join_order,
                }
            })
            .collect()
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.id.clone(),
            name: self.name.clone(),
            host_id: self.host_id.clone(),
            phase: self.phase,
            settings: self.settings.clone(),
            members: self
                .members
                .iter()
                .map(|m| MemberView {
                    participant_id: m.participant.id.clone(),
                    display_name: m.participant.display_name.clone(),
                    is_host: m.participant.is_host,
                    present: m.present,
                })
                .collect(),
            current_question_index: self.current_question_index,
            created_at: self.created_at,
        }
    }
}
