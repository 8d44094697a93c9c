//! Conversion logic between DTOs and domain entities.

use quizroom_shared::time::timestamp_to_rfc3339;

use super::{
    http::{ResultRecordDto, RoomDetailDto, RoomSummaryDto},
    websocket::{
        MemberDto, MembershipChangeDto, PlayerPointsDto, PublicQuestionDto, RankedPlayerDto,
        RoomSettingsDto, RoomSnapshotDto, ServerMessage, SessionResultDto,
    },
};
use crate::domain::{
    CloseReason, MemberView, MembershipChange, PublicQuestion, ResultRecord, RoomError,
    RoomEvent, RoomPhase, RoomSettings, RoomSnapshot, SessionResult, ValueObjectError,
};

fn phase_name(phase: RoomPhase) -> &'static str {
    match phase {
        RoomPhase::Waiting => "waiting",
        RoomPhase::InProgress => "inProgress",
        RoomPhase::Finished => "finished",
    }
}

fn close_reason_name(reason: CloseReason) -> &'static str {
    match reason {
        CloseReason::IdleTimeout => "idleTimeout",
        CloseReason::Empty => "empty",
    }
}

// ========================================
// DTO → Domain Entity
// ========================================

impl TryFrom<RoomSettingsDto> for RoomSettings {
    type Error = ValueObjectError;

    fn try_from(dto: RoomSettingsDto) -> Result<Self, Self::Error> {
        let difficulty = dto.difficulty.parse()?;
        Ok(RoomSettings::new(
            dto.question_count,
            dto.time_per_question_secs,
            dto.categories,
            difficulty,
        ))
    }
}

// ========================================
// Domain Entity → DTO
// ========================================

impl From<&RoomSettings> for RoomSettingsDto {
    fn from(settings: &RoomSettings) -> Self {
        Self {
            question_count: settings.question_count,
            time_per_question_secs: settings.time_per_question_secs,
            categories: settings.categories.iter().cloned().collect(),
            difficulty: settings.difficulty.as_str().to_string(),
        }
    }
}

impl From<&MemberView> for MemberDto {
    fn from(member: &MemberView) -> Self {
        Self {
            participant_id: member.participant_id.as_str().to_string(),
            display_name: member.display_name.as_str().to_string(),
            is_host: member.is_host,
            present: member.present,
        }
    }
}

impl From<&RoomSnapshot> for RoomSnapshotDto {
    fn from(snapshot: &RoomSnapshot) -> Self {
        Self {
            room_id: snapshot.room_id.as_str().to_string(),
            name: snapshot.name.as_str().to_string(),
            host_id: snapshot.host_id.as_str().to_string(),
            phase: phase_name(snapshot.phase).to_string(),
            settings: RoomSettingsDto::from(&snapshot.settings),
            members: snapshot.members.iter().map(MemberDto::from).collect(),
            current_question_index: snapshot.current_question_index,
            created_at: snapshot.created_at.value(),
        }
    }
}

impl From<&MembershipChange> for MembershipChangeDto {
    fn from(change: &MembershipChange) -> Self {
        let id = |p: &crate::domain::ParticipantId| p.as_str().to_string();
        match change {
            MembershipChange::Created(p) => Self::Created {
                participant_id: id(p),
            },
            MembershipChange::Joined(p) => Self::Joined {
                participant_id: id(p),
            },
            MembershipChange::Left(p) => Self::Left {
                participant_id: id(p),
            },
            MembershipChange::Disconnected(p) => Self::Disconnected {
                participant_id: id(p),
            },
            MembershipChange::Reconnected(p) => Self::Reconnected {
                participant_id: id(p),
            },
            MembershipChange::HostChanged { previous, new_host } => Self::HostChanged {
                previous: id(previous),
                new_host: id(new_host),
            },
        }
    }
}

impl From<&PublicQuestion> for PublicQuestionDto {
    fn from(question: &PublicQuestion) -> Self {
        Self {
            id: question.id.clone(),
            text: question.text.clone(),
            options: question.options.clone(),
            category: question.category.clone(),
            difficulty: question.difficulty.as_str().to_string(),
        }
    }
}

impl From<&SessionResult> for SessionResultDto {
    fn from(result: &SessionResult) -> Self {
        Self {
            room_id: result.room_id.as_str().to_string(),
            ranking: result
                .ranking
                .iter()
                .enumerate()
                .map(|(i, p)| RankedPlayerDto {
                    rank: i + 1,
                    participant_id: p.as_str().to_string(),
                    total_points: result.total_of(p),
                })
                .collect(),
            finalized_at: timestamp_to_rfc3339(result.finalized_at.value()),
        }
    }
}

impl From<&RoomEvent> for ServerMessage {
    fn from(event: &RoomEvent) -> Self {
        match event {
            RoomEvent::RoomUpdated { change, room } => Self::RoomUpdated {
                change: change.into(),
                room: room.into(),
            },
            RoomEvent::QuestionRevealed {
                room_id,
                index,
                total,
                question,
                deadline,
                time_limit_secs,
            } => Self::QuestionRevealed {
                room_id: room_id.as_str().to_string(),
                index: *index,
                total: *total,
                question: question.into(),
                deadline: deadline.value(),
                time_limit_secs: *time_limit_secs,
            },
            RoomEvent::AnswerAccepted {
                room_id,
                question_index,
            } => Self::AnswerAccepted {
                room_id: room_id.as_str().to_string(),
                question_index: *question_index,
            },
            RoomEvent::QuestionResolved {
                room_id,
                resolution,
            } => Self::QuestionResolved {
                room_id: room_id.as_str().to_string(),
                index: resolution.index,
                correct_option: resolution.correct_option,
                points: resolution
                    .points
                    .iter()
                    .map(|(p, points)| PlayerPointsDto {
                        participant_id: p.as_str().to_string(),
                        points: *points,
                    })
                    .collect(),
            },
            RoomEvent::SessionFinished(result) => Self::SessionFinished {
                result: result.into(),
            },
            RoomEvent::RoomClosed { room_id, reason } => Self::RoomClosed {
                room_id: room_id.as_str().to_string(),
                reason: close_reason_name(*reason).to_string(),
            },
            RoomEvent::Error { code, message } => Self::Error {
                code: *code,
                message: message.clone(),
            },
        }
    }
}

impl From<&RoomError> for ServerMessage {
    fn from(error: &RoomError) -> Self {
        Self::Error {
            code: error.code(),
            message: error.to_string(),
        }
    }
}

impl From<&RoomSnapshot> for RoomSummaryDto {
    fn from(snapshot: &RoomSnapshot) -> Self {
        Self {
            id: snapshot.room_id.as_str().to_string(),
            name: snapshot.name.as_str().to_string(),
            phase: phase_name(snapshot.phase).to_string(),
            host_id: snapshot.host_id.as_str().to_string(),
            member_count: snapshot.members.len(),
            created_at: timestamp_to_rfc3339(snapshot.created_at.value()),
        }
    }
}

impl From<&RoomSnapshot> for RoomDetailDto {
    fn from(snapshot: &RoomSnapshot) -> Self {
        Self {
            id: snapshot.room_id.as_str().to_string(),
            name: snapshot.name.as_str().to_string(),
            phase: phase_name(snapshot.phase).to_string(),
            host_id: snapshot.host_id.as_str().to_string(),
            question_count: snapshot.settings.question_count,
            time_per_question_secs: snapshot.settings.time_per_question_secs,
            difficulty: snapshot.settings.difficulty.as_str().to_string(),
            current_question_index: snapshot.current_question_index,
            members: snapshot.members.iter().map(MemberDto::from).collect(),
            created_at: timestamp_to_rfc3339(snapshot.created_at.value()),
        }
    }
}

impl From<&ResultRecord> for ResultRecordDto {
    fn from(record: &ResultRecord) -> Self {
        Self {
            participant_id: record.participant_id.as_str().to_string(),
            points: record.points,
            rank: record.rank,
            finalized_at: timestamp_to_rfc3339(record.finalized_at.value()),
        }
    }
}
