//! Server state shared by the handlers.

use std::sync::Arc;

use crate::{
    domain::ResultStore,
    usecase::{ConnectParticipantUseCase, DisconnectParticipantUseCase, RoomStore},
};

/// Shared application state
pub struct AppState {
    /// ConnectParticipantUseCase（参加者接続のユースケース）
    pub connect_participant_usecase: Arc<ConnectParticipantUseCase>,
    /// DisconnectParticipantUseCase（参加者切断のユースケース）
    pub disconnect_participant_usecase: Arc<DisconnectParticipantUseCase>,
    /// 稼働中の Room
    pub room_store: RoomStore,
    /// 永続化済みの結果（HTTP API から参照）
    pub result_store: Arc<dyn ResultStore>,
}
