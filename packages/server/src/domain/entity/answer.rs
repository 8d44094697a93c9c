use serde::Serialize;

use crate::domain::value_object::ParticipantId;

/// (参加者, 問題番号) ごとに 1 つだけ作られる回答
///
/// 作成後は変更されません。得点はサーバーが計測した経過時間から受理時に算出されます。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub participant_id: ParticipantId,
    pub question_index: usize,
    pub chosen_option: usize,
    pub submitted_at_offset_ms: u64,
    pub is_correct: bool,
    pub points_awarded: u32,
}
