//! Scoring Engine
//!
//! 副作用のない得点計算と順位付け。並行に呼び出して問題ありません。

use crate::domain::value_object::{Difficulty, ParticipantId};

/// 全問正解かつソロプレイ時のボーナス
pub const PERFECT_RUN_BONUS: u32 = 10;

/// (経過時間の上限 ms, 加点) の昇順テーブル
const TIME_BONUS_TABLE: [(u64, u32); 3] = [(5_000, 5), (10_000, 3), (20_000, 1)];

/// 難易度ごとの基本点
pub fn base_points(difficulty: Difficulty) -> u32 {
    match difficulty {
        Difficulty::Easy => 5,
        Difficulty::Medium => 10,
        Difficulty::Hard => 15,
    }
}

/// 経過時間に応じた加点。境界値は含む（5000ms ちょうどは +5）。
pub fn time_bonus(elapsed_ms: u64) -> u32 {
    TIME_BONUS_TABLE
        .iter()
        .find(|(limit, _)| elapsed_ms <= *limit)
        .map(|(_, bonus)| *bonus)
        .unwrap_or(0)
}

/// 1 回の回答の得点
///
/// `elapsed_ms` は出題のブロードキャストからサーバーが回答を受理するまでの時間。
/// クライアントの時計は使いません。
pub fn score(
    difficulty: Difficulty,
    elapsed_ms: u64,
    is_correct: bool,
    perfect_run_bonus: bool,
) -> u32 {
    if !is_correct {
        return 0;
    }
    let bonus = if perfect_run_bonus {
        PERFECT_RUN_BONUS
    } else {
        0
    };
    base_points(difficulty) + time_bonus(elapsed_ms) + bonus
}

/// 順位付けのためのプレイヤーごとの集計
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerTally {
    pub participant_id: ParticipantId,
    pub total_points: u32,
    pub total_elapsed_ms: u64,
    pub join_order: usize,
}

/// 合計点の降順、同点なら合計経過時間の昇順、さらに参加順で並べる
pub fn rank(mut tallies: Vec<PlayerTally>) -> Vec<PlayerTally> {
    tallies.sort_by(|a, b| {
        b.total_points
            .cmp(&a.total_points)
            .then(a.total_elapsed_ms.cmp(&b.total_elapsed_ms))
            .then(a.join_order.cmp(&b.join_order))
    });
    tallies
}
