use std::{collections::BTreeSet, time::Duration};

use serde::Serialize;

use crate::domain::{error::ValueObjectError, value_object::Difficulty};

/// 設定値の上限（サーバー設定から与えられる）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingsLimits {
    pub max_question_count: u32,
    pub max_time_per_question_secs: u32,
}

/// Room のクイズ設定
///
/// InProgress に入った後は変更されません。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomSettings {
    pub question_count: u32,
    pub time_per_question_secs: u32,
    pub categories: BTreeSet<String>,
    pub difficulty: Difficulty,
}

impl RoomSettings {
    pub fn new(
        question_count: u32,
        time_per_question_secs: u32,
        categories: impl IntoIterator<Item = String>,
        difficulty: Difficulty,
    ) -> Self {
        let categories = categories
            .into_iter()
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .collect();
        Self {
            question_count,
            time_per_question_secs,
            categories,
            difficulty,
        }
    }

    pub fn validate(&self, limits: &SettingsLimits) -> Result<(), ValueObjectError> {
        if self.question_count == 0 || self.question_count > limits.max_question_count {
            return Err(ValueObjectError::QuestionCountOutOfRange(
                limits.max_question_count,
            ));
        }
        if self.time_per_question_secs == 0
            || self.time_per_question_secs > limits.max_time_per_question_secs
        {
            return Err(ValueObjectError::TimePerQuestionOutOfRange(
                limits.max_time_per_question_secs,
            ));
        }
        Ok(())
    }

    pub fn time_per_question(&self) -> Duration {
        Duration::from_secs(u64::from(self.time_per_question_secs))
    }
}
