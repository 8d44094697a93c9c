use serde::{Deserialize, Serialize};

use crate::domain::{error::ValueObjectError, value_object::Difficulty};

/// 1 問あたりの選択肢数
pub const OPTION_COUNT: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub text: String,
    pub is_correct: bool,
}

/// 4 択問題。正解はちょうど 1 つ。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Question {
    id: String,
    text: String,
    options: Vec<QuestionOption>,
    category: Option<String>,
    difficulty: Difficulty,
}

impl Question {
    pub fn new(
        id: String,
        text: String,
        options: Vec<QuestionOption>,
        category: Option<String>,
        difficulty: Difficulty,
    ) -> Result<Self, ValueObjectError> {
        if text.trim().is_empty() {
            return Err(ValueObjectError::QuestionTextEmpty);
        }
        if options.len() != OPTION_COUNT {
            return Err(ValueObjectError::OptionCount {
                expected: OPTION_COUNT,
                actual: options.len(),
            });
        }
        let correct = options.iter().filter(|o| o.is_correct).count();
        if correct != 1 {
            return Err(ValueObjectError::CorrectOptionCount(correct));
        }
        Ok(Self {
            id,
            text,
            options,
            category,
            difficulty,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn options(&self) -> &[QuestionOption] {
        &self.options
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn correct_option(&self) -> usize {
        self.options
            .iter()
            .position(|o| o.is_correct)
            .unwrap_or_default()
    }

    pub fn is_correct(&self, chosen_option: usize) -> bool {
        self.options
            .get(chosen_option)
            .is_some_and(|o| o.is_correct)
    }
}
