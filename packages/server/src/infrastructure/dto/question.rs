//! Question payload DTOs.
//!
//! The embedded question pool and the external generation service share this shape.

use serde::{Deserialize, Serialize};

use crate::domain::{Question, QuestionOption, ValueObjectError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDto {
    #[serde(default)]
    pub id: Option<String>,
    pub text: String,
    pub options: Vec<String>,
    /// Index of the correct option
    pub answer: usize,
    #[serde(default)]
    pub category: Option<String>,
    pub difficulty: String,
}

/// Body of a generation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQuestionRequest {
    pub difficulty: String,
    pub category: Option<String>,
}

impl QuestionDto {
    /// Convert into a domain question, using `fallback_id` when the payload has none.
    pub fn into_question(self, fallback_id: String) -> Result<Question, ValueObjectError> {
        let difficulty = self.difficulty.parse()?;
        if self.answer >= self.options.len() {
            return Err(ValueObjectError::CorrectOptionCount(0));
        }
        let options = self
            .options
            .into_iter()
            .enumerate()
            .map(|(i, text)| QuestionOption {
                text,
                is_correct: i == self.answer,
            })
            .collect();
        let category = self
            .category
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty());
        Question::new(
            self.id.unwrap_or(fallback_id),
            self.text,
            options,
            category,
            difficulty,
        )
    }
}
