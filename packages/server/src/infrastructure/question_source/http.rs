//! HTTP を使った QuestionGenerator 実装
//!
//! 設定されたエンドポイントに `{difficulty, category}` を POST し、
//! 1 問ぶんの JSON を受け取ります。通信・ステータス・デコードのどの失敗も
//! `GenerationUnavailable` として扱い、Question Sequencer にフォールバックを任せます。

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    domain::{Difficulty, GenerationError, Question, QuestionGenerator},
    infrastructure::dto::question::{GenerateQuestionRequest, QuestionDto},
};

pub struct HttpQuestionGenerator {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpQuestionGenerator {
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }
}

fn unavailable(e: impl std::fmt::Display) -> GenerationError {
    GenerationError::GenerationUnavailable(e.to_string())
}

#[async_trait]
impl QuestionGenerator for HttpQuestionGenerator {
    async fn generate(
        &self,
        difficulty: Difficulty,
        category: Option<String>,
    ) -> Result<Question, GenerationError> {
        let request = GenerateQuestionRequest {
            difficulty: difficulty.as_str().to_string(),
            category,
        };
        let dto: QuestionDto = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(unavailable)?
            .json()
            .await
            .map_err(unavailable)?;

        let question = dto
            .into_question(format!("gen-{}", Uuid::new_v4().simple()))
            .map_err(unavailable)?;
        tracing::debug!("Generated question {}", question.id());
        Ok(question)
    }
}
