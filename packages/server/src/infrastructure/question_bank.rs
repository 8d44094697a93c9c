//! 埋め込みの問題プール
//!
//! バイナリに同梱した JSON から Question Sequencer のフォールバック用プールを作ります。

use thiserror::Error;

use super::dto::question::QuestionDto;
use crate::domain::{QuestionPool, ValueObjectError};

const DEFAULT_POOL: &str = include_str!("../../assets/question_pool.json");

#[derive(Debug, Error)]
pub enum QuestionBankError {
    #[error("question pool is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("question #{index} is invalid: {source}")]
    Invalid {
        index: usize,
        source: ValueObjectError,
    },
    #[error("question pool is empty")]
    Empty,
}

/// 同梱の問題プールを読み込む
pub fn load_default_pool() -> Result<QuestionPool, QuestionBankError> {
    parse_pool(DEFAULT_POOL)
}

/// JSON 配列から問題プールを作る。1 問でも不正ならエラー。
pub fn parse_pool(json: &str) -> Result<QuestionPool, QuestionBankError> {
    let dtos: Vec<QuestionDto> = serde_json::from_str(json)?;
    let questions = dtos
        .into_iter()
        .enumerate()
        .map(|(index, dto)| {
            dto.into_question(format!("pool-{index}"))
                .map_err(|source| QuestionBankError::Invalid { index, source })
        })
        .collect::<Result<Vec<_>, _>>()?;
    QuestionPool::new(questions).map_err(|_| QuestionBankError::Empty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pool_covers_every_difficulty() {
        // テスト項目: 同梱プールが読み込めて、すべての難易度を含む
        // given (前提条件):

        // when (操作):
        let pool = load_default_pool().unwrap();

        // then (期待する結果):
        assert!(pool.len() >= 20);
        for difficulty in ["easy", "medium", "hard"] {
            assert!(DEFAULT_POOL.contains(&format!("\"difficulty\": \"{difficulty}\"")));
        }
    }

    #[test]
    fn test_empty_pool_is_rejected() {
        // テスト項目: 空のプールはエラー
        // given (前提条件):
        let json = "[]";

        // when (操作):
        let result = parse_pool(json);

        // then (期待する結果):
        assert!(matches!(result, Err(QuestionBankError::Empty)));
    }

    #[test]
    fn test_invalid_question_reports_its_index() {
        // テスト項目: 不正な問題は何番目かを含むエラーになる
        // given (前提条件):
        let json = r#"[
            {"text": "ok", "options": ["a", "b", "c", "d"], "answer": 0, "difficulty": "easy"},
            {"text": "bad", "options": ["a", "b"], "answer": 0, "difficulty": "easy"}
        ]"#;

        // when (操作):
        let result = parse_pool(json);

        // then (期待する結果):
        assert!(matches!(
            result,
            Err(QuestionBankError::Invalid { index: 1, .. })
        ));
    }
}
