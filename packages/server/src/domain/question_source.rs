//! 外部の問題生成ソース
//!
//! Question Sequencer はこれを「使えれば使う」能力として扱い、失敗時は
//! ローカルの問題プールにフォールバックします。

use async_trait::async_trait;

use super::{Difficulty, GenerationError, Question};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    /// 指定の難易度・カテゴリで 1 問生成する。`category` が `None` ならソース任せ。
    async fn generate(
        &self,
        difficulty: Difficulty,
        category: Option<String>,
    ) -> Result<Question, GenerationError>;
}
