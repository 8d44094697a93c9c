//! Question Sequencer
//!
//! Room の設定から出題列を確定させます。確定した出題列は Room の生存期間中
//! 変わらず、全メンバーが同じ問題を同じ順序で受け取ります。

use std::{
    collections::{BTreeSet, HashSet},
    sync::Arc,
    time::Duration,
};

use rand::seq::IteratorRandom;
use tokio::time::{Instant, timeout_at};

use crate::domain::{Question, QuestionGenerator, QuestionPool, RoomSettings};

/// 1 回の出題列確定で生成ソースに費やしてよい時間の既定値
pub const DEFAULT_GENERATION_BUDGET: Duration = Duration::from_secs(5);

pub struct QuestionSequencer {
    /// 外部の問題生成ソース（任意）
    generator: Option<Arc<dyn QuestionGenerator>>,
    /// フォールバック用のローカルプール
    pool: Arc<QuestionPool>,
    /// 生成ソース呼び出し全体の締め切り。超えた分はプールから選ぶ
    generation_budget: Duration,
}

impl QuestionSequencer {
    pub fn new(pool: Arc<QuestionPool>) -> Self {
        Self {
            generator: None,
            pool,
            generation_budget: DEFAULT_GENERATION_BUDGET,
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn QuestionGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_generation_budget(mut self, budget: Duration) -> Self {
        self.generation_budget = budget;
        self
    }

    /// `settings.question_count` 問ちょうどの出題列を作る
    ///
    /// 生成ソースが一度 `GenerationUnavailable` を返すか、`generation_budget` を使い切ったら、
    /// 残りはローカルプールから選びます。Room のアクターはこの間ほかのコマンドを処理しないため、
    /// 所要時間は締め切りで頭打ちになります。
    pub async fn materialize(&self, settings: &RoomSettings) -> Vec<Question> {
        let count = settings.question_count as usize;
        let mut questions = Vec::with_capacity(count);
        let mut used = HashSet::new();
        let mut generator = self.generator.as_ref();
        let deadline = Instant::now() + self.generation_budget;

        for index in 0..count {
            let category = pick_category(&settings.categories);

            let generated = match generator {
                Some(source) => {
                    let request = source.generate(settings.difficulty, category.clone());
                    match timeout_at(deadline, request).await {
                        Ok(Ok(question)) => Some(question),
                        Ok(Err(e)) => {
                            tracing::warn!(
                                "Question {} falls back to the local pool: {}",
                                index,
                                e
                            );
                            generator = None;
                            None
                        }
                        Err(_) => {
                            tracing::warn!(
                                "Generation budget of {:?} spent; questions {}.. come from the local pool",
                                self.generation_budget,
                                index
                            );
                            generator = None;
                            None
                        }
                    }
                }
                None => None,
            };

            let question = generated.unwrap_or_else(|| {
                self.pool
                    .draw(settings.difficulty, category.as_deref(), &used)
            });
            used.insert(question.id().to_string());
            questions.push(question);
        }

        tracing::debug!(
            "Materialized {} questions ({} difficulty)",
            questions.len(),
            settings.difficulty.as_str()
        );
        questions
    }
}

/// カテゴリが複数あれば一様に選ぶ。空なら生成ソース任せ（`None`）。
fn pick_category(categories: &BTreeSet<String>) -> Option<String> {
    categories.iter().choose(&mut rand::rng()).cloned()
}
