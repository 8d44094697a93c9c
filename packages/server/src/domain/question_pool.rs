//! ローカルの問題プール
//!
//! 外部の生成ソースが使えないときでも Room を必ず開始できるよう、
//! 事前に用意された問題から選びます。プールは構造的に空になりません。

use std::collections::HashSet;

use rand::seq::IndexedRandom;

use super::{Difficulty, Question, ValueObjectError};

#[derive(Debug, Clone)]
pub struct QuestionPool {
    head: Question,
    tail: Vec<Question>,
}

impl QuestionPool {
    pub fn new(questions: Vec<Question>) -> Result<Self, ValueObjectError> {
        let mut questions = questions.into_iter();
        let head = questions.next().ok_or(ValueObjectError::EmptyQuestionPool)?;
        Ok(Self {
            head,
            tail: questions.collect(),
        })
    }

    pub fn len(&self) -> usize {
        1 + self.tail.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    fn iter(&self) -> impl Iterator<Item = &Question> {
        std::iter::once(&self.head).chain(self.tail.iter())
    }

    /// 1 問選ぶ
    ///
    /// 未使用 > 難易度一致 > カテゴリ一致 の優先順で最も条件に合う問題の中から
    /// ランダムに選びます。条件に合う問題がなければ条件を順に緩めます。
    pub fn draw(
        &self,
        difficulty: Difficulty,
        category: Option<&str>,
        used: &HashSet<String>,
    ) -> Question {
        let preference = |q: &Question| {
            (
                !used.contains(q.id()),
                q.difficulty() == difficulty,
                category.is_none_or(|c| q.category() == Some(c)),
            )
        };
        let best = self.iter().map(preference).max();
        let candidates: Vec<&Question> = self
            .iter()
            .filter(|q| Some(preference(*q)) == best)
            .collect();

        let mut rng = rand::rng();
        candidates
            .choose(&mut rng)
            .copied()
            .unwrap_or(&self.head)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::QuestionOption;

    fn question(id: &str, category: &str, difficulty: Difficulty) -> Question {
        let options = (0..4)
            .map(|i| QuestionOption {
                text: format!("{id}-{i}"),
                is_correct: i == 0,
            })
            .collect();
        Question::new(
            id.to_string(),
            format!("text {id}"),
            options,
            Some(category.to_string()),
            difficulty,
        )
        .unwrap()
    }

    fn pool() -> QuestionPool {
        QuestionPool::new(vec![
            question("e-sci", "science", Difficulty::Easy),
            question("m-sci", "science", Difficulty::Medium),
            question("m-his", "history", Difficulty::Medium),
            question("h-geo", "geography", Difficulty::Hard),
        ])
        .unwrap()
    }

    #[test]
    fn test_new_rejects_empty_pool() {
        // テスト項目: 空の問題プールは作れない
        // given (前提条件):

        // when (操作):
        let result = QuestionPool::new(Vec::new());

        // then (期待する結果):
        assert!(matches!(result, Err(ValueObjectError::EmptyQuestionPool)));
    }

    #[test]
    fn test_draw_prefers_difficulty_and_category() {
        // テスト項目: 難易度とカテゴリが一致する問題が選ばれる
        // given (前提条件):
        let pool = pool();

        // when (操作):
        let drawn = pool.draw(Difficulty::Medium, Some("history"), &HashSet::new());

        // then (期待する結果):
        assert_eq!(drawn.id(), "m-his");
    }

    #[test]
    fn test_draw_avoids_used_questions() {
        // テスト項目: 使用済みの問題は他に候補がある限り選ばれない
        // given (前提条件):
        let pool = pool();
        let used: HashSet<String> = ["m-sci".to_string()].into_iter().collect();

        // when (操作):
        let drawn = pool.draw(Difficulty::Medium, Some("science"), &used);

        // then (期待する結果): 難易度一致を優先してカテゴリを緩める
        assert_eq!(drawn.id(), "m-his");
    }

    #[test]
    fn test_draw_relaxes_to_any_question_when_exhausted() {
        // テスト項目: 全問使用済みでもプールから 1 問返す
        // given (前提条件):
        let pool = pool();
        let used: HashSet<String> = ["e-sci", "m-sci", "m-his", "h-geo"]
            .into_iter()
            .map(str::to_string)
            .collect();

        // when (操作):
        let drawn = pool.draw(Difficulty::Hard, None, &used);

        // then (期待する結果):
        assert_eq!(drawn.id(), "h-geo");
        assert_eq!(pool.len(), 4);
    }
}
