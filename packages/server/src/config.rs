//! Coordinator configuration.

use std::time::Duration;

use crate::domain::SettingsLimits;

/// Tunables of the quiz session coordinator.
///
/// The binary maps its command-line arguments into this struct; tests build it
/// directly with struct-update syntax over [`CoordinatorConfig::default`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Maximum number of members in a room, host included
    pub max_members: usize,
    /// Connected non-host members required before the host can start
    pub min_players: usize,
    /// Pause between a question's results and the next question
    pub reveal_pause: Duration,
    /// A waiting room with no activity for this long is torn down
    pub idle_timeout: Duration,
    /// How long a finished room keeps answering `SessionClosed` before it is forgotten
    pub finished_room_grace: Duration,
    /// Attempts per result record before the failure is reported to the operator
    pub persist_max_attempts: u32,
    /// Base delay between persistence attempts (multiplied by the attempt number)
    pub persist_retry_backoff: Duration,
    pub max_question_count: u32,
    pub max_time_per_question_secs: u32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_members: 8,
            min_players: 1,
            reveal_pause: Duration::from_secs(3),
            idle_timeout: Duration::from_secs(10 * 60),
            finished_room_grace: Duration::from_secs(60),
            persist_max_attempts: 3,
            persist_retry_backoff: Duration::from_millis(500),
            max_question_count: 50,
            max_time_per_question_secs: 120,
        }
    }
}

impl CoordinatorConfig {
    pub fn settings_limits(&self) -> SettingsLimits {
        SettingsLimits {
            max_question_count: self.max_question_count,
            max_time_per_question_secs: self.max_time_per_question_secs,
        }
    }
}
