//! Deadline & budget controller (C10): derives sub-deadlines from the
//! request's overall deadline and centralizes the read-only caps every
//! other component consults.

use std::time::{Duration, Instant};

use crate::config::Settings;

/// A request-scoped wall-clock budget. Cheap to clone; all instants share
/// the same underlying deadline.
#[derive(Debug, Clone, Copy)]
pub struct Budget {
    deadline: Instant,
}

impl Budget {
    pub fn starting_now(overall: Duration) -> Self {
        Self {
            deadline: Instant::now() + overall,
        }
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self { deadline }
    }

    /// Time left before the overall deadline; zero once elapsed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// A stage's own deadline is `min(stageDefault, remaining(parent))`.
    pub fn sub_deadline(&self, stage_default: Duration) -> Duration {
        std::cmp::min(stage_default, self.remaining())
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

/// Read-only caps threaded through the aggregator, sourced from
/// `Settings` so overrides apply uniformly.
#[derive(Debug, Clone, Copy)]
pub struct Caps {
    pub max_feeds_per_publisher: usize,
    pub max_total_feeds: usize,
    pub max_articles_cap: usize,
    pub max_concurrent_summaries: usize,
    pub min_content_len: usize,
    pub max_input_chars: usize,
}

impl From<&Settings> for Caps {
    fn from(s: &Settings) -> Self {
        Self {
            max_feeds_per_publisher: s.max_feeds_per_publisher,
            max_total_feeds: s.max_total_feeds,
            max_articles_cap: s.max_articles_cap,
            max_concurrent_summaries: s.max_concurrent_summaries,
            min_content_len: s.min_content_len,
            max_input_chars: s.max_input_chars,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_deadline_never_exceeds_remaining() {
        let budget = Budget::starting_now(Duration::from_millis(50));
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(budget.sub_deadline(Duration::from_secs(30)), Duration::ZERO);
    }

    #[test]
    fn sub_deadline_uses_stage_default_when_plenty_remains() {
        let budget = Budget::starting_now(Duration::from_secs(60));
        assert_eq!(
            budget.sub_deadline(Duration::from_secs(10)),
            Duration::from_secs(10)
        );
    }
}
