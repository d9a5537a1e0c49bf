use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Materialisation state of a dataset, always derived from the shards present remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetState {
    /// No shard present (container absent or empty).
    None,
    Partial { present: usize, expected: usize },
    Complete,
}

impl DatasetState {
    /// Complete only on an exact match: unexpected extra objects keep the dataset partial.
    pub fn from_counts(present: usize, expected: usize) -> DatasetState {
        if present == 0 {
            DatasetState::None
        } else if expected > 0 && present == expected {
            DatasetState::Complete
        } else {
            DatasetState::Partial { present, expected }
        }
    }

    pub fn is_complete(&self) -> bool {
        *self == DatasetState::Complete
    }
}

impl fmt::Display for DatasetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetState::None => write!(f, "none"),
            DatasetState::Partial { present, expected } => write!(f, "partial ({}/{})", present, expected),
            DatasetState::Complete => write!(f, "complete"),
        }
    }
}

/// How `wait_until_settled` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// No pending or running job remains. Says nothing about success.
    Settled,
    TimedOut,
    Cancelled,
}

/// Polling policy of `wait_until_settled`.
#[derive(Debug, Clone)]
pub struct WaitOptions {
    pub poll_interval: Duration,

    /// `None` waits for as long as the remote platform keeps jobs active.
    pub max_wait: Option<Duration>,

    /// Checked while sleeping between two polls.
    pub cancel: Option<CancellationToken>,
}

impl Default for WaitOptions {
    fn default() -> Self {
        WaitOptions { poll_interval: Duration::from_secs(10), max_wait: None, cancel: None }
    }
}

impl WaitOptions {
    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        WaitOptions { poll_interval, ..Default::default() }
    }

    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }

    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_follows_counts() {
        assert_eq!(DatasetState::from_counts(0, 3), DatasetState::None);
        assert_eq!(DatasetState::from_counts(2, 3), DatasetState::Partial { present: 2, expected: 3 });
        assert_eq!(DatasetState::from_counts(3, 3), DatasetState::Complete);
        assert_eq!(DatasetState::from_counts(1, 0), DatasetState::Partial { present: 1, expected: 0 });
        assert_eq!(DatasetState::from_counts(4, 3), DatasetState::Partial { present: 4, expected: 3 });
    }

    #[test]
    fn display_matches_dashboard_wording() {
        assert_eq!(DatasetState::Partial { present: 2, expected: 5 }.to_string(), "partial (2/5)");
        assert_eq!(DatasetState::Complete.to_string(), "complete");
        assert_eq!(DatasetState::None.to_string(), "none");
    }
}
