//! Process-wide "credential rejected" signal.
//!
//! The request layer raises it; the session authority consumes it. Each raise
//! bumps a counter on a `watch` channel and records which credential the
//! server refused, so a raise is never lost and a late rejection of a replaced
//! credential can be told apart from one aimed at the current session.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::watch;

/// Raises remembered individually; anything older reads as "credential unknown".
const RECENT_RAISES: usize = 64;

#[derive(Debug, Default)]
pub(crate) struct RaiseLog {
    raised: u64,
    /// Rejected credential of each of the last raises, oldest first.
    recent: VecDeque<Option<String>>,
}

#[derive(Clone)]
pub struct UnauthorizedSignal {
    log: Arc<watch::Sender<RaiseLog>>,
}

impl UnauthorizedSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(RaiseLog::default());
        Self { log: Arc::new(tx) }
    }

    /// Report a rejection without knowing which credential was sent.
    /// Clears whatever session is current.
    pub fn raise(&self) {
        self.push(None);
    }

    /// Report that the server refused `credential`.
    pub fn raise_for(&self, credential: &str) {
        self.push(Some(credential.to_string()));
    }

    fn push(&self, rejected: Option<String>) {
        self.log.send_modify(|log| {
            log.raised += 1;
            log.recent.push_back(rejected);
            if log.recent.len() > RECENT_RAISES {
                log.recent.pop_front();
            }
        });
        tracing::debug!("unauthorized signal raised");
    }

    /// Total raises so far.
    pub fn raised(&self) -> u64 {
        self.log.borrow().raised
    }

    /// Raise count plus the credentials rejected after the first `seen` raises.
    /// `None` stands for an unknown credential.
    pub(crate) fn since(&self, seen: u64) -> (u64, Vec<Option<String>>) {
        let log = self.log.borrow();
        let first_kept = log.raised - log.recent.len() as u64;

        let mut rejected = Vec::new();
        if seen < first_kept {
            rejected.push(None);
        }
        let skip = usize::try_from(seen.saturating_sub(first_kept)).unwrap_or(usize::MAX);
        rejected.extend(log.recent.iter().skip(skip).cloned());
        (log.raised, rejected)
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<RaiseLog> {
        self.log.subscribe()
    }
}

impl Default for UnauthorizedSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for UnauthorizedSignal {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UnauthorizedSignal")
            .field("raised", &self.raised())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raises_accumulate() {
        let signal = UnauthorizedSignal::new();
        let clone = signal.clone();
        signal.raise();
        clone.raise_for("tok");
        assert_eq!(signal.raised(), 2);
    }

    #[test]
    fn since_lists_rejections_after_the_seen_count() {
        let signal = UnauthorizedSignal::new();
        signal.raise_for("old");
        signal.raise();
        signal.raise_for("new");

        assert_eq!(
            signal.since(0),
            (3, vec![Some("old".to_string()), None, Some("new".to_string())])
        );
        assert_eq!(signal.since(2), (3, vec![Some("new".to_string())]));
        assert_eq!(signal.since(3), (3, vec![]));
    }

    #[test]
    fn forgotten_raises_read_as_unknown() {
        let signal = UnauthorizedSignal::new();
        for _ in 0..RECENT_RAISES + 5 {
            signal.raise_for("old");
        }

        let (raised, rejected) = signal.since(0);
        assert_eq!(raised, (RECENT_RAISES + 5) as u64);
        assert_eq!(rejected.len(), RECENT_RAISES + 1);
        assert_eq!(rejected[0], None);
    }

    #[tokio::test]
    async fn subscriber_wakes_on_raise() {
        let signal = UnauthorizedSignal::new();
        let mut rx = signal.subscribe();
        signal.raise_for("tok");
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().raised, 1);
    }
}
