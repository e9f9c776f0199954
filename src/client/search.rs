//! Cancellable search attempts
//!
//! Each outstanding find-opponent request owns one [`SearchAttempt`]. A new
//! request from the same client cancels the previous attempt; the matchmaker
//! polls the attempt at each of its checkpoints.

use crate::types::ClientId;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

/// Cancellation handle for one in-flight find-opponent request
#[derive(Debug, Clone)]
pub struct SearchAttempt {
    client_id: ClientId,
    sequence: u64,
    started_at: DateTime<Utc>,
    token: CancellationToken,
}

impl SearchAttempt {
    pub(crate) fn new(client_id: ClientId, sequence: u64) -> Self {
        Self {
            client_id,
            sequence,
            started_at: crate::utils::current_timestamp(),
            token: CancellationToken::new(),
        }
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    /// Per-client sequence number, increasing with every new attempt
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the attempt is cancelled
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    pub(crate) fn is_same_attempt(&self, other: &SearchAttempt) -> bool {
        self.client_id == other.client_id && self.sequence == other.sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::generate_client_id;

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let attempt = SearchAttempt::new(generate_client_id(), 1);
        let observer = attempt.clone();

        assert!(!observer.is_cancelled());
        attempt.cancel();
        assert!(observer.is_cancelled());

        // Idempotent
        attempt.cancel();
        assert!(observer.is_cancelled());
    }

    #[test]
    fn test_attempt_identity() {
        let client_id = generate_client_id();
        let first = SearchAttempt::new(client_id, 1);
        let second = SearchAttempt::new(client_id, 2);

        assert!(first.is_same_attempt(&first.clone()));
        assert!(!first.is_same_attempt(&second));
    }

    #[tokio::test]
    async fn test_cancelled_future_resolves() {
        let attempt = SearchAttempt::new(generate_client_id(), 1);
        let waiter = attempt.clone();

        let handle = tokio::spawn(async move { waiter.cancelled().await });
        attempt.cancel();
        handle.await.unwrap();
    }
}
