use chrono::Utc;
use moka::future::Cache;
use sha2::{Digest, Sha256};
use std::future::Future;
use std::time::Duration;

/// Runs a form submission with a minimum perceived duration.
///
/// The real work and the timer run concurrently, so a slow provider call is
/// never delayed further and a fast one still shows the "sending" state for
/// at least `min_duration`.
#[derive(Debug, Clone, Copy)]
pub struct SubmissionPipeline {
    min_duration: Duration,
}

impl SubmissionPipeline {
    pub fn new(min_duration: Duration) -> Self {
        Self { min_duration }
    }

    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }

    pub fn min_duration(&self) -> Duration {
        self.min_duration
    }

    pub async fn run<F, T>(&self, work: F) -> T
    where
        F: Future<Output = T>,
    {
        let (output, _) = tokio::join!(work, tokio::time::sleep(self.min_duration));
        output
    }
}

/// Stable, non-reversible key for a lead's contact details.
///
/// Email is lower-cased and only the digits of the phone are used, so
/// `(11) 99999-9999` and `11999999999` fingerprint the same.
pub fn lead_fingerprint(email: &str, phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    let mut hasher = Sha256::new();
    hasher.update(email.trim().to_lowercase().as_bytes());
    hasher.update(b"|");
    hasher.update(digits.as_bytes());
    hex::encode(hasher.finalize())
}

/// Rejects a submission while an identical one is still outstanding.
///
/// Entries expire after `ttl` so a request that never completes cannot block
/// the same lead forever.
#[derive(Clone)]
pub struct SubmissionGuard {
    in_flight: Cache<String, i64>,
}

impl SubmissionGuard {
    pub fn new(ttl: Duration) -> Self {
        Self {
            in_flight: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(10_000)
                .build(),
        }
    }

    /// Marks `key` as in flight. Returns `None` if it already was.
    pub async fn try_acquire(&self, key: &str) -> Option<InFlightLease> {
        let entry = self
            .in_flight
            .entry(key.to_string())
            .or_insert_with(async { Utc::now().timestamp_millis() })
            .await;

        entry.is_fresh().then(|| InFlightLease {
            in_flight: self.in_flight.clone(),
            key: Some(key.to_string()),
        })
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.in_flight.contains_key(key)
    }
}

/// Ownership of one in-flight key.
///
/// Call [`InFlightLease::release`] when the submission completes. If the
/// lease is dropped instead (the request future was cancelled), the key is
/// released from a background task.
pub struct InFlightLease {
    in_flight: Cache<String, i64>,
    key: Option<String>,
}

impl InFlightLease {
    pub async fn release(mut self) {
        if let Some(key) = self.key.take() {
            self.in_flight.invalidate(&key).await;
        }
    }
}

impl Drop for InFlightLease {
    fn drop(&mut self) {
        let Some(key) = self.key.take() else {
            return;
        };

        let in_flight = self.in_flight.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    in_flight.invalidate(&key).await;
                });
            }
            Err(_) => tracing::warn!("No async runtime; in-flight key left to expire"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_pipeline_waits_for_minimum_duration() {
        let pipeline = SubmissionPipeline::from_millis(80);
        let started = Instant::now();

        let value = pipeline.run(async { 42 }).await;

        assert_eq!(value, 42);
        assert!(started.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn test_pipeline_overlaps_work_and_timer() {
        let pipeline = SubmissionPipeline::from_millis(100);
        let started = Instant::now();

        pipeline
            .run(tokio::time::sleep(Duration::from_millis(100)))
            .await;

        // Sequential execution would take at least 200ms.
        assert!(started.elapsed() < Duration::from_millis(190));
    }

    #[test]
    fn test_fingerprint_normalizes_contact() {
        assert_eq!(
            lead_fingerprint("Ana@X.com ", "(11) 99999-9999"),
            lead_fingerprint("ana@x.com", "11999999999")
        );
        assert_ne!(
            lead_fingerprint("ana@x.com", "11999999999"),
            lead_fingerprint("ana@x.com", "11999999998")
        );
        assert_eq!(lead_fingerprint("a@b.c", "1").len(), 64);
    }

    #[tokio::test]
    async fn test_guard_blocks_until_released() {
        let guard = SubmissionGuard::new(Duration::from_secs(60));

        let lease = guard.try_acquire("lead").await.unwrap();
        assert!(guard.try_acquire("lead").await.is_none());
        assert!(guard.try_acquire("other").await.is_some());

        lease.release().await;
        assert!(!guard.is_in_flight("lead"));
        assert!(guard.try_acquire("lead").await.is_some());
    }

    #[tokio::test]
    async fn test_dropped_lease_releases_key() {
        let guard = SubmissionGuard::new(Duration::from_secs(60));

        let lease = guard.try_acquire("lead").await.unwrap();
        drop(lease);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(!guard.is_in_flight("lead"));
        assert!(guard.try_acquire("lead").await.is_some());
    }

    #[tokio::test]
    async fn test_cancelled_work_releases_key() {
        let guard = SubmissionGuard::new(Duration::from_secs(60));

        let work = {
            let guard = guard.clone();
            async move {
                let lease = guard.try_acquire("lead").await.unwrap();
                tokio::time::sleep(Duration::from_secs(5)).await;
                lease.release().await;
            }
        };
        assert!(tokio::time::timeout(Duration::from_millis(20), work)
            .await
            .is_err());
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(guard.try_acquire("lead").await.is_some());
    }
}
