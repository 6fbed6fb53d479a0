use std::sync::Mutex;
use std::time::Duration;

/// Abstraction over blind waits so tests can run without sleeping.
#[async_trait::async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, duration: Duration);
}

#[derive(Debug, Clone, Default)]
pub struct TokioPacer;

#[async_trait::async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Returns immediately and remembers every wait it was asked for.
#[derive(Debug, Default)]
pub struct RecordingPacer {
    pauses: Mutex<Vec<Duration>>,
}

impl RecordingPacer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    pub fn total(&self) -> Duration {
        self.pauses().into_iter().sum()
    }
}

#[async_trait::async_trait]
impl Pacer for RecordingPacer {
    async fn pause(&self, duration: Duration) {
        if let Ok(mut pauses) = self.pauses.lock() {
            pauses.push(duration);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_pacer_records_without_sleeping() {
        let pacer = RecordingPacer::new();
        pacer.pause(Duration::from_secs(3600)).await;
        pacer.pause(Duration::from_millis(500)).await;

        assert_eq!(
            pacer.pauses(),
            vec![Duration::from_secs(3600), Duration::from_millis(500)]
        );
        assert_eq!(pacer.total(), Duration::from_millis(3_600_500));
    }
}
