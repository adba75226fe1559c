use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use kit::services::HubProbe;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use super::form::validate_hub_url;

/// Runs only the last scheduled job, once `delay` elapsed without a newer one.
/// Must be used from within a tokio runtime.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, generation: 0, task: None }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Generation of the most recently scheduled job.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Supersedes any pending job. `job` receives the generation it was scheduled under.
    pub fn schedule<F, Fut>(&mut self, job: F) -> u64
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.generation += 1;
        let delay = self.delay;
        let fut = job(self.generation);
        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            fut.await;
        }));
        self.generation
    }

    /// Aborts the pending job, if any. Results it may still deliver are stale.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubUrlStatus {
    Idle,
    Pending,
    Valid,
    Invalid(String),
}

/// Custom storage endpoint input, probed once the user stops typing.
#[derive(Debug)]
pub struct HubUrlField {
    probe: Arc<dyn HubProbe>,
    debouncer: Debouncer,
    value: String,
    status: HubUrlStatus,
    results_tx: UnboundedSender<(u64, bool)>,
    results_rx: UnboundedReceiver<(u64, bool)>,
}

impl HubUrlField {
    pub fn new(probe: Arc<dyn HubProbe>, delay: Duration) -> Self {
        let (results_tx, results_rx) = unbounded_channel();
        Self {
            probe,
            debouncer: Debouncer::new(delay),
            value: String::new(),
            status: HubUrlStatus::Idle,
            results_tx,
            results_rx,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn status(&self) -> &HubUrlStatus {
        &self.status
    }

    pub fn is_valid(&self) -> bool {
        self.status == HubUrlStatus::Valid
    }

    pub fn on_input(&mut self, url: &str) {
        self.value = url.trim().to_string();
        if self.value.is_empty() {
            self.debouncer.cancel();
            self.status = HubUrlStatus::Idle;
            return;
        }
        if let Err(message) = validate_hub_url(&self.value) {
            self.debouncer.cancel();
            self.status = HubUrlStatus::Invalid(message);
            return;
        }

        self.status = HubUrlStatus::Pending;
        let probe = self.probe.clone();
        let results_tx = self.results_tx.clone();
        let url = self.value.clone();
        self.debouncer.schedule(move |generation| async move {
            let reachable = probe.probe(&url).await;
            let _ = results_tx.send((generation, reachable));
        });
    }

    /// Applies probe results already delivered, without waiting.
    pub fn poll(&mut self) -> &HubUrlStatus {
        while let Ok((generation, reachable)) = self.results_rx.try_recv() {
            self.apply(generation, reachable);
        }
        &self.status
    }

    /// Waits until the probe for the latest input has reported.
    pub async fn settle(&mut self) -> &HubUrlStatus {
        while self.status == HubUrlStatus::Pending {
            match self.results_rx.recv().await {
                Some((generation, reachable)) => self.apply(generation, reachable),
                None => break,
            }
        }
        &self.status
    }

    fn apply(&mut self, generation: u64, reachable: bool) {
        if generation != self.debouncer.generation() || self.status != HubUrlStatus::Pending {
            return;
        }
        self.status = if reachable {
            HubUrlStatus::Valid
        } else {
            HubUrlStatus::Invalid("Unable to reach a Gaia hub at this address".to_string())
        };
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use stacks_wallet_test_utils::mocks::MockHubProbe;
    use tokio::time::advance;

    use super::*;

    const DELAY: Duration = Duration::from_millis(200);

    #[tokio::test(start_paused = true)]
    async fn debouncer_runs_only_the_last_job() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut debouncer = Debouncer::new(DELAY);
        for _ in 0..5 {
            let runs = runs.clone();
            debouncer.schedule(move |_| async move {
                runs.fetch_add(1, Ordering::SeqCst);
            });
            advance(Duration::from_millis(50)).await;
        }
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        tokio::time::sleep(DELAY).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(debouncer.generation(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_edits_probe_once_with_the_last_value() {
        let probe = Arc::new(MockHubProbe::reachable(&["https://hub.mine.com"]));
        let mut field = HubUrlField::new(probe.clone(), DELAY);

        for url in ["https://h", "https://hub.m", "https://hub.mine", "https://hub.mine.com"] {
            field.on_input(url);
            advance(Duration::from_millis(20)).await;
        }
        assert_eq!(field.status(), &HubUrlStatus::Pending);
        assert_eq!(field.settle().await, &HubUrlStatus::Valid);
        assert_eq!(probe.probed_urls(), vec!["https://hub.mine.com".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_results_are_dropped() {
        let probe = Arc::new(MockHubProbe::reachable(&["https://good.hub"]));
        let mut field = HubUrlField::new(probe.clone(), DELAY);

        field.on_input("https://good.hub");
        tokio::time::sleep(DELAY * 2).await;
        field.on_input("https://bad.hub");
        assert_eq!(field.poll(), &HubUrlStatus::Pending);
        assert!(matches!(field.settle().await, HubUrlStatus::Invalid(_)));
        assert_eq!(probe.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_or_empty_input_skips_the_probe() {
        let probe = Arc::new(MockHubProbe::reachable(&[]));
        let mut field = HubUrlField::new(probe.clone(), DELAY);

        field.on_input("ftp://hub");
        assert!(matches!(field.status(), HubUrlStatus::Invalid(_)));
        field.on_input("   ");
        assert_eq!(field.settle().await, &HubUrlStatus::Idle);
        advance(DELAY * 2).await;
        assert_eq!(probe.call_count(), 0);
    }
}
