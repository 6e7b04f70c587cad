//! Reconciler implementation.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Local, Utc};
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use crate::broadcaster::BroadcasterName;
use crate::dispatcher::{CompletionQueue, Dispatcher, JobFactory};
use crate::metrics;
use crate::prober::{LiveSet, LivenessProber, ProbeError, ProbeStatus};
use crate::whitelist::{merge, HistoryLog, Whitelist, WhitelistStore};

use super::config::ReconcilerConfig;
use super::types::{CycleReport, ReconcilerStatus};

/// Enabled, live broadcasters that have no job in flight.
pub fn compute_to_start(
    whitelist: &Whitelist,
    live: &LiveSet,
    recording: &BTreeSet<BroadcasterName>,
) -> BTreeSet<BroadcasterName> {
    live.names()
        .filter(|name| whitelist.is_enabled(name) && !recording.contains(*name))
        .cloned()
        .collect()
}

/// Drives the poll loop. Sole owner of the live set, the cached whitelist
/// and the recording set.
pub struct Reconciler {
    config: ReconcilerConfig,
    prober: Arc<dyn LivenessProber>,
    whitelist_store: Arc<dyn WhitelistStore>,
    history: Arc<dyn HistoryLog>,
    dispatcher: Dispatcher,
    factory: Arc<dyn JobFactory>,
    completions: CompletionQueue,

    // Runtime state
    whitelist: Whitelist,
    live: LiveSet,
    recording: BTreeSet<BroadcasterName>,
    cycles: u64,
    status_tx: watch::Sender<ReconcilerStatus>,
}

impl Reconciler {
    /// Create a reconciler. Completions are read from `dispatcher`'s queue.
    pub fn new(
        config: ReconcilerConfig,
        prober: Arc<dyn LivenessProber>,
        whitelist_store: Arc<dyn WhitelistStore>,
        history: Arc<dyn HistoryLog>,
        dispatcher: Dispatcher,
        factory: Arc<dyn JobFactory>,
    ) -> Self {
        let completions = dispatcher.completions();
        let (status_tx, _) = watch::channel(ReconcilerStatus {
            pool: dispatcher.status(),
            ..Default::default()
        });

        Self {
            config,
            prober,
            whitelist_store,
            history,
            dispatcher,
            factory,
            completions,
            whitelist: Whitelist::new(),
            live: LiveSet::default(),
            recording: BTreeSet::new(),
            cycles: 0,
            status_tx,
        }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Receiver for the status published after every cycle.
    pub fn subscribe(&self) -> watch::Receiver<ReconcilerStatus> {
        self.status_tx.subscribe()
    }

    /// Handle to the queue the dispatcher pushes completions into.
    pub fn completions(&self) -> CompletionQueue {
        self.completions.clone()
    }

    pub fn recording(&self) -> &BTreeSet<BroadcasterName> {
        &self.recording
    }

    pub fn live(&self) -> &LiveSet {
        &self.live
    }

    pub fn whitelist(&self) -> &Whitelist {
        &self.whitelist
    }

    /// Run cycles until a shutdown signal arrives. The signal is only
    /// observed between cycles; jobs in flight are not cancelled.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            category_id = %self.config.category_id,
            language = %self.config.language,
            poll_delay_secs = self.config.poll_delay.as_secs(),
            "Reconciler started"
        );
        self.status_tx.send_modify(|s| s.running = true);

        loop {
            let report = self.run_cycle().await;
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Reconciler received shutdown signal");
                    break;
                }
                _ = tokio::time::sleep(report.next_delay) => {}
            }
        }

        self.dispatcher.close();
        self.status_tx.send_modify(|s| s.running = false);
        info!(
            cycles = self.cycles,
            recording = self.recording.len(),
            "Reconciler stopped"
        );
    }

    /// Run one poll cycle.
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.cycles += 1;

        // 1. Who is live. A failed listing keeps the previous live set.
        let result = self.poll_live().await;
        let usable = matches!(result, ProbeStatus::Online | ProbeStatus::Offline);

        // 2. Whitelist merge.
        if usable {
            self.refresh_whitelist();
        }

        // 3. Completions land before the dispatch decision.
        let drained = self.drain_completions();

        // 4-5. Dispatch.
        let started = if usable {
            self.dispatch_new()
        } else {
            Vec::new()
        };

        let next_delay = if result == ProbeStatus::Error {
            warn!(
                cooldown_secs = self.config.error_cooldown.as_secs(),
                "Live listing failed, cooling down"
            );
            self.config.error_cooldown
        } else {
            self.config.poll_delay
        };

        self.record_metrics(result);
        self.publish_status(result);

        info!(
            cycle = self.cycles,
            result = result.as_str(),
            live = self.live.len(),
            recording = self.recording.len(),
            started = started.len(),
            "Poll cycle finished"
        );

        CycleReport {
            cycle: self.cycles,
            result,
            live: self.live.len(),
            drained,
            started,
            next_delay,
        }
    }

    async fn poll_live(&mut self) -> ProbeStatus {
        match self
            .prober
            .list_live(&self.config.category_id, &self.config.language)
            .await
        {
            Ok(live) => {
                debug!(
                    names = ?live.names().map(|n| n.as_str()).collect::<Vec<_>>(),
                    viewers = ?live.viewer_counts(),
                    "Live broadcasters"
                );
                self.live = live;
                ProbeStatus::Online
            }
            Err(ProbeError::Offline) => {
                debug!("Nobody live in the watched category");
                self.live = LiveSet::default();
                ProbeStatus::Offline
            }
            Err(ProbeError::Unauthorized) => {
                warn!("Live listing unauthorized, refreshing credentials");
                if let Err(e) = self.prober.refresh_credentials().await {
                    error!("Credential refresh failed: {}", e);
                }
                ProbeStatus::Unauthorized
            }
            Err(e) => {
                error!(status = e.status().as_str(), "Live listing failed: {}", e);
                e.status()
            }
        }
    }

    /// Reload the stored whitelist (it may have been edited by hand), merge
    /// the live names into it and save it back.
    fn refresh_whitelist(&mut self) {
        let previous = match self.whitelist_store.load() {
            Ok(whitelist) => whitelist,
            Err(e) => {
                warn!("Could not load whitelist, using cached copy: {}", e);
                self.whitelist.clone()
            }
        };

        let merged = merge(self.live.names(), &previous);
        let added = merged.len() - previous.len();
        if let Err(e) = self.whitelist_store.save(&merged) {
            error!("Could not save whitelist: {}", e);
        } else if added > 0 {
            info!(added, total = merged.len(), "New broadcasters added to whitelist");
        }
        self.whitelist = merged;
    }

    /// Retire every finished job: log it to history and free its slot in
    /// the recording set.
    pub fn drain_completions(&mut self) -> Vec<BroadcasterName> {
        let mut drained = Vec::new();
        for completion in self.completions.drain() {
            let name = completion.broadcaster;
            if let Err(e) = self.history.append(&name, Local::now()) {
                warn!(broadcaster = %name, "Could not append to history: {}", e);
            }
            if !self.recording.remove(&name) {
                warn!(broadcaster = %name, "Completion for a broadcaster that was not recording");
            }
            info!(
                broadcaster = %name,
                job_id = %completion.job_id,
                outcome = completion.outcome.label(),
                "Capture job retired"
            );
            drained.push(name);
        }
        drained
    }

    fn dispatch_new(&mut self) -> Vec<BroadcasterName> {
        let to_start = compute_to_start(&self.whitelist, &self.live, &self.recording);
        let mut started = Vec::with_capacity(to_start.len());

        for name in to_start {
            let job = self.factory.create(name.clone());
            let job_id = job.id();
            match self.dispatcher.submit(job) {
                Ok(()) => {
                    info!(broadcaster = %name, job_id = %job_id, "Capture job dispatched");
                    self.recording.insert(name.clone());
                    started.push(name);
                }
                Err(e) => {
                    error!(broadcaster = %name, "Could not dispatch capture job: {}", e);
                }
            }
        }
        started
    }

    fn record_metrics(&self, result: ProbeStatus) {
        metrics::POLL_CYCLES
            .with_label_values(&[result.as_str()])
            .inc();
        metrics::LIVE_BROADCASTERS.set(self.live.len() as i64);
        metrics::RECORDING_BROADCASTERS.set(self.recording.len() as i64);
        let enabled = self.whitelist.enabled_count();
        metrics::WHITELIST_ENTRIES
            .with_label_values(&["enabled"])
            .set(enabled as i64);
        metrics::WHITELIST_ENTRIES
            .with_label_values(&["disabled"])
            .set((self.whitelist.len() - enabled) as i64);
    }

    fn publish_status(&self, result: ProbeStatus) {
        let status = ReconcilerStatus {
            running: self.status_tx.borrow().running,
            cycles: self.cycles,
            last_poll_at: Some(Utc::now()),
            last_result: Some(result),
            live: self.live.streams().to_vec(),
            recording: self.recording.iter().cloned().collect(),
            whitelist_entries: self.whitelist.len(),
            whitelist_enabled: self.whitelist.enabled_count(),
            pool: self.dispatcher.status(),
        };
        self.status_tx.send_replace(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        fixtures, MemoryHistoryLog, MemoryWhitelistStore, MockJobFactory, MockProber,
    };
    use std::time::Duration;

    const TEST_POLL: Duration = Duration::from_secs(45);

    struct Harness {
        prober: Arc<MockProber>,
        store: Arc<MemoryWhitelistStore>,
        history: Arc<MemoryHistoryLog>,
        jobs: MockJobFactory,
        reconciler: Reconciler,
    }

    fn harness(store: MemoryWhitelistStore, jobs: MockJobFactory) -> Harness {
        let prober = Arc::new(MockProber::new());
        let store = Arc::new(store);
        let history = Arc::new(MemoryHistoryLog::new());
        let reconciler = Reconciler::new(
            ReconcilerConfig::new("509658", "en", TEST_POLL.as_secs(), 300),
            prober.clone(),
            store.clone(),
            history.clone(),
            Dispatcher::new(4),
            Arc::new(jobs.clone()),
        );
        Harness {
            prober,
            store,
            history,
            jobs,
            reconciler,
        }
    }

    async fn wait_for_completions(queue: &CompletionQueue, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while queue.len() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("completions did not arrive");
    }

    #[test]
    fn test_compute_to_start_scenarios() {
        let live = fixtures::live_set(&[("alice", 120), ("bob", 5)]);
        let whitelist = fixtures::whitelist(&[("alice", "x"), ("carol", "")]);

        let to_start = compute_to_start(&whitelist, &live, &BTreeSet::new());
        let expected: BTreeSet<_> = fixtures::names(&["alice"]).into_iter().collect();
        assert_eq!(to_start, expected);

        // Already recording: nothing to start.
        let recording = expected;
        assert!(compute_to_start(&whitelist, &live, &recording).is_empty());
    }

    #[test]
    fn test_to_start_never_overlaps_recording() {
        let pool = ["alice", "bob", "carol", "dave", "eve"];
        // Every subset of the pool as the recording set.
        for mask in 0u32..(1 << pool.len()) {
            let recording: BTreeSet<_> = pool
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, n)| fixtures::name(n))
                .collect();
            let live = fixtures::live_set(&[("alice", 1), ("bob", 2), ("dave", 3), ("eve", 4)]);
            let whitelist =
                fixtures::whitelist(&[("alice", "x"), ("bob", "y"), ("carol", "z"), ("eve", "")]);

            let to_start = compute_to_start(&whitelist, &live, &recording);
            assert!(to_start.is_disjoint(&recording));
            for name in &to_start {
                assert!(whitelist.is_enabled(name));
                assert!(live.contains(name));
            }
        }
    }

    #[tokio::test]
    async fn test_cycle_dispatches_enabled_live_broadcasters() {
        let mut h = harness(
            MemoryWhitelistStore::with_entries(&[("alice", "x"), ("carol", "")]),
            MockJobFactory::held(),
        );
        h.prober
            .set_live(fixtures::live_set(&[("alice", 120), ("bob", 5)]))
            .await;

        let report = h.reconciler.run_cycle().await;

        assert_eq!(report.result, ProbeStatus::Online);
        assert_eq!(report.started, fixtures::names(&["alice"]));
        assert_eq!(report.next_delay, TEST_POLL);
        assert_eq!(h.jobs.created(), fixtures::names(&["alice"]));
        assert!(h.reconciler.recording().contains(&fixtures::name("alice")));

        // bob was discovered and added disabled; carol kept.
        let saved = h.store.contents();
        assert_eq!(saved.get(&fixtures::name("bob")), Some(""));
        assert_eq!(saved.get(&fixtures::name("carol")), Some(""));
        assert_eq!(saved.get(&fixtures::name("alice")), Some("x"));
    }

    #[tokio::test]
    async fn test_recording_broadcaster_is_not_dispatched_again() {
        let mut h = harness(
            MemoryWhitelistStore::with_entries(&[("alice", "x")]),
            MockJobFactory::held(),
        );
        h.prober.set_live(fixtures::live_set(&[("alice", 120)])).await;

        h.reconciler.run_cycle().await;
        let second = h.reconciler.run_cycle().await;

        assert!(second.started.is_empty());
        assert_eq!(h.jobs.created().len(), 1);
        assert_eq!(h.reconciler.recording().len(), 1);
    }

    #[tokio::test]
    async fn test_completion_frees_slot_on_next_cycle() {
        let mut h = harness(
            MemoryWhitelistStore::with_entries(&[("alice", "x")]),
            MockJobFactory::instant(),
        );
        h.prober.set_live(fixtures::live_set(&[("alice", 120)])).await;
        let queue = h.reconciler.completions();

        let first = h.reconciler.run_cycle().await;
        assert_eq!(first.started, fixtures::names(&["alice"]));

        // The job finished after this cycle drained: alice stays recording.
        wait_for_completions(&queue, 1).await;
        assert!(h.reconciler.recording().contains(&fixtures::name("alice")));
        assert!(h.history.names().is_empty());

        // The next cycle retires it first, then dispatches again.
        let second = h.reconciler.run_cycle().await;
        assert_eq!(second.drained, fixtures::names(&["alice"]));
        assert_eq!(second.started, fixtures::names(&["alice"]));
        assert_eq!(h.history.names(), vec!["alice"]);
        assert_eq!(h.jobs.created().len(), 2);
    }

    #[tokio::test]
    async fn test_completion_without_relisting_is_not_redispatched() {
        let mut h = harness(
            MemoryWhitelistStore::with_entries(&[("alice", "x")]),
            MockJobFactory::held(),
        );
        h.prober.set_live(fixtures::live_set(&[("alice", 120)])).await;
        h.reconciler.run_cycle().await;

        h.jobs.release(1);
        wait_for_completions(&h.reconciler.completions(), 1).await;
        h.prober.set_live(LiveSet::default()).await;

        let report = h.reconciler.run_cycle().await;
        assert_eq!(report.result, ProbeStatus::Offline);
        assert_eq!(report.drained, fixtures::names(&["alice"]));
        assert!(report.started.is_empty());
        assert!(h.reconciler.recording().is_empty());
        assert!(h.reconciler.live().is_empty());
    }

    #[tokio::test]
    async fn test_manual_enable_takes_effect_next_cycle() {
        let mut h = harness(MemoryWhitelistStore::new(), MockJobFactory::held());
        h.prober.set_live(fixtures::live_set(&[("bob", 5)])).await;

        let first = h.reconciler.run_cycle().await;
        assert!(first.started.is_empty());
        assert_eq!(h.store.contents().get(&fixtures::name("bob")), Some(""));

        h.store.set_annotation("bob", "enabled");
        let second = h.reconciler.run_cycle().await;
        assert_eq!(second.started, fixtures::names(&["bob"]));
    }

    #[tokio::test]
    async fn test_unauthorized_keeps_state_and_refreshes() {
        let mut h = harness(
            MemoryWhitelistStore::with_entries(&[("alice", "x"), ("bob", "y")]),
            MockJobFactory::held(),
        );
        h.prober.set_live(fixtures::live_set(&[("alice", 120)])).await;
        h.reconciler.run_cycle().await;
        let saves = h.store.save_count();

        h.prober.push_live(Err(ProbeError::Unauthorized)).await;
        h.store.set_annotation("carol", "z");
        let report = h.reconciler.run_cycle().await;

        assert_eq!(report.result, ProbeStatus::Unauthorized);
        assert_eq!(report.next_delay, TEST_POLL);
        assert!(report.started.is_empty());
        assert_eq!(h.prober.refresh_calls(), 1);
        assert_eq!(h.store.save_count(), saves);
        assert!(h.reconciler.live().contains(&fixtures::name("alice")));
        assert_eq!(h.reconciler.recording().len(), 1);
    }

    #[tokio::test]
    async fn test_transient_error_uses_cooldown_and_still_drains() {
        let mut h = harness(
            MemoryWhitelistStore::with_entries(&[("alice", "x")]),
            MockJobFactory::instant(),
        );
        h.prober.set_live(fixtures::live_set(&[("alice", 120)])).await;
        h.reconciler.run_cycle().await;
        wait_for_completions(&h.reconciler.completions(), 1).await;

        h.prober
            .push_live(Err(ProbeError::Unavailable("503".to_string())))
            .await;
        let report = h.reconciler.run_cycle().await;

        assert_eq!(report.result, ProbeStatus::Error);
        assert_eq!(report.next_delay, Duration::from_secs(300));
        assert_eq!(report.drained, fixtures::names(&["alice"]));
        assert!(report.started.is_empty());
        assert!(h.reconciler.recording().is_empty());
    }

    #[tokio::test]
    async fn test_store_failures_fall_back_to_cache() {
        let mut h = harness(
            MemoryWhitelistStore::with_entries(&[("alice", "x")]),
            MockJobFactory::held(),
        );
        h.prober.set_live(fixtures::live_set(&[("alice", 1)])).await;
        h.reconciler.run_cycle().await;

        h.store.set_fail_loads(true);
        h.store.set_fail_saves(true);
        h.prober
            .set_live(fixtures::live_set(&[("alice", 1), ("bob", 2)]))
            .await;
        let report = h.reconciler.run_cycle().await;

        assert_eq!(report.result, ProbeStatus::Online);
        assert!(h.reconciler.whitelist().is_enabled(&fixtures::name("alice")));
        assert!(h.reconciler.whitelist().contains(&fixtures::name("bob")));
    }

    #[tokio::test]
    async fn test_status_is_published() {
        let mut h = harness(
            MemoryWhitelistStore::with_entries(&[("alice", "x"), ("carol", "")]),
            MockJobFactory::held(),
        );
        let rx = h.reconciler.subscribe();
        h.prober
            .set_live(fixtures::live_set(&[("alice", 120), ("bob", 5)]))
            .await;
        h.reconciler.run_cycle().await;

        let status = rx.borrow().clone();
        assert_eq!(status.cycles, 1);
        assert_eq!(status.last_result, Some(ProbeStatus::Online));
        assert_eq!(status.live.len(), 2);
        assert_eq!(status.live[0].viewer_count, 120);
        assert_eq!(status.recording, fixtures::names(&["alice"]));
        assert_eq!(status.whitelist_entries, 3);
        assert_eq!(status.whitelist_enabled, 1);
        assert_eq!(status.pool.capacity, 4);
        assert_eq!(status.pool.in_flight, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_shutdown() {
        let h = harness(MemoryWhitelistStore::new(), MockJobFactory::held());
        let rx = h.reconciler.subscribe();
        let prober = h.prober.clone();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let task = tokio::spawn(h.reconciler.run(shutdown_rx));
        tokio::time::sleep(TEST_POLL * 2 + Duration::from_secs(1)).await;
        assert!(rx.borrow().running);
        assert_eq!(prober.list_calls(), 3);

        shutdown_tx.send(()).unwrap();
        task.await.unwrap();
        assert!(!rx.borrow().running);
    }
}
