//! Aggregate statistics, computed off the UI thread.
//!
//! [`StatsComputer`] owns a single worker thread fed through a one-slot
//! mailbox: a new request replaces any request the worker has not started,
//! and the worker abandons its current batch as soon as a newer one arrives.
//! Results come back over an `mpsc` channel and are cached per array on the
//! calling thread by [`StatsComputer::poll`].

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;

use tracing::{debug, error};

use super::cache::IdentityCache;
use super::region::Region;
use super::signals::{ArrayId, Samples};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub rms: f64,
    /// Population standard deviation.
    pub stdev: f64,
}

/// Statistics of `values`, or `None` for an empty slice.
pub fn compute_stats(values: &[f64]) -> Option<SignalStats> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for &v in values {
        min = min.min(v);
        max = max.max(v);
        sum += v;
        sum_sq += v * v;
    }
    let mean = sum / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    Some(SignalStats {
        count: values.len(),
        min,
        max,
        mean,
        rms: (sum_sq / n).sqrt(),
        stdev: var.sqrt(),
    })
}

/// One statistic, as shown in a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatKind {
    Min,
    Max,
    Avg,
    Rms,
    StDev,
}

impl StatKind {
    pub const ALL: [StatKind; 5] = [StatKind::Min, StatKind::Max, StatKind::Avg, StatKind::Rms, StatKind::StDev];

    pub fn label(self) -> &'static str {
        match self {
            StatKind::Min => "Min",
            StatKind::Max => "Max",
            StatKind::Avg => "Avg",
            StatKind::Rms => "RMS",
            StatKind::StDev => "StDev",
        }
    }

    pub fn of(self, stats: &SignalStats) -> f64 {
        match self {
            StatKind::Min => stats.min,
            StatKind::Max => stats.max,
            StatKind::Avg => stats.mean,
            StatKind::Rms => stats.rms,
            StatKind::StDev => stats.stdev,
        }
    }

    /// The statistic with `precision` decimals, or blank when there is none.
    pub fn format(self, stats: Option<&SignalStats>, precision: usize) -> String {
        match stats {
            Some(s) => format!("{:.*}", precision, self.of(s)),
            None => String::new(),
        }
    }
}

/// A signal to compute statistics for: its displayed values and the
/// timestamps that index them.
#[derive(Debug, Clone)]
pub struct StatsItem {
    pub values: Samples<f64>,
    pub timestamps: Samples<f64>,
}

/// A finished computation.
#[derive(Debug, Clone)]
pub struct StatsUpdate {
    pub values: ArrayId,
    pub timestamps: ArrayId,
    pub region: Region,
    pub stats: Option<SignalStats>,
}

struct Task {
    items: Vec<StatsItem>,
    region: Region,
    generation: u64,
    /// Sequence number of the request that produced this task.
    request: u64,
}

#[derive(Default)]
struct Pending {
    task: Option<Task>,
    shutdown: bool,
}

struct Shared {
    pending: Mutex<Pending>,
    wake: Condvar,
    /// Current dataset generation; tasks tagged older are stale.
    generation: AtomicU64,
    /// Sequence number of the latest request, cached-only requests included.
    requests: AtomicU64,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn superseded(&self, request: u64) -> bool {
        self.requests.load(Ordering::Acquire) != request || self.lock().shutdown
    }

    fn is_stale(&self, generation: u64) -> bool {
        generation < self.generation.load(Ordering::Acquire)
    }
}

pub struct StatsComputer {
    shared: Arc<Shared>,
    results_tx: Sender<StatsUpdate>,
    results_rx: Receiver<StatsUpdate>,
    worker: Option<JoinHandle<()>>,
    full: IdentityCache<(), Option<SignalStats>>,
    regional: IdentityCache<(Region, ArrayId), Option<SignalStats>>,
    region: Region,
}

impl StatsComputer {
    /// Start a computer. With `background` false, or if the worker thread
    /// cannot be spawned, requests are computed inline.
    pub fn new(background: bool) -> Self {
        let shared = Arc::new(Shared {
            pending: Mutex::new(Pending::default()),
            wake: Condvar::new(),
            generation: AtomicU64::new(0),
            requests: AtomicU64::new(0),
        });
        let (results_tx, results_rx) = mpsc::channel();
        let worker = if background {
            let worker_shared = shared.clone();
            let tx = results_tx.clone();
            match std::thread::Builder::new()
                .name("StatsWorker".into())
                .spawn(move || worker_loop(worker_shared, tx))
            {
                Ok(handle) => Some(handle),
                Err(error) => {
                    error!("Failed to spawn stats worker, computing inline: {error:?}");
                    None
                }
            }
        } else {
            None
        };
        Self {
            shared,
            results_tx,
            results_rx,
            worker,
            full: IdentityCache::new(),
            regional: IdentityCache::new(),
            region: Region::Unbounded,
        }
    }

    pub fn is_background(&self) -> bool {
        self.worker.is_some()
    }

    /// Record the model's current dataset generation.
    pub fn set_generation(&self, generation: u64) {
        self.shared.generation.store(generation, Ordering::Release);
    }

    /// Request statistics of `items` over `region`, replacing any request
    /// not yet started and abandoning the batch in progress. Items whose
    /// statistics are already cached are skipped.
    pub fn request(&mut self, items: Vec<StatsItem>, region: Region, generation: u64) {
        self.region = region;
        let request = self.shared.requests.fetch_add(1, Ordering::AcqRel) + 1;
        let items: Vec<StatsItem> = items
            .into_iter()
            .filter(|item| self.cached(&item.values, &item.timestamps).is_none())
            .collect();
        debug!(count = items.len(), ?region, generation, "stats request");
        let task = (!items.is_empty()).then_some(Task {
            items,
            region,
            generation,
            request,
        });

        if self.worker.is_some() {
            let mut pending = self.shared.lock();
            pending.task = task;
            self.shared.wake.notify_one();
        } else if let Some(task) = task {
            run_task(&self.shared, task, &self.results_tx, false);
        }
    }

    /// Drain finished computations into the caches. Returns the value arrays
    /// whose statistics for the current region just became available.
    ///
    /// Full-range results are always cached. A bounded result is cached only
    /// for the current region, since the regional cache holds one entry per
    /// array and an older region would evict it.
    pub fn poll(&mut self) -> Vec<ArrayId> {
        let mut completed = Vec::new();
        while let Ok(update) = self.results_rx.try_recv() {
            let current = update.region == self.region;
            if !update.region.is_bounded() {
                self.full.set(update.values, (), update.stats);
            } else if current {
                self.regional
                    .set(update.values, (update.region, update.timestamps), update.stats);
            } else {
                debug!(region = ?update.region, "dropping stats for a deselected region");
                continue;
            }
            if current {
                completed.push(update.values);
            }
        }
        completed
    }

    /// Cached statistics of `values` over the current region. `None` means
    /// not computed yet; `Some(None)` means the slice was empty.
    pub fn stats_for(&self, values: &Samples<f64>, timestamps: &Samples<f64>) -> Option<&Option<SignalStats>> {
        self.cached(values, timestamps)
    }

    fn cached(&self, values: &Samples<f64>, timestamps: &Samples<f64>) -> Option<&Option<SignalStats>> {
        match self.region {
            Region::Unbounded => self.full.get(values.id(), &()),
            region => self.regional.get(values.id(), &(region, timestamps.id())),
        }
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn retain_sources(&mut self, live: &HashSet<ArrayId>) {
        self.full.retain_sources(live);
        self.regional.retain_sources(live);
    }
}

impl Drop for StatsComputer {
    fn drop(&mut self) {
        {
            let mut pending = self.shared.lock();
            pending.shutdown = true;
            pending.task = None;
        }
        self.shared.wake.notify_all();
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                error!("Stats worker panicked");
            }
        }
    }
}

fn worker_loop(shared: Arc<Shared>, tx: Sender<StatsUpdate>) {
    loop {
        let task = {
            let mut pending = shared.lock();
            loop {
                if pending.shutdown {
                    return;
                }
                if let Some(task) = pending.task.take() {
                    break task;
                }
                pending = shared.wake.wait(pending).unwrap_or_else(|e| e.into_inner());
            }
        };
        if !run_task(&shared, task, &tx, true) {
            return;
        }
    }
}

/// Returns false once the receiving side is gone.
fn run_task(shared: &Shared, task: Task, tx: &Sender<StatsUpdate>, interruptible: bool) -> bool {
    for item in task.items {
        if interruptible && shared.superseded(task.request) {
            debug!("stats batch superseded");
            break;
        }
        if shared.is_stale(task.generation) {
            continue;
        }
        let values = task.region.slice(&item.timestamps, &item.values);
        let update = StatsUpdate {
            values: item.values.id(),
            timestamps: item.timestamps.id(),
            region: task.region,
            stats: compute_stats(values),
        };
        if tx.send(update).is_err() {
            return false;
        }
    }
    true
}
