//! Running many scenario tasks across worker threads.
//!
//! Tasks are independent: each one owns its frontier and id allocator. The
//! only shared mutable state is the allocator's next-index counter and its
//! counterexample log, both behind a `Mutex`. Workers pull tasks until the
//! allocator runs dry, so the index order across workers is unspecified.

use crate::grid::ScenarioSpace;
use crate::search::BackreachSearch;
use crate::types::{BackreachResult, ResultSummary};
use backreach_core::{BackreachError, Result, ScenarioParams};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Configuration for parallel scenario runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelConfig {
    /// Maximum number of worker threads.
    /// None means use rayon's default (typically number of cores).
    #[serde(default)]
    pub max_threads: Option<usize>,

    /// Whether to log progress as tasks complete.
    #[serde(default = "default_report_progress")]
    pub report_progress: bool,
}

fn default_report_progress() -> bool {
    true
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            max_threads: None,
            report_progress: default_report_progress(),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A worker that panicked cannot leave the counters half-updated.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Hands out scenario tasks by index and collects counterexamples.
#[derive(Debug)]
pub struct TaskAllocator {
    space: ScenarioSpace,
    next: Mutex<usize>,
    end: usize,
    counterexamples: Mutex<Vec<ResultSummary>>,
}

impl TaskAllocator {
    /// Allocate every scenario in `space`, starting at index 0.
    pub fn new(space: ScenarioSpace) -> Self {
        let end = space.len();
        Self {
            space,
            next: Mutex::new(0),
            end,
            counterexamples: Mutex::new(Vec::new()),
        }
    }

    /// Start allocating at `index`.
    pub fn starting_at(self, index: usize) -> Self {
        *lock(&self.next) = index.min(self.end);
        self
    }

    /// Stop after at most `count` tasks from the current start.
    pub fn with_limit(mut self, count: usize) -> Self {
        let start = *lock(&self.next);
        self.end = self.end.min(start.saturating_add(count));
        self
    }

    pub fn space(&self) -> &ScenarioSpace {
        &self.space
    }

    /// Number of tasks not yet handed out.
    pub fn remaining(&self) -> usize {
        self.end.saturating_sub(*lock(&self.next))
    }

    /// Next `(index, params)`, or `None` when all tasks have been handed out.
    pub fn next_task(&self) -> Option<(usize, ScenarioParams)> {
        let mut next = lock(&self.next);
        if *next >= self.end {
            return None;
        }
        let index = *next;
        *next += 1;
        drop(next);
        self.space.get(index).map(|params| (index, params))
    }

    /// Record a task that found a counterexample. Returns the new count.
    pub fn notify_counterexample(&self, result: &BackreachResult) -> Result<usize> {
        let summary = result.to_summary()?;
        let mut found = lock(&self.counterexamples);
        found.push(summary);
        let count = found.len();
        drop(found);
        info!(
            "Index {}: found counterexample (count: {})",
            result.index, count
        );
        Ok(count)
    }

    pub fn num_counterexamples(&self) -> usize {
        lock(&self.counterexamples).len()
    }

    /// Counterexample summaries, sorted by task index.
    pub fn counterexamples(&self) -> Vec<ResultSummary> {
        let mut found = lock(&self.counterexamples).clone();
        found.sort_by_key(|s| s.index);
        found
    }
}

/// Aggregate over a parallel run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelReport {
    pub tasks_completed: usize,
    pub total_popped: usize,
    pub counterexamples: Vec<ResultSummary>,
    pub runtime: Duration,
}

impl ParallelReport {
    pub fn counterexample_indices(&self) -> Vec<usize> {
        self.counterexamples.iter().map(|s| s.index).collect()
    }

    pub fn summary(&self) -> String {
        format!(
            "Completed {} tasks ({} states popped) in {:.2}s\nCounterexamples ({}): {:?}",
            self.tasks_completed,
            self.total_popped,
            self.runtime.as_secs_f64(),
            self.counterexamples.len(),
            self.counterexample_indices()
        )
    }
}

#[derive(Debug, Default)]
struct WorkerTotals {
    tasks: usize,
    popped: usize,
}

/// Run every task the allocator hands out on a rayon pool.
///
/// The first task error aborts that worker and is returned after the other
/// workers drain.
pub fn run_parallel(
    search: &BackreachSearch<'_>,
    allocator: &TaskAllocator,
    config: &ParallelConfig,
) -> Result<ParallelReport> {
    let start = Instant::now();
    let completed = AtomicUsize::new(0);
    let total = allocator.remaining();

    let pool = if let Some(max_threads) = config.max_threads {
        Some(
            rayon::ThreadPoolBuilder::new()
                .num_threads(max_threads)
                .build()
                .map_err(|e| {
                    BackreachError::InvalidConfig(format!("Failed to create thread pool: {}", e))
                })?,
        )
    } else {
        None
    };

    let worker = |worker_id: usize| -> Result<WorkerTotals> {
        let mut totals = WorkerTotals::default();
        while let Some((index, params)) = allocator.next_task() {
            let result = search.run(index, params)?;
            totals.tasks += 1;
            totals.popped += result.num_popped;
            if result.has_counterexample() {
                allocator.notify_counterexample(&result)?;
            }
            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            if config.report_progress {
                debug!(
                    "Worker {}: {}/{} tasks done, {} counterexamples",
                    worker_id,
                    done,
                    total,
                    allocator.num_counterexamples()
                );
            }
        }
        Ok(totals)
    };

    let run_workers = || -> Vec<Result<WorkerTotals>> {
        let num_workers = rayon::current_num_threads().min(total.max(1));
        (0..num_workers).into_par_iter().map(worker).collect()
    };

    let per_worker = match &pool {
        Some(p) => p.install(run_workers),
        None => run_workers(),
    };

    let mut tasks_completed = 0;
    let mut total_popped = 0;
    for totals in per_worker {
        let totals = totals?;
        tasks_completed += totals.tasks;
        total_popped += totals.popped;
    }

    let report = ParallelReport {
        tasks_completed,
        total_popped,
        counterexamples: allocator.counterexamples(),
        runtime: start.elapsed(),
    };
    info!("{}", report.summary());
    Ok(report)
}

/// Run all scenarios of `space` from `start_index` onward.
pub fn run_all(
    search: &BackreachSearch<'_>,
    space: ScenarioSpace,
    start_index: usize,
    limit: Option<usize>,
    config: &ParallelConfig,
) -> Result<ParallelReport> {
    let mut allocator = TaskAllocator::new(space).starting_at(start_index);
    if let Some(limit) = limit {
        allocator = allocator.with_limit(limit);
    }
    info!(
        "Running {} of {} scenarios from index {}",
        allocator.remaining(),
        allocator.space().len(),
        start_index
    );
    run_parallel(search, &allocator, config)
}

/// Run the single scenario at `index` on the calling thread.
pub fn run_index(
    search: &BackreachSearch<'_>,
    space: &ScenarioSpace,
    index: usize,
) -> Result<BackreachResult> {
    let params = space.get(index).ok_or_else(|| {
        BackreachError::InvalidScenario(format!(
            "index {} out of range (space has {} scenarios)",
            index,
            space.len()
        ))
    })?;
    search.run(index, params)
}
