//! Operation timing and resource sampling for a pipeline run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use storyteller_error::{JsonError, StorageError, StorageErrorKind, StorytellerResult};
use sysinfo::{Disks, System};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long a stopping sampler may take before it is aborted.
const SAMPLER_GRACE: Duration = Duration::from_secs(2);

/// One timed operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    /// Operation name
    pub operation: String,
    /// When the operation started
    pub start_time: DateTime<Utc>,
    /// When the operation ended, if it has
    pub end_time: Option<DateTime<Utc>>,
    /// Elapsed seconds, once ended
    pub duration: Option<f64>,
    #[serde(skip)]
    started: Option<Instant>,
}

impl OperationRecord {
    fn open(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            start_time: Utc::now(),
            end_time: None,
            duration: None,
            started: Some(Instant::now()),
        }
    }

    /// Whether the operation is still running.
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }
}

/// One resource usage sample, as percentages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSample {
    /// When the sample was taken
    pub timestamp: DateTime<Utc>,
    /// Global CPU usage
    pub cpu: f32,
    /// Used memory
    pub memory: f32,
    /// Used space on the root disk
    pub disk: f32,
}

/// Aggregate timings for one operation name, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationStats {
    /// Completed runs
    pub count: usize,
    /// Sum of durations
    pub total_time: f64,
    /// Shortest duration
    pub min_time: f64,
    /// Longest duration
    pub max_time: f64,
    /// Mean duration
    pub avg_time: f64,
}

/// Paths written by [`PerformanceMonitor::save_performance_data`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerformanceFiles {
    /// `operation_history.json`
    pub history: PathBuf,
    /// `resource_usage.json`
    pub resource_usage: PathBuf,
    /// `operation_stats.json`
    pub stats: PathBuf,
}

/// Background task sampling resource usage into a buffer it owns.
#[derive(Debug)]
struct ResourceSampler {
    cancel: CancellationToken,
    handle: JoinHandle<Vec<ResourceSample>>,
}

impl ResourceSampler {
    fn spawn(interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut samples = Vec::new();
            let mut system = System::new();
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let sample = take_sample(&mut system);
                        debug!(cpu = sample.cpu, memory = sample.memory, disk = sample.disk, "Resource usage");
                        samples.push(sample);
                    }
                }
            }
            samples
        });
        Self { cancel, handle }
    }

    /// Cancel, then wait up to the grace period before aborting.
    async fn stop(mut self) -> Vec<ResourceSample> {
        self.cancel.cancel();
        match tokio::time::timeout(SAMPLER_GRACE, &mut self.handle).await {
            Ok(Ok(samples)) => samples,
            Ok(Err(e)) => {
                warn!(error = %e, "Resource sampler task failed");
                Vec::new()
            }
            Err(_) => {
                warn!("Resource sampler did not stop in time, aborting");
                self.handle.abort();
                Vec::new()
            }
        }
    }
}

impl Drop for ResourceSampler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn percent(used: u64, total: u64) -> f32 {
    if total == 0 {
        0.0
    } else {
        (used as f64 / total as f64 * 100.0) as f32
    }
}

fn take_sample(system: &mut System) -> ResourceSample {
    system.refresh_cpu_usage();
    system.refresh_memory();
    let disks = Disks::new_with_refreshed_list();
    let root = disks
        .list()
        .iter()
        .find(|disk| disk.mount_point() == Path::new("/"))
        .or_else(|| disks.list().first());
    let disk = root
        .map(|disk| {
            percent(
                disk.total_space().saturating_sub(disk.available_space()),
                disk.total_space(),
            )
        })
        .unwrap_or(0.0);

    ResourceSample {
        timestamp: Utc::now(),
        cpu: system.global_cpu_usage(),
        memory: percent(system.used_memory(), system.total_memory()),
        disk,
    }
}

/// Times named operations and samples resource usage.
///
/// History is bounded; once full, the oldest record is evicted.
///
/// # Examples
///
/// ```
/// use storyteller_narrative::PerformanceMonitor;
///
/// let mut monitor = PerformanceMonitor::new(2);
/// monitor.start_operation("Story Generation");
/// monitor.end_operation("Story Generation");
/// monitor.start_operation("Image Generation");
/// monitor.start_operation("Markdown Update");
///
/// assert_eq!(monitor.history().len(), 2);
/// assert_eq!(monitor.history()[0].operation, "Image Generation");
/// ```
#[derive(Debug)]
pub struct PerformanceMonitor {
    history: VecDeque<OperationRecord>,
    max_history: usize,
    samples: Vec<ResourceSample>,
    sampler: Option<ResourceSampler>,
}

impl PerformanceMonitor {
    /// Create a monitor keeping at most `max_history` records (at least one).
    pub fn new(max_history: usize) -> Self {
        let max_history = max_history.max(1);
        Self {
            history: VecDeque::with_capacity(max_history),
            max_history,
            samples: Vec::new(),
            sampler: None,
        }
    }

    /// Record the start of an operation.
    pub fn start_operation(&mut self, operation: &str) {
        if self.history.len() == self.max_history {
            self.history.pop_front();
        }
        self.history.push_back(OperationRecord::open(operation));
        info!(operation, "Started operation");
    }

    /// Close the most recent open record named `operation`.
    ///
    /// Returns the elapsed time, or `None` if no such record is open.
    pub fn end_operation(&mut self, operation: &str) -> Option<Duration> {
        let Some(record) = self
            .history
            .iter_mut()
            .rev()
            .find(|record| record.operation == operation && record.is_open())
        else {
            debug!(operation, "No open operation to end");
            return None;
        };

        let elapsed = record.started.map(|s| s.elapsed()).unwrap_or_default();
        record.end_time = Some(Utc::now());
        record.duration = Some(elapsed.as_secs_f64());
        info!(
            operation,
            duration_secs = elapsed.as_secs_f64(),
            "Ended operation: {}, Duration: {:.2} seconds",
            operation,
            elapsed.as_secs_f64()
        );
        Some(elapsed)
    }

    /// Operation records, oldest first.
    pub fn history(&self) -> &VecDeque<OperationRecord> {
        &self.history
    }

    /// Resource samples collected by stopped samplers.
    pub fn resource_usage(&self) -> &[ResourceSample] {
        &self.samples
    }

    /// Start sampling every `interval`. Does nothing if already sampling.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_monitoring(&mut self, interval: Duration) {
        if self.sampler.is_none() {
            self.sampler = Some(ResourceSampler::spawn(interval));
            info!(interval_ms = interval.as_millis() as u64, "Started resource monitoring");
        }
    }

    /// Whether a sampler is running.
    pub fn is_monitoring(&self) -> bool {
        self.sampler.is_some()
    }

    /// Stop sampling and keep what the sampler collected.
    pub async fn stop_monitoring(&mut self) {
        if let Some(sampler) = self.sampler.take() {
            let samples = sampler.stop().await;
            info!(samples = samples.len(), "Stopped resource monitoring");
            self.samples.extend(samples);
        }
    }

    /// Aggregate completed operations by name.
    pub fn operation_stats(&self) -> BTreeMap<String, OperationStats> {
        let mut stats: BTreeMap<String, OperationStats> = BTreeMap::new();
        for record in &self.history {
            let Some(duration) = record.duration else {
                continue;
            };
            let entry = stats
                .entry(record.operation.clone())
                .or_insert(OperationStats {
                    count: 0,
                    total_time: 0.0,
                    min_time: f64::INFINITY,
                    max_time: 0.0,
                    avg_time: 0.0,
                });
            entry.count += 1;
            entry.total_time += duration;
            entry.min_time = entry.min_time.min(duration);
            entry.max_time = entry.max_time.max(duration);
        }
        for entry in stats.values_mut() {
            entry.avg_time = entry.total_time / entry.count as f64;
        }
        stats
    }

    /// Write history, resource usage and stats as JSON into `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or a file cannot be written.
    pub async fn save_performance_data(&self, dir: &Path) -> StorytellerResult<PerformanceFiles> {
        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                "{}: {}",
                dir.display(),
                e
            )))
        })?;

        let files = PerformanceFiles {
            history: dir.join("operation_history.json"),
            resource_usage: dir.join("resource_usage.json"),
            stats: dir.join("operation_stats.json"),
        };
        write_json(&files.history, &self.history).await?;
        write_json(&files.resource_usage, &self.samples).await?;
        write_json(&files.stats, &self.operation_stats()).await?;

        info!(dir = %dir.display(), "Saved performance data");
        Ok(files)
    }
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> StorytellerResult<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| JsonError::new(e.to_string()))?;
    tokio::fs::write(path, json).await.map_err(|e| {
        StorageError::new(StorageErrorKind::FileWrite(format!(
            "{}: {}",
            path.display(),
            e
        )))
    })?;
    Ok(())
}
