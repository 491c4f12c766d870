// src/ingest/pipeline.rs
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;
use serde::Serialize;

use crate::ingest::store::CatalogStore;
use crate::ingest::types::{Category, Fault, HackathonListing, JobPosting, Listing, SourceAdapter};

pub const DEFAULT_ADAPTER_TIMEOUT: Duration = Duration::from_secs(120);

/// One-time metrics registration (so series show up on /metrics).
fn describe_metrics() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "pipeline_records_extracted_total",
            "Candidate records returned by adapters."
        );
        describe_counter!(
            "pipeline_records_persisted_total",
            "Records accepted by the catalog store."
        );
        describe_counter!(
            "pipeline_records_rejected_total",
            "Records dropped by validation before reaching the store."
        );
        describe_counter!(
            "pipeline_write_failures_total",
            "Upserts the catalog store refused."
        );
        describe_counter!(
            "pipeline_adapter_failures_total",
            "Adapter passes that ended Failed."
        );
        describe_counter!("pipeline_faults_total", "Non-fatal adapter faults by kind.");
        describe_counter!(
            "pipeline_degraded_runs_total",
            "Runs in which no adapter completed."
        );
        describe_histogram!(
            "pipeline_adapter_duration_ms",
            "Adapter collect() duration in milliseconds."
        );
        describe_gauge!(
            "pipeline_last_run_ts",
            "Unix ts when a category pipeline last finished."
        );
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AdapterStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdapterReport {
    pub name: &'static str,
    pub status: AdapterStatus,
    pub extracted: usize,
    pub persisted: usize,
    pub rejected: usize,
    pub failed_writes: usize,
    pub filtered: usize,
    pub faults: Vec<Fault>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl AdapterReport {
    pub fn pending(name: &'static str) -> Self {
        Self {
            name,
            status: AdapterStatus::Pending,
            extracted: 0,
            persisted: 0,
            rejected: 0,
            failed_writes: 0,
            filtered: 0,
            faults: Vec::new(),
            error: None,
            duration_ms: 0,
        }
    }

    fn start(&mut self) {
        debug_assert_eq!(self.status, AdapterStatus::Pending);
        self.status = AdapterStatus::Running;
    }

    fn complete(&mut self) {
        debug_assert_eq!(self.status, AdapterStatus::Running);
        self.status = AdapterStatus::Completed;
    }

    fn fail(&mut self, error: String) {
        debug_assert_eq!(self.status, AdapterStatus::Running);
        self.status = AdapterStatus::Failed;
        self.error = Some(error);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub category: Category,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Records handed to validation (extracted by completed-or-not adapters).
    pub attempted: usize,
    pub persisted: usize,
    pub rejected: usize,
    pub failed_writes: usize,
    pub adapters: Vec<AdapterReport>,
}

impl RunSummary {
    pub fn completed(&self) -> usize {
        self.count(AdapterStatus::Completed)
    }

    pub fn failed(&self) -> usize {
        self.count(AdapterStatus::Failed)
    }

    fn count(&self, status: AdapterStatus) -> usize {
        self.adapters.iter().filter(|a| a.status == status).count()
    }

    pub fn degraded(&self) -> bool {
        !self.adapters.is_empty() && self.completed() == 0
    }

    /// Human-readable line for the trigger response.
    pub fn message(&self) -> String {
        let mut msg = format!(
            "{} scraping completed: {} of {} records persisted, {}/{} adapters completed",
            self.category,
            self.persisted,
            self.attempted,
            self.completed(),
            self.adapters.len()
        );
        let failed: Vec<&str> = self
            .adapters
            .iter()
            .filter(|a| a.status == AdapterStatus::Failed)
            .map(|a| a.name)
            .collect();
        if !failed.is_empty() {
            msg.push_str(&format!(" (failed: {})", failed.join(", ")));
        }
        msg
    }
}

/// Ordered adapter registry for one category, run sequentially against a store.
pub struct Pipeline<R: Listing> {
    registry: Vec<Box<dyn SourceAdapter<R>>>,
    store: Arc<dyn CatalogStore>,
    adapter_timeout: Duration,
}

impl<R: Listing> Pipeline<R> {
    pub fn new(registry: Vec<Box<dyn SourceAdapter<R>>>, store: Arc<dyn CatalogStore>) -> Self {
        Self {
            registry,
            store,
            adapter_timeout: DEFAULT_ADAPTER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, adapter_timeout: Duration) -> Self {
        self.adapter_timeout = adapter_timeout;
        self
    }

    pub fn category(&self) -> Category {
        R::CATEGORY
    }

    pub fn adapter_names(&self) -> Vec<&'static str> {
        self.registry.iter().map(|a| a.name()).collect()
    }

    pub async fn run(&self) -> RunSummary {
        describe_metrics();
        let category = R::CATEGORY;
        let started_at = Utc::now();
        tracing::info!(%category, adapters = self.registry.len(), "pipeline run started");

        let mut reports: Vec<AdapterReport> = self
            .registry
            .iter()
            .map(|a| AdapterReport::pending(a.name()))
            .collect();

        for (adapter, report) in self.registry.iter().zip(reports.iter_mut()) {
            self.run_adapter(adapter.as_ref(), report).await;
        }

        let summary = RunSummary {
            category,
            started_at,
            finished_at: Utc::now(),
            attempted: reports.iter().map(|r| r.extracted).sum(),
            persisted: reports.iter().map(|r| r.persisted).sum(),
            rejected: reports.iter().map(|r| r.rejected).sum(),
            failed_writes: reports.iter().map(|r| r.failed_writes).sum(),
            adapters: reports,
        };

        gauge!("pipeline_last_run_ts", "category" => category.as_str())
            .set(summary.finished_at.timestamp().max(0) as f64);

        if summary.degraded() {
            counter!("pipeline_degraded_runs_total", "category" => category.as_str()).increment(1);
            tracing::warn!(%category, adapters = summary.adapters.len(), "no adapter completed");
        }
        tracing::info!(
            %category,
            attempted = summary.attempted,
            persisted = summary.persisted,
            rejected = summary.rejected,
            failed_writes = summary.failed_writes,
            completed = summary.completed(),
            failed = summary.failed(),
            "pipeline run finished"
        );
        summary
    }

    async fn run_adapter(&self, adapter: &dyn SourceAdapter<R>, report: &mut AdapterReport) {
        let category = R::CATEGORY.as_str();
        let name = report.name;
        report.start();
        tracing::debug!(category, adapter = name, "adapter running");

        let t0 = std::time::Instant::now();
        let guarded = AssertUnwindSafe(adapter.collect()).catch_unwind();
        let outcome = tokio::time::timeout(self.adapter_timeout, guarded).await;
        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        report.duration_ms = ms as u64;
        histogram!("pipeline_adapter_duration_ms", "category" => category, "adapter" => name)
            .record(ms);

        let failure = match outcome {
            Ok(Ok(Ok(h))) => Ok(h),
            Ok(Ok(Err(e))) => {
                tracing::error!(category, adapter = name, error = ?e, "adapter failed");
                Err(format!("{e:#}"))
            }
            Ok(Err(payload)) => {
                let msg = panic_message(payload.as_ref());
                tracing::error!(category, adapter = name, panic = %msg, "adapter panicked");
                Err(format!("panicked: {msg}"))
            }
            Err(_) => {
                tracing::error!(
                    category,
                    adapter = name,
                    timeout = ?self.adapter_timeout,
                    "adapter timed out"
                );
                Err(format!("timed out after {:?}", self.adapter_timeout))
            }
        };
        let harvest = match failure {
            Ok(h) => h,
            Err(error) => {
                counter!(
                    "pipeline_adapter_failures_total",
                    "category" => category,
                    "adapter" => name
                )
                .increment(1);
                report.fail(error);
                return;
            }
        };

        for fault in &harvest.faults {
            let kind = match fault {
                Fault::Transport { .. } => "transport",
                Fault::ShapeDrift { .. } => "shape_drift",
                Fault::Item { .. } => "item",
            };
            counter!("pipeline_faults_total", "adapter" => name, "kind" => kind).increment(1);
        }

        let unreachable = harvest.records.is_empty() && harvest.transport_failed();
        report.extracted = harvest.records.len();
        report.filtered = harvest.filtered;
        report.faults = harvest.faults;
        counter!("pipeline_records_extracted_total", "category" => category, "adapter" => name)
            .increment(report.extracted as u64);

        for record in harvest.records {
            let record = record.normalize();
            if let Err(e) = record.validate() {
                tracing::debug!(category, adapter = name, error = %e, "record rejected");
                report.rejected += 1;
                continue;
            }
            if self.store.upsert(record.as_record()).await {
                report.persisted += 1;
            } else {
                report.failed_writes += 1;
            }
        }

        counter!("pipeline_records_persisted_total", "category" => category, "adapter" => name)
            .increment(report.persisted as u64);
        counter!("pipeline_records_rejected_total", "category" => category, "adapter" => name)
            .increment(report.rejected as u64);
        counter!("pipeline_write_failures_total", "category" => category, "adapter" => name)
            .increment(report.failed_writes as u64);

        if unreachable {
            tracing::warn!(
                category,
                adapter = name,
                faults = report.faults.len(),
                "upstream unreachable"
            );
            counter!("pipeline_adapter_failures_total", "category" => category, "adapter" => name)
                .increment(1);
            report.fail("upstream unreachable".to_string());
        } else {
            report.complete();
            tracing::info!(
                category,
                adapter = name,
                extracted = report.extracted,
                persisted = report.persisted,
                rejected = report.rejected,
                filtered = report.filtered,
                faults = report.faults.len(),
                "adapter completed"
            );
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Runs both categories concurrently. Adapters within a category stay sequential.
pub async fn run_all(
    jobs: &Pipeline<JobPosting>,
    hackathons: &Pipeline<HackathonListing>,
) -> (RunSummary, RunSummary) {
    tokio::join!(jobs.run(), hackathons.run())
}
