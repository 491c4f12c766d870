// tests/pipeline_isolation.rs
//
// Orchestrator behaviour with scripted adapters: failure isolation, timeouts,
// and the guarantee that invalid records never reach the store.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use opportunity_aggregator::ingest::pipeline::{AdapterStatus, Pipeline};
use opportunity_aggregator::ingest::store::MemoryStore;
use opportunity_aggregator::ingest::types::{
    Fault, HackathonListing, Harvest, SourceAdapter, Tags,
};

enum Script {
    Records(Vec<(&'static str, &'static str)>),
    Fatal,
    Hang,
    Unreachable,
}

struct Scripted {
    name: &'static str,
    script: Script,
}

fn listing(name: &str, url: &str, source: &str) -> HackathonListing {
    HackathonListing {
        name: name.to_string(),
        organizer: String::new(),
        description: String::new(),
        dates: String::new(),
        location: String::new(),
        url: url.to_string(),
        source: source.to_string(),
        tags: ["Hackathon"].into_iter().collect::<Tags>(),
        prizes: String::new(),
    }
}

#[async_trait]
impl SourceAdapter<HackathonListing> for Scripted {
    async fn collect(&self) -> Result<Harvest<HackathonListing>> {
        let mut h = Harvest::new();
        match &self.script {
            Script::Records(items) => {
                for (name, url) in items {
                    h.push(listing(name, url, self.name));
                }
            }
            Script::Fatal => return Err(anyhow!("{} exploded", self.name)),
            Script::Hang => tokio::time::sleep(Duration::from_secs(3600)).await,
            Script::Unreachable => h.fault(Fault::Transport {
                url: "https://down.test/".into(),
                detail: "HTTP 500".into(),
            }),
        }
        Ok(h)
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

fn boxed(name: &'static str, script: Script) -> Box<dyn SourceAdapter<HackathonListing>> {
    Box::new(Scripted { name, script })
}

#[tokio::test]
async fn kth_adapter_failure_does_not_abort_the_rest() {
    let n = 4;
    for k in 0..n {
        let registry: Vec<_> = (0..n)
            .map(|i| {
                if i == k {
                    boxed("Fatal", Script::Fatal)
                } else {
                    boxed("Ok", Script::Records(vec![("Hack", "https://ok.test/h")]))
                }
            })
            .collect();
        let store = Arc::new(MemoryStore::new());
        let summary = Pipeline::new(registry, store.clone()).run().await;

        assert_eq!(summary.adapters.len(), n);
        assert_eq!(summary.completed(), n - 1, "k = {k}");
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.adapters[k].status, AdapterStatus::Failed);
        assert_eq!(summary.adapters[k].error.as_deref(), Some("Fatal exploded"));
        // every other adapter still ran
        assert_eq!(store.write_log().len(), n - 1);
        assert_eq!(store.hackathons().len(), 1);
    }
}

#[tokio::test]
async fn empty_keys_never_reach_the_store() {
    let store = Arc::new(MemoryStore::new());
    let registry = vec![boxed(
        "Mixed",
        Script::Records(vec![
            ("", "https://x.test/no-name"),
            ("   ", "https://x.test/blank-name"),
            ("No Url", ""),
            ("Relative", "/hackathons/rel"),
            ("Good", "https://x.test/good"),
        ]),
    )];
    let summary = Pipeline::new(registry, store.clone()).run().await;

    assert_eq!(summary.attempted, 5);
    assert_eq!(summary.rejected, 4);
    assert_eq!(summary.persisted, 1);
    assert_eq!(store.write_log(), vec!["https://x.test/good".to_string()]);

    let stored = &store.hackathons()[0];
    assert_eq!(stored.location, "Online");
    assert_eq!(stored.organizer, "Mixed");
    assert_eq!(stored.prizes, "See Details");
}

#[tokio::test(start_paused = true)]
async fn hanging_adapter_times_out_and_the_next_one_runs() {
    let store = Arc::new(MemoryStore::new());
    let registry = vec![
        boxed("Slow", Script::Hang),
        boxed("Fast", Script::Records(vec![("Hack", "https://fast.test/1")])),
    ];
    let summary = Pipeline::new(registry, store.clone())
        .with_timeout(Duration::from_secs(5))
        .run()
        .await;

    assert_eq!(summary.adapters[0].status, AdapterStatus::Failed);
    assert!(summary.adapters[0]
        .error
        .as_deref()
        .is_some_and(|e| e.contains("timed out")));
    assert_eq!(summary.adapters[1].status, AdapterStatus::Completed);
    assert_eq!(store.hackathons().len(), 1);
}

#[tokio::test]
async fn unreachable_upstream_fails_but_empty_page_completes() {
    let store = Arc::new(MemoryStore::new());
    let registry = vec![
        boxed("Down", Script::Unreachable),
        boxed("Quiet", Script::Records(Vec::new())),
    ];
    let summary = Pipeline::new(registry, store).run().await;

    assert_eq!(summary.adapters[0].status, AdapterStatus::Failed);
    assert_eq!(summary.adapters[0].faults.len(), 1);
    assert_eq!(summary.adapters[1].status, AdapterStatus::Completed);
    assert!(!summary.degraded());
}

#[tokio::test]
async fn all_failed_run_is_degraded_but_still_summarised() {
    let store = Arc::new(MemoryStore::new());
    let registry = vec![boxed("A", Script::Fatal), boxed("B", Script::Unreachable)];
    let summary = Pipeline::new(registry, store).run().await;

    assert!(summary.degraded());
    assert_eq!(summary.failed(), 2);
    assert!(summary.message().contains("(failed: A, B)"));
}
