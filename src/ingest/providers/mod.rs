// src/ingest/providers/mod.rs
pub mod aicte;
pub mod curated;
pub mod hackerearth;
pub mod internshala;
pub mod linkedin;
pub mod mlh;
pub mod unstop;

use std::sync::Arc;

use crate::config::app::SourcesConfig;
use crate::ingest::fetch::Fetcher;
use crate::ingest::types::{HackathonListing, JobPosting, SourceAdapter};

/// Jobs registry in run order.
pub fn jobs_registry(
    cfg: &SourcesConfig,
    fetcher: Arc<dyn Fetcher>,
) -> Vec<Box<dyn SourceAdapter<JobPosting>>> {
    vec![
        Box::new(curated::CuratedListAdapter::new(cfg.curated_path.clone())),
        Box::new(internshala::InternshalaAdapter::new(fetcher.clone())),
        Box::new(linkedin::LinkedInAdapter::new(
            fetcher.clone(),
            linkedin::GuestQuery {
                keywords: cfg.linkedin_keywords.clone(),
                location: cfg.linkedin_location.clone(),
                geo_id: cfg.linkedin_geo_id.clone(),
            },
        )),
        Box::new(unstop::UnstopJobsAdapter::new(fetcher.clone(), cfg.unstop_per_page)),
        Box::new(aicte::AicteAdapter::new(fetcher)),
    ]
}

/// Hackathons registry in run order.
pub fn hackathons_registry(
    cfg: &SourcesConfig,
    fetcher: Arc<dyn Fetcher>,
) -> Vec<Box<dyn SourceAdapter<HackathonListing>>> {
    vec![
        Box::new(mlh::MlhAdapter::new(fetcher.clone(), &cfg.mlh_season)),
        Box::new(unstop::UnstopHackathonsAdapter::new(fetcher.clone(), cfg.unstop_per_page)),
        Box::new(hackerearth::HackerEarthAdapter::new(fetcher)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::fetch::FixtureFetcher;

    #[test]
    fn registries_keep_documented_order() {
        let cfg = SourcesConfig::default();
        let f: Arc<dyn Fetcher> = Arc::new(FixtureFetcher::new());
        let jobs: Vec<_> = jobs_registry(&cfg, f.clone()).iter().map(|a| a.name()).collect();
        assert_eq!(jobs, ["VikashPR (GitHub)", "Internshala", "LinkedIn", "Unstop", "AICTE"]);
        let hacks: Vec<_> = hackathons_registry(&cfg, f).iter().map(|a| a.name()).collect();
        assert_eq!(hacks, ["MLH", "Unstop", "HackerEarth"]);
    }
}
