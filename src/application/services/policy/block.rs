//! Block policy - One queue element per resolved input dataset
//!
//! Resolution runs in a fixed order: the dataset's blocks, their run/lumi
//! masks, the sites holding each block, the parent blocks and their sites.
//! Every step tolerates partial failure; the element carries whatever
//! resolved.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{PolicyKind, StartPolicy};
use crate::application::services::block_service::BlockResolver;
use crate::application::services::site_service::SiteResolver;
use crate::domain::entities::{QueueElement, SiteMap};
use crate::domain::value_objects::{MaskedBlock, Request, RequestConfig};

const PILEUP_KEYS: [&str; 2] = ["MCPileup", "DataPileup"];

pub struct BlockPolicy {
    blocks: BlockResolver,
    sites: SiteResolver,
}

impl BlockPolicy {
    pub fn new(blocks: BlockResolver, sites: SiteResolver) -> Self {
        Self { blocks, sites }
    }

    /// Catalog the request asked for, falling back to the configured one
    fn resolver_for(&self, request: &Request) -> BlockResolver {
        if request.dbs_url.is_empty() {
            self.blocks.clone()
        } else {
            self.blocks.with_dbs_url(request.dbs_url.clone())
        }
    }

    async fn pileup_sites(&self, config: &RequestConfig) -> SiteMap {
        let mut datasets: Vec<String> = PILEUP_KEYS
            .iter()
            .flat_map(|key| config.get_list(key))
            .collect();
        if datasets.is_empty() {
            return SiteMap::new();
        }
        datasets.sort();
        datasets.dedup();
        self.sites.sites_for_each(&datasets).await
    }
}

#[async_trait]
impl StartPolicy for BlockPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Block
    }

    fn validate(&self, request: &Request) -> bool {
        request.has_input_dataset()
    }

    async fn split(&self, request: &Request, config: &RequestConfig) -> Vec<QueueElement> {
        let resolver = self.resolver_for(request);

        let block_names = resolver.blocks_of(&request.input_dataset).await;
        if block_names.is_empty() {
            warn!(
                "No blocks resolved for {} of {}, nothing to queue",
                request.input_dataset, request.name
            );
            return Vec::new();
        }

        let masked = resolver.masked_blocks(&block_names).await;
        if masked.is_empty() {
            warn!("No block details resolved for {}, nothing to queue", request.name);
            return Vec::new();
        }
        let names: Vec<String> = masked.iter().map(|b| b.block.clone()).collect();

        let inputs = self.sites.sites_for_each(&names).await;

        let mut parents = resolver.parent_blocks_of(&names).await;
        parents.sort();
        parents.dedup();
        let parent_data = if parents.is_empty() {
            SiteMap::new()
        } else {
            self.sites.sites_for_each(&parents).await
        };

        let pileup_data = self.pileup_sites(config).await;

        let mut element = QueueElement::new(request.name.clone());
        element.number_of_files = masked.iter().map(MaskedBlock::number_of_files).sum();
        element.number_of_lumis = masked.iter().map(MaskedBlock::number_of_lumis).sum();
        element.number_of_events = masked.iter().map(MaskedBlock::number_of_events).sum();
        element.jobs = estimate_jobs(
            config,
            element.number_of_files,
            element.number_of_lumis,
            element.number_of_events,
        );
        element.mask = merged_mask(&masked);
        element.inputs = inputs;
        element.parent_flag = !parent_data.is_empty();
        element.parent_data = parent_data;
        element.pileup_data = pileup_data;
        element.open_for_new_data = config.get_bool("OpenForNewData");
        element.no_input_update = config.get_bool("NoInputUpdate");
        element.no_pileup_update = config.get_bool("NoPileupUpdate");
        element.wm_spec = request.spec_url.clone();
        element.dbs = resolver.dbs_url().to_string();
        element.task_name = match config.get_str("TaskName") {
            task if task.is_empty() => request.name.clone(),
            task => task,
        };
        element.site_whitelist = request.site_whitelist.clone();
        element.site_blacklist = request.site_blacklist.clone();
        element.priority = request.priority;

        info!(
            "{}: {} blocks, {} files, {} lumis, {} events, {} jobs",
            request.name,
            masked.len(),
            element.number_of_files,
            element.number_of_lumis,
            element.number_of_events,
            element.jobs
        );
        debug!("{} possible sites: {:?}", request.name, element.possible_sites());

        vec![element]
    }
}

/// Jobs needed for the work, by the first splitting size the config sets
fn estimate_jobs(config: &RequestConfig, files: u64, lumis: u64, events: u64) -> u64 {
    let per_job = |key: &str| u64::try_from(config.get_int(key)).unwrap_or(0);

    match (
        per_job("EventsPerJob"),
        per_job("LumisPerJob"),
        per_job("FilesPerJob"),
    ) {
        (n, _, _) if n > 0 => events.div_ceil(n),
        (_, n, _) if n > 0 => lumis.div_ceil(n),
        (_, _, n) if n > 0 => files.div_ceil(n),
        _ => files,
    }
}

fn merged_mask(blocks: &[MaskedBlock]) -> BTreeMap<u64, Vec<u64>> {
    let mut mask: BTreeMap<u64, Vec<u64>> = BTreeMap::new();
    for (run, lumis) in blocks.iter().flat_map(MaskedBlock::run_lumi_mask) {
        mask.entry(run).or_default().extend(lumis);
    }
    for lumis in mask.values_mut() {
        lumis.sort_unstable();
        lumis.dedup();
    }
    mask
}
