//! Block resolution against the dataset catalog
//!
//! Resolves a dataset into its blocks, each block into its per-file run/lumi
//! mask, and blocks into their declared parents. Per-block lookups are fanned
//! out through the [`Aggregator`] in one round.

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::application::ports::outbound::RemoteCall;
use crate::application::services::aggregator::Aggregator;
use crate::application::services::data_services::{self, endpoint_url, Record};
use crate::domain::value_objects::{FileLumis, MaskedBlock, RunLumis};

#[derive(Clone)]
pub struct BlockResolver {
    aggregator: Aggregator,
    dbs_url: String,
}

impl BlockResolver {
    pub fn new(aggregator: Aggregator, dbs_url: impl Into<String>) -> Self {
        Self {
            aggregator,
            dbs_url: dbs_url.into(),
        }
    }

    /// Same resolver pointed at another catalog instance
    pub fn with_dbs_url(&self, dbs_url: impl Into<String>) -> Self {
        Self {
            aggregator: self.aggregator.clone(),
            dbs_url: dbs_url.into(),
        }
    }

    pub fn dbs_url(&self) -> &str {
        &self.dbs_url
    }

    /// Block names of a dataset
    pub async fn blocks_of(&self, dataset: &str) -> Vec<String> {
        let url = endpoint_url(&self.dbs_url, "blocks", &[("dataset", dataset)]);
        let result = self.aggregator.caller().call(&url, None).await;
        if let Some(e) = &result.error {
            warn!("Unable to list blocks of {}: {}", dataset, e);
            return Vec::new();
        }
        let records = match data_services::decode(&result.url, &result.data) {
            Ok(records) => records,
            Err(e) => {
                warn!("Unable to decode block listing of {}: {}", dataset, e);
                return Vec::new();
            }
        };
        records
            .iter()
            .filter_map(|record| record.get("block_name").and_then(Value::as_str))
            .map(str::to_string)
            .collect()
    }

    /// Run/lumi masks of the given blocks, in input order.
    ///
    /// Blocks whose detail lookup failed are left out. When the catalog omits
    /// per-file event counts, the block's event total from its file summary is
    /// used for every file lacking a count; summaries are fetched in one extra
    /// round for all such blocks together.
    pub async fn masked_blocks(&self, blocks: &[String]) -> Vec<MaskedBlock> {
        let calls = blocks
            .iter()
            .map(|block| {
                RemoteCall::get(
                    block.clone(),
                    endpoint_url(&self.dbs_url, "filelumis", &[("block_name", block)]),
                )
            })
            .collect();
        let mut details = self.aggregator.process(calls).await;

        let mut masked = Vec::with_capacity(blocks.len());
        let mut missing_events: HashSet<String> = HashSet::new();
        for block in blocks {
            let records = match details.remove(block) {
                Some(Ok(records)) => records,
                Some(Err(e)) => {
                    warn!("Skipping block {}: {}", block, e);
                    continue;
                }
                // already consumed by a duplicate entry in `blocks`
                None => continue,
            };
            let files: Vec<FileLumis> = records.iter().map(file_lumis).collect();
            if files.iter().any(|file| !file.has_events()) {
                missing_events.insert(block.clone());
            }
            masked.push(MaskedBlock::new(block.clone(), files));
        }

        if !missing_events.is_empty() {
            let totals = self.block_event_totals(missing_events).await;
            for block in masked.iter_mut() {
                let Some(total) = totals.get(&block.block) else {
                    continue;
                };
                for file in block.files_lumis.iter_mut().filter(|f| !f.has_events()) {
                    file.run_lumis.events = vec![*total];
                }
            }
        }

        debug!("Resolved {} masked blocks out of {}", masked.len(), blocks.len());
        masked
    }

    /// Parent block names of every given block, flattened without de-duplication
    pub async fn parent_blocks_of(&self, blocks: &[String]) -> Vec<String> {
        let calls = blocks
            .iter()
            .map(|block| {
                RemoteCall::get(
                    block.clone(),
                    endpoint_url(&self.dbs_url, "blockparents", &[("block_name", block)]),
                )
            })
            .collect();
        let mut results = self.aggregator.process(calls).await;

        let mut parents = Vec::new();
        for block in blocks {
            match results.remove(block) {
                Some(Ok(records)) => parents.extend(
                    records
                        .iter()
                        .filter_map(|r| r.get("parent_block_name").and_then(Value::as_str))
                        .map(str::to_string),
                ),
                Some(Err(e)) => warn!("Unable to fetch parents of {}: {}", block, e),
                None => {}
            }
        }
        parents
    }

    async fn block_event_totals(&self, blocks: HashSet<String>) -> HashMap<String, u64> {
        info!(
            "Catalog returned files without event counts for {} blocks, fetching summaries",
            blocks.len()
        );
        let calls = blocks
            .iter()
            .map(|block| {
                RemoteCall::get(
                    block.clone(),
                    endpoint_url(&self.dbs_url, "filesummaries", &[("block_name", block)]),
                )
            })
            .collect();

        self.aggregator
            .process(calls)
            .await
            .into_iter()
            .filter_map(|(block, outcome)| match outcome {
                Ok(records) => {
                    let total = records
                        .iter()
                        .map(|r| r.get("num_event").map(u64_value).unwrap_or(0))
                        .sum();
                    Some((block, total))
                }
                Err(e) => {
                    warn!("Unable to fetch file summary of {}: {}", block, e);
                    None
                }
            })
            .collect()
    }
}

fn file_lumis(record: &Record) -> FileLumis {
    let lfn = record
        .get("logical_file_name")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let run = record.get("run_num").map(u64_value).unwrap_or(0);
    let lumis = record.get("lumi_section_num").map(u64_list).unwrap_or_default();
    let events = record.get("event_count").map(u64_list).unwrap_or_default();
    FileLumis::new(lfn, RunLumis::new(run, lumis).with_events(events))
}

fn u64_value(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n.as_u64().unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn u64_list(value: &Value) -> Vec<u64> {
    match value {
        Value::Array(items) => items.iter().map(u64_value).collect(),
        Value::Null => Vec::new(),
        scalar => vec![u64_value(scalar)],
    }
}
