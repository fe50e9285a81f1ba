//! Site resolution against the replica locator

use std::collections::BTreeSet;

use serde_json::Value;
use tracing::warn;

use crate::application::ports::outbound::RemoteCall;
use crate::application::services::aggregator::Aggregator;
use crate::application::services::data_services::{endpoint_url, Record};
use crate::domain::entities::SiteMap;

/// Separator between dataset and block part of a block name
const BLOCK_SEPARATOR: char = '#';

#[derive(Clone)]
pub struct SiteResolver {
    aggregator: Aggregator,
    phedex_url: String,
}

impl SiteResolver {
    pub fn new(aggregator: Aggregator, phedex_url: impl Into<String>) -> Self {
        Self {
            aggregator,
            phedex_url: phedex_url.into(),
        }
    }

    /// Distinct sites per dataset or block.
    ///
    /// An input without replicas maps to an empty set; an input whose lookup
    /// failed outright has no entry at all.
    pub async fn sites_for_each(&self, inputs: &[String]) -> SiteMap {
        let calls = inputs
            .iter()
            .map(|input| RemoteCall::get(input.clone(), self.replicas_url(input)))
            .collect();

        self.aggregator
            .process(calls)
            .await
            .into_iter()
            .filter_map(|(input, outcome)| match outcome {
                Ok(records) => Some((input, replica_nodes(&records))),
                Err(e) => {
                    warn!("Unable to locate replicas of {}: {}", input, e);
                    None
                }
            })
            .collect()
    }

    fn replicas_url(&self, input: &str) -> String {
        let key = if input.contains(BLOCK_SEPARATOR) {
            "block"
        } else {
            "dataset"
        };
        endpoint_url(&self.phedex_url, "blockReplicas", &[(key, input)])
    }
}

fn replica_nodes(records: &[Record]) -> BTreeSet<String> {
    records
        .iter()
        .filter_map(|record| record.get("phedex"))
        .filter_map(|phedex| phedex.get("block").and_then(Value::as_array))
        .flatten()
        .filter_map(|block| block.get("replica").and_then(Value::as_array))
        .flatten()
        .filter_map(|replica| replica.get("node").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::FakeRemoteCaller;
    use serde_json::json;
    use std::sync::Arc;

    const PHEDEX: &str = "http://fake/phedex/datasvc/json/prod";

    fn replicas(key: &str, value: &str) -> String {
        endpoint_url(PHEDEX, "blockReplicas", &[(key, value)])
    }

    fn replica_doc(nodes: &[&str]) -> serde_json::Value {
        let replicas: Vec<_> = nodes.iter().map(|n| json!({ "node": n })).collect();
        json!({ "phedex": { "block": [{ "name": "x", "replica": replicas }] } })
    }

    fn resolver(caller: FakeRemoteCaller) -> SiteResolver {
        SiteResolver::new(Aggregator::new(Arc::new(caller)), PHEDEX)
    }

    #[tokio::test]
    async fn test_sites_for_dataset_and_block_use_matching_query() {
        let caller = FakeRemoteCaller::new()
            .with_json(&replicas("dataset", "/A/B/RAW"), replica_doc(&["T1_A", "T2_B", "T1_A"]))
            .with_json(&replicas("block", "/A/B/RAW#1"), replica_doc(&["T2_C"]));
        let inputs = vec!["/A/B/RAW".to_string(), "/A/B/RAW#1".to_string()];

        let sites = resolver(caller).sites_for_each(&inputs).await;

        assert_eq!(sites["/A/B/RAW"].len(), 2);
        assert!(sites["/A/B/RAW"].contains("T1_A"));
        assert_eq!(
            sites["/A/B/RAW#1"].iter().cloned().collect::<Vec<_>>(),
            vec!["T2_C".to_string()]
        );
    }

    #[tokio::test]
    async fn test_sites_for_each_tolerates_partial_failure() {
        let caller = FakeRemoteCaller::new()
            .with_json(&replicas("block", "/A/B/RAW#1"), replica_doc(&["T1_A"]))
            .with_json(&replicas("block", "/A/B/RAW#2"), json!({ "phedex": { "block": [] } }))
            .with_failure(&replicas("block", "/A/B/RAW#3"));
        let blocks: Vec<String> = ["/A/B/RAW#1", "/A/B/RAW#2", "/A/B/RAW#3"]
            .iter()
            .map(|b| b.to_string())
            .collect();

        let sites = resolver(caller).sites_for_each(&blocks).await;

        assert_eq!(sites.len(), 2);
        assert!(sites["/A/B/RAW#1"].contains("T1_A"));
        assert!(sites["/A/B/RAW#2"].is_empty());
        assert!(!sites.contains_key("/A/B/RAW#3"));
    }
}
