//! Aggregator - Concurrent fan-out/fan-in over remote calls
//!
//! Every call of a round runs as its own task. Each task performs the remote
//! call, decodes the payload for the service behind the URL, and reports on a
//! completion channel. The round ends after exactly one report per call.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::application::ports::outbound::{RemoteCall, RemoteCallerPort, RemoteError, RemoteResult};
use crate::application::services::data_services::{self, Record};

/// Decoded records per call name. A failed call maps to its error, a call
/// whose payload could not be decoded maps to an empty record list.
pub type Aggregated = HashMap<String, Result<Vec<Record>, RemoteError>>;

#[derive(Clone)]
pub struct Aggregator {
    caller: Arc<dyn RemoteCallerPort>,
}

impl Aggregator {
    pub fn new(caller: Arc<dyn RemoteCallerPort>) -> Self {
        Self { caller }
    }

    pub fn caller(&self) -> &Arc<dyn RemoteCallerPort> {
        &self.caller
    }

    /// Issue every call concurrently and join the decoded results by name.
    ///
    /// Arrival order is not preserved. Calls sharing a name have their
    /// records concatenated.
    pub async fn process(&self, calls: Vec<RemoteCall>) -> Aggregated {
        let expected = calls.len();
        let mut results = Aggregated::with_capacity(expected);
        if expected == 0 {
            return results;
        }

        let started = Instant::now();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut names = Vec::with_capacity(expected);

        for call in calls {
            names.push(call.name.clone());
            let caller = self.caller.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let RemoteCall { name, url, body } = call;
                let result = caller.call(&url, body.as_deref()).await;
                let _ = tx.send((name, decode_result(&result)));
            });
        }
        // Only the tasks hold senders now, so a task that dies without
        // reporting closes the channel instead of stalling the round.
        drop(tx);

        let mut reported = 0;
        while reported < expected {
            let Some((name, outcome)) = rx.recv().await else {
                break;
            };
            reported += 1;
            merge(&mut results, name, outcome);
        }

        if reported < expected {
            warn!(
                "{} of {} remote call tasks ended without reporting",
                expected - reported,
                expected
            );
            for name in names {
                results.entry(name.clone()).or_insert_with(|| {
                    Err(RemoteError::TaskFailed(format!("no result for {}", name)))
                });
            }
        }

        debug!("Aggregated {} remote calls in {:?}", expected, started.elapsed());
        results
    }
}

fn decode_result(result: &RemoteResult) -> Result<Vec<Record>, RemoteError> {
    if let Some(error) = &result.error {
        return Err(error.clone());
    }
    match data_services::decode(&result.url, &result.data) {
        Ok(records) => Ok(records),
        Err(e) => {
            warn!("Dropping response from {}: {}", result.url, e);
            Ok(Vec::new())
        }
    }
}

fn merge(results: &mut Aggregated, name: String, outcome: Result<Vec<Record>, RemoteError>) {
    match results.get_mut(&name) {
        Some(Ok(existing)) => {
            if let Ok(records) = outcome {
                existing.extend(records);
            }
        }
        _ => {
            results.insert(name, outcome);
        }
    }
}
