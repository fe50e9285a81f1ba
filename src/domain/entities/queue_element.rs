//! Queue element entity
//!
//! A queue element is the schedulable unit produced from one request: which
//! blocks to read, where they are hosted, how much data they hold and the
//! scheduling parameters copied from the request.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Block name to the set of sites hosting a replica
pub type SiteMap = BTreeMap<String, BTreeSet<String>>;

/// Lifecycle status of a queue element
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementStatus {
    #[default]
    Available,
    Negotiating,
    Acquired,
    Running,
    Done,
    Failed,
    Canceled,
}

impl ElementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::Negotiating => "Negotiating",
            Self::Acquired => "Acquired",
            Self::Running => "Running",
            Self::Done => "Done",
            Self::Failed => "Failed",
            Self::Canceled => "Canceled",
        }
    }
}

impl std::fmt::Display for ElementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueueElement {
    pub inputs: SiteMap,
    pub parent_data: SiteMap,
    pub pileup_data: SiteMap,
    pub parent_flag: bool,
    pub number_of_lumis: u64,
    pub number_of_files: u64,
    pub number_of_events: u64,
    pub jobs: u64,
    pub open_for_new_data: bool,
    pub no_input_update: bool,
    pub no_pileup_update: bool,
    #[serde(rename = "WMSpec")]
    pub wm_spec: String,
    /// Run number to lumi sections in scope
    pub mask: BTreeMap<u64, Vec<u64>>,
    pub blowup_factor: u32,
    #[serde(rename = "ACDC")]
    pub acdc: bool,
    pub dbs: String,
    pub task_name: String,
    pub request_name: String,
    pub site_whitelist: Vec<String>,
    pub site_blacklist: Vec<String>,
    pub priority: i64,
    pub parent_queue_url: String,
    pub child_queue_url: String,
    pub percent_success: f32,
    pub percent_complete: f32,
    #[serde(rename = "WMBSUrl")]
    pub agent_url: String,
    pub files_processed: u64,
    pub status: ElementStatus,
    pub created_at: DateTime<Utc>,
}

impl QueueElement {
    /// Empty, available element for the given request
    pub fn new(request_name: impl Into<String>) -> Self {
        Self {
            inputs: SiteMap::new(),
            parent_data: SiteMap::new(),
            pileup_data: SiteMap::new(),
            parent_flag: false,
            number_of_lumis: 0,
            number_of_files: 0,
            number_of_events: 0,
            jobs: 0,
            open_for_new_data: false,
            no_input_update: false,
            no_pileup_update: false,
            wm_spec: String::new(),
            mask: BTreeMap::new(),
            blowup_factor: 1,
            acdc: false,
            dbs: String::new(),
            task_name: String::new(),
            request_name: request_name.into(),
            site_whitelist: Vec::new(),
            site_blacklist: Vec::new(),
            priority: 0,
            parent_queue_url: String::new(),
            child_queue_url: String::new(),
            percent_success: 0.0,
            percent_complete: 0.0,
            agent_url: String::new(),
            files_processed: 0,
            status: ElementStatus::Available,
            created_at: Utc::now(),
        }
    }

    /// Sites that may run this element: every site hosting any input block,
    /// restricted by the whitelist (when set) and minus the blacklist
    pub fn possible_sites(&self) -> BTreeSet<String> {
        self.inputs
            .values()
            .flatten()
            .filter(|site| self.site_whitelist.is_empty() || self.site_whitelist.contains(site))
            .filter(|site| !self.site_blacklist.contains(site))
            .cloned()
            .collect()
    }
}
