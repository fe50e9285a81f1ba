//! Run/lumi masks for blocks
//!
//! A block is described by the files it contains and, for each file, the run
//! and lumi sections that file covers. Totals are always derived from the file
//! list so they can never drift from the data they summarise.

use serde::{Deserialize, Serialize};

/// Lumi sections (and their event counts) of a single run inside one file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLumis {
    pub run: u64,
    pub lumis: Vec<u64>,
    pub events: Vec<u64>,
}

impl RunLumis {
    pub fn new(run: u64, lumis: Vec<u64>) -> Self {
        Self {
            run,
            lumis,
            events: Vec::new(),
        }
    }

    pub fn with_events(mut self, events: Vec<u64>) -> Self {
        self.events = events;
        self
    }

    pub fn number_of_lumis(&self) -> u64 {
        self.lumis.len() as u64
    }

    pub fn number_of_events(&self) -> u64 {
        self.events.iter().sum()
    }
}

impl std::fmt::Display for RunLumis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{Run: {}, Lumis: {:?}}}", self.run, self.lumis)
    }
}

/// A logical file name with the run/lumis it covers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLumis {
    pub lfn: String,
    pub run_lumis: RunLumis,
}

impl FileLumis {
    pub fn new(lfn: impl Into<String>, run_lumis: RunLumis) -> Self {
        Self {
            lfn: lfn.into(),
            run_lumis,
        }
    }

    pub fn has_events(&self) -> bool {
        !self.run_lumis.events.is_empty()
    }
}

/// A block together with the per-file lumi mask describing its content
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskedBlock {
    pub block: String,
    pub files_lumis: Vec<FileLumis>,
}

impl MaskedBlock {
    pub fn new(block: impl Into<String>, files_lumis: Vec<FileLumis>) -> Self {
        Self {
            block: block.into(),
            files_lumis,
        }
    }

    pub fn number_of_files(&self) -> u64 {
        self.files_lumis.len() as u64
    }

    pub fn number_of_lumis(&self) -> u64 {
        self.files_lumis
            .iter()
            .map(|f| f.run_lumis.number_of_lumis())
            .sum()
    }

    pub fn number_of_events(&self) -> u64 {
        self.files_lumis
            .iter()
            .map(|f| f.run_lumis.number_of_events())
            .sum()
    }

    /// Run number to sorted, de-duplicated lumi list across every file
    pub fn run_lumi_mask(&self) -> std::collections::BTreeMap<u64, Vec<u64>> {
        let mut mask: std::collections::BTreeMap<u64, Vec<u64>> = Default::default();
        for file in &self.files_lumis {
            mask.entry(file.run_lumis.run)
                .or_default()
                .extend(file.run_lumis.lumis.iter().copied());
        }
        for lumis in mask.values_mut() {
            lumis.sort_unstable();
            lumis.dedup();
        }
        mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_lumis_display() {
        let run_lumis = RunLumis::new(123, vec![1, 2, 3]);
        assert_eq!(run_lumis.to_string(), "{Run: 123, Lumis: [1, 2, 3]}");
    }

    #[test]
    fn test_masked_block_counts() {
        let file = FileLumis::new("a.root", RunLumis::new(123, vec![1, 2, 3]));
        let block = MaskedBlock::new("/a/b/c#123", vec![file.clone(), file]);

        assert_eq!(block.number_of_files(), 2);
        // two files with three lumis each
        assert_eq!(block.number_of_lumis(), 6);
        assert_eq!(block.number_of_events(), 0);
    }

    #[test]
    fn test_masked_block_counts_follow_file_list() {
        let mut block = MaskedBlock::new(
            "/a/b/c#1",
            vec![FileLumis::new(
                "a.root",
                RunLumis::new(1, vec![10, 11]).with_events(vec![100, 50]),
            )],
        );
        assert_eq!(block.number_of_events(), 150);

        block.files_lumis.push(FileLumis::new(
            "b.root",
            RunLumis::new(2, vec![1]).with_events(vec![7]),
        ));
        assert_eq!(block.number_of_files(), 2);
        assert_eq!(block.number_of_lumis(), 3);
        assert_eq!(block.number_of_events(), 157);
    }

    #[test]
    fn test_empty_block_counts_are_zero() {
        let block = MaskedBlock::new("/a/b/c#empty", vec![]);
        assert_eq!(block.number_of_files(), 0);
        assert_eq!(block.number_of_lumis(), 0);
        assert_eq!(block.number_of_events(), 0);
    }

    #[test]
    fn test_run_lumi_mask_merges_runs() {
        let block = MaskedBlock::new(
            "/a/b/c#1",
            vec![
                FileLumis::new("a.root", RunLumis::new(1, vec![3, 1])),
                FileLumis::new("b.root", RunLumis::new(1, vec![2, 3])),
                FileLumis::new("c.root", RunLumis::new(5, vec![9])),
            ],
        );
        let mask = block.run_lumi_mask();
        assert_eq!(mask.get(&1), Some(&vec![1, 2, 3]));
        assert_eq!(mask.get(&5), Some(&vec![9]));
    }
}
