//! Hierarchical identifier reconciliation.
//!
//! Simulation output is labeled by position in the population hierarchy
//! (`1` = population, `1.12` = subject 12) while observed data is keyed by
//! opaque dataset subject ids. The [`IdentifierMap`] ties the two together;
//! it is built once per dataset and read-only thereafter.
//!
//! Determinism matters here: results from independently generated output
//! files are later joined by run label, so the subject-index assignment must
//! depend only on the set of dataset ids, never on file read order.

use std::collections::BTreeMap;

use pkat_core::{Error, Result, RunId, POPULATION_KEYWORD};

/// Label width needed for `n_subjects` distinct zero-padded subject labels,
/// with the historical minimum of two digits.
pub fn label_width(n_subjects: usize) -> usize {
    let digits = n_subjects.max(1).ilog10() as usize + 1;
    digits.max(2)
}

/// Map a hierarchical level string onto a run id: no dot means the
/// population, otherwise the post-dot component is the 1-based subject index.
pub fn run_id_for_level(level: &str) -> Result<RunId> {
    match level.split_once('.') {
        None => Ok(RunId::Population),
        Some((_, sub)) => {
            let index: u32 = sub
                .parse()
                .map_err(|_| Error::Validation(format!("malformed level: {level:?}")))?;
            if index == 0 {
                return Err(Error::Validation(format!(
                    "subject indices are 1-based, got level {level:?}"
                )));
            }
            Ok(RunId::Subject(index))
        }
    }
}

/// Extract a run label (`s##` or `pop`) embedded in an output-file stem,
/// e.g. `posterior_s03.out` -> `s03`. Returns `None` when no label is
/// present.
pub fn extract_run_label(file_name: &str) -> Option<String> {
    for token in file_name.split('_') {
        let token = token.split('.').next().unwrap_or(token);
        if token == POPULATION_KEYWORD {
            return Some(token.to_string());
        }
        if let Some(digits) = token.strip_prefix('s') {
            if digits.len() >= 2 && digits.bytes().all(|b| b.is_ascii_digit()) {
                return Some(token.to_string());
            }
        }
    }
    None
}

/// Bidirectional mapping between canonical run labels and dataset subject
/// ids. Immutable once built; lookups never default on a miss.
#[derive(Debug, Clone)]
pub struct IdentifierMap {
    width: usize,
    run_to_data: BTreeMap<String, String>,
    data_to_run: BTreeMap<String, String>,
}

impl IdentifierMap {
    /// Build the map from the dataset subject ids: ids are sorted ascending
    /// (lexicographic) and assigned `s01..sNN` in that order, plus the
    /// `pop -> pop` sentinel. Label width is derived from the population
    /// size so labels stay unique beyond 99 subjects.
    pub fn from_subject_ids<I, S>(ids: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut data_ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        data_ids.sort();
        if let Some(dup) = data_ids.windows(2).find(|w| w[0] == w[1]) {
            return Err(Error::DataIntegrity(format!("duplicate dataset subject id {:?}", dup[0])));
        }
        if data_ids.iter().any(|id| id == POPULATION_KEYWORD) {
            return Err(Error::Validation(format!(
                "{POPULATION_KEYWORD:?} is reserved for the population sentinel"
            )));
        }

        let width = label_width(data_ids.len());
        let mut run_to_data = BTreeMap::new();
        let mut data_to_run = BTreeMap::new();
        for (i, data_id) in data_ids.into_iter().enumerate() {
            let label = RunId::Subject(i as u32 + 1).label(width);
            data_to_run.insert(data_id.clone(), label.clone());
            run_to_data.insert(label, data_id);
        }
        run_to_data.insert(POPULATION_KEYWORD.to_string(), POPULATION_KEYWORD.to_string());
        data_to_run.insert(POPULATION_KEYWORD.to_string(), POPULATION_KEYWORD.to_string());
        Ok(Self { width, run_to_data, data_to_run })
    }

    /// Zero-pad width used for subject labels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of subjects (excluding the population sentinel).
    pub fn n_subjects(&self) -> usize {
        self.run_to_data.len() - 1
    }

    /// Dataset subject id for a run label.
    pub fn data_id(&self, run_label: &str) -> Result<&str> {
        self.run_to_data
            .get(run_label)
            .map(String::as_str)
            .ok_or_else(|| Error::KeyNotFound(format!("run label {run_label:?}")))
    }

    /// Run label for a dataset subject id.
    pub fn run_label(&self, data_id: &str) -> Result<&str> {
        self.data_to_run
            .get(data_id)
            .map(String::as_str)
            .ok_or_else(|| Error::KeyNotFound(format!("dataset subject id {data_id:?}")))
    }

    /// Run labels in sorted order (population sentinel included).
    pub fn run_labels(&self) -> impl Iterator<Item = &str> {
        self.run_to_data.keys().map(String::as_str)
    }

    /// Canonical label for a hierarchical level string under this map's
    /// width, e.g. `"1.12" -> "s12"`.
    pub fn label_for_level(&self, level: &str) -> Result<String> {
        Ok(run_id_for_level(level)?.label(self.width))
    }
}
