//! Long-format ("tidy") reshaping of wide result matrices.
//!
//! Wide matrices (rows = draws or subjects, columns = time or parameter)
//! are melted into `(identifier, measure, time, value)` records for the
//! plotting and persistence collaborators. The composite key must stay
//! unique per frame: a duplicate key means upstream data corruption and is
//! reported, never silently overwritten.

use std::collections::BTreeSet;

use pkat_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// One long-format record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TidyRecord {
    /// Run identifier (`pop`, `s01`, ...).
    pub ident: String,
    /// Measure name (output variable or PK parameter).
    pub measure: String,
    /// Time point (or parameter index for time-free measures).
    pub time: f64,
    /// Value at the composite key.
    pub value: f64,
}

/// A collection of tidy records with composite-key uniqueness enforcement.
#[derive(Debug, Clone, Default)]
pub struct TidyFrame {
    records: Vec<TidyRecord>,
    // key set uses the bit pattern of `time` so exact duplicates collide
    keys: BTreeSet<(String, String, u64)>,
}

impl TidyFrame {
    /// Empty frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one record; a duplicate `(ident, measure, time)` key is a
    /// data-integrity defect.
    pub fn push(&mut self, record: TidyRecord) -> Result<()> {
        let key = (record.ident.clone(), record.measure.clone(), record.time.to_bits());
        if !self.keys.insert(key) {
            return Err(Error::DataIntegrity(format!(
                "duplicate tidy key ({}, {}, {})",
                record.ident, record.measure, record.time
            )));
        }
        self.records.push(record);
        Ok(())
    }

    /// Melt one wide series (one identifier, one measure) into the frame.
    pub fn push_series(
        &mut self,
        ident: &str,
        measure: &str,
        times: &[f64],
        values: &[f64],
    ) -> Result<()> {
        if times.len() != values.len() {
            return Err(Error::Validation(format!(
                "time/value length mismatch: {} vs {}",
                times.len(),
                values.len()
            )));
        }
        for (&t, &v) in times.iter().zip(values.iter()) {
            self.push(TidyRecord {
                ident: ident.to_string(),
                measure: measure.to_string(),
                time: t,
                value: v,
            })?;
        }
        Ok(())
    }

    /// Records in insertion order.
    pub fn records(&self) -> &[TidyRecord] {
        &self.records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the frame is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sort records by composite key, making output independent of the
    /// order units were computed in.
    pub fn sort_by_key(&mut self) {
        self.records.sort_by(|a, b| {
            (&a.ident, &a.measure)
                .cmp(&(&b.ident, &b.measure))
                .then(a.time.total_cmp(&b.time))
        });
    }

    /// Pivot back to wide form for one measure: sorted row identifiers,
    /// sorted time grid, and the value matrix (NaN where a combination is
    /// absent).
    pub fn pivot_wide(&self, measure: &str) -> (Vec<String>, Vec<f64>, Vec<Vec<f64>>) {
        let mut idents = BTreeSet::new();
        let mut time_bits = BTreeSet::new();
        for r in self.records.iter().filter(|r| r.measure == measure) {
            idents.insert(r.ident.clone());
            time_bits.insert(r.time.to_bits());
        }
        let idents: Vec<String> = idents.into_iter().collect();
        let mut times: Vec<f64> = time_bits.into_iter().map(f64::from_bits).collect();
        times.sort_by(f64::total_cmp);

        let mut matrix = vec![vec![f64::NAN; times.len()]; idents.len()];
        for r in self.records.iter().filter(|r| r.measure == measure) {
            if let (Ok(i), Ok(j)) = (
                idents.binary_search(&r.ident),
                times.binary_search_by(|t| t.total_cmp(&r.time)),
            ) {
                matrix[i][j] = r.value;
            }
        }
        (idents, times, matrix)
    }

    /// Flat tab-delimited rendition for the persistence collaborator.
    pub fn to_tsv(&self) -> String {
        let mut out = String::from("ident\tmeasure\ttime\tvalue\n");
        for r in &self.records {
            out.push_str(&format!("{}\t{}\t{}\t{}\n", r.ident, r.measure, r.time, r.value));
        }
        out
    }
}
