//! Splitting hierarchical chain output into per-level sample tables.
//!
//! A posterior chain table carries columns for every hierarchical level at
//! once (`M_ka(1)`, `M_ka(1.2)`, ...). Set-points analyses need one table
//! per level with bare variable names, an `iter` index column, and
//! optionally only the trailing (converged) window of draws.

use std::collections::BTreeMap;

use pkat_core::{Error, Result, RunId};

use crate::columns::ColumnGrammar;
use crate::hierarchy::{label_width, run_id_for_level};
use crate::table::DataTable;

/// Split a chain table into per-level tables keyed by run label.
///
/// `last_n` keeps only the trailing `last_n` draws (0 = all). Columns that
/// do not parse under the chain grammar (the iteration counter, posterior
/// diagnostics) are dropped.
pub fn split_chain_table(table: &DataTable, last_n: usize) -> Result<BTreeMap<String, DataTable>> {
    let grammar = ColumnGrammar::Chain;
    let windowed = table.last_n_rows(last_n);

    // level -> [(column index, bare variable name)]
    let mut by_level: BTreeMap<String, Vec<(usize, String)>> = BTreeMap::new();
    for (idx, col) in windowed.column_names().iter().enumerate() {
        if let Some(var) = grammar.parse(col) {
            by_level.entry(var.level).or_default().push((idx, var.name));
        }
    }
    if by_level.is_empty() {
        return Err(Error::Validation(
            "no chain-convention columns found in table".to_string(),
        ));
    }

    let max_subject = by_level
        .keys()
        .map(|level| run_id_for_level(level))
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .map(|id| match id {
            RunId::Subject(i) => i as usize,
            RunId::Population => 0,
        })
        .max()
        .unwrap_or(0);
    let width = label_width(max_subject);

    let mut out = BTreeMap::new();
    for (level, picks) in by_level {
        let label = run_id_for_level(&level)?.label(width);
        if out.contains_key(&label) {
            return Err(Error::DataIntegrity(format!(
                "hierarchy level {level:?} collides with an earlier level on label {label:?}"
            )));
        }
        let sub = windowed.select_columns(&picks)?;

        let mut columns = vec!["iter".to_string()];
        columns.extend(sub.column_names().iter().cloned());
        let rows: Vec<Vec<f64>> = (0..sub.n_rows())
            .map(|r| {
                let mut row = Vec::with_capacity(sub.n_cols() + 1);
                row.push(r as f64);
                row.extend_from_slice(sub.row(r));
                row
            })
            .collect();
        out.insert(label, DataTable::new(columns, rows)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_table() -> DataTable {
        DataTable::from_tsv(
            "iter\tM_ka(1)\tM_ka(1.1)\tM_ka(1.2)\tLnPosterior\n\
             0\t1.0\t1.1\t1.2\t-3.0\n\
             1\t2.0\t2.1\t2.2\t-2.0\n\
             2\t3.0\t3.1\t3.2\t-1.0\n",
            0,
        )
        .unwrap()
    }

    #[test]
    fn one_table_per_level_with_bare_names() {
        let split = split_chain_table(&chain_table(), 0).unwrap();
        let labels: Vec<&String> = split.keys().collect();
        assert_eq!(labels, vec!["pop", "s01", "s02"]);

        let pop = &split["pop"];
        assert_eq!(pop.column_names(), &["iter", "M_ka"]);
        assert_eq!(pop.column("M_ka").unwrap(), vec![1.0, 2.0, 3.0]);
        assert_eq!(pop.column("iter").unwrap(), vec![0.0, 1.0, 2.0]);

        assert_eq!(split["s02"].column("M_ka").unwrap(), vec![1.2, 2.2, 3.2]);
    }

    #[test]
    fn tail_window_reindexes_draws() {
        let split = split_chain_table(&chain_table(), 2).unwrap();
        let s01 = &split["s01"];
        assert_eq!(s01.n_rows(), 2);
        assert_eq!(s01.column("iter").unwrap(), vec![0.0, 1.0]);
        assert_eq!(s01.column("M_ka").unwrap(), vec![2.1, 3.1]);
    }

    #[test]
    fn table_without_chain_columns_is_rejected() {
        let t = DataTable::from_tsv("iter\tx\n0\t1\n", 0).unwrap();
        assert!(split_chain_table(&t, 0).is_err());
    }

    #[test]
    fn colliding_population_levels_are_rejected() {
        // both dotless levels resolve to the population label; overwriting
        // one table with the other would lose samples silently
        let t = DataTable::from_tsv("M_ka(1)\tM_ka(2)\n1.0\t2.0\n", 0).unwrap();
        let err = split_chain_table(&t, 0).unwrap_err();
        assert!(matches!(err, Error::DataIntegrity(_)));
    }
}
