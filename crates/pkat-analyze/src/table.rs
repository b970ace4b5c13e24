//! In-memory delimited tables.
//!
//! The engine accepts already-loaded text rather than file paths, so the
//! surrounding collaborators own all I/O and fixtures can be injected in
//! tests. Tables are dense f64 matrices with named columns; the
//! independent-variable column (`Time`) is explicit for forward/ensemble
//! output and implicit (row index) for chain-sample output.

use pkat_core::{Error, Result};

/// Dense numeric table with named columns, row-major storage.
#[derive(Debug, Clone, PartialEq)]
pub struct DataTable {
    columns: Vec<String>,
    values: Vec<f64>,
    n_rows: usize,
}

impl DataTable {
    /// Build a table from column names and rows. Every row must match the
    /// header width.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
        let n_cols = columns.len();
        if n_cols == 0 {
            return Err(Error::Validation("table must have at least one column".to_string()));
        }
        let mut values = Vec::with_capacity(rows.len() * n_cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n_cols {
                return Err(Error::Validation(format!(
                    "row {} has {} fields, expected {}",
                    i,
                    row.len(),
                    n_cols
                )));
            }
            values.extend_from_slice(row);
        }
        let n_rows = rows.len();
        Ok(Self { columns, values, n_rows })
    }

    /// Parse tab-delimited text: `skip_lines` leading lines are discarded,
    /// then a header row, then numeric data rows. Blank lines are ignored.
    pub fn from_tsv(text: &str, skip_lines: usize) -> Result<Self> {
        let mut lines = text.lines().skip(skip_lines).filter(|l| !l.trim().is_empty());
        let header = lines
            .next()
            .ok_or_else(|| Error::Validation("table text has no header row".to_string()))?;
        let columns: Vec<String> =
            header.split('\t').map(|c| c.trim_end_matches('\r').trim().to_string()).collect();
        let n_cols = columns.len();

        let mut values = Vec::new();
        let mut n_rows = 0usize;
        for (lineno, line) in lines.enumerate() {
            let fields: Vec<&str> = line.split('\t').map(|f| f.trim_end_matches('\r')).collect();
            if fields.len() != n_cols {
                return Err(Error::Validation(format!(
                    "data row {} has {} fields, expected {}",
                    lineno + 1,
                    fields.len(),
                    n_cols
                )));
            }
            for f in fields {
                let v: f64 = f.trim().parse().map_err(|_| {
                    Error::Validation(format!(
                        "non-numeric field {:?} in data row {}",
                        f,
                        lineno + 1
                    ))
                })?;
                values.push(v);
            }
            n_rows += 1;
        }
        Ok(Self { columns, values, n_rows })
    }

    /// Number of data rows.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of columns.
    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// Column names in table order.
    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    /// Index of a named column.
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| Error::KeyNotFound(format!("column {name:?}")))
    }

    /// Copy of a column by position.
    pub fn column_at(&self, idx: usize) -> Vec<f64> {
        let n_cols = self.n_cols();
        (0..self.n_rows).map(|r| self.values[r * n_cols + idx]).collect()
    }

    /// Copy of a named column.
    pub fn column(&self, name: &str) -> Result<Vec<f64>> {
        Ok(self.column_at(self.column_index(name)?))
    }

    /// Row as a slice.
    pub fn row(&self, i: usize) -> &[f64] {
        let n_cols = self.n_cols();
        &self.values[i * n_cols..(i + 1) * n_cols]
    }

    /// New table keeping only the trailing `n` rows (all rows if `n == 0` or
    /// `n >= n_rows`). Used to window chain samples to the converged tail.
    pub fn last_n_rows(&self, n: usize) -> DataTable {
        if n == 0 || n >= self.n_rows {
            return self.clone();
        }
        let n_cols = self.n_cols();
        let start = (self.n_rows - n) * n_cols;
        DataTable {
            columns: self.columns.clone(),
            values: self.values[start..].to_vec(),
            n_rows: n,
        }
    }

    /// New table from a subset of columns, each given as (source index, new
    /// name).
    pub fn select_columns(&self, picks: &[(usize, String)]) -> Result<DataTable> {
        let n_cols = self.n_cols();
        for &(idx, _) in picks {
            if idx >= n_cols {
                return Err(Error::Validation(format!(
                    "column index {idx} out of range (table has {n_cols} columns)"
                )));
            }
        }
        let columns: Vec<String> = picks.iter().map(|(_, name)| name.clone()).collect();
        let mut values = Vec::with_capacity(self.n_rows * picks.len());
        for r in 0..self.n_rows {
            let row = self.row(r);
            for &(idx, _) in picks {
                values.push(row[idx]);
            }
        }
        Ok(DataTable { columns, values, n_rows: self.n_rows })
    }

    /// Flat tab-delimited rendition (header + rows) for the persistence
    /// collaborator.
    pub fn to_tsv(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.columns.join("\t"));
        out.push('\n');
        for r in 0..self.n_rows {
            let row: Vec<String> = self.row(r).iter().map(|v| v.to_string()).collect();
            out.push_str(&row.join("\t"));
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_and_rows() {
        let text = "Time\tC_central_1.1\tC_central_1.2\n0\t1.5\t2.5\n1\t0.5\t1.25\n";
        let t = DataTable::from_tsv(text, 0).unwrap();
        assert_eq!(t.n_rows(), 2);
        assert_eq!(t.n_cols(), 3);
        assert_eq!(t.column("Time").unwrap(), vec![0.0, 1.0]);
        assert_eq!(t.column("C_central_1.2").unwrap(), vec![2.5, 1.25]);
    }

    #[test]
    fn skips_leading_comment_lines() {
        let text = "Results of simulation\n\nTime\tC\n0\t1\n";
        let t = DataTable::from_tsv(text, 2).unwrap();
        assert_eq!(t.column_names(), &["Time", "C"]);
        assert_eq!(t.n_rows(), 1);
    }

    #[test]
    fn rejects_ragged_rows() {
        let text = "a\tb\n1\t2\n3\n";
        assert!(DataTable::from_tsv(text, 0).is_err());
    }

    #[test]
    fn unknown_column_is_key_not_found() {
        let t = DataTable::from_tsv("a\tb\n1\t2\n", 0).unwrap();
        assert!(matches!(t.column("c"), Err(Error::KeyNotFound(_))));
    }

    #[test]
    fn tsv_round_trip() {
        let t = DataTable::new(
            vec!["x".into(), "y".into()],
            vec![vec![1.0, 2.0], vec![3.0, 4.5]],
        )
        .unwrap();
        let back = DataTable::from_tsv(&t.to_tsv(), 0).unwrap();
        assert_eq!(t, back);
    }

    #[test]
    fn last_n_rows_windows_the_tail() {
        let t = DataTable::new(
            vec!["x".into()],
            vec![vec![1.0], vec![2.0], vec![3.0], vec![4.0]],
        )
        .unwrap();
        assert_eq!(t.last_n_rows(2).column("x").unwrap(), vec![3.0, 4.0]);
        assert_eq!(t.last_n_rows(0).n_rows(), 4);
        assert_eq!(t.last_n_rows(10).n_rows(), 4);
    }
}
