//! Output-column name grammars.
//!
//! Simulation output labels hierarchical output columns in one of two
//! conventions, selected by configuration:
//!
//! - grid: `C_central_1.12` (ensemble / set-points output), where the suffix
//!   is `TOPLEVEL.SUBINDEX` with a caller-supplied top level (normally 1);
//! - chain: `C_central(1.12)` (posterior chain output), where the
//!   parenthesized level is an integer or dotted integer pair.
//!
//! Columns matching neither convention (the independent-variable column,
//! covariates) are not output variables and parse to `None`; that is not an
//! error condition.

use pkat_core::OutputVariable;

/// Column-name grammar, one variant per naming convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnGrammar {
    /// `name_TOPLEVEL.SUB`, e.g. `C_central_1.12`.
    Grid {
        /// The main hierarchical level.
        toplevel: u32,
    },
    /// `name(LEVEL)`, e.g. `M_ka(1.2)` or `M_ka(1)`.
    Chain,
}

impl ColumnGrammar {
    /// Extract `(name, level)` from a column name, or `None` for columns that
    /// are not output variables under this grammar.
    pub fn parse(&self, column: &str) -> Option<OutputVariable> {
        match *self {
            ColumnGrammar::Grid { toplevel } => parse_grid(column, toplevel),
            ColumnGrammar::Chain => parse_chain(column),
        }
    }
}

fn is_word(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn parse_grid(column: &str, toplevel: u32) -> Option<OutputVariable> {
    let sep = format!("_{toplevel}.");
    let pos = column.rfind(&sep)?;
    let name = &column[..pos];
    let sub = &column[pos + sep.len()..];
    if !is_word(name) || !is_digits(sub) {
        return None;
    }
    Some(OutputVariable::new(name, format!("{toplevel}.{sub}")))
}

fn parse_chain(column: &str) -> Option<OutputVariable> {
    let inner = column.strip_suffix(')')?;
    let open = inner.find('(')?;
    let (name, level) = (&inner[..open], &inner[open + 1..]);
    let level_ok = match level.split_once('.') {
        Some((a, b)) => is_digits(a) && is_digits(b),
        None => is_digits(level),
    };
    if !is_word(name) || !level_ok {
        return None;
    }
    Some(OutputVariable::new(name, level))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_extracts_name_and_level() {
        let g = ColumnGrammar::Grid { toplevel: 1 };
        assert_eq!(g.parse("C_central_1.12"), Some(OutputVariable::new("C_central", "1.12")));
        assert_eq!(g.parse("A_gut_1.1"), Some(OutputVariable::new("A_gut", "1.1")));
    }

    #[test]
    fn grid_ignores_non_output_columns() {
        let g = ColumnGrammar::Grid { toplevel: 1 };
        assert_eq!(g.parse("Time"), None);
        assert_eq!(g.parse("C_central"), None);
        assert_eq!(g.parse("C_central_2.1"), None);
        assert_eq!(g.parse("C_central_1."), None);
    }

    #[test]
    fn grid_respects_caller_toplevel() {
        let g = ColumnGrammar::Grid { toplevel: 2 };
        assert_eq!(g.parse("C_central_2.7"), Some(OutputVariable::new("C_central", "2.7")));
        assert_eq!(g.parse("C_central_1.7"), None);
    }

    #[test]
    fn chain_extracts_name_and_level() {
        let g = ColumnGrammar::Chain;
        assert_eq!(g.parse("M_ka(1)"), Some(OutputVariable::new("M_ka", "1")));
        assert_eq!(g.parse("M_ka(1.2)"), Some(OutputVariable::new("M_ka", "1.2")));
    }

    #[test]
    fn chain_ignores_non_output_columns() {
        let g = ColumnGrammar::Chain;
        assert_eq!(g.parse("iter"), None);
        assert_eq!(g.parse("LnPosterior"), None);
        assert_eq!(g.parse("M_ka(1.2.3)"), None);
        assert_eq!(g.parse("M_ka()"), None);
    }
}
