//! Common data types for pkat

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Canonical label for the aggregate population level.
pub const POPULATION_KEYWORD: &str = "pop";

/// Position of a simulation run within the population hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RunId {
    /// The aggregate population.
    Population,
    /// An individual subject, 1-based, assigned by sorted order of dataset
    /// subject ids.
    Subject(u32),
}

impl RunId {
    /// Canonical text label: `"pop"`, or `"s"` followed by the subject index
    /// zero-padded to `width` digits.
    ///
    /// The width is supplied by the caller (normally derived from the
    /// population size) rather than hardcoded, so labels stay unique and
    /// order-stable beyond 99 subjects.
    pub fn label(&self, width: usize) -> String {
        match self {
            RunId::Population => POPULATION_KEYWORD.to_string(),
            RunId::Subject(i) => format!("s{i:0width$}"),
        }
    }

    /// Parse a canonical label (`"pop"`, `"s01"`, `"s117"`, ...).
    pub fn parse(label: &str) -> Result<Self> {
        if label == POPULATION_KEYWORD {
            return Ok(RunId::Population);
        }
        let digits = label
            .strip_prefix('s')
            .filter(|d| !d.is_empty() && d.bytes().all(|b| b.is_ascii_digit()))
            .ok_or_else(|| Error::Validation(format!("malformed run label: {label:?}")))?;
        let index: u32 = digits
            .parse()
            .map_err(|_| Error::Validation(format!("run label index out of range: {label:?}")))?;
        if index == 0 {
            return Err(Error::Validation("subject indices are 1-based".to_string()));
        }
        Ok(RunId::Subject(index))
    }
}

/// An output-variable column recognized in a simulation output table:
/// the variable root name plus its hierarchical level string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputVariable {
    /// Variable root name, e.g. `C_central`.
    pub name: String,
    /// Hierarchical level, e.g. `1` (population) or `1.12` (subject 12).
    pub level: String,
}

impl OutputVariable {
    /// Convenience constructor.
    pub fn new(name: impl Into<String>, level: impl Into<String>) -> Self {
        Self { name: name.into(), level: level.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip() {
        assert_eq!(RunId::Population.label(2), "pop");
        assert_eq!(RunId::Subject(3).label(2), "s03");
        assert_eq!(RunId::Subject(117).label(3), "s117");
        assert_eq!(RunId::parse("pop").unwrap(), RunId::Population);
        assert_eq!(RunId::parse("s03").unwrap(), RunId::Subject(3));
        assert_eq!(RunId::parse("s117").unwrap(), RunId::Subject(117));
    }

    #[test]
    fn malformed_labels_rejected() {
        assert!(RunId::parse("s").is_err());
        assert!(RunId::parse("s00").is_err());
        assert!(RunId::parse("subject1").is_err());
        assert!(RunId::parse("POP").is_err());
    }
}
