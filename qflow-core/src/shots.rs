//! Shot specifications

use serde::{Deserialize, Serialize};
use std::fmt;

/// How many times a script is sampled
///
/// # Example
/// ```
/// use qflow_core::Shots;
///
/// assert_eq!(Shots::None.total(), None);
/// assert_eq!(Shots::Single(100).total(), Some(100));
/// assert_eq!(Shots::Vector(vec![10, 10, 5]).total(), Some(25));
/// assert!(Shots::Vector(vec![10, 20]).has_partitioned_shots());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shots {
    /// Analytic (exact) execution
    #[default]
    None,
    /// A single batch of samples
    Single(u64),
    /// Several independent batches, each producing its own result
    Vector(Vec<u64>),
}

impl Shots {
    /// Total number of samples, `None` when analytic
    pub fn total(&self) -> Option<u64> {
        match self {
            Shots::None => None,
            Shots::Single(n) => Some(*n),
            Shots::Vector(v) => Some(v.iter().sum()),
        }
    }

    /// Whether execution is analytic
    pub fn is_analytic(&self) -> bool {
        matches!(self, Shots::None)
    }

    /// Whether results are split per shot batch
    pub fn has_partitioned_shots(&self) -> bool {
        matches!(self, Shots::Vector(v) if v.len() > 1)
    }

    /// Number of result copies a device produces per measurement
    pub fn num_copies(&self) -> usize {
        match self {
            Shots::Vector(v) => v.len().max(1),
            _ => 1,
        }
    }
}

impl From<u64> for Shots {
    fn from(n: u64) -> Self {
        Shots::Single(n)
    }
}

impl From<Option<u64>> for Shots {
    fn from(n: Option<u64>) -> Self {
        n.map_or(Shots::None, Shots::Single)
    }
}

impl From<Vec<u64>> for Shots {
    fn from(v: Vec<u64>) -> Self {
        Shots::Vector(v)
    }
}

impl fmt::Display for Shots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shots::None => write!(f, "analytic"),
            Shots::Single(n) => write!(f, "{} shots", n),
            Shots::Vector(v) => write!(f, "{:?} shots", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_num_copies() {
        assert_eq!(Shots::None.num_copies(), 1);
        assert_eq!(Shots::Single(10).num_copies(), 1);
        assert_eq!(Shots::Vector(vec![1, 2, 3]).num_copies(), 3);
    }

    #[test]
    fn test_conversions() {
        assert_eq!(Shots::from(Some(5u64)), Shots::Single(5));
        assert_eq!(Shots::from(None::<u64>), Shots::None);
        assert!(Shots::from(None::<u64>).is_analytic());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Shots::Single(3)), "3 shots");
        assert_eq!(format!("{}", Shots::None), "analytic");
    }
}
