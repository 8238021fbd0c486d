//! Wire labels and ordered wire sets

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Label of a single wire
///
/// Wires are addressed either by integer index or by a free-form name.
///
/// # Example
/// ```
/// use qflow_core::Wire;
///
/// let w0 = Wire::Index(0);
/// let anc = Wire::from("ancilla");
/// assert_ne!(w0, anc);
/// assert_eq!(format!("{}", w0), "0");
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum Wire {
    /// Integer-indexed wire
    Index(usize),
    /// Named wire
    Label(String),
}

impl fmt::Display for Wire {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Wire::Index(i) => write!(f, "{}", i),
            Wire::Label(s) => write!(f, "{}", s),
        }
    }
}

impl From<usize> for Wire {
    #[inline]
    fn from(index: usize) -> Self {
        Wire::Index(index)
    }
}

impl From<&str> for Wire {
    fn from(label: &str) -> Self {
        Wire::Label(label.to_string())
    }
}

impl From<String> for Wire {
    fn from(label: String) -> Self {
        Wire::Label(label)
    }
}

/// Ordered set of wires an operation or measurement acts on
///
/// Equality is order-sensitive: `[0, 1]` and `[1, 0]` are different wire sets.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Wires(SmallVec<[Wire; 2]>); // Most operations act on 1-2 wires

impl Wires {
    /// Empty wire set
    #[inline]
    pub fn empty() -> Self {
        Self(SmallVec::new())
    }

    /// Build a wire set from integer indices
    ///
    /// # Example
    /// ```
    /// use qflow_core::Wires;
    ///
    /// let wires = Wires::new([0, 1]);
    /// assert_eq!(wires.len(), 2);
    /// ```
    pub fn new(indices: impl IntoIterator<Item = usize>) -> Self {
        Self(indices.into_iter().map(Wire::Index).collect())
    }

    /// Build a wire set from arbitrary wire labels
    pub fn from_labels<I, W>(wires: I) -> Self
    where
        I: IntoIterator<Item = W>,
        W: Into<Wire>,
    {
        Self(wires.into_iter().map(Into::into).collect())
    }

    /// Number of wires
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no wires are present
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over wire labels in order
    pub fn iter(&self) -> impl Iterator<Item = &Wire> {
        self.0.iter()
    }

    /// Whether the wire is part of this set
    pub fn contains(&self, wire: &Wire) -> bool {
        self.0.contains(wire)
    }

    /// First repeated wire, if any
    pub fn first_duplicate(&self) -> Option<&Wire> {
        for i in 0..self.0.len() {
            for j in (i + 1)..self.0.len() {
                if self.0[i] == self.0[j] {
                    return Some(&self.0[i]);
                }
            }
        }
        None
    }

    /// Union preserving first-seen order
    pub fn union<'a>(sets: impl IntoIterator<Item = &'a Wires>) -> Self {
        let mut out = Wires::empty();
        for set in sets {
            for wire in set.iter() {
                if !out.contains(wire) {
                    out.0.push(wire.clone());
                }
            }
        }
        out
    }
}

impl fmt::Display for Wires {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, w) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", w)?;
        }
        write!(f, "]")
    }
}

impl FromIterator<Wire> for Wires {
    fn from_iter<I: IntoIterator<Item = Wire>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_creation() {
        assert_eq!(Wire::from(5usize), Wire::Index(5));
        assert_eq!(Wire::from("a"), Wire::Label("a".to_string()));
    }

    #[test]
    fn test_wires_order_sensitive() {
        let a = Wires::new([0, 1]);
        let b = Wires::new([1, 0]);
        assert_ne!(a, b);
        assert_eq!(a, Wires::new([0, 1]));
    }

    #[test]
    fn test_first_duplicate() {
        assert!(Wires::new([0, 1, 2]).first_duplicate().is_none());
        assert_eq!(Wires::new([0, 1, 0]).first_duplicate(), Some(&Wire::Index(0)));
    }

    #[test]
    fn test_union_keeps_first_seen_order() {
        let u = Wires::union([&Wires::new([2, 0]), &Wires::new([0, 1])]);
        assert_eq!(u, Wires::new([2, 0, 1]));
    }

    #[test]
    fn test_display() {
        let wires = Wires::from_labels([Wire::Index(0), Wire::from("aux")]);
        assert_eq!(format!("{}", wires), "[0, aux]");
    }
}
