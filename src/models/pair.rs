use serde::{Deserialize, Serialize};

/// Two-element key where `(a, b)` and `(b, a)` are the same value.
///
/// The elements are stored sorted, so the derived `Eq`, `Hash` and `Ord`
/// are order-independent without custom impls.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(T, T)", into = "(T, T)")]
#[serde(bound(
    serialize = "T: Ord + Clone + Serialize",
    deserialize = "T: Ord + Deserialize<'de>"
))]
pub struct UnorderedPair<T: Ord> {
    low: T,
    high: T,
}

impl<T: Ord> UnorderedPair<T> {
    pub fn new(a: T, b: T) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    /// The smaller element.
    pub fn first(&self) -> &T {
        &self.low
    }

    /// The larger element.
    pub fn second(&self) -> &T {
        &self.high
    }

    pub fn contains(&self, value: &T) -> bool {
        self.low == *value || self.high == *value
    }

    /// The element paired with `value`, if `value` is part of the pair.
    pub fn other(&self, value: &T) -> Option<&T> {
        if self.low == *value {
            Some(&self.high)
        } else if self.high == *value {
            Some(&self.low)
        } else {
            None
        }
    }
}

impl UnorderedPair<String> {
    pub fn of(a: &str, b: &str) -> Self {
        Self::new(a.to_string(), b.to_string())
    }
}

impl<T: Ord> From<(T, T)> for UnorderedPair<T> {
    fn from((a, b): (T, T)) -> Self {
        Self::new(a, b)
    }
}

impl<T: Ord> From<UnorderedPair<T>> for (T, T) {
    fn from(pair: UnorderedPair<T>) -> Self {
        (pair.low, pair.high)
    }
}

impl<T: Ord + std::fmt::Display> std::fmt::Display for UnorderedPair<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.low, self.high)
    }
}
