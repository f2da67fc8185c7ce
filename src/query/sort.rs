use std::cmp::Ordering;
use crate::core::types::SortValue;

/// Compiled sort key over a sortable field
#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub field: String,
    pub reverse: bool,
}

/// Field sort; an empty key list means relevance order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sort {
    pub keys: Vec<SortKey>,
}

impl Sort {
    pub fn relevance() -> Self {
        Sort { keys: Vec::new() }
    }

    pub fn is_relevance(&self) -> bool {
        self.keys.is_empty()
    }

    /// Compare two docs by their values for each key, in key order
    pub fn compare(&self, a: &[Option<SortValue>], b: &[Option<SortValue>]) -> Ordering {
        for (i, key) in self.keys.iter().enumerate() {
            let left = a.get(i).and_then(Option::as_ref);
            let right = b.get(i).and_then(Option::as_ref);
            let ord = compare_values(left, right, key.reverse);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

/// Missing values order last in both directions
pub fn compare_values(a: Option<&SortValue>, b: Option<&SortValue>, reverse: bool) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => {
            let ord = a.compare(b);
            if reverse { ord.reverse() } else { ord }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
