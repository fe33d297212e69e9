//! Capacity-bounded, always-sorted candidate list.
//!
//! [`RankedList`] keeps the `capacity` best items seen so far, best first.
//! Insertion is O(capacity), which beats collecting every comparison and
//! sorting at the end when a candidate tree holds thousands of files.

use std::cmp::Ordering;
use std::fmt;

use crate::ComparisonResult;

/// Default number of ranked candidates kept per query.
pub const DEFAULT_CAPACITY: usize = 10;

/// Comparator used by [`RankedList`]: `Less` means "better".
pub type Comparator<T> = fn(&T, &T) -> Ordering;

/// Bounded list ordered by a comparator, best item first.
///
/// # Examples
///
/// ```
/// use skinmatch_core::RankedList;
///
/// let mut top = RankedList::new(2, |a: &u32, b: &u32| a.cmp(b));
/// for value in [30, 10, 20, 5] {
///     top.insert(value);
/// }
/// assert_eq!(top.into_vec(), vec![5, 10]);
/// ```
#[derive(Clone)]
pub struct RankedList<T> {
    capacity: usize,
    compare: Comparator<T>,
    items: Vec<T>,
}

impl<T> RankedList<T> {
    pub fn new(capacity: usize, compare: Comparator<T>) -> Self {
        Self {
            capacity,
            compare,
            items: Vec::with_capacity(capacity),
        }
    }

    /// Inserts `item`, keeping the list ascending and bounded.
    ///
    /// Ties go in front of existing equal entries. When the list is full the
    /// item is kept only if it is strictly better than the current worst
    /// entry, which is then evicted. Returns `true` if the item was kept.
    pub fn insert(&mut self, item: T) -> bool {
        if self.capacity == 0 {
            return false;
        }

        let position = self
            .items
            .iter()
            .position(|existing| (self.compare)(existing, &item) != Ordering::Less)
            .unwrap_or(self.items.len());

        if self.items.len() < self.capacity {
            self.items.insert(position, item);
            return true;
        }

        let Some(worst) = self.items.last() else {
            return false;
        };
        if (self.compare)(&item, worst) != Ordering::Less {
            return false;
        }

        self.items.pop();
        self.items.insert(position, item);
        true
    }

    /// Folds another list into this one, replaying the entries `other` kept
    /// in the order they were inserted there.
    ///
    /// Tied entries sit newest-first, so they are replayed back to front.
    /// When neither list has evicted anything the result equals inserting
    /// every item into one list in sequence.
    pub fn merge(&mut self, other: RankedList<T>) {
        for item in other.items.into_iter().rev() {
            self.insert(item);
        }
    }

    pub fn best(&self) -> Option<&T> {
        self.items.first()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl<T: fmt::Debug> fmt::Debug for RankedList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RankedList")
            .field("capacity", &self.capacity)
            .field("items", &self.items)
            .finish()
    }
}

/// Orders successful comparisons by ascending dissimilarity.
///
/// Results without a score sort last; they never reach a ranked list through
/// bucket routing.
pub fn by_score(a: &ComparisonResult, b: &ComparisonResult) -> Ordering {
    match (a.score, b.score) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Ranked list of comparisons ordered by [`by_score`].
pub fn score_list(capacity: usize) -> RankedList<ComparisonResult> {
    RankedList::new(capacity, by_score)
}
