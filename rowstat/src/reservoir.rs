//! Weighted reservoir sampling (A-Res).
//!
//! Each candidate row arrives with a pre-drawn uniform weight. A bounded
//! min-heap on the weight keeps the `K` heaviest rows seen so far, which
//! for i.i.d. uniform weights is a uniform random sample of size `K`
//! without replacement. Because eviction is a stateless comparison on the
//! weight, two reservoirs merge by simply re-presenting one's items to the
//! other.

use crate::datum::Datum;

/// Storage-engine row identifier. Carried through sampling untouched so
/// consumers can relate a surviving sample back to its row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowHandle(pub i64);

/// A sampled row with its reservoir weight. `handle` is set by callers
/// that know the row's storage identity; the sampling policy never reads
/// it.
#[derive(Debug, Clone, PartialEq)]
pub struct RowSampleItem {
    pub columns: Vec<Datum>,
    pub weight: i64,
    pub handle: Option<RowHandle>,
}

/// Bounded binary min-heap on `weight`.
///
/// Items are appended unordered until the capacity is reached, heapified
/// once, and from then on a new arrival replaces the root only when it is
/// heavier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightedSampleHeap {
    items: Vec<RowSampleItem>,
    capacity: usize,
}

impl WeightedSampleHeap {
    pub fn new(capacity: usize) -> Self {
        WeightedSampleHeap {
            items: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Adopts items that are already heap-ordered (e.g. decoded from a
    /// shard's wire form). The order is trusted; see the collector's wire
    /// notes.
    pub fn from_raw(items: Vec<RowSampleItem>, capacity: usize) -> Self {
        WeightedSampleHeap { items, capacity }
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

    pub fn items(&self) -> &[RowSampleItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<RowSampleItem> {
        self.items
    }

    /// A-Res arrival: append below capacity (heapifying when the reservoir
    /// first fills), then evict the minimum-weight root for heavier items.
    pub fn push(&mut self, item: RowSampleItem) {
        if self.capacity == 0 {
            return;
        }
        if self.items.len() < self.capacity {
            self.items.push(item);
            if self.items.len() == self.capacity {
                self.heapify();
            }
            return;
        }
        if self.items[0].weight < item.weight {
            self.items[0] = item;
            self.sift_down(0);
        }
    }

    /// Re-presents every item of `other` through the arrival policy.
    pub fn merge(&mut self, other: WeightedSampleHeap) {
        for item in other.items {
            self.push(item);
        }
    }

    fn heapify(&mut self) {
        for i in (0..self.items.len() / 2).rev() {
            self.sift_down(i);
        }
    }

    fn sift_down(&mut self, mut i: usize) {
        let len = self.items.len();
        loop {
            let left = 2 * i + 1;
            let right = left + 1;
            let mut smallest = i;
            if left < len && self.items[left].weight < self.items[smallest].weight {
                smallest = left;
            }
            if right < len && self.items[right].weight < self.items[smallest].weight {
                smallest = right;
            }
            if smallest == i {
                return;
            }
            self.items.swap(i, smallest);
            i = smallest;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(weight: i64) -> RowSampleItem {
        RowSampleItem {
            columns: vec![Datum::Int(weight)],
            weight,
            handle: None,
        }
    }

    fn weights(heap: &WeightedSampleHeap) -> Vec<i64> {
        let mut w: Vec<i64> = heap.items().iter().map(|i| i.weight).collect();
        w.sort_unstable();
        w
    }

    #[test]
    fn below_capacity_keeps_everything() {
        let mut heap = WeightedSampleHeap::new(10);
        for w in [5, 3, 8] {
            heap.push(item(w));
        }
        assert_eq!(heap.len(), 3);
        assert_eq!(weights(&heap), vec![3, 5, 8]);
    }

    #[test]
    fn survivors_are_the_k_largest_weights() {
        let mut heap = WeightedSampleHeap::new(5);
        // A scrambled permutation of 1..=20; the five largest must win.
        for w in [13, 2, 19, 7, 1, 16, 4, 20, 9, 11, 3, 18, 6, 15, 8, 10, 5, 17, 12, 14] {
            heap.push(item(w));
        }
        assert_eq!(weights(&heap), vec![16, 17, 18, 19, 20]);
    }

    #[test]
    fn light_arrival_is_discarded_at_capacity() {
        let mut heap = WeightedSampleHeap::new(3);
        for w in [10, 20, 30] {
            heap.push(item(w));
        }
        heap.push(item(1));
        assert_eq!(weights(&heap), vec![10, 20, 30]);
    }

    #[test]
    fn merge_equals_single_stream() {
        let all: Vec<i64> = (0..100).map(|i| (i * 37 + 11) % 1000).collect();
        let mut merged = WeightedSampleHeap::new(7);
        let mut sub = WeightedSampleHeap::new(7);
        for (i, &w) in all.iter().enumerate() {
            if i % 2 == 0 {
                merged.push(item(w));
            } else {
                sub.push(item(w));
            }
        }
        merged.merge(sub);

        let mut single = WeightedSampleHeap::new(7);
        for &w in &all {
            single.push(item(w));
        }
        assert_eq!(weights(&merged), weights(&single));
    }

    #[test]
    fn handles_ride_along_with_their_rows() {
        let mut heap = WeightedSampleHeap::new(2);
        for w in [1i64, 9, 5] {
            heap.push(RowSampleItem {
                columns: vec![Datum::Int(w)],
                weight: w,
                handle: Some(RowHandle(w * 100)),
            });
        }
        for item in heap.items() {
            assert_eq!(item.handle, Some(RowHandle(item.weight * 100)));
        }
    }

    #[test]
    fn zero_capacity_never_panics() {
        let mut heap = WeightedSampleHeap::new(0);
        heap.push(item(1));
        assert!(heap.is_empty());
    }

    #[test]
    fn tied_weights_keep_count_stable() {
        let mut heap = WeightedSampleHeap::new(4);
        for _ in 0..20 {
            heap.push(item(42));
        }
        // Which specific items survive a tie is unspecified, but the
        // reservoir size and the weight multiset are not.
        assert_eq!(heap.len(), 4);
        assert_eq!(weights(&heap), vec![42, 42, 42, 42]);
    }
}
