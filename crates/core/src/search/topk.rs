//! Bounded top-k selection over `(row, distance)` pairs.

use std::collections::BinaryHeap;

/// The k nearest rows of one query, nearest first.
///
/// `indices[i]` and `distances[i]` describe the same row. Ordering is by
/// distance ascending, ties by row index ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopK {
    pub indices: Vec<usize>,
    pub distances: Vec<u32>,
}

impl TopK {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// `(row, distance)` pairs in rank order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.indices.iter().copied().zip(self.distances.iter().copied())
    }
}

/// Keeps the `k` smallest distances from `candidates`.
///
/// Uses a max-heap of `(distance, row)` so the worst kept candidate is always
/// on top; a newcomer replaces it only when strictly better under the
/// `(distance, row)` ordering, which makes lower rows win ties.
pub fn select_top_k<I>(candidates: I, k: usize) -> TopK
where
    I: IntoIterator<Item = (usize, u32)>,
{
    if k == 0 {
        return TopK::default();
    }

    let candidates = candidates.into_iter();
    let capacity = k.min(candidates.size_hint().0).saturating_add(1);
    let mut heap: BinaryHeap<(u32, usize)> = BinaryHeap::with_capacity(capacity);
    for (row, distance) in candidates {
        if heap.len() < k {
            heap.push((distance, row));
        } else if let Some(&worst) = heap.peek() {
            if (distance, row) < worst {
                heap.pop();
                heap.push((distance, row));
            }
        }
    }

    let sorted = heap.into_sorted_vec();
    let mut out = TopK {
        indices: Vec::with_capacity(sorted.len()),
        distances: Vec::with_capacity(sorted.len()),
    };
    for (distance, row) in sorted {
        out.indices.push(row);
        out.distances.push(distance);
    }
    out
}
