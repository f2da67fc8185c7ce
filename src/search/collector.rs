use std::cmp::Ordering;
use std::collections::BinaryHeap;
use crate::core::types::SortValue;
use crate::query::sort::Sort;

/// A matching document with its relevance score
///
/// `slot` is the position of the segment in the snapshot, `doc` the
/// segment-local doc number.
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub slot: usize,
    pub doc: u32,
    pub score: f32,
}

impl ScoredDocument {
    /// Higher score first, then index order
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other.score
            .total_cmp(&self.score)
            .then_with(|| (self.slot, self.doc).cmp(&(other.slot, other.doc)))
    }
}

// Ordered by rank, so the heap top is the worst kept hit
impl PartialEq for ScoredDocument {
    fn eq(&self, other: &Self) -> bool {
        self.rank_cmp(other) == Ordering::Equal
    }
}

impl Eq for ScoredDocument {}

impl PartialOrd for ScoredDocument {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoredDocument {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank_cmp(other)
    }
}

/// Top-K collector for relevance ordered results
pub struct TopKCollector {
    heap: BinaryHeap<ScoredDocument>,
    k: usize,
    pub total_collected: usize,  // Track total documents processed
}

impl TopKCollector {
    pub fn new(k: usize) -> Self {
        TopKCollector {
            heap: BinaryHeap::with_capacity(k.saturating_add(1).min(4096)),
            k,
            total_collected: 0,
        }
    }

    pub fn collect(&mut self, scored_doc: ScoredDocument) {
        self.total_collected += 1;
        if self.k == 0 {
            return;
        }

        if self.heap.len() < self.k {
            self.heap.push(scored_doc);
        } else if let Some(worst) = self.heap.peek() {
            if scored_doc.rank_cmp(worst) == Ordering::Less {
                self.heap.pop();
                self.heap.push(scored_doc);
            }
        }
    }

    pub fn max_score(&self) -> f32 {
        self.heap.iter().map(|d| d.score).fold(0.0, f32::max)
    }

    /// Best hit first
    pub fn get_results(self) -> Vec<ScoredDocument> {
        self.heap.into_sorted_vec()
    }
}

/// Collects every hit with its sort values, orders them once at the end
pub struct SortedCollector<'s> {
    sort: &'s Sort,
    hits: Vec<(Vec<Option<SortValue>>, ScoredDocument)>,
}

impl<'s> SortedCollector<'s> {
    pub fn new(sort: &'s Sort) -> Self {
        SortedCollector { sort, hits: Vec::new() }
    }

    pub fn collect(&mut self, values: Vec<Option<SortValue>>, scored_doc: ScoredDocument) {
        self.hits.push((values, scored_doc));
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Sort keys first; ties fall back to relevance, then index order
    pub fn get_results(mut self, limit: usize) -> Vec<ScoredDocument> {
        let sort = self.sort;
        self.hits.sort_by(|(va, a), (vb, b)| sort.compare(va, vb).then_with(|| a.rank_cmp(b)));
        self.hits.truncate(limit);
        self.hits.into_iter().map(|(_, doc)| doc).collect()
    }
}
