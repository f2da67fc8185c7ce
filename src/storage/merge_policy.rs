use std::sync::Arc;
use crate::core::config::MergePolicyConfig;
use crate::storage::segment::Segment;

/// Decides which live segments the background merger folds together
pub trait MergePolicy: Send + Sync {
    fn should_merge(&self, segments: &[Arc<Segment>]) -> bool;

    /// Empty when nothing qualifies
    fn select_segments_to_merge(&self, segments: &[Arc<Segment>]) -> Vec<Arc<Segment>>;
}

/// Tiered merge policy over segment doc counts
pub struct TieredMergePolicy {
    pub max_segments_per_tier: usize,
    pub min_segments_to_merge: usize,
    pub max_segments_to_merge: usize,
    pub max_merged_docs: usize,
}

impl Default for TieredMergePolicy {
    fn default() -> Self {
        TieredMergePolicy::from_config(&MergePolicyConfig::default())
    }
}

impl TieredMergePolicy {
    pub fn from_config(config: &MergePolicyConfig) -> Self {
        TieredMergePolicy {
            max_segments_per_tier: config.max_segments_per_tier,
            min_segments_to_merge: config.min_segments_to_merge.max(2),
            max_segments_to_merge: config.max_segments_to_merge,
            max_merged_docs: config.max_merged_docs,
        }
    }
}

impl MergePolicy for TieredMergePolicy {
    fn should_merge(&self, segments: &[Arc<Segment>]) -> bool {
        segments.len() > self.max_segments_per_tier
    }

    fn select_segments_to_merge(&self, segments: &[Arc<Segment>]) -> Vec<Arc<Segment>> {
        let mut by_size = segments.to_vec();
        by_size.sort_by_key(|s| s.doc_count());

        let mut budget = self.max_merged_docs;
        let picked: Vec<Arc<Segment>> = by_size
            .into_iter()
            .take_while(|s| {
                let docs = s.doc_count() as usize;
                let fits = docs <= budget;
                budget = budget.saturating_sub(docs);
                fits
            })
            .take(self.max_segments_to_merge)
            .collect();

        if picked.len() >= self.min_segments_to_merge { picked } else { Vec::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Document;

    fn segment(docs: usize) -> Arc<Segment> {
        let docs: Vec<Document> = (0..docs)
            .map(|i| Document::new(format!("d{}", i), format!("d{}", i), 1))
            .collect();
        Arc::new(Segment::build(&docs).unwrap())
    }

    #[test]
    fn test_merge_triggers_past_tier_size() {
        let policy = TieredMergePolicy { max_segments_per_tier: 2, ..Default::default() };
        let segments = vec![segment(1), segment(1)];
        assert!(!policy.should_merge(&segments));
        let segments = vec![segment(1), segment(1), segment(1)];
        assert!(policy.should_merge(&segments));
    }

    #[test]
    fn test_selects_smallest_within_doc_budget() {
        let policy = TieredMergePolicy {
            max_segments_per_tier: 1,
            min_segments_to_merge: 2,
            max_segments_to_merge: 10,
            max_merged_docs: 5,
        };
        let segments = vec![segment(4), segment(1), segment(2), segment(3)];
        let selected = policy.select_segments_to_merge(&segments);
        let sizes: Vec<u32> = selected.iter().map(|s| s.doc_count()).collect();
        assert_eq!(sizes, vec![1, 2]);
    }
}
