/// Scorer trait
pub trait Scorer: Send + Sync {
    fn score(&self, term_freq: f32, term_stats: &TermStats, doc_stats: &DocStats) -> f32;

    fn name(&self) -> &str;
}

/// Collection-wide statistics of one term (or the terms of a phrase)
#[derive(Debug, Clone, Copy)]
pub struct TermStats {
    pub idf: f32,
}

impl TermStats {
    /// BM25 idf, never negative
    pub fn bm25(doc_freq: u64, total_docs: u64) -> Self {
        let n = total_docs as f32;
        let df = doc_freq as f32;
        TermStats {
            idf: (1.0 + (n - df + 0.5) / (df + 0.5)).ln(),
        }
    }
}

/// Document statistics for scoring
#[derive(Debug, Clone)]
pub struct DocStats {
    pub doc_length: usize,    // Number of tokens in the field of the document
    pub avg_doc_length: f32,  // Average field length in the collection
}

/// BM25 Scorer
pub struct BM25Scorer {
    pub k1: f32,  // Term frequency saturation (default: 1.2)
    pub b: f32,   // Length normalization strength (default: 0.75)
}

impl Default for BM25Scorer {
    fn default() -> Self {
        BM25Scorer {
            k1: 1.2,
            b: 0.75,
        }
    }
}

impl Scorer for BM25Scorer {
    fn score(&self, term_freq: f32, term_stats: &TermStats, doc_stats: &DocStats) -> f32 {
        let doc_len = doc_stats.doc_length as f32;
        let avg_doc_len = if doc_stats.avg_doc_length > 0.0 { doc_stats.avg_doc_length } else { 1.0 };

        // BM25 formula
        let numerator = term_stats.idf * term_freq * (self.k1 + 1.0);
        let denominator = term_freq + self.k1 * (1.0 - self.b + self.b * (doc_len / avg_doc_len));

        numerator / denominator
    }

    fn name(&self) -> &str {
        "bm25"
    }
}
