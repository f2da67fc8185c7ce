use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc: u32,
    pub term_freq: u32,       // Term frequency in document
    pub positions: Vec<u32>,  // Token positions for phrase queries
}

/// Posting list for a term
/// Note: Sorted by doc for efficient merging
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingList {
    pub postings: Vec<Posting>,  // Sorted by doc
}

impl PostingList {
    pub fn new() -> Self {
        PostingList {
            postings: Vec::new(),
        }
    }

    pub fn add_posting(&mut self, posting: Posting) {
        // Docs are numbered in insertion order, so appending is the common case
        match self.postings.last() {
            Some(last) if last.doc < posting.doc => self.postings.push(posting),
            None => self.postings.push(posting),
            _ => match self.postings.binary_search_by_key(&posting.doc, |p| p.doc) {
                Ok(pos) => self.postings[pos] = posting,
                Err(pos) => self.postings.insert(pos, posting),
            },
        }
    }

    /// Record one more occurrence of the term in `doc`
    pub fn add_occurrence(&mut self, doc: u32, position: u32) {
        match self.postings.last_mut() {
            Some(last) if last.doc == doc => {
                last.term_freq += 1;
                last.positions.push(position);
            }
            _ => self.add_posting(Posting { doc, term_freq: 1, positions: vec![position] }),
        }
    }

    pub fn get(&self, doc: u32) -> Option<&Posting> {
        self.postings
            .binary_search_by_key(&doc, |p| p.doc)
            .ok()
            .map(|pos| &self.postings[pos])
    }

    pub fn len(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    pub fn doc_freq(&self) -> u32 {
        self.postings.len() as u32
    }

    pub fn total_freq(&self) -> u64 {
        self.postings.iter().map(|p| p.term_freq as u64).sum()
    }

    pub fn docs(&self) -> impl Iterator<Item = u32> + '_ {
        self.postings.iter().map(|p| p.doc)
    }

    /// Intersect two posting lists (simple linear merge)
    pub fn intersect(&self, other: &PostingList) -> Vec<u32> {
        let mut result = Vec::new();
        let mut i = 0;
        let mut j = 0;

        while i < self.postings.len() && j < other.postings.len() {
            let doc1 = self.postings[i].doc;
            let doc2 = other.postings[j].doc;

            if doc1 == doc2 {
                result.push(doc1);
                i += 1;
                j += 1;
            } else if doc1 < doc2 {
                i += 1;
            } else {
                j += 1;
            }
        }

        result
    }
}
