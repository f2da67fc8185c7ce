use std::collections::{BTreeMap, HashMap};
use fst::{Automaton, IntoStreamer, Map, MapBuilder, Streamer};
use serde::{Deserialize, Serialize};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::FieldToken;
use crate::index::posting::{Posting, PostingList};

/// Term representation: field name plus encoded term bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Term {
    pub field: String,
    pub bytes: Vec<u8>,
}

impl Term {
    pub fn new(field: impl Into<String>, bytes: Vec<u8>) -> Self {
        Term { field: field.into(), bytes }
    }

    pub fn text(field: impl Into<String>, text: &str) -> Self {
        Term::new(field, text.as_bytes().to_vec())
    }

    pub fn as_str(&self) -> Result<&str> {
        std::str::from_utf8(&self.bytes)
            .map_err(|_| Error::new(ErrorKind::Parse, "Invalid UTF-8 in term"))
    }
}

/// Bounds of a term dictionary range, encoded bytes
#[derive(Debug, Clone, PartialEq)]
pub struct TermRange {
    pub lower: Option<Vec<u8>>,
    pub upper: Option<Vec<u8>>,
    pub include_lower: bool,
    pub include_upper: bool,
}

/// Inverted index of one field inside a segment
pub struct FieldIndex {
    pub dictionary: Map<Vec<u8>>,  // Term -> ordinal into postings
    pub postings: Vec<PostingList>,
    pub lengths: Vec<u32>,         // Tokens per doc, for length normalization
    pub total_tokens: u64,
}

/// Serialized form of a `FieldIndex`
#[derive(Debug, Serialize, Deserialize)]
pub struct FieldIndexData {
    pub dictionary: Vec<u8>,
    pub postings: Vec<PostingList>,
    pub lengths: Vec<u32>,
    pub total_tokens: u64,
}

impl FieldIndex {
    pub fn postings(&self, term: &[u8]) -> Option<&PostingList> {
        self.dictionary
            .get(term)
            .and_then(|ord| self.postings.get(ord as usize))
    }

    pub fn doc_freq(&self, term: &[u8]) -> u32 {
        self.postings(term).map(PostingList::doc_freq).unwrap_or(0)
    }

    pub fn length(&self, doc: u32) -> u32 {
        self.lengths.get(doc as usize).copied().unwrap_or(0)
    }

    pub fn term_count(&self) -> usize {
        self.postings.len()
    }

    /// Posting lists of every term accepted by the automaton
    pub fn search<A: Automaton>(&self, automaton: A) -> Vec<&PostingList> {
        let mut stream = self.dictionary.search(automaton).into_stream();
        let mut lists = Vec::new();
        while let Some((_, ord)) = stream.next() {
            if let Some(list) = self.postings.get(ord as usize) {
                lists.push(list);
            }
        }
        lists
    }

    pub fn range(&self, range: &TermRange) -> Vec<&PostingList> {
        let mut builder = self.dictionary.range();
        if let Some(lower) = &range.lower {
            builder = if range.include_lower { builder.ge(lower) } else { builder.gt(lower) };
        }
        if let Some(upper) = &range.upper {
            builder = if range.include_upper { builder.le(upper) } else { builder.lt(upper) };
        }
        let mut stream = builder.into_stream();
        let mut lists = Vec::new();
        while let Some((_, ord)) = stream.next() {
            if let Some(list) = self.postings.get(ord as usize) {
                lists.push(list);
            }
        }
        lists
    }

    /// All terms in byte order, paired with their postings
    pub fn terms(&self) -> Vec<(Vec<u8>, &PostingList)> {
        let mut stream = self.dictionary.stream();
        let mut terms = Vec::with_capacity(self.postings.len());
        while let Some((term, ord)) = stream.next() {
            if let Some(list) = self.postings.get(ord as usize) {
                terms.push((term.to_vec(), list));
            }
        }
        terms
    }

    pub fn size_bytes(&self) -> usize {
        let postings: usize = self.postings
            .iter()
            .map(|l| l.postings.iter().map(|p| 8 + 4 * p.positions.len()).sum::<usize>())
            .sum();
        self.dictionary.as_fst().as_bytes().len() + postings + 4 * self.lengths.len()
    }

    pub fn to_data(&self) -> FieldIndexData {
        FieldIndexData {
            dictionary: self.dictionary.as_fst().as_bytes().to_vec(),
            postings: self.postings.clone(),
            lengths: self.lengths.clone(),
            total_tokens: self.total_tokens,
        }
    }

    pub fn from_data(data: FieldIndexData) -> Result<Self> {
        Ok(FieldIndex {
            dictionary: Map::new(data.dictionary)?,
            postings: data.postings,
            lengths: data.lengths,
            total_tokens: data.total_tokens,
        })
    }
}

/// Inverted index structure of a segment
pub struct InvertedIndex {
    pub fields: HashMap<String, FieldIndex>,
    pub doc_count: u32,
}

impl InvertedIndex {
    pub fn field(&self, name: &str) -> Option<&FieldIndex> {
        self.fields.get(name)
    }

    pub fn search_term(&self, term: &Term) -> Option<&PostingList> {
        self.field(&term.field)?.postings(&term.bytes)
    }

    pub fn size_bytes(&self) -> usize {
        self.fields.values().map(FieldIndex::size_bytes).sum()
    }
}

#[derive(Default)]
struct FieldBuilder {
    terms: BTreeMap<Vec<u8>, PostingList>,
    lengths: Vec<u32>,
    total_tokens: u64,
    cursor: Option<(u32, u32)>,  // (doc, next position) for multi-valued fields
}

impl FieldBuilder {
    fn add_length(&mut self, doc: u32, len: u32) {
        let idx = doc as usize;
        if self.lengths.len() <= idx {
            self.lengths.resize(idx + 1, 0);
        }
        self.lengths[idx] += len;
        self.total_tokens += len as u64;
    }
}

/// Accumulates postings in memory and freezes them into FST dictionaries
#[derive(Default)]
pub struct InvertedIndexBuilder {
    fields: BTreeMap<String, FieldBuilder>,
}

impl InvertedIndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index one value of `field` for `doc`; docs must arrive in increasing order
    pub fn add_tokens(&mut self, doc: u32, field: &str, tokens: &[FieldToken]) {
        if tokens.is_empty() {
            return;
        }
        let builder = self.fields.entry(field.to_string()).or_default();

        // Later values of the same field continue after a one position gap
        let base = match builder.cursor {
            Some((d, next)) if d == doc => next + 1,
            _ => 0,
        };
        let mut max_position = base;
        for token in tokens {
            let position = base + token.position;
            max_position = max_position.max(position);
            builder.terms
                .entry(token.term.clone())
                .or_default()
                .add_occurrence(doc, position);
        }
        builder.cursor = Some((doc, max_position + 1));
        builder.add_length(doc, tokens.len() as u32);
    }

    /// Copy an existing posting, used when merging segments
    pub fn add_posting(&mut self, field: &str, term: &[u8], posting: Posting) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .terms
            .entry(term.to_vec())
            .or_default()
            .add_posting(posting);
    }

    pub fn add_length(&mut self, field: &str, doc: u32, len: u32) {
        self.fields.entry(field.to_string()).or_default().add_length(doc, len);
    }

    pub fn build(self, doc_count: u32) -> Result<InvertedIndex> {
        let mut fields = HashMap::with_capacity(self.fields.len());

        for (name, builder) in self.fields {
            let mut map_builder = MapBuilder::memory();
            let mut postings = Vec::with_capacity(builder.terms.len());
            // BTreeMap iteration is already in the byte order the FST needs
            for (ord, (term, list)) in builder.terms.into_iter().enumerate() {
                map_builder.insert(&term, ord as u64)?;
                postings.push(list);
            }
            let dictionary = Map::new(map_builder.into_inner()?)?;

            let mut lengths = builder.lengths;
            lengths.resize(doc_count as usize, 0);

            fields.insert(name, FieldIndex {
                dictionary,
                postings,
                lengths,
                total_tokens: builder.total_tokens,
            });
        }

        Ok(InvertedIndex { fields, doc_count })
    }
}
