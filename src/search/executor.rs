use std::collections::HashMap;
use std::time::Instant;
use fst::automaton::Str;
use fst::Automaton;
use log::debug;
use rayon::prelude::*;
use regex::Regex;
use crate::core::error::Result;
use crate::core::types::StoredDocument;
use crate::index::posting::PostingList;
use crate::mvcc::snapshot::{SegmentSlot, Snapshot};
use crate::query::ast::{BoolQuery, FuzzyQuery, PhraseQuery, Query, TermQuery};
use crate::query::compiler::CompiledSearch;
use crate::search::automaton::FuzzyAutomaton;
use crate::search::collector::{ScoredDocument, SortedCollector, TopKCollector};
use crate::search::scorer::{BM25Scorer, DocStats, Scorer, TermStats};
use crate::storage::segment::Segment;

/// Matching docs of one segment with their scores
type DocSet = HashMap<u32, f32>;

type FuzzyKey = (String, u8, usize, bool);

/// Per-query state shared by every segment: collection statistics and
/// compiled patterns
struct Weights {
    total_docs: u64,
    idf: HashMap<(String, Vec<u8>), f32>,
    avg_length: HashMap<String, f32>,
    regexes: HashMap<String, Regex>,
    fuzzy: HashMap<FuzzyKey, FuzzyAutomaton>,
}

/// Executes compiled searches against one snapshot
pub struct QueryExecutor<'s> {
    snapshot: &'s Snapshot,
    scorer: BM25Scorer,
}

impl<'s> QueryExecutor<'s> {
    pub fn new(snapshot: &'s Snapshot) -> Self {
        QueryExecutor {
            snapshot,
            scorer: BM25Scorer::default(),
        }
    }

    /// Best `limit` hits, in relevance order or by the search's sort keys
    pub fn search(&self, search: &CompiledSearch, limit: usize) -> Result<Vec<ScoredDocument>> {
        let start = Instant::now();
        let weights = self.prepare(&search.query)?;

        let per_slot: Vec<Vec<ScoredDocument>> = self.snapshot.slots
            .par_iter()
            .enumerate()
            .map(|(slot, segment_slot)| self.execute_segment(&search.query, &weights, slot, segment_slot))
            .collect();

        let total: usize = per_slot.iter().map(Vec::len).sum();
        let hits = if search.sort.is_relevance() {
            let mut collector = TopKCollector::new(limit);
            for hit in per_slot.into_iter().flatten() {
                collector.collect(hit);
            }
            collector.get_results()
        } else {
            let mut collector = SortedCollector::new(&search.sort);
            for hit in per_slot.into_iter().flatten() {
                let segment = &self.snapshot.slots[hit.slot].segment;
                let values = search.sort.keys
                    .iter()
                    .map(|key| segment.sort_value(&key.field, hit.doc).cloned())
                    .collect();
                collector.collect(values, hit);
            }
            collector.get_results(limit)
        };

        debug!(
            "Search matched {} docs over {} segments, returned {} in {}ms",
            total,
            self.snapshot.slots.len(),
            hits.len(),
            start.elapsed().as_millis()
        );
        Ok(hits)
    }

    /// Number of live docs matching `query`
    pub fn count(&self, query: &Query) -> Result<usize> {
        let weights = self.prepare(query)?;
        Ok(self.snapshot.slots
            .par_iter()
            .enumerate()
            .map(|(slot, segment_slot)| self.execute_segment(query, &weights, slot, segment_slot).len())
            .sum())
    }

    pub fn document(&self, hit: &ScoredDocument) -> Option<&'s StoredDocument> {
        self.snapshot.slots.get(hit.slot)?.segment.stored(hit.doc)
    }

    fn execute_segment(&self, query: &Query, weights: &Weights, slot: usize, segment_slot: &SegmentSlot) -> Vec<ScoredDocument> {
        let docs = self.execute_query(query, weights, &segment_slot.segment);
        let mut hits: Vec<ScoredDocument> = docs
            .into_iter()
            .filter(|(doc, _)| !segment_slot.is_deleted(*doc))
            .map(|(doc, score)| ScoredDocument { slot, doc, score })
            .collect();
        hits.sort_unstable_by_key(|h| h.doc);
        hits
    }

    fn execute_query(&self, query: &Query, weights: &Weights, segment: &Segment) -> DocSet {
        match query {
            Query::Term(tq) => self.execute_term(tq, weights, segment),
            Query::Phrase(pq) => self.execute_phrase(pq, weights, segment),
            Query::Bool(bq) => self.execute_bool(bq, weights, segment),
            Query::Range(rq) => match segment.field(&rq.field) {
                Some(field) => constant_score(field.range(&rq.range), rq.boost),
                None => DocSet::new(),
            },
            Query::Prefix(pq) => match segment.field(&pq.field) {
                Some(field) => constant_score(field.search(Str::new(&pq.prefix).starts_with()), pq.boost),
                None => DocSet::new(),
            },
            Query::Regex(rq) => {
                let (Some(field), Some(regex)) = (segment.field(&rq.field), weights.regexes.get(&rq.pattern)) else {
                    return DocSet::new();
                };
                let lists = field.terms()
                    .into_iter()
                    .filter(|(term, _)| std::str::from_utf8(term).is_ok_and(|t| regex.is_match(t)))
                    .map(|(_, list)| list)
                    .collect();
                constant_score(lists, rq.boost)
            }
            Query::Fuzzy(fq) => {
                let (Some(field), Some(automaton)) = (segment.field(&fq.field), weights.fuzzy.get(&fuzzy_key(fq))) else {
                    return DocSet::new();
                };
                constant_score(field.search(automaton), fq.boost)
            }
            Query::MatchAll { boost } => (0..segment.doc_count()).map(|doc| (doc, *boost)).collect(),
            Query::MatchNone => DocSet::new(),
        }
    }

    fn execute_term(&self, query: &TermQuery, weights: &Weights, segment: &Segment) -> DocSet {
        let Some(field) = segment.field(&query.term.field) else {
            return DocSet::new();
        };
        let Some(list) = field.postings(&query.term.bytes) else {
            return DocSet::new();
        };
        let stats = TermStats {
            idf: weights.idf.get(&(query.term.field.clone(), query.term.bytes.clone())).copied().unwrap_or(0.0),
        };
        let avg = weights.avg_length.get(&query.term.field).copied().unwrap_or(1.0);

        list.postings
            .iter()
            .map(|p| {
                let doc_stats = DocStats { doc_length: field.length(p.doc) as usize, avg_doc_length: avg };
                (p.doc, self.scorer.score(p.term_freq as f32, &stats, &doc_stats) * query.boost)
            })
            .collect()
    }

    fn execute_phrase(&self, query: &PhraseQuery, weights: &Weights, segment: &Segment) -> DocSet {
        let Some(field) = segment.field(&query.field) else {
            return DocSet::new();
        };
        let mut lists: Vec<(u32, &PostingList)> = Vec::with_capacity(query.terms.len());
        for (offset, term) in &query.terms {
            match field.postings(term) {
                Some(list) => lists.push((*offset, list)),
                None => return DocSet::new(),
            }
        }
        let Some(((first_offset, first), rest)) = lists.split_first() else {
            return DocSet::new();
        };

        // Phrase idf is the sum of its terms' idfs
        let stats = TermStats {
            idf: query.terms
                .iter()
                .map(|(_, term)| weights.idf.get(&(query.field.clone(), term.clone())).copied().unwrap_or(0.0))
                .sum(),
        };
        let avg = weights.avg_length.get(&query.field).copied().unwrap_or(1.0);

        let mut docs = DocSet::new();
        'docs: for posting in &first.postings {
            let mut others = Vec::with_capacity(rest.len());
            for (offset, list) in rest {
                match list.get(posting.doc) {
                    Some(p) => others.push((*offset, p)),
                    None => continue 'docs,
                }
            }

            let occurrences = posting.positions
                .iter()
                .filter(|&&pos| {
                    let Some(base) = pos.checked_sub(*first_offset) else {
                        return false;
                    };
                    others.iter().all(|(offset, p)| p.positions.binary_search(&(base + offset)).is_ok())
                })
                .count();
            if occurrences > 0 {
                let doc_stats = DocStats { doc_length: field.length(posting.doc) as usize, avg_doc_length: avg };
                docs.insert(posting.doc, self.scorer.score(occurrences as f32, &stats, &doc_stats) * query.boost);
            }
        }
        docs
    }

    fn execute_bool(&self, query: &BoolQuery, weights: &Weights, segment: &Segment) -> DocSet {
        let mut docs: Option<DocSet> = None;

        for clause in &query.must {
            let matched = self.execute_query(clause, weights, segment);
            docs = Some(match docs {
                None => matched,
                Some(current) => intersect(current, &matched, true),
            });
        }
        for clause in &query.filter {
            let matched = self.execute_query(clause, weights, segment);
            docs = Some(match docs {
                None => matched.into_keys().map(|doc| (doc, 0.0)).collect(),
                Some(current) => intersect(current, &matched, false),
            });
        }

        let mut docs = match docs {
            Some(mut required) => {
                // Optional clauses only add to the score
                for clause in &query.should {
                    for (doc, score) in self.execute_query(clause, weights, segment) {
                        if let Some(current) = required.get_mut(&doc) {
                            *current += score;
                        }
                    }
                }
                required
            }
            None => {
                let mut union = DocSet::new();
                for clause in &query.should {
                    for (doc, score) in self.execute_query(clause, weights, segment) {
                        *union.entry(doc).or_insert(0.0) += score;
                    }
                }
                union
            }
        };

        for clause in &query.must_not {
            if docs.is_empty() {
                break;
            }
            for doc in self.execute_query(clause, weights, segment).into_keys() {
                docs.remove(&doc);
            }
        }

        if query.boost != 1.0 {
            for score in docs.values_mut() {
                *score *= query.boost;
            }
        }
        docs
    }

    /// Collect collection-wide statistics and compile patterns once per query
    fn prepare(&self, query: &Query) -> Result<Weights> {
        let mut weights = Weights {
            total_docs: self.snapshot.segments().map(|s| s.doc_count() as u64).sum(),
            idf: HashMap::new(),
            avg_length: HashMap::new(),
            regexes: HashMap::new(),
            fuzzy: HashMap::new(),
        };
        self.prepare_query(query, &mut weights)?;
        Ok(weights)
    }

    fn prepare_query(&self, query: &Query, weights: &mut Weights) -> Result<()> {
        match query {
            Query::Term(tq) => self.prepare_term(&tq.term.field, &tq.term.bytes, weights),
            Query::Phrase(pq) => {
                for (_, term) in &pq.terms {
                    self.prepare_term(&pq.field, term, weights);
                }
            }
            Query::Bool(bq) => {
                for clause in bq.must.iter().chain(&bq.should).chain(&bq.must_not).chain(&bq.filter) {
                    self.prepare_query(clause, weights)?;
                }
            }
            Query::Regex(rq) => {
                if !weights.regexes.contains_key(&rq.pattern) {
                    weights.regexes.insert(rq.pattern.clone(), Regex::new(&rq.pattern)?);
                }
            }
            Query::Fuzzy(fq) => {
                weights.fuzzy.entry(fuzzy_key(fq)).or_insert_with(|| {
                    FuzzyAutomaton::new(&fq.term, fq.max_edits, fq.prefix_length, fq.transpositions)
                });
            }
            Query::Range(_) | Query::Prefix(_) | Query::MatchAll { .. } | Query::MatchNone => {}
        }
        Ok(())
    }

    fn prepare_term(&self, field: &str, term: &[u8], weights: &mut Weights) {
        let key = (field.to_string(), term.to_vec());
        if !weights.idf.contains_key(&key) {
            let doc_freq: u64 = self.snapshot
                .segments()
                .filter_map(|s| s.field(field))
                .map(|f| f.doc_freq(term) as u64)
                .sum();
            weights.idf.insert(key, TermStats::bm25(doc_freq, weights.total_docs).idf);
        }
        if !weights.avg_length.contains_key(field) {
            let tokens: u64 = self.snapshot
                .segments()
                .filter_map(|s| s.field(field))
                .map(|f| f.total_tokens)
                .sum();
            let avg = if weights.total_docs == 0 { 1.0 } else { tokens as f32 / weights.total_docs as f32 };
            weights.avg_length.insert(field.to_string(), avg);
        }
    }
}

fn fuzzy_key(query: &FuzzyQuery) -> FuzzyKey {
    (query.term.clone(), query.max_edits, query.prefix_length, query.transpositions)
}

fn constant_score(lists: Vec<&PostingList>, boost: f32) -> DocSet {
    lists.into_iter().flat_map(PostingList::docs).map(|doc| (doc, boost)).collect()
}

/// Keep docs present in both; scores add up when `score` is set
fn intersect(current: DocSet, other: &DocSet, score: bool) -> DocSet {
    current
        .into_iter()
        .filter_map(|(doc, s)| {
            other.get(&doc).map(|o| (doc, if score { s + o } else { s }))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::core::types::{Document, FieldToken, IndexableField, SortValue};
    use crate::index::inverted::{Term, TermRange};
    use crate::mvcc::snapshot::SnapshotController;
    use crate::query::ast::{PrefixQuery, RangeQuery, RegexQuery};
    use crate::query::sort::{Sort, SortKey};

    fn text_doc(id: &str, words: &[&str], n: i64) -> Document {
        let mut doc = Document::new(id, id, 1);
        let mut body = IndexableField::new("body");
        body.tokens = words
            .iter()
            .enumerate()
            .map(|(i, w)| FieldToken { term: w.as_bytes().to_vec(), position: i as u32 })
            .collect();
        doc.add_field(body);
        let mut num = IndexableField::single_term("n", n.to_be_bytes().to_vec());
        num.sort = Some(SortValue::Long(n));
        doc.add_field(num);
        doc
    }

    fn snapshot(segments: Vec<Vec<Document>>) -> Arc<Snapshot> {
        let controller = SnapshotController::new();
        let slots = segments
            .iter()
            .map(|docs| SegmentSlot::new(Arc::new(Segment::build(docs).unwrap())))
            .collect();
        controller.publish(slots)
    }

    fn term(word: &str) -> Query {
        Query::Term(TermQuery { term: Term::text("body", word), boost: 1.0 })
    }

    fn search(snapshot: &Snapshot, query: Query, limit: usize) -> Vec<String> {
        let executor = QueryExecutor::new(snapshot);
        let hits = executor.search(&CompiledSearch { query, sort: Sort::relevance() }, limit).unwrap();
        hits.iter().map(|h| executor.document(h).unwrap().id.clone()).collect()
    }

    #[test]
    fn test_term_scores_use_stats_across_segments() {
        let snap = snapshot(vec![
            vec![text_doc("a", &["fox", "jumps"], 1)],
            vec![text_doc("b", &["fox"], 2), text_doc("c", &["dog"], 3)],
        ]);
        // Shorter field ranks higher for the same term frequency
        assert_eq!(search(&snap, term("fox"), 10), vec!["b", "a"]);
        assert!(search(&snap, term("cat"), 10).is_empty());
    }

    #[test]
    fn test_phrase_requires_adjacent_positions() {
        let snap = snapshot(vec![vec![
            text_doc("a", &["quick", "brown", "fox"], 1),
            text_doc("b", &["brown", "quick", "fox"], 2),
        ]]);
        let phrase = Query::Phrase(PhraseQuery {
            field: "body".into(),
            terms: vec![(0, b"quick".to_vec()), (1, b"brown".to_vec())],
            boost: 1.0,
        });
        assert_eq!(search(&snap, phrase, 10), vec!["a"]);
    }

    #[test]
    fn test_bool_semantics() {
        let snap = snapshot(vec![vec![
            text_doc("a", &["red", "apple"], 1),
            text_doc("b", &["green", "apple"], 2),
            text_doc("c", &["red", "car"], 3),
        ]]);

        let must = Query::Bool(BoolQuery::new().with_must(term("apple")).with_must_not(term("green")));
        assert_eq!(search(&snap, must, 10), vec!["a"]);

        let should = Query::Bool(BoolQuery::new().with_should(term("apple")).with_should(term("car")));
        assert_eq!(search(&snap, should, 10).len(), 3);

        // With a required clause, should only boosts
        let boosted = Query::Bool(BoolQuery::new().with_filter(term("red")).with_should(term("car")));
        assert_eq!(search(&snap, boosted, 10), vec!["c", "a"]);
    }

    #[test]
    fn test_multi_term_queries() {
        let snap = snapshot(vec![vec![
            text_doc("a", &["hello"], 1),
            text_doc("b", &["help"], 5),
            text_doc("c", &["world"], 9),
        ]]);

        let prefix = Query::Prefix(PrefixQuery { field: "body".into(), prefix: "hel".into(), boost: 1.0 });
        assert_eq!(search(&snap, prefix, 10), vec!["a", "b"]);

        let regex = Query::Regex(RegexQuery { field: "body".into(), pattern: "^(?:w.*)$".into(), boost: 1.0 });
        assert_eq!(search(&snap, regex, 10), vec!["c"]);

        let fuzzy = Query::Fuzzy(FuzzyQuery {
            field: "body".into(),
            term: "hallo".into(),
            max_edits: 1,
            prefix_length: 0,
            transpositions: true,
            boost: 1.0,
        });
        assert_eq!(search(&snap, fuzzy, 10), vec!["a"]);

        let range = Query::Range(RangeQuery {
            field: "n".into(),
            range: TermRange {
                lower: Some(2i64.to_be_bytes().to_vec()),
                upper: None,
                include_lower: true,
                include_upper: false,
            },
            boost: 1.0,
        });
        assert_eq!(search(&snap, range, 10), vec!["b", "c"]);
    }

    #[test]
    fn test_sorted_search_and_deletes() {
        let snap = snapshot(vec![vec![
            text_doc("a", &["x"], 3),
            text_doc("b", &["x"], 1),
            text_doc("c", &["x"], 2),
        ]]);
        let mut slots = snap.slots.clone();
        Arc::make_mut(&mut slots[0].deletes).insert(2);
        let snap = SnapshotController::new().publish(slots);

        let executor = QueryExecutor::new(&snap);
        let sort = Sort { keys: vec![SortKey { field: "n".into(), reverse: false }] };
        let hits = executor.search(&CompiledSearch { query: Query::MatchAll { boost: 1.0 }, sort }, 10).unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| executor.document(h).unwrap().id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(executor.count(&Query::MatchAll { boost: 1.0 }).unwrap(), 2);
    }
}
