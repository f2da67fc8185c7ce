use fst::Automaton;
use levenshtein_automata::{Distance, LevenshteinAutomatonBuilder, DFA, SINK_STATE};

/// Levenshtein automaton over the term dictionary
///
/// The first `prefix_length` chars of the term must match exactly; the
/// edit distance applies to the rest.
pub struct FuzzyAutomaton {
    prefix: Vec<u8>,
    dfa: DFA,
}

/// (bytes of the prefix consumed, DFA state once past the prefix)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuzzyState {
    consumed: usize,
    dfa: u32,
}

const DEAD: usize = usize::MAX;

impl FuzzyAutomaton {
    pub fn new(term: &str, max_edits: u8, prefix_length: usize, transpositions: bool) -> Self {
        let split = term.char_indices().nth(prefix_length).map(|(i, _)| i).unwrap_or(term.len());
        let (prefix, rest) = term.split_at(split);

        let builder = LevenshteinAutomatonBuilder::new(max_edits, transpositions);
        FuzzyAutomaton {
            prefix: prefix.as_bytes().to_vec(),
            dfa: builder.build_dfa(rest),
        }
    }

    /// Check a candidate directly, outside of a dictionary walk
    pub fn matches(&self, candidate: &[u8]) -> bool {
        let mut state = self.start();
        for &byte in candidate {
            state = self.accept(&state, byte);
            if !self.can_match(&state) {
                return false;
            }
        }
        self.is_match(&state)
    }
}

impl Automaton for FuzzyAutomaton {
    type State = FuzzyState;

    fn start(&self) -> FuzzyState {
        FuzzyState { consumed: 0, dfa: self.dfa.initial_state() }
    }

    fn is_match(&self, state: &FuzzyState) -> bool {
        state.consumed == self.prefix.len() && matches!(self.dfa.distance(state.dfa), Distance::Exact(_))
    }

    fn can_match(&self, state: &FuzzyState) -> bool {
        state.consumed != DEAD && (state.consumed < self.prefix.len() || state.dfa != SINK_STATE)
    }

    fn accept(&self, state: &FuzzyState, byte: u8) -> FuzzyState {
        if state.consumed == DEAD {
            return *state;
        }
        if state.consumed < self.prefix.len() {
            return if self.prefix[state.consumed] == byte {
                FuzzyState { consumed: state.consumed + 1, dfa: state.dfa }
            } else {
                FuzzyState { consumed: DEAD, dfa: SINK_STATE }
            };
        }
        FuzzyState { consumed: state.consumed, dfa: self.dfa.transition(state.dfa, byte) }
    }
}
