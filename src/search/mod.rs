pub mod automaton;
pub mod collector;
pub mod executor;
pub mod scorer;
