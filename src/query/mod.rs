pub mod ast;
pub mod compiler;
pub mod condition;
pub mod search;
pub mod sort;
