pub mod scanner;
pub mod simple;
pub mod wide;

pub use scanner::{Hit, RowScanner, ScanContext, ScanIterator};
