pub mod row_index;
pub mod searcher;
pub mod status;

pub use row_index::{IndexDefinition, RowIndex};
pub use searcher::RowSearcher;
pub use status::IndexStatus;
