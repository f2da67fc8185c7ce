pub mod terms;
pub mod field;
pub mod json;
