pub mod field;
pub mod options;
