pub mod value;
pub mod table;
pub mod row;
pub mod filter;
pub mod reader;
