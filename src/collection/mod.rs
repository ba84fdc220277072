pub mod row_collection;
pub mod uniq;
