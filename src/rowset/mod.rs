pub mod row_set;
mod merge;
pub mod iter;
pub mod shared;
