pub mod column;
pub mod order;
pub mod row;
