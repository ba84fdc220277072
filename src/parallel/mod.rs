pub mod executor;
pub(crate) mod quicksort;
