pub mod arena;
pub mod blob;
