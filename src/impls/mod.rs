pub mod cache;
pub mod tokener;
