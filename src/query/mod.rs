pub mod cache;
pub mod filter;
pub mod params;
pub mod sort;

pub use filter::{Filter, FilterComparator};
pub use params::SearchParams;
pub use sort::SortBy;
