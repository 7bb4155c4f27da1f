pub mod art;
pub mod in_memory;
pub mod num_tree;
pub mod posting;

pub use art::{Art, TokenOrdering};
pub use in_memory::Index;
pub use num_tree::{float_to_int64, NumComparator, NumTree};
pub use posting::PostingContainer;
