pub mod executor;
pub mod facets;
pub mod highlight;
pub mod matcher;
pub mod results;
pub mod topster;

pub use executor::{QueryExecutor, SearchArgs, SearchOutput};
pub use results::{Hit, SearchResults};
pub use topster::{Kv, Topster};
