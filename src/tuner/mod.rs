pub mod output;
pub mod search;
pub mod space;

pub use output::{write_best_json, write_csv};
pub use search::{Phase, SearchEngine, SearchOptions, SearchReport, SearchState};
pub use space::{ConfigSpace, Parameter};
