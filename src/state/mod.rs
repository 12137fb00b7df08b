mod persistence;
mod replay;
mod trace;

pub use persistence::{load_trace, TraceWriter};
pub use replay::ReplayCache;
pub use trace::ResultTrace;
