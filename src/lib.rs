pub mod cli;
pub mod error;
pub mod evaluation;
pub mod interface;
pub mod logging;
pub mod models;
pub mod settings;
pub mod state;
pub mod tuner;

pub use error::{Result, TuneError};
pub use models::{Configuration, Outcome, Trial, Value};
