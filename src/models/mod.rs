mod configuration;
mod trial;
mod value;

pub use configuration::Configuration;
pub use trial::{Outcome, Trial};
pub use value::{Value, ValueKind};
