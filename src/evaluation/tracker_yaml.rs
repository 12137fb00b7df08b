use crate::error::Result;
use crate::models::Configuration;

/// Render a configuration as the flat YAML mapping the tracker loads, one
/// `key: value` line per parameter in declaration order. String values that
/// would read back as numbers, bools or nested YAML come out quoted.
pub fn render_tracker_yaml(config: &Configuration) -> Result<String> {
    Ok(serde_yaml::to_string(config)?)
}
