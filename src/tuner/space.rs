use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use strsim::jaro_winkler;

use crate::error::{Result, TuneError};
use crate::models::{Configuration, Value, ValueKind};

/// Similarity above which a misspelled parameter name gets a suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.7;

/// A tunable parameter with an ordered, finite domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Parameter {
    pub name: String,
    pub domain: Vec<Value>,
    pub default: Value,
}

impl Parameter {
    pub fn new(name: impl Into<String>, domain: Vec<Value>, default: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            domain,
            default: default.into(),
        }
    }

    pub fn floats(name: &str, domain: &[f64], default: f64) -> Self {
        Self::new(name, domain.iter().map(|&v| Value::Float(v)).collect(), default)
    }

    pub fn ints(name: &str, domain: &[i64], default: i64) -> Self {
        Self::new(name, domain.iter().map(|&v| Value::Int(v)).collect(), default)
    }

    pub fn bools(name: &str, default: bool) -> Self {
        Self::new(name, vec![Value::Bool(false), Value::Bool(true)], default)
    }

    pub fn strings(name: &str, domain: &[&str], default: &str) -> Self {
        Self::new(name, domain.iter().map(|&v| Value::from(v)).collect(), default)
    }

    /// Tag shared by every value in the domain. Only meaningful after
    /// [`ConfigSpace::declare`] has accepted the parameter.
    pub fn kind(&self) -> ValueKind {
        self.default.kind()
    }

    fn check(&self) -> std::result::Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("parameter name is empty".to_string());
        }
        let first = self
            .domain
            .first()
            .ok_or_else(|| format!("'{}' has an empty domain", self.name))?;

        let kind = first.kind();
        for value in &self.domain {
            if value.kind() != kind {
                return Err(format!(
                    "'{}' mixes {} and {} values (write whole floats as 1.0)",
                    self.name,
                    kind,
                    value.kind()
                ));
            }
            if !value.is_finite() {
                return Err(format!("'{}' has a non-finite value {}", self.name, value));
            }
        }

        for (i, value) in self.domain.iter().enumerate() {
            if self.domain[..i].contains(value) {
                return Err(format!("'{}' lists {} twice", self.name, value));
            }
        }

        if !self.domain.contains(&self.default) {
            return Err(format!(
                "'{}' default {} is not in its domain",
                self.name, self.default
            ));
        }
        Ok(())
    }
}

/// The validated set of tunable parameters, in search order.
#[derive(Debug, Clone)]
pub struct ConfigSpace {
    parameters: Vec<Parameter>,
}

/// On-disk shape of a space declaration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SpaceDeclaration {
    parameters: Vec<Parameter>,
}

impl ConfigSpace {
    /// Validate and freeze a list of parameters. Declaration order becomes the
    /// iteration order.
    pub fn declare(parameters: Vec<Parameter>) -> Result<Self> {
        if parameters.is_empty() {
            return Err(TuneError::InvalidSpace("no parameters declared".to_string()));
        }

        let mut seen = HashSet::new();
        for parameter in &parameters {
            parameter.check().map_err(TuneError::InvalidSpace)?;
            if !seen.insert(parameter.name.as_str()) {
                return Err(TuneError::InvalidSpace(format!(
                    "parameter '{}' declared twice",
                    parameter.name
                )));
            }
        }

        Ok(Self { parameters })
    }

    /// The tracker parameters swept by the original tuning runs.
    pub fn tracker_default() -> Self {
        let grid = [0.0, 0.2, 0.4, 0.6, 0.8, 1.0];
        let parameters = vec![
            Parameter::strings("tracker_type", &["bytetrack", "botsort"], "bytetrack"),
            Parameter::floats("track_high_thresh", &grid, 0.4),
            Parameter::floats("track_low_thresh", &grid, 0.2),
            Parameter::floats("new_track_thresh", &grid, 0.6),
            Parameter::ints("track_buffer", &[10, 20, 30, 40, 50, 60], 30),
            Parameter::floats("match_thresh", &grid, 0.6),
            Parameter::bools("fuse_score", true),
            Parameter::strings(
                "gmc_method",
                &["orb", "sift", "ecc", "sparseOptFlow", "None"],
                "orb",
            ),
            Parameter::floats("proximity_thresh", &grid, 0.2),
            Parameter::floats("appearance_thresh", &grid, 0.4),
            Parameter::bools("with_reid", true),
        ];
        Self { parameters }
    }

    /// Load a JSON space declaration.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            return Err(TuneError::Config(format!(
                "space declaration {} should have a .json extension",
                path.display()
            )));
        }
        let content = fs::read_to_string(path).map_err(|e| {
            TuneError::Config(format!("cannot read space declaration {}: {}", path.display(), e))
        })?;
        let declaration: SpaceDeclaration = serde_json::from_str(&content).map_err(|e| {
            TuneError::Config(format!("malformed space declaration {}: {}", path.display(), e))
        })?;
        Self::declare(declaration.parameters)
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Parameters in the order the search visits them.
    pub fn iteration_order(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter()
    }

    /// Configuration made of every parameter's default.
    pub fn default_configuration(&self) -> Configuration {
        Configuration::from_entries(
            self.parameters
                .iter()
                .map(|p| (p.name.clone(), p.default.clone()))
                .collect(),
        )
    }

    /// Upper bound on evaluations for one full sweep, baseline included.
    pub fn max_evaluations(&self) -> usize {
        1 + self.parameters.iter().map(|p| p.domain.len()).sum::<usize>()
    }

    /// Check a configuration from outside (e.g. an old trace) against this
    /// space, returning it re-ordered to declaration order.
    pub fn conform(&self, raw: &Configuration) -> std::result::Result<Configuration, String> {
        for name in raw.names() {
            if self.parameter(name).is_none() {
                return Err(match self.suggest(name) {
                    Some(known) => format!("unknown parameter '{}' (did you mean '{}'?)", name, known),
                    None => format!("unknown parameter '{}'", name),
                });
            }
        }

        let mut entries = Vec::with_capacity(self.parameters.len());
        for parameter in &self.parameters {
            let value = raw
                .get(&parameter.name)
                .ok_or_else(|| format!("missing parameter '{}'", parameter.name))?;
            if value.kind() != parameter.kind() {
                return Err(format!(
                    "'{}' holds a {} but the space declares {}",
                    parameter.name,
                    value.kind(),
                    parameter.kind()
                ));
            }
            if !parameter.domain.contains(value) {
                return Err(format!(
                    "'{}' = {} is no longer in its domain",
                    parameter.name, value
                ));
            }
            entries.push((parameter.name.clone(), value.clone()));
        }
        Ok(Configuration::from_entries(entries))
    }

    fn suggest(&self, name: &str) -> Option<&str> {
        let lower = name.to_lowercase();
        self.parameters
            .iter()
            .map(|p| (p.name.as_str(), jaro_winkler(&p.name.to_lowercase(), &lower)))
            .filter(|(_, score)| *score > SUGGESTION_THRESHOLD)
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(known, _)| known)
    }
}
