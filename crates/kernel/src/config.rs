//! Protocol files and the configuration source contract.
//!
//! A protocol is a YAML document:
//! ```text
//! simulator:
//!   chemostat: false
//! solutes: [oxygen, ammonium]
//! world:
//!   bulk: [...]
//!   computationDomain: [...]
//! ```
//! The world section is handed to [`crate::World::init`] as a [`ConfigNode`];
//! each repeatable child section is decoded by the bulk or domain it builds.

use biosim_common::SoluteDictionary;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_yaml::Value;
use std::path::Path;

use crate::context::SimContext;

/// Errors from reading or decoding configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("missing section: {0}")]
    MissingSection(&'static str),
    #[error("unknown solute '{solute}' in bulk '{bulk}'")]
    UnknownSolute { bulk: String, solute: String },
    #[error("invalid {field} in '{owner}': {reason}")]
    Invalid {
        owner: String,
        field: &'static str,
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(owner: &str, field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            owner: owner.to_string(),
            field,
            reason: reason.into(),
        }
    }
}

/// A configuration section with named, repeatable children.
///
/// Child handles are opaque to the world; only the constructor that
/// receives one decodes it.
pub trait ConfigNode: Sized {
    /// Child sections called `section`, in document order. Absent sections
    /// yield nothing.
    fn children(&self, section: &str) -> Vec<Self>;

    /// Decode this section into a typed record.
    fn decode<T: DeserializeOwned>(&self) -> Result<T, ConfigError>;
}

impl ConfigNode for Value {
    fn children(&self, section: &str) -> Vec<Self> {
        match self.get(section) {
            Some(Value::Sequence(items)) => items.clone(),
            Some(Value::Null) | None => Vec::new(),
            Some(single) => vec![single.clone()],
        }
    }

    fn decode<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        Ok(serde_yaml::from_value(self.clone())?)
    }
}

/// Scenario switches from the `simulator` section.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulatorSection {
    #[serde(default)]
    pub chemostat: bool,
}

/// A parsed protocol file.
#[derive(Debug, Clone)]
pub struct Protocol {
    pub simulator: SimulatorSection,
    pub solutes: SoluteDictionary,
    world: Value,
}

#[derive(Deserialize)]
struct RawProtocol {
    #[serde(default)]
    simulator: SimulatorSection,
    #[serde(default)]
    solutes: SoluteDictionary,
    world: Option<Value>,
}

impl Protocol {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let raw: RawProtocol = serde_yaml::from_str(text)?;
        let world = raw.world.ok_or(ConfigError::MissingSection("world"))?;
        Ok(Self {
            simulator: raw.simulator,
            solutes: raw.solutes,
            world,
        })
    }

    /// Read and parse a protocol file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        tracing::debug!(path = %path.as_ref().display(), "loaded protocol file");
        Self::from_yaml_str(&text)
    }

    /// The `world` section, ready for [`crate::World::init`].
    pub fn world_root(&self) -> &Value {
        &self.world
    }

    /// Simulation context built from the solute list and scenario switches.
    pub fn context(&self) -> SimContext {
        SimContext::new(self.solutes.clone()).with_chemostat(self.simulator.chemostat)
    }
}
