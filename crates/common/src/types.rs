use serde::{Deserialize, Serialize};
use std::fmt;

/// Name a bulk must carry when the scenario is a chemostat.
///
/// The chemostat bulk is looked up by this name regardless of how the
/// computation domains are named.
pub const CHEMOSTAT_BULK: &str = "chemostat";

/// Position of a solute in the simulation-wide solute dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SoluteIndex(pub usize);

impl fmt::Display for SoluteIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Ordered solute names. A solute's index is its position in the list.
///
/// Deserializes from a list of names; repeated names keep their first index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct SoluteDictionary {
    names: Vec<String>,
}

impl SoluteDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a solute and return its index. Registering an existing name
    /// returns the index it already has.
    pub fn register(&mut self, name: impl Into<String>) -> SoluteIndex {
        let name = name.into();
        if let Some(index) = self.index_of(&name) {
            return index;
        }
        self.names.push(name);
        SoluteIndex(self.names.len() - 1)
    }

    /// Look up a solute by exact name.
    pub fn index_of(&self, name: &str) -> Option<SoluteIndex> {
        self.names.iter().position(|n| n == name).map(SoluteIndex)
    }

    pub fn name(&self, index: SoluteIndex) -> Option<&str> {
        self.names.get(index.0).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// All indices in dictionary order.
    pub fn indices(&self) -> impl Iterator<Item = SoluteIndex> + '_ {
        (0..self.names.len()).map(SoluteIndex)
    }
}

impl<S: Into<String>> FromIterator<S> for SoluteDictionary {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut dict = Self::new();
        for name in iter {
            dict.register(name);
        }
        dict
    }
}

impl From<Vec<String>> for SoluteDictionary {
    fn from(names: Vec<String>) -> Self {
        names.into_iter().collect()
    }
}

impl From<SoluteDictionary> for Vec<String> {
    fn from(dict: SoluteDictionary) -> Self {
        dict.names
    }
}
