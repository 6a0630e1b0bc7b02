use biosim_common::{SoluteDictionary, SoluteIndex};

/// Simulation-wide state the world and its members are built against.
#[derive(Debug, Clone, Default)]
pub struct SimContext {
    solutes: SoluteDictionary,
    chemostat: bool,
}

impl SimContext {
    pub fn new(solutes: SoluteDictionary) -> Self {
        Self {
            solutes,
            chemostat: false,
        }
    }

    pub fn with_chemostat(mut self, chemostat: bool) -> Self {
        self.chemostat = chemostat;
        self
    }

    /// True when the scenario is a chemostat; callers then expect a bulk
    /// named [`biosim_common::CHEMOSTAT_BULK`].
    pub fn is_chemostat(&self) -> bool {
        self.chemostat
    }

    pub fn solutes(&self) -> &SoluteDictionary {
        &self.solutes
    }

    pub fn solute_index(&self, name: &str) -> Option<SoluteIndex> {
        self.solutes.index_of(name)
    }
}
