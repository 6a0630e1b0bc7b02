use biosim_common::SoluteIndex;
use serde::Serialize;
use std::fmt;

use crate::bulk::Bulk;
use crate::config::{ConfigError, ConfigNode};
use crate::context::SimContext;
use crate::domain::Domain;

/// Errors from world construction and queries.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("world has no bulks to derive a time constraint from")]
    NoBulks,
    #[error("duplicate bulk name: {0}")]
    DuplicateBulk(String),
    #[error("duplicate domain name: {0}")]
    DuplicateDomain(String),
    #[error("time step must be finite and >= 0, got {0}")]
    InvalidTimeStep(f64),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// The two construction phases of [`World::init`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InitPhase {
    Bulks,
    Domains,
}

impl fmt::Display for InitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitPhase::Bulks => f.write_str("while creating bulks"),
            InitPhase::Domains => f.write_str("while creating domains"),
        }
    }
}

/// A construction failure that ended one phase of [`World::init`].
#[derive(Debug)]
pub struct InitDiagnostic {
    pub phase: InitPhase,
    pub error: WorldError,
}

impl fmt::Display for InitDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "World::init {}: {}", self.phase, self.error)
    }
}

/// Outcome of [`World::init`]. Empty when everything was built.
#[derive(Debug, Default)]
pub struct InitReport {
    pub diagnostics: Vec<InitDiagnostic>,
}

impl InitReport {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Whether `phase` stopped on an error.
    pub fn failed(&self, phase: InitPhase) -> bool {
        self.diagnostics.iter().any(|d| d.phase == phase)
    }
}

/// The two most recent global bulk time constraints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BulkTimeHistory {
    pub current: f64,
    pub previous: f64,
}

/// Registry of every bulk and computation domain in a simulation.
///
/// Both lists keep configuration order. Lookups are by exact name; the
/// first bulk seeds the global time constraint.
#[derive(Debug, Clone, Default)]
pub struct World {
    domains: Vec<Domain>,
    bulks: Vec<Bulk>,
    bulk_time: BulkTimeHistory,
}

impl World {
    /// Create an empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a world and populate it from `root`.
    pub fn from_config<N: ConfigNode>(ctx: &SimContext, root: &N) -> (Self, InitReport) {
        let mut world = Self::new();
        let report = world.init(ctx, root);
        (world, report)
    }

    /// Build one bulk per `bulk` section and one domain per
    /// `computationDomain` section, in document order.
    ///
    /// The two phases are independent: a failure stops the phase it occurs
    /// in, keeps whatever that phase built so far, and is logged and
    /// returned in the report. The other phase still runs.
    pub fn init<N: ConfigNode>(&mut self, ctx: &SimContext, root: &N) -> InitReport {
        let _span = tracing::info_span!("world_init").entered();
        let mut report = InitReport::default();

        if let Err(error) = self.create_bulks(ctx, root) {
            report.diagnostics.push(InitDiagnostic {
                phase: InitPhase::Bulks,
                error,
            });
        }
        if let Err(error) = self.create_domains(ctx, root) {
            report.diagnostics.push(InitDiagnostic {
                phase: InitPhase::Domains,
                error,
            });
        }
        for diag in &report.diagnostics {
            tracing::error!(phase = ?diag.phase, error = %diag.error, "World::init {}", diag.phase);
        }

        tracing::info!(
            bulks = self.bulks.len(),
            domains = self.domains.len(),
            "world initialised"
        );
        report
    }

    fn create_bulks<N: ConfigNode>(&mut self, ctx: &SimContext, root: &N) -> Result<(), WorldError> {
        for section in root.children("bulk") {
            self.add_bulk(Bulk::from_config(ctx, &section)?)?;
        }
        Ok(())
    }

    fn create_domains<N: ConfigNode>(
        &mut self,
        ctx: &SimContext,
        root: &N,
    ) -> Result<(), WorldError> {
        for section in root.children("computationDomain") {
            self.add_domain(Domain::from_config(ctx, &section)?)?;
        }
        Ok(())
    }

    /// Register a bulk. Names must be unique.
    pub fn add_bulk(&mut self, bulk: Bulk) -> Result<(), WorldError> {
        if self.contains_bulk(bulk.name()) {
            return Err(WorldError::DuplicateBulk(bulk.name().to_string()));
        }
        self.bulks.push(bulk);
        Ok(())
    }

    /// Register a domain. Names must be unique.
    pub fn add_domain(&mut self, domain: Domain) -> Result<(), WorldError> {
        if self.domains.iter().any(|d| d.name() == domain.name()) {
            return Err(WorldError::DuplicateDomain(domain.name().to_string()));
        }
        self.domains.push(domain);
        Ok(())
    }

    /// All domains in configuration order.
    pub fn domains(&self) -> &[Domain] {
        &self.domains
    }

    /// All bulks in configuration order.
    pub fn bulks(&self) -> &[Bulk] {
        &self.bulks
    }

    /// Find a domain by exact name. A miss is logged.
    ///
    /// Used to link solute grids to the region they cover.
    pub fn get_domain(&self, name: &str) -> Option<&Domain> {
        let found = self.domains.iter().find(|d| d.name() == name);
        if found.is_none() {
            tracing::info!("World::get_domain found no domain called {name}");
        }
        found
    }

    /// Find a bulk by exact name. A miss is logged.
    pub fn get_bulk(&self, name: &str) -> Option<&Bulk> {
        let found = self.bulks.iter().find(|b| b.name_equals(name));
        if found.is_none() {
            tracing::info!("World::get_bulk found no bulk called {name}");
        }
        found
    }

    /// Mutable access for the solvers that update a bulk. A miss is logged.
    pub fn bulk_mut(&mut self, name: &str) -> Option<&mut Bulk> {
        let found = self.bulks.iter_mut().find(|b| b.name_equals(name));
        if found.is_none() {
            tracing::info!("World::bulk_mut found no bulk called {name}");
        }
        found
    }

    /// Whether a bulk called `name` exists. Never logs.
    pub fn contains_bulk(&self, name: &str) -> bool {
        self.bulks.iter().any(|b| b.name_equals(name))
    }

    /// Largest time step that keeps every bulk's explicit update stable:
    /// the minimum over all bulks' own constraints.
    ///
    /// The previous result moves into [`BulkTimeHistory::previous`]. Fails
    /// with [`WorldError::NoBulks`] on an empty world, leaving the history
    /// untouched.
    pub fn bulk_time_constraint(&mut self) -> Result<f64, WorldError> {
        let first = self.bulks.first().ok_or(WorldError::NoBulks)?;
        self.bulk_time.previous = self.bulk_time.current;
        let mut current = first.time_constraint();
        for bulk in &self.bulks {
            let t = bulk.time_constraint();
            // ties keep the value already held
            if t < current {
                current = t;
            }
        }
        self.bulk_time.current = current;
        Ok(current)
    }

    /// Current and previous results of [`World::bulk_time_constraint`].
    pub fn bulk_time_history(&self) -> BulkTimeHistory {
        self.bulk_time
    }

    /// Concentration of `solute` in each bulk, in bulk order. Bulks that do
    /// not track it contribute 0.0, so the length always equals the bulk
    /// count.
    pub fn all_bulk_values(&self, solute: SoluteIndex) -> Vec<f64> {
        self.bulks
            .iter()
            .map(|b| b.value(solute).unwrap_or(0.0))
            .collect()
    }

    /// Highest concentration of `solute` over all bulks; 0.0 when there are
    /// no bulks.
    pub fn max_bulk_value(&self, solute: SoluteIndex) -> f64 {
        self.all_bulk_values(solute)
            .into_iter()
            .reduce(f64::max)
            .unwrap_or(0.0)
    }

    /// Whether any bulk would change on the next update.
    pub fn bulks_changing(&self) -> bool {
        self.bulks.iter().any(Bulk::is_changing)
    }

    /// Advance every bulk by `dt`. A rejected step leaves every bulk as it
    /// was.
    pub fn update_bulks(&mut self, dt: f64) -> Result<(), WorldError> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(WorldError::InvalidTimeStep(dt));
        }
        for bulk in &mut self.bulks {
            bulk.update(dt)?;
        }
        Ok(())
    }
}
