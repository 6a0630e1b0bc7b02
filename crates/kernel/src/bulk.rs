//! Bulk compartments: well-mixed solute reservoirs acting as sources or
//! sinks for the biofilm.

use biosim_common::SoluteIndex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::{ConfigError, ConfigNode};
use crate::context::SimContext;
use crate::world::WorldError;

/// State of one solute tracked by a bulk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BulkSolute {
    /// Current concentration.
    pub value: f64,
    /// Feed concentration entering with the dilution flow.
    pub feed: f64,
    /// Net reaction rate, written by the solvers that couple this bulk to a
    /// domain.
    pub reaction_rate: f64,
}

impl BulkSolute {
    fn new(value: f64, feed: f64) -> Self {
        Self {
            value,
            feed,
            reaction_rate: 0.0,
        }
    }
}

/// A named solute reservoir.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bulk {
    name: String,
    constant: bool,
    dilution_rate: f64,
    solutes: BTreeMap<SoluteIndex, BulkSolute>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct BulkSpec {
    name: String,
    #[serde(default)]
    is_constant: bool,
    #[serde(rename = "D", default)]
    dilution_rate: f64,
    #[serde(default)]
    solutes: Vec<BulkSoluteSpec>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct BulkSoluteSpec {
    name: String,
    #[serde(rename = "Sbulk")]
    s_bulk: f64,
    #[serde(rename = "Sin", default)]
    s_in: Option<f64>,
}

impl Bulk {
    /// An empty, non-constant bulk with no dilution.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constant: false,
            dilution_rate: 0.0,
            solutes: BTreeMap::new(),
        }
    }

    /// Build a bulk from one `bulk` configuration section.
    pub fn from_config<N: ConfigNode>(ctx: &SimContext, node: &N) -> Result<Self, ConfigError> {
        let spec: BulkSpec = node.decode()?;
        if !spec.dilution_rate.is_finite() || spec.dilution_rate < 0.0 {
            return Err(ConfigError::invalid(
                &spec.name,
                "D",
                format!("dilution rate must be finite and >= 0, got {}", spec.dilution_rate),
            ));
        }

        let mut bulk = Self::new(spec.name)
            .with_dilution_rate(spec.dilution_rate)
            .with_constant(spec.is_constant);
        for solute in spec.solutes {
            let index = ctx
                .solute_index(&solute.name)
                .ok_or_else(|| ConfigError::UnknownSolute {
                    bulk: bulk.name.clone(),
                    solute: solute.name.clone(),
                })?;
            let feed = solute.s_in.unwrap_or(solute.s_bulk);
            for (field, v) in [("Sbulk", solute.s_bulk), ("Sin", feed)] {
                if !v.is_finite() || v < 0.0 {
                    return Err(ConfigError::invalid(
                        &bulk.name,
                        field,
                        format!("concentration of {} must be finite and >= 0, got {v}", solute.name),
                    ));
                }
            }
            if bulk.solutes.contains_key(&index) {
                return Err(ConfigError::invalid(
                    &bulk.name,
                    "solutes",
                    format!("duplicate solute {}", solute.name),
                ));
            }
            bulk.solutes.insert(index, BulkSolute::new(solute.s_bulk, feed));
        }
        tracing::debug!(bulk = %bulk.name, solutes = bulk.solutes.len(), "created bulk");
        Ok(bulk)
    }

    /// Track `solute` at concentration `value`, fed at the same concentration.
    pub fn with_solute(mut self, solute: SoluteIndex, value: f64) -> Self {
        self.solutes.insert(solute, BulkSolute::new(value, value));
        self
    }

    pub fn with_dilution_rate(mut self, rate: f64) -> Self {
        self.dilution_rate = rate;
        self
    }

    pub fn with_constant(mut self, constant: bool) -> Self {
        self.constant = constant;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Exact, case-sensitive name comparison.
    pub fn name_equals(&self, name: &str) -> bool {
        self.name == name
    }

    pub fn is_constant(&self) -> bool {
        self.constant
    }

    pub fn dilution_rate(&self) -> f64 {
        self.dilution_rate
    }

    /// Whether this bulk tracks `solute`.
    pub fn contains(&self, solute: SoluteIndex) -> bool {
        self.solutes.contains_key(&solute)
    }

    /// Concentration of `solute`, if tracked.
    pub fn value(&self, solute: SoluteIndex) -> Option<f64> {
        self.solutes.get(&solute).map(|s| s.value)
    }

    /// Tracked solutes in index order.
    pub fn solutes(&self) -> impl Iterator<Item = (SoluteIndex, &BulkSolute)> {
        self.solutes.iter().map(|(i, s)| (*i, s))
    }

    /// Overwrite a tracked concentration. Returns false if `solute` is not
    /// tracked.
    pub fn set_value(&mut self, solute: SoluteIndex, value: f64) -> bool {
        match self.solutes.get_mut(&solute) {
            Some(s) => {
                s.value = value;
                true
            }
            None => false,
        }
    }

    /// Set the reaction rate for a tracked solute. Returns false if `solute`
    /// is not tracked.
    pub fn set_reaction_rate(&mut self, solute: SoluteIndex, rate: f64) -> bool {
        match self.solutes.get_mut(&solute) {
            Some(s) => {
                s.reaction_rate = rate;
                true
            }
            None => false,
        }
    }

    /// dS/dt for a tracked solute: dilution exchange plus reaction. Constant
    /// bulks never change.
    pub fn rate(&self, solute: SoluteIndex) -> Option<f64> {
        self.solutes.get(&solute).map(|s| self.rate_of(s))
    }

    fn rate_of(&self, s: &BulkSolute) -> f64 {
        if self.constant {
            0.0
        } else {
            self.dilution_rate * (s.feed - s.value) + s.reaction_rate
        }
    }

    /// A solute is changing when its rate would move it; a depleted solute
    /// with a negative rate stays clamped at zero.
    fn is_moving(&self, s: &BulkSolute) -> bool {
        let rate = self.rate_of(s);
        rate > 0.0 || (rate < 0.0 && s.value > 0.0)
    }

    /// Whether any tracked concentration would change on the next update.
    pub fn is_changing(&self) -> bool {
        self.solutes.values().any(|s| self.is_moving(s))
    }

    /// Time needed to change 100% of any tracked concentration at the
    /// current rates. A depleted solute is measured against its feed.
    /// Infinite when nothing is changing.
    pub fn time_constraint(&self) -> f64 {
        self.solutes
            .values()
            .filter(|s| self.is_moving(s))
            .filter_map(|s| {
                let scale = if s.value > 0.0 { s.value } else { s.feed };
                (scale > 0.0).then_some((scale / self.rate_of(s)).abs())
            })
            .fold(f64::INFINITY, f64::min)
    }

    /// Advance every tracked concentration by one explicit Euler step.
    /// Concentrations never drop below zero.
    pub fn update(&mut self, dt: f64) -> Result<(), WorldError> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(WorldError::InvalidTimeStep(dt));
        }
        let rates: Vec<f64> = self.solutes.values().map(|s| self.rate_of(s)).collect();
        for (s, rate) in self.solutes.values_mut().zip(rates) {
            s.value = (s.value + dt * rate).max(0.0);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biosim_common::SoluteDictionary;
    use serde_yaml::Value;

    fn ctx() -> SimContext {
        SimContext::new(["oxygen", "ammonium"].into_iter().collect::<SoluteDictionary>())
    }

    fn section(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn from_config_resolves_solute_names() {
        let node = section(
            "{name: tank, D: 0.2, solutes: [{name: ammonium, Sbulk: 3.0, Sin: 5.0}]}",
        );
        let bulk = Bulk::from_config(&ctx(), &node).unwrap();
        assert_eq!(bulk.name(), "tank");
        assert_eq!(bulk.dilution_rate(), 0.2);
        assert!(!bulk.contains(SoluteIndex(0)));
        assert_eq!(bulk.value(SoluteIndex(1)), Some(3.0));
        let (_, s) = bulk.solutes().next().unwrap();
        assert_eq!(s.feed, 5.0);
    }

    #[test]
    fn feed_defaults_to_initial_concentration() {
        let node = section("{name: tank, solutes: [{name: oxygen, Sbulk: 8.0}]}");
        let bulk = Bulk::from_config(&ctx(), &node).unwrap();
        let (_, s) = bulk.solutes().next().unwrap();
        assert_eq!(s.feed, 8.0);
    }

    #[test]
    fn unknown_solute_is_rejected() {
        let node = section("{name: tank, solutes: [{name: nitrate, Sbulk: 1.0}]}");
        let err = Bulk::from_config(&ctx(), &node).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownSolute { .. }));
    }

    #[test]
    fn negative_values_are_rejected() {
        let node = section("{name: tank, D: -1.0}");
        assert!(matches!(
            Bulk::from_config(&ctx(), &node),
            Err(ConfigError::Invalid { field: "D", .. })
        ));
        let node = section("{name: tank, solutes: [{name: oxygen, Sbulk: -2.0}]}");
        assert!(matches!(
            Bulk::from_config(&ctx(), &node),
            Err(ConfigError::Invalid { field: "Sbulk", .. })
        ));
    }

    #[test]
    fn missing_name_is_a_decode_error() {
        let node = section("{D: 0.1}");
        assert!(matches!(
            Bulk::from_config(&ctx(), &node),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn name_equality_is_exact() {
        let bulk = Bulk::new("chemostat");
        assert!(bulk.name_equals("chemostat"));
        assert!(!bulk.name_equals("Chemostat"));
        assert!(!bulk.name_equals("chemostat "));
    }

    #[test]
    fn time_constraint_is_time_to_exhaust() {
        let mut bulk = Bulk::new("a")
            .with_solute(SoluteIndex(0), 10.0)
            .with_solute(SoluteIndex(1), 4.0);
        assert_eq!(bulk.time_constraint(), f64::INFINITY);

        bulk.set_reaction_rate(SoluteIndex(0), -2.0);
        assert_eq!(bulk.time_constraint(), 5.0);
        bulk.set_reaction_rate(SoluteIndex(1), 1.0);
        assert_eq!(bulk.time_constraint(), 4.0);
    }

    #[test]
    fn dilution_drives_toward_feed() {
        let mut bulk = Bulk::new("a")
            .with_solute(SoluteIndex(0), 2.0)
            .with_dilution_rate(0.5);
        bulk.set_value(SoluteIndex(0), 4.0);
        // feed stays at 2.0
        assert_eq!(bulk.rate(SoluteIndex(0)), Some(-1.0));
        bulk.update(1.0).unwrap();
        assert_eq!(bulk.value(SoluteIndex(0)), Some(3.0));
    }

    #[test]
    fn constant_bulk_never_changes() {
        let mut bulk = Bulk::new("a")
            .with_solute(SoluteIndex(0), 1.0)
            .with_constant(true);
        bulk.set_reaction_rate(SoluteIndex(0), -5.0);
        assert_eq!(bulk.time_constraint(), f64::INFINITY);
        bulk.update(10.0).unwrap();
        assert_eq!(bulk.value(SoluteIndex(0)), Some(1.0));
    }

    #[test]
    fn update_clamps_at_zero() {
        let mut bulk = Bulk::new("a").with_solute(SoluteIndex(0), 1.0);
        bulk.set_reaction_rate(SoluteIndex(0), -3.0);
        bulk.update(1.0).unwrap();
        assert_eq!(bulk.value(SoluteIndex(0)), Some(0.0));
    }

    #[test]
    fn depleted_bulk_with_feed_is_constrained_by_feed() {
        let node = section("{name: tank, D: 0.5, solutes: [{name: oxygen, Sbulk: 0.0, Sin: 5.0}]}");
        let mut bulk = Bulk::from_config(&ctx(), &node).unwrap();
        assert_eq!(bulk.rate(SoluteIndex(0)), Some(2.5));
        assert!(bulk.is_changing());
        assert_eq!(bulk.time_constraint(), 2.0);

        bulk.update(2.0).unwrap();
        assert_eq!(bulk.value(SoluteIndex(0)), Some(5.0));
        assert!(!bulk.is_changing());
        assert_eq!(bulk.time_constraint(), f64::INFINITY);
    }

    #[test]
    fn depleted_solute_with_uptake_is_not_changing() {
        let mut bulk = Bulk::new("a").with_solute(SoluteIndex(0), 0.0);
        bulk.set_reaction_rate(SoluteIndex(0), -1.0);
        assert!(!bulk.is_changing());
        assert_eq!(bulk.time_constraint(), f64::INFINITY);
    }

    #[test]
    fn duplicate_solute_in_one_bulk_is_rejected() {
        let node = section(
            "{name: tank, solutes: [{name: oxygen, Sbulk: 1.0}, {name: oxygen, Sbulk: 2.0}]}",
        );
        assert!(matches!(
            Bulk::from_config(&ctx(), &node),
            Err(ConfigError::Invalid { field: "solutes", .. })
        ));
    }

    #[test]
    fn update_uses_the_reported_rates() {
        let mut bulk = Bulk::new("a")
            .with_solute(SoluteIndex(0), 4.0)
            .with_solute(SoluteIndex(1), 1.0)
            .with_dilution_rate(0.25);
        bulk.set_value(SoluteIndex(0), 8.0);
        bulk.set_reaction_rate(SoluteIndex(1), 0.5);
        let expected: Vec<f64> = [SoluteIndex(0), SoluteIndex(1)]
            .into_iter()
            .map(|i| bulk.value(i).unwrap() + 2.0 * bulk.rate(i).unwrap())
            .collect();
        bulk.update(2.0).unwrap();
        assert_eq!(bulk.value(SoluteIndex(0)), Some(expected[0]));
        assert_eq!(bulk.value(SoluteIndex(1)), Some(expected[1]));
    }

    #[test]
    fn update_rejects_bad_steps() {
        let mut bulk = Bulk::new("a").with_solute(SoluteIndex(0), 1.0);
        bulk.set_reaction_rate(SoluteIndex(0), -0.5);
        for dt in [-1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(bulk.update(dt), Err(WorldError::InvalidTimeStep(_))));
        }
        assert_eq!(bulk.value(SoluteIndex(0)), Some(1.0));
    }

    #[test]
    fn untracked_solute_setters_report_false() {
        let mut bulk = Bulk::new("a");
        assert!(!bulk.set_value(SoluteIndex(3), 1.0));
        assert!(!bulk.set_reaction_rate(SoluteIndex(3), 1.0));
        assert_eq!(bulk.rate(SoluteIndex(3)), None);
    }
}
