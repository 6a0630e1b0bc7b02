//! Computation domains: the spatial regions a biofilm grows in.
//!
//! The kernel only names and sizes a domain. Grids and diffusion solvers
//! that live on it are built elsewhere and find it by name.

use glam::{DVec3, UVec3};
use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, ConfigNode};
use crate::context::SimContext;

/// A named spatial region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Domain {
    name: String,
    /// Grid size in cells along I, J, K.
    grid: UVec3,
    /// Side length of one grid cell.
    resolution: f64,
    /// Bulk this domain exchanges solutes with, by name.
    bulk: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct DomainSpec {
    name: String,
    resolution: f64,
    #[serde(rename = "nI")]
    n_i: u32,
    #[serde(rename = "nJ")]
    n_j: u32,
    #[serde(rename = "nK", default = "one")]
    n_k: u32,
    #[serde(default)]
    bulk: Option<String>,
}

fn one() -> u32 {
    1
}

impl Domain {
    pub fn new(name: impl Into<String>, grid: UVec3, resolution: f64) -> Result<Self, ConfigError> {
        let name = name.into();
        if grid.min_element() == 0 {
            return Err(ConfigError::invalid(
                &name,
                "grid",
                format!("every axis needs at least one cell, got {grid}"),
            ));
        }
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(ConfigError::invalid(
                &name,
                "resolution",
                format!("must be finite and > 0, got {resolution}"),
            ));
        }
        Ok(Self {
            name,
            grid,
            resolution,
            bulk: None,
        })
    }

    /// Build a domain from one `computationDomain` configuration section.
    pub fn from_config<N: ConfigNode>(_ctx: &SimContext, node: &N) -> Result<Self, ConfigError> {
        let spec: DomainSpec = node.decode()?;
        let mut domain = Self::new(
            spec.name,
            UVec3::new(spec.n_i, spec.n_j, spec.n_k),
            spec.resolution,
        )?;
        domain.bulk = spec.bulk;
        tracing::debug!(domain = %domain.name, grid = %domain.grid, "created domain");
        Ok(domain)
    }

    pub fn with_bulk(mut self, bulk: impl Into<String>) -> Self {
        self.bulk = Some(bulk.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn grid(&self) -> UVec3 {
        self.grid
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Name of the connected bulk, if the domain declares one.
    pub fn bulk(&self) -> Option<&str> {
        self.bulk.as_deref()
    }

    /// A single K layer makes the domain two-dimensional.
    pub fn is_3d(&self) -> bool {
        self.grid.z > 1
    }

    /// Physical size along each axis.
    pub fn extent(&self) -> DVec3 {
        self.grid.as_dvec3() * self.resolution
    }

    pub fn cell_count(&self) -> usize {
        self.grid.x as usize * self.grid.y as usize * self.grid.z as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::Value;

    fn build(yaml: &str) -> Result<Domain, ConfigError> {
        let node: Value = serde_yaml::from_str(yaml).unwrap();
        Domain::from_config(&SimContext::default(), &node)
    }

    #[test]
    fn two_dimensional_by_default() {
        let d = build("{name: biofilm, resolution: 4.0, nI: 33, nJ: 65}").unwrap();
        assert_eq!(d.name(), "biofilm");
        assert!(!d.is_3d());
        assert_eq!(d.grid(), UVec3::new(33, 65, 1));
        assert_eq!(d.extent(), DVec3::new(132.0, 260.0, 4.0));
        assert_eq!(d.cell_count(), 33 * 65);
        assert_eq!(d.bulk(), None);
    }

    #[test]
    fn three_dimensional_with_bulk_link() {
        let d = build("{name: slab, resolution: 1.0, nI: 2, nJ: 3, nK: 4, bulk: tank}").unwrap();
        assert!(d.is_3d());
        assert_eq!(d.cell_count(), 24);
        assert_eq!(d.bulk(), Some("tank"));
    }

    #[test]
    fn empty_axis_is_rejected() {
        let err = build("{name: flat, resolution: 1.0, nI: 0, nJ: 3}").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "grid", .. }));
    }

    #[test]
    fn non_positive_resolution_is_rejected() {
        let err = Domain::new("d", UVec3::ONE, 0.0).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "resolution", .. }));
    }

    #[test]
    fn unknown_key_is_a_decode_error() {
        assert!(matches!(
            build("{name: d, resolution: 1.0, nI: 1, nJ: 1, depth: 9}"),
            Err(ConfigError::Yaml(_))
        ));
    }
}
