//! Driver-facing run configuration.

use std::sync::Arc;

use crate::cost::{AreaCostPolicy, CostPolicy};
use crate::error::MapError;

/// Whether cut/embedding enumeration should keep duplicates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Dedupe {
    /// Keep every cut/match as found.
    None,
    /// Drop cuts/matches that are structurally identical to one
    /// already recorded for the same root.
    #[default]
    All,
}

/// Run configuration shared by the cut enumerator, pattern matcher and
/// map generator.
///
/// Built with [`Config::builder`], matching the `.builder()...build()`
/// chains used elsewhere in this codebase rather than public field
/// construction.
#[derive(Clone)]
pub struct Config {
    k_max: u32,
    dedupe: Dedupe,
    cost_policy: Arc<dyn CostPolicy + Send + Sync>,
}

impl Config {
    /// Starts building a [`Config`] with the library defaults
    /// (`k_max = 6`, [`Dedupe::All`], [`AreaCostPolicy`]).
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// The cut-size bound cuts are enumerated up to.
    #[must_use]
    pub const fn k_max(&self) -> u32 {
        self.k_max
    }

    /// The configured deduplication policy.
    #[must_use]
    pub const fn dedupe(&self) -> Dedupe {
        self.dedupe
    }

    /// The configured cost policy.
    #[must_use]
    pub fn cost_policy(&self) -> &(dyn CostPolicy + Send + Sync) {
        self.cost_policy.as_ref()
    }
}

/// Incremental builder for [`Config`].
pub struct ConfigBuilder {
    k_max: u32,
    dedupe: Dedupe,
    cost_policy: Arc<dyn CostPolicy + Send + Sync>,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            k_max: 6,
            dedupe: Dedupe::All,
            cost_policy: Arc::new(AreaCostPolicy),
        }
    }
}

impl ConfigBuilder {
    /// Sets the cut-size bound.
    #[must_use]
    pub const fn k_max(mut self, k_max: u32) -> Self {
        self.k_max = k_max;
        self
    }

    /// Sets the deduplication policy.
    #[must_use]
    pub const fn dedupe(mut self, dedupe: Dedupe) -> Self {
        self.dedupe = dedupe;
        self
    }

    /// Sets the cost policy.
    #[must_use]
    pub fn cost_policy(mut self, cost_policy: Arc<dyn CostPolicy + Send + Sync>) -> Self {
        self.cost_policy = cost_policy;
        self
    }

    /// Finalizes the configuration, validating `k_max` against the
    /// supported cut-size range.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::InvalidCutBound`] if `k_max` is outside
    /// `2..=20`.
    pub fn build(self) -> Result<Config, MapError> {
        if !(2..=20).contains(&self.k_max) {
            return Err(MapError::InvalidCutBound { k: self.k_max });
        }
        Ok(Config {
            k_max: self.k_max,
            dedupe: self.dedupe,
            cost_policy: self.cost_policy,
        })
    }
}
