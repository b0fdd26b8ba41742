//! The cost-policy boundary.
//!
//! Which of two candidate cell matches for a cut is "better" is a
//! driver decision (area, area-delay product, a technology-specific
//! weighting), not something this crate should guess at. `CostPolicy`
//! is the trait a driver implements; [`AreaCostPolicy`] is a trivial
//! default used only by the demonstration binary.

use crate::cell::Cell;
use crate::handle::NodeId;

/// An opaque cost value. Only the policy that produced it knows what
/// it means; callers only ever compare two costs via [`CostPolicy::better`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cost(pub u64);

/// A driver-supplied comparison between candidate cell matches.
pub trait CostPolicy {
    /// Computes the cost of mapping `cell` onto a cut rooted at `root`
    /// with `leaf_count` leaves.
    fn cost(&self, cell: &dyn Cell, root: NodeId, leaf_count: usize) -> Cost;

    /// Returns `true` if `a` should be preferred over `b`.
    fn better(&self, a: Cost, b: Cost) -> bool {
        a < b
    }
}

/// Costs a match purely by the matched cell's pin count. Only meant to
/// exercise the pipeline end to end; real drivers supply their own
/// policy.
#[derive(Debug, Default, Clone, Copy)]
pub struct AreaCostPolicy;

impl CostPolicy for AreaCostPolicy {
    fn cost(&self, cell: &dyn Cell, _root: NodeId, _leaf_count: usize) -> Cost {
        Cost(cell.input_count() as u64)
    }
}
