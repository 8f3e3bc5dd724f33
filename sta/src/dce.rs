// dce.rs — Dead instruction elimination over one region
//
// Walks a region from its last instruction to its first and removes every
// instruction whose results have no uses. Walking backwards lets a chain of
// dead producers disappear in a single sweep.
//
// Preconditions: `region` belongs to `graph`.
// Postconditions: no instruction left in `region` is unused, except those
//   kept by `SideEffectPolicy::Preserve`.
// Failure modes: none.
// Side effects: removes instructions (and their nested regions) from the graph.

use tracing::debug;

use crate::ir::{Graph, InstId, RegionId};

/// Whether unused instructions with side effects may be deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SideEffectPolicy {
    /// Keep side-effecting instructions even when unused.
    Preserve,
    /// Delete any unused instruction.
    #[default]
    AllowDeleting,
}

/// Whether `inst` or anything nested inside it has side effects.
pub fn has_side_effects(graph: &Graph, inst: InstId) -> bool {
    let i = graph.inst(inst);
    i.op().has_side_effects()
        || i.regions().iter().any(|&region| {
            graph
                .insts_of(region)
                .into_iter()
                .any(|nested| has_side_effects(graph, nested))
        })
}

/// Remove unused instructions from `region`. Returns how many were removed.
pub fn eliminate_dead_code(graph: &mut Graph, region: RegionId, policy: SideEffectPolicy) -> usize {
    let mut removed = 0;
    for inst in graph.insts_of(region).into_iter().rev() {
        if graph.result_uses(inst) > 0 {
            continue;
        }
        if policy == SideEffectPolicy::Preserve && has_side_effects(graph, inst) {
            continue;
        }
        if graph.remove(inst).is_ok() {
            removed += 1;
        }
    }
    if removed > 0 {
        debug!(region = region.0, removed, "dead instructions removed");
    }
    removed
}
