// verify.rs — Structural and kind checks over a graph
//
// `verify_graph` checks the invariants every transformation must keep:
// operands are defined before use in their region or an enclosing one, and
// use lists agree with operands and region returns. `check_type_consistency`
// lists uniform and comparison instructions whose operand kinds still
// disagree, which is what the scalar type analysis is meant to eliminate.
//
// Preconditions: none.
// Postconditions: an empty result means the graph is well formed / consistent.
// Failure modes: violations are returned, never raised.
// Side effects: none.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::diag::{codes, DiagCode, Diagnostic, Location};
use crate::ir::{Graph, InstId, RegionId, Use, ValueId};
use crate::kind::ScalarKind;
use crate::op::{classify, OpClass};
use crate::origin::effective_kind;

// ── Well-formedness ─────────────────────────────────────────────────────────

/// Check scoping and use-list invariants. Returns one error per violation.
pub fn verify_graph(graph: &Graph) -> Vec<Diagnostic> {
    let mut checker = Checker {
        graph,
        reachable_insts: HashSet::new(),
        reachable_regions: HashSet::new(),
        values: Vec::new(),
        diagnostics: Vec::new(),
    };
    checker.scope_region(graph.root(), &HashSet::new());
    checker.check_use_lists();
    checker.diagnostics
}

struct Checker<'a> {
    graph: &'a Graph,
    reachable_insts: HashSet<InstId>,
    reachable_regions: HashSet<RegionId>,
    /// Reachable values in definition order.
    values: Vec<ValueId>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Checker<'a> {
    fn scope_region(&mut self, region: RegionId, outer: &HashSet<ValueId>) {
        let g = self.graph;
        self.reachable_regions.insert(region);
        let mut visible = outer.clone();
        for &p in g.region(region).params() {
            visible.insert(p);
            self.values.push(p);
        }

        for inst in g.insts_of(region) {
            self.reachable_insts.insert(inst);
            let i = g.inst(inst);
            if i.is_removed() {
                self.error(
                    Location::Inst(inst),
                    format!("removed instruction {} is still linked into its region", inst),
                    codes::USE_BEFORE_DEF,
                );
            }
            for (index, &v) in i.inputs().iter().enumerate() {
                if !visible.contains(&v) {
                    self.error(
                        Location::Inst(inst),
                        format!(
                            "operand {} (%{}) of {} is not defined before this point",
                            index,
                            g.name(v),
                            g.describe(inst)
                        ),
                        codes::USE_BEFORE_DEF,
                    );
                }
            }
            for &nested in i.regions() {
                self.scope_region(nested, &visible);
            }
            for &out in i.outputs() {
                visible.insert(out);
                self.values.push(out);
            }
        }

        for (index, &v) in g.region(region).returns().iter().enumerate() {
            if !visible.contains(&v) {
                self.error(
                    Location::Graph,
                    format!(
                        "return {} (%{}) of region {} is not defined in scope",
                        index,
                        g.name(v),
                        region.0
                    ),
                    codes::USE_BEFORE_DEF,
                );
            }
        }
    }

    fn check_use_lists(&mut self) {
        let g = self.graph;
        let mut expected = 0usize;
        for &inst in &self.reachable_insts {
            expected += g.inst(inst).inputs().len();
        }
        for &region in &self.reachable_regions {
            expected += g.region(region).returns().len();
        }

        let mut recorded = 0usize;
        for &v in &self.values.clone() {
            for u in g.users(v) {
                recorded += 1;
                let consistent = match *u {
                    Use::Operand { inst, index } => {
                        self.reachable_insts.contains(&inst)
                            && g.inst(inst).inputs().get(index) == Some(&v)
                    }
                    Use::Return { region, index } => {
                        self.reachable_regions.contains(&region)
                            && g.region(region).returns().get(index) == Some(&v)
                    }
                };
                if !consistent {
                    self.error(
                        Location::Graph,
                        format!("use list of %{} records {:?}, which does not read it", g.name(v), u),
                        codes::BROKEN_USE_LIST,
                    );
                }
            }
        }

        if recorded != expected {
            self.error(
                Location::Graph,
                format!(
                    "use lists record {} uses but operands and returns read {}",
                    recorded, expected
                ),
                codes::BROKEN_USE_LIST,
            );
        }
    }

    fn error(&mut self, location: Location, message: String, code: DiagCode) {
        self.diagnostics
            .push(Diagnostic::error(location, message).with_code(code));
    }
}

// ── Kind consistency ────────────────────────────────────────────────────────

/// A uniform or comparison instruction whose kinds disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inconsistency {
    #[serde(skip)]
    pub inst: InstId,
    pub instruction: String,
    /// Kinds of annotated operands, in operand order.
    pub operand_kinds: Vec<ScalarKind>,
    /// Result kind, reported for uniform instructions only.
    pub output_kind: Option<ScalarKind>,
}

impl fmt::Display for Inconsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds: Vec<String> = self.operand_kinds.iter().map(|k| k.to_string()).collect();
        write!(f, "{}: operands [{}]", self.instruction, kinds.join(", "))?;
        if let Some(out) = self.output_kind {
            write!(f, ", result {}", out)?;
        }
        Ok(())
    }
}

/// List instructions whose annotated operand kinds, or uniform result kind,
/// disagree. Unannotated operands are ignored.
pub fn check_type_consistency(graph: &Graph) -> Vec<Inconsistency> {
    let mut found = Vec::new();
    collect_inconsistencies(graph, graph.root(), &mut found);
    found
}

fn collect_inconsistencies(graph: &Graph, region: RegionId, found: &mut Vec<Inconsistency>) {
    for inst in graph.insts_of(region) {
        let i = graph.inst(inst);
        for &nested in i.regions() {
            collect_inconsistencies(graph, nested, found);
        }
        let class = classify(i.op());
        if class == OpClass::Unsupported {
            continue;
        }
        let kinds: Vec<ScalarKind> = i
            .inputs()
            .iter()
            .filter_map(|&v| effective_kind(graph, v))
            .collect();
        let Some(&first) = kinds.first() else {
            continue;
        };
        let output = match class {
            OpClass::Uniform => i.outputs().first().and_then(|&v| graph.kind(v)),
            _ => None,
        };
        let operands_agree = kinds.iter().all(|&k| k == first);
        let output_agrees = output.map_or(true, |k| k == first);
        if !operands_agree || !output_agrees {
            found.push(Inconsistency {
                inst,
                instruction: graph.describe(inst),
                operand_kinds: kinds,
                output_kind: output,
            });
        }
    }
}
