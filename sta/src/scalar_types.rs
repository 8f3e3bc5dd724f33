// scalar_types.rs — Scalar type analysis pass (implicit casts for export)
//
// Resolves scalar kind mismatches introduced by implicit scalar conversions
// in the traced program. For every uniform or comparison operator, infers
// the single kind its operands must share, recasts constant operands,
// inserts `onnx::Cast` for tensor operands, fixes the result annotation, and
// finally removes instructions the rewrite left unused.
//
// Nested regions are processed before the region that owns them. Within a
// region, instructions are visited in order; instructions inserted during
// the visit are not analyzed themselves.
//
// Preconditions: values carry trace-recorded kind annotations; graphs with
//   no annotations are accepted but left mostly untouched.
// Postconditions: every uniform/comparison instruction with an inferred
//   target has operands of that kind; uniform results carry it too.
// Failure modes: none fatal. Ambiguous tensor kinds (W0101) and unmapped
//   wire types (W0102) are reported as warnings.
// Side effects: mutates the graph in place.

use tracing::debug;

use crate::dce::{eliminate_dead_code, SideEffectPolicy};
use crate::diag::{codes, Diagnostic, Location};
use crate::infer::{infer_expected_kind, Inference};
use crate::ir::{Graph, InstId, RegionId};
use crate::kind::ScalarKind;
use crate::op::{classify, OpClass};
use crate::rewrite::{update_inputs, update_output, RewriteStats};

// ── Options and result ──────────────────────────────────────────────────────

/// Knobs for the analysis.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalysisOptions {
    /// Policy for the dead-code sweep that follows each region.
    pub dce_policy: SideEffectPolicy,
}

/// Diagnostics and statistics of one analysis run.
#[derive(Debug, Default)]
pub struct AnalysisResult {
    pub diagnostics: Vec<Diagnostic>,
    pub stats: RewriteStats,
}

// ── Entry points ────────────────────────────────────────────────────────────

/// Run the analysis with default options.
pub fn scalar_type_analysis(graph: &mut Graph) -> AnalysisResult {
    scalar_type_analysis_with(graph, &AnalysisOptions::default())
}

pub fn scalar_type_analysis_with(graph: &mut Graph, options: &AnalysisOptions) -> AnalysisResult {
    let mut pass = ScalarTypePass {
        graph,
        options: *options,
        result: AnalysisResult::default(),
    };
    let root = pass.graph.root();
    pass.run_region(root);
    pass.result
}

// ── Pass state ──────────────────────────────────────────────────────────────

struct ScalarTypePass<'a> {
    graph: &'a mut Graph,
    options: AnalysisOptions,
    result: AnalysisResult,
}

impl<'a> ScalarTypePass<'a> {
    fn run_region(&mut self, region: RegionId) {
        let insts = self.graph.insts_of(region);

        for &inst in &insts {
            for nested in self.graph.inst(inst).regions().to_vec() {
                self.run_region(nested);
            }
        }

        for &inst in &insts {
            self.implicit_cast(inst);
        }

        self.result.stats.instructions_removed +=
            eliminate_dead_code(self.graph, region, self.options.dce_policy);
    }

    fn implicit_cast(&mut self, inst: InstId) {
        let class = classify(self.graph.inst(inst).op());
        if class == OpClass::Unsupported {
            return;
        }

        let inference = infer_expected_kind(self.graph, inst, class);
        let target = match &inference {
            Inference::None => return,
            Inference::Target(kind) => *kind,
            Inference::Fallback {
                chosen,
                tensor_kinds,
            } => {
                self.result
                    .diagnostics
                    .push(self.ambiguity(inst, *chosen, tensor_kinds));
                *chosen
            }
        };
        debug!(inst = %self.graph.describe(inst), %target, "inferred scalar kind");
        self.result.stats.instructions_typed += 1;

        if let Err(err) = update_inputs(
            self.graph,
            inst,
            target,
            &mut self.result.stats,
            &mut self.result.diagnostics,
        ) {
            self.result.diagnostics.push(Diagnostic::error(
                Location::Inst(inst),
                format!("internal IR error while rewriting {}: {}", self.graph.describe(inst), err),
            ));
            return;
        }

        if class == OpClass::Uniform && update_output(self.graph, inst, target) {
            self.result.stats.outputs_retyped += 1;
        }
    }

    fn ambiguity(
        &self,
        inst: InstId,
        chosen: ScalarKind,
        tensor_kinds: &[ScalarKind],
    ) -> Diagnostic {
        let kinds: Vec<String> = tensor_kinds.iter().map(|k| k.to_string()).collect();
        Diagnostic::warning(
            Location::Inst(inst),
            format!(
                "scalar kinds of tensor operands of {} disagree ({}); using {} from the first tensor operand",
                self.graph.describe(inst),
                kinds.join(", "),
                chosen
            ),
        )
        .with_code(codes::AMBIGUOUS_TENSOR_KINDS)
        .with_hint("annotate the result kind of this instruction to make the choice explicit")
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Attr, ValueId};
    use crate::kind::ScalarKind;
    use crate::literal::{LiteralData, TensorLiteral};
    use crate::op::OpKind;
    use crate::origin::constant_literal;

    fn constant(g: &mut Graph, region: RegionId, literal: TensorLiteral) -> ValueId {
        let c = g.append(region, OpKind::Constant, &[], 1);
        let kind = literal.kind();
        g.set_attr(c, "value", Attr::Tensor(literal));
        let out = g.inst(c).outputs()[0];
        g.set_kind(out, kind);
        out
    }

    fn ops(g: &Graph, region: RegionId) -> Vec<String> {
        g.insts_of(region)
            .into_iter()
            .map(|i| g.inst(i).op().to_string())
            .collect()
    }

    #[test]
    fn add_tensor_and_int_constant() {
        let mut g = Graph::new();
        let root = g.root();
        let a = g.add_param(root, Some(ScalarKind::Float32));
        let b = constant(&mut g, root, TensorLiteral::scalar_int(ScalarKind::Int32, 2).unwrap());
        let add = g.append(root, OpKind::Add, &[a, b], 1);
        let out = g.inst(add).outputs()[0];
        g.set_returns(root, &[out]);

        let result = scalar_type_analysis(&mut g);
        assert!(result.diagnostics.is_empty());
        assert_eq!(ops(&g, root), vec!["onnx::Constant", "onnx::Add"]);
        let new_b = g.inst(add).inputs()[1];
        assert_ne!(new_b, b);
        assert_eq!(
            constant_literal(&g, new_b).map(|l| l.data().clone()),
            Some(LiteralData::Float(vec![2.0]))
        );
        assert_eq!(g.kind(out), Some(ScalarKind::Float32));
        assert_eq!(result.stats.constants_recast, 1);
        assert_eq!(result.stats.instructions_removed, 1);
    }

    #[test]
    fn comparison_casts_and_keeps_bool() {
        let mut g = Graph::new();
        let root = g.root();
        let a = g.add_param(root, Some(ScalarKind::Float64));
        let b = g.add_param(root, Some(ScalarKind::Float32));
        let gt = g.append(root, OpKind::Greater, &[a, b], 1);
        let out = g.inst(gt).outputs()[0];
        g.set_kind(out, ScalarKind::Bool);
        g.set_returns(root, &[out]);

        let result = scalar_type_analysis(&mut g);
        assert_eq!(ops(&g, root), vec!["onnx::Cast", "onnx::Greater"]);
        assert_eq!(g.kind(g.inst(gt).inputs()[1]), Some(ScalarKind::Float64));
        assert_eq!(g.kind(out), Some(ScalarKind::Bool));
        assert_eq!(result.stats.casts_inserted, 1);
        assert_eq!(result.stats.outputs_retyped, 0);
    }

    #[test]
    fn conflicting_tensors_warn_and_cast_to_first() {
        let mut g = Graph::new();
        let root = g.root();
        let t1 = g.add_param(root, Some(ScalarKind::Float16));
        let t2 = g.add_param(root, Some(ScalarKind::Float32));
        let add = g.append(root, OpKind::Add, &[t1, t2], 1);
        let out = g.inst(add).outputs()[0];
        g.set_returns(root, &[out]);

        let result = scalar_type_analysis(&mut g);
        assert_eq!(result.diagnostics.len(), 1);
        let d = &result.diagnostics[0];
        assert_eq!(d.code, Some(codes::AMBIGUOUS_TENSOR_KINDS));
        assert_eq!(d.location, Location::Inst(add));
        assert!(d.message.contains("using f16"), "{}", d.message);
        assert_eq!(g.kind(g.inst(add).inputs()[1]), Some(ScalarKind::Float16));
        assert_eq!(g.kind(out), Some(ScalarKind::Float16));
    }

    #[test]
    fn unknown_operands_leave_instruction_untouched() {
        let mut g = Graph::new();
        let root = g.root();
        let x = g.add_param(root, None);
        let y = g.add_param(root, None);
        let add = g.append(root, OpKind::Add, &[x, y], 1);
        let out = g.inst(add).outputs()[0];
        g.set_returns(root, &[out]);

        let result = scalar_type_analysis(&mut g);
        assert!(result.diagnostics.is_empty());
        assert_eq!(result.stats, RewriteStats::default());
        assert_eq!(g.kind(out), None);
    }

    #[test]
    fn nested_regions_are_rewritten_in_place() {
        let mut g = Graph::new();
        let root = g.root();
        let cond = g.add_param(root, Some(ScalarKind::Bool));
        let x = g.add_param(root, Some(ScalarKind::Float64));
        let iff = g.append(root, OpKind::If, &[cond], 1);
        let then_body = g.add_region(iff);
        let c = constant(&mut g, then_body, TensorLiteral::scalar_int(ScalarKind::Int64, 1).unwrap());
        let mul = g.append(then_body, OpKind::Mul, &[x, c], 1);
        g.set_returns(then_body, &[g.inst(mul).outputs()[0]]);
        let out = g.inst(iff).outputs()[0];
        g.set_returns(root, &[out]);

        scalar_type_analysis(&mut g);
        assert_eq!(ops(&g, then_body), vec!["onnx::Constant", "onnx::Mul"]);
        let new_c = g.inst(mul).inputs()[1];
        assert_eq!(
            constant_literal(&g, new_c).map(|l| l.kind()),
            Some(ScalarKind::Float64)
        );
        assert_eq!(g.kind(g.inst(mul).outputs()[0]), Some(ScalarKind::Float64));
        assert_eq!(ops(&g, root), vec!["onnx::If"]);
    }

    #[test]
    fn shared_constant_survives_while_used() {
        let mut g = Graph::new();
        let root = g.root();
        let f = g.add_param(root, Some(ScalarKind::Float32));
        let i = g.add_param(root, Some(ScalarKind::Int64));
        let c = constant(&mut g, root, TensorLiteral::scalar_int(ScalarKind::Int64, 3).unwrap());
        let add_f = g.append(root, OpKind::Add, &[f, c], 1);
        let add_i = g.append(root, OpKind::Add, &[i, c], 1);
        g.set_returns(
            root,
            &[g.inst(add_f).outputs()[0], g.inst(add_i).outputs()[0]],
        );

        scalar_type_analysis(&mut g);
        assert_eq!(g.inst(add_i).inputs()[1], c);
        assert_ne!(g.inst(add_f).inputs()[1], c);
        assert_eq!(
            ops(&g, root),
            vec!["onnx::Constant", "onnx::Constant", "onnx::Add", "onnx::Add"]
        );
    }

    #[test]
    fn preserve_policy_keeps_unused_side_effects() {
        let mut g = Graph::new();
        let root = g.root();
        let x = g.add_param(root, Some(ScalarKind::Float32));
        g.append(root, OpKind::from_qualified("prim::Print"), &[x], 0);

        let options = AnalysisOptions {
            dce_policy: SideEffectPolicy::Preserve,
        };
        scalar_type_analysis_with(&mut g, &options);
        assert_eq!(ops(&g, root), vec!["prim::Print"]);

        scalar_type_analysis(&mut g);
        assert!(ops(&g, root).is_empty());
    }
}
