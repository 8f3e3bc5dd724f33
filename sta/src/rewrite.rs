// rewrite.rs — Normalize an instruction's operands and result to one kind
//
// Constant operands are replaced by a recast copy of the literal; every other
// annotated operand with a different kind gets an `onnx::Cast` inserted right
// before the instruction. Nothing is deleted here: constants orphaned by the
// rewrite are left for dead-code elimination.
//
// Preconditions: `inst` is live; `target` came from `infer`.
// Postconditions: every operand with a known kind carries `target`, except
//   operands whose conversion needs a wire type that does not exist.
// Failure modes: unmapped wire type → `W0102` warning, operand left as is;
//   `IrError` only on graph misuse.
// Side effects: mutates the graph; appends diagnostics.

use serde::Serialize;
use tracing::trace;

use crate::diag::{codes, Diagnostic, Location};
use crate::ir::{Attr, Graph, InstId, IrError, ValueId};
use crate::kind::ScalarKind;
use crate::literal::TensorLiteral;
use crate::op::OpKind;
use crate::origin::constant_literal;

/// Counters describing what a run of the analysis changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RewriteStats {
    /// Instructions for which a target kind was inferred.
    pub instructions_typed: usize,
    pub constants_recast: usize,
    pub casts_inserted: usize,
    /// Conversions not emitted because the kind has no wire type.
    pub casts_skipped: usize,
    pub outputs_retyped: usize,
    pub instructions_removed: usize,
}

enum Action {
    Keep,
    Recast(TensorLiteral),
    Cast,
}

/// Rewrite every operand of `inst` whose kind differs from `target`.
pub fn update_inputs(
    graph: &mut Graph,
    inst: InstId,
    target: ScalarKind,
    stats: &mut RewriteStats,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<(), IrError> {
    // The same value may feed several operands; it is rewritten once.
    let mut replaced: Vec<(ValueId, ValueId)> = Vec::new();
    let inputs = graph.inst(inst).inputs().to_vec();

    for (index, input) in inputs.into_iter().enumerate() {
        if let Some(&(_, new)) = replaced.iter().find(|(old, _)| *old == input) {
            graph.replace_input(inst, index, new)?;
            continue;
        }

        let action = match constant_literal(graph, input) {
            Some(literal) if literal.kind() == target => Action::Keep,
            Some(literal) => Action::Recast(literal.recast(target)),
            None => match graph.kind(input) {
                Some(kind) if kind != target => Action::Cast,
                _ => Action::Keep,
            },
        };

        let new = match action {
            Action::Keep => continue,
            Action::Recast(literal) => {
                stats.constants_recast += 1;
                recast_constant(graph, inst, input, literal)
            }
            Action::Cast => match target.wire_type() {
                Some(wire) => {
                    stats.casts_inserted += 1;
                    insert_cast(graph, inst, input, target, wire)
                }
                None => {
                    stats.casts_skipped += 1;
                    diagnostics.push(unmapped_wire_type(graph, inst, index, input, target));
                    continue;
                }
            },
        };
        graph.replace_input(inst, index, new)?;
        replaced.push((input, new));
    }
    Ok(())
}

/// Set the result annotation of `inst` to `target`. Returns whether it changed.
pub fn update_output(graph: &mut Graph, inst: InstId, target: ScalarKind) -> bool {
    match graph.inst(inst).outputs().first().copied() {
        Some(out) if graph.kind(out) != Some(target) => {
            graph.set_kind(out, target);
            true
        }
        _ => false,
    }
}

fn recast_constant(graph: &mut Graph, before: InstId, old: ValueId, literal: TensorLiteral) -> ValueId {
    let kind = literal.kind();
    let constant = graph.insert_before(before, OpKind::Constant, &[], 1);
    graph.set_attr(constant, "value", Attr::Tensor(literal));
    let out = graph.inst(constant).outputs()[0];
    graph.set_kind(out, kind);
    let hint = graph.name(old).to_string();
    graph.rename_fresh(out, &hint);
    trace!(from = %graph.name(old), to = %graph.name(out), %kind, "recast constant operand");
    out
}

fn insert_cast(graph: &mut Graph, before: InstId, input: ValueId, target: ScalarKind, wire: i64) -> ValueId {
    let cast = graph.insert_before(before, OpKind::Cast, &[input], 1);
    graph.set_attr(cast, "to", Attr::Int(wire));
    let out = graph.inst(cast).outputs()[0];
    graph.set_kind(out, target);
    let hint = graph.name(input).to_string();
    graph.rename_fresh(out, &hint);
    trace!(from = %graph.name(input), to = %graph.name(out), %target, "inserted cast");
    out
}

fn unmapped_wire_type(
    graph: &Graph,
    inst: InstId,
    index: usize,
    input: ValueId,
    target: ScalarKind,
) -> Diagnostic {
    let current = graph
        .kind(input)
        .map_or_else(|| "unknown".to_string(), |k| k.to_string());
    Diagnostic::warning(
        Location::Inst(inst),
        format!(
            "scalar kind {} has no ONNX type; operand {} (%{}) of {} keeps kind {}",
            target,
            index,
            graph.name(input),
            graph.describe(inst),
            current
        ),
    )
    .with_code(codes::UNMAPPED_WIRE_TYPE)
    .with_hint("the exported graph has a type mismatch on this operand")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal::LiteralData;

    fn constant(g: &mut Graph, literal: TensorLiteral) -> ValueId {
        let root = g.root();
        let c = g.append(root, OpKind::Constant, &[], 1);
        g.set_attr(c, "value", Attr::Tensor(literal));
        let out = g.inst(c).outputs()[0];
        g.rename(out, "c").unwrap();
        out
    }

    #[test]
    fn constant_operand_is_recast_not_cast() {
        let mut g = Graph::new();
        let root = g.root();
        let a = g.add_param(root, Some(ScalarKind::Float32));
        let b = constant(&mut g, TensorLiteral::scalar_int(ScalarKind::Int32, 2).unwrap());
        let add = g.append(root, OpKind::Add, &[a, b], 1);

        let mut stats = RewriteStats::default();
        let mut diags = Vec::new();
        update_inputs(&mut g, add, ScalarKind::Float32, &mut stats, &mut diags).unwrap();

        let new_b = g.inst(add).inputs()[1];
        assert_ne!(new_b, b);
        let literal = constant_literal(&g, new_b).unwrap();
        assert_eq!(literal.kind(), ScalarKind::Float32);
        assert_eq!(literal.data(), &LiteralData::Float(vec![2.0]));
        assert_eq!(g.name(new_b), "c.1");
        assert!(g.users(b).is_empty());
        assert_eq!(stats.constants_recast, 1);
        assert_eq!(stats.casts_inserted, 0);
        assert!(g
            .insts_of(root)
            .iter()
            .all(|&i| *g.inst(i).op() != OpKind::Cast));
        // Inserted immediately before the consumer.
        let order = g.insts_of(root);
        let pos = order.iter().position(|&i| i == add).unwrap();
        assert_eq!(g.producer(new_b), Some(order[pos - 1]));
    }

    #[test]
    fn tensor_operand_gets_cast() {
        let mut g = Graph::new();
        let root = g.root();
        let a = g.add_param(root, Some(ScalarKind::Float64));
        let b = g.add_param(root, Some(ScalarKind::Float32));
        g.rename(b, "b").unwrap();
        let gt = g.append(root, OpKind::Greater, &[a, b], 1);

        let mut stats = RewriteStats::default();
        let mut diags = Vec::new();
        update_inputs(&mut g, gt, ScalarKind::Float64, &mut stats, &mut diags).unwrap();

        let cast_out = g.inst(gt).inputs()[1];
        let cast = g.producer(cast_out).unwrap();
        assert_eq!(g.inst(cast).op(), &OpKind::Cast);
        assert_eq!(g.inst(cast).attr("to"), Some(&Attr::Int(11)));
        assert_eq!(g.inst(cast).inputs(), &[b]);
        assert_eq!(g.kind(cast_out), Some(ScalarKind::Float64));
        assert_eq!(g.name(cast_out), "b.1");
        assert_eq!(g.inst(gt).inputs()[0], a);
        assert_eq!(stats.casts_inserted, 1);
        assert!(diags.is_empty());
    }

    #[test]
    fn repeated_operand_shares_one_cast() {
        let mut g = Graph::new();
        let root = g.root();
        let x = g.add_param(root, Some(ScalarKind::Int32));
        let mul = g.append(root, OpKind::Mul, &[x, x], 1);

        let mut stats = RewriteStats::default();
        let mut diags = Vec::new();
        update_inputs(&mut g, mul, ScalarKind::Int64, &mut stats, &mut diags).unwrap();

        let inputs = g.inst(mul).inputs();
        assert_eq!(inputs[0], inputs[1]);
        assert_eq!(stats.casts_inserted, 1);
        assert!(g.users(x).len() == 1);
    }

    #[test]
    fn unannotated_operand_is_left_alone() {
        let mut g = Graph::new();
        let root = g.root();
        let x = g.add_param(root, None);
        let y = g.add_param(root, Some(ScalarKind::Int32));
        let add = g.append(root, OpKind::Add, &[x, y], 1);

        let mut stats = RewriteStats::default();
        let mut diags = Vec::new();
        update_inputs(&mut g, add, ScalarKind::Int32, &mut stats, &mut diags).unwrap();
        assert_eq!(g.inst(add).inputs(), &[x, y]);
        assert_eq!(stats, RewriteStats::default());
    }

    #[test]
    fn unmapped_kind_skips_only_cast_operands() {
        let mut g = Graph::new();
        let root = g.root();
        let a = g.add_param(root, Some(ScalarKind::BFloat16));
        let b = g.add_param(root, Some(ScalarKind::Float32));
        let c = constant(&mut g, TensorLiteral::scalar_float(ScalarKind::Float32, 0.5).unwrap());
        let add = g.append(root, OpKind::Add, &[a, b, c], 1);

        let mut stats = RewriteStats::default();
        let mut diags = Vec::new();
        update_inputs(&mut g, add, ScalarKind::BFloat16, &mut stats, &mut diags).unwrap();

        assert_eq!(g.inst(add).inputs()[1], b);
        assert_eq!(
            constant_literal(&g, g.inst(add).inputs()[2]).map(|l| l.kind()),
            Some(ScalarKind::BFloat16)
        );
        assert_eq!(stats.casts_skipped, 1);
        assert_eq!(stats.constants_recast, 1);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, Some(codes::UNMAPPED_WIRE_TYPE));
        assert_eq!(diags[0].location, Location::Inst(add));
        assert!(diags[0].message.contains("bf16"), "{}", diags[0].message);
    }

    #[test]
    fn output_annotation_updates() {
        let mut g = Graph::new();
        let root = g.root();
        let x = g.add_param(root, Some(ScalarKind::Float32));
        let add = g.append(root, OpKind::Add, &[x, x], 1);
        assert!(update_output(&mut g, add, ScalarKind::Float32));
        assert!(!update_output(&mut g, add, ScalarKind::Float32));
        assert_eq!(g.kind(g.inst(add).outputs()[0]), Some(ScalarKind::Float32));
    }
}
