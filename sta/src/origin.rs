// origin.rs — Implicit-scalar pattern matcher
//
// Classifies where an operand's scalar kind comes from. Some tensor-producing
// instructions stand for values the source program treats as plain scalars:
// literal constants, and `Gather(Shape(x), i)` (reading one dimension of a
// shape). Those contribute a kind without relying on the value annotation.
//
//    %1 : i64 = onnx::Constant[value=tensor<i64>{0}]()
//    %2 = onnx::Shape(%x)
//    %dim : i64 = onnx::Gather(%2, %1)     # scalar origin, int64
//
// Preconditions: `value` belongs to `graph`.
// Postconditions: none.
// Failure modes: none.
// Side effects: none.

use crate::ir::{Graph, ValueId};
use crate::kind::ScalarKind;
use crate::literal::TensorLiteral;
use crate::op::OpKind;

/// Provenance of an operand's scalar kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// An implicit scalar (constant literal or shape-dimension read).
    Scalar(ScalarKind),
    /// A tensor with an annotated kind.
    Tensor(ScalarKind),
    /// Nothing is known.
    Unknown,
}

/// Payload of the `onnx::Constant` producing `value`, if any.
pub fn constant_literal(graph: &Graph, value: ValueId) -> Option<&TensorLiteral> {
    let producer = graph.inst(graph.producer(value)?);
    if *producer.op() != OpKind::Constant {
        return None;
    }
    producer.attr("value")?.as_tensor()
}

/// `Gather` whose data operand is produced by `Shape`.
fn is_shape_dimension(graph: &Graph, value: ValueId) -> bool {
    let Some(producer) = graph.producer(value) else {
        return false;
    };
    let gather = graph.inst(producer);
    if *gather.op() != OpKind::Gather {
        return false;
    }
    gather
        .inputs()
        .first()
        .and_then(|&data| graph.producer(data))
        .is_some_and(|shape| *graph.inst(shape).op() == OpKind::Shape)
}

pub fn operand_origin(graph: &Graph, value: ValueId) -> Origin {
    if let Some(literal) = constant_literal(graph, value) {
        return Origin::Scalar(literal.kind());
    }
    if is_shape_dimension(graph, value) {
        return Origin::Scalar(ScalarKind::Int64);
    }
    match graph.kind(value) {
        Some(kind) => Origin::Tensor(kind),
        None => Origin::Unknown,
    }
}

/// Kind the operand currently carries: the literal kind for constants,
/// otherwise the annotation.
pub fn effective_kind(graph: &Graph, value: ValueId) -> Option<ScalarKind> {
    match constant_literal(graph, value) {
        Some(literal) => Some(literal.kind()),
        None => graph.kind(value),
    }
}
