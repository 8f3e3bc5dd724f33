// infer.rs — Expected scalar kind for one instruction
//
// Splits operand kinds into implicit-scalar and tensor origins, then decides
// the single kind the instruction must be normalized to.
//
// Preconditions: the instruction is classified Uniform or Comparison.
// Postconditions: `Inference::None` means the instruction must be left as is.
// Failure modes: several distinct tensor kinds with no output hint resolve to
//   the first tensor kind and are reported as `Inference::Fallback`.
// Side effects: none.

use crate::ir::{Graph, InstId};
use crate::kind::{fold_promote, ScalarKind};
use crate::op::OpClass;
use crate::origin::{operand_origin, Origin};

/// Operand kinds of one instruction, split by origin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperandKinds {
    pub scalars: Vec<ScalarKind>,
    pub tensors: Vec<ScalarKind>,
    pub operand_count: usize,
}

impl OperandKinds {
    pub fn collect(graph: &Graph, inst: InstId) -> Self {
        let mut kinds = OperandKinds {
            operand_count: graph.inst(inst).inputs().len(),
            ..OperandKinds::default()
        };
        for &input in graph.inst(inst).inputs() {
            match operand_origin(graph, input) {
                Origin::Scalar(k) => kinds.scalars.push(k),
                Origin::Tensor(k) => kinds.tensors.push(k),
                Origin::Unknown => {}
            }
        }
        kinds
    }
}

/// Outcome of inference for one instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inference {
    /// No kind information reached the instruction.
    None,
    Target(ScalarKind),
    /// Tensor operands disagree; the first tensor kind was chosen.
    Fallback {
        chosen: ScalarKind,
        tensor_kinds: Vec<ScalarKind>,
    },
}

impl Inference {
    pub fn target(&self) -> Option<ScalarKind> {
        match self {
            Inference::None => None,
            Inference::Target(k) => Some(*k),
            Inference::Fallback { chosen, .. } => Some(*chosen),
        }
    }

    fn from_option(kind: Option<ScalarKind>) -> Self {
        kind.map_or(Inference::None, Inference::Target)
    }
}

/// Decide the target kind from classified operand kinds and the current
/// output annotation.
pub fn infer_target(class: OpClass, kinds: &OperandKinds, output: Option<ScalarKind>) -> Inference {
    match class {
        OpClass::Unsupported => Inference::None,
        OpClass::Comparison => {
            let mut all = kinds.scalars.clone();
            all.extend_from_slice(&kinds.tensors);
            Inference::from_option(fold_promote(&all))
        }
        OpClass::Uniform => {
            if kinds.scalars.len() == kinds.operand_count {
                Inference::from_option(fold_promote(&kinds.scalars))
            } else if let Some(out) = output {
                Inference::Target(out)
            } else if let Some(&first) = kinds.tensors.first() {
                // Scalars follow the tensor kind at runtime. Several tensor
                // kinds would need real promotion, which is not attempted.
                if kinds.tensors.iter().any(|&k| k != first) {
                    Inference::Fallback {
                        chosen: first,
                        tensor_kinds: kinds.tensors.clone(),
                    }
                } else {
                    Inference::Target(first)
                }
            } else {
                Inference::from_option(fold_promote(&kinds.scalars))
            }
        }
    }
}

/// Infer the expected kind of `inst` in `graph`.
pub fn infer_expected_kind(graph: &Graph, inst: InstId, class: OpClass) -> Inference {
    let kinds = OperandKinds::collect(graph, inst);
    let output = graph
        .inst(inst)
        .outputs()
        .first()
        .and_then(|&v| graph.kind(v));
    infer_target(class, &kinds, output)
}
