// op.rs — Operator kinds and the implicit-cast classification table
//
// Operators are a closed enum for the ONNX operators the analysis inspects;
// every other operator is carried by name in `OpKind::Custom`.
//
// Preconditions: none.
// Postconditions: `classify` is total and pure.
// Failure modes: none.
// Side effects: none.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Operator identity of an instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum OpKind {
    Add,
    Sub,
    Mul,
    Div,
    Gemm,
    Pow,
    Mod,
    Greater,
    Less,
    Equal,
    GreaterOrEqual,
    LessOrEqual,
    Constant,
    Cast,
    Shape,
    Gather,
    If,
    Loop,
    /// Any other operator, by qualified name (`onnx::Relu`, `prim::Print`).
    Custom(String),
}

/// How the analysis treats an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpClass {
    /// Operands and result share one scalar kind.
    Uniform,
    /// Operands share one scalar kind; the result is bool.
    Comparison,
    /// Left untouched.
    Unsupported,
}

/// Operators outside the closed set that have observable effects.
const SIDE_EFFECT_OPS: &[&str] = &["prim::Print", "prim::RaiseException", "aten::warn"];

impl OpKind {
    /// Map a qualified operator name to its kind.
    pub fn from_qualified(name: &str) -> OpKind {
        match name {
            "onnx::Add" => OpKind::Add,
            "onnx::Sub" => OpKind::Sub,
            "onnx::Mul" => OpKind::Mul,
            "onnx::Div" => OpKind::Div,
            "onnx::Gemm" => OpKind::Gemm,
            "onnx::Pow" => OpKind::Pow,
            "onnx::Mod" => OpKind::Mod,
            "onnx::Greater" => OpKind::Greater,
            "onnx::Less" => OpKind::Less,
            "onnx::Equal" => OpKind::Equal,
            "onnx::GreaterOrEqual" => OpKind::GreaterOrEqual,
            "onnx::LessOrEqual" => OpKind::LessOrEqual,
            "onnx::Constant" => OpKind::Constant,
            "onnx::Cast" => OpKind::Cast,
            "onnx::Shape" => OpKind::Shape,
            "onnx::Gather" => OpKind::Gather,
            "onnx::If" => OpKind::If,
            "onnx::Loop" => OpKind::Loop,
            other => OpKind::Custom(other.to_string()),
        }
    }

    pub fn qualified_name(&self) -> &str {
        match self {
            OpKind::Add => "onnx::Add",
            OpKind::Sub => "onnx::Sub",
            OpKind::Mul => "onnx::Mul",
            OpKind::Div => "onnx::Div",
            OpKind::Gemm => "onnx::Gemm",
            OpKind::Pow => "onnx::Pow",
            OpKind::Mod => "onnx::Mod",
            OpKind::Greater => "onnx::Greater",
            OpKind::Less => "onnx::Less",
            OpKind::Equal => "onnx::Equal",
            OpKind::GreaterOrEqual => "onnx::GreaterOrEqual",
            OpKind::LessOrEqual => "onnx::LessOrEqual",
            OpKind::Constant => "onnx::Constant",
            OpKind::Cast => "onnx::Cast",
            OpKind::Shape => "onnx::Shape",
            OpKind::Gather => "onnx::Gather",
            OpKind::If => "onnx::If",
            OpKind::Loop => "onnx::Loop",
            OpKind::Custom(name) => name,
        }
    }

    /// Whether the instruction has effects beyond producing its outputs.
    pub fn has_side_effects(&self) -> bool {
        match self {
            OpKind::Custom(name) => SIDE_EFFECT_OPS.contains(&name.as_str()),
            _ => false,
        }
    }
}

/// Classify an operator for implicit-cast handling.
pub fn classify(op: &OpKind) -> OpClass {
    match op {
        OpKind::Add
        | OpKind::Sub
        | OpKind::Mul
        | OpKind::Div
        | OpKind::Gemm
        | OpKind::Pow
        | OpKind::Mod => OpClass::Uniform,
        OpKind::Greater
        | OpKind::Less
        | OpKind::Equal
        | OpKind::GreaterOrEqual
        | OpKind::LessOrEqual => OpClass::Comparison,
        OpKind::Constant
        | OpKind::Cast
        | OpKind::Shape
        | OpKind::Gather
        | OpKind::If
        | OpKind::Loop
        | OpKind::Custom(_) => OpClass::Unsupported,
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.qualified_name())
    }
}

impl From<OpKind> for String {
    fn from(op: OpKind) -> String {
        op.qualified_name().to_string()
    }
}

impl From<String> for OpKind {
    fn from(name: String) -> OpKind {
        OpKind::from_qualified(&name)
    }
}
