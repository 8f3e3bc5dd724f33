// literal.rs — Embedded constant tensor payloads
//
// A `TensorLiteral` is the value carried by an `onnx::Constant` instruction:
// an element kind, a shape, and flat row-major data. Recasting converts the
// data element-wise to another kind.
//
// Preconditions: none.
// Postconditions: data length always equals the product of the dims; integer
//   data always fits the element kind.
// Failure modes: `LiteralError` on shape/data mismatch, overflowing shapes, or
//   out-of-range values.
// Side effects: none.

use std::fmt;

use half::{bf16, f16};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::kind::ScalarKind;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LiteralError {
    #[error("tensor<{kind}> expects {expected} elements, found {actual}")]
    CountMismatch {
        kind: ScalarKind,
        expected: usize,
        actual: usize,
    },

    #[error("value {value} is out of range for {kind}")]
    OutOfRange { kind: ScalarKind, value: i64 },

    #[error("tensor<{kind}> shape {dims:?} has more elements than can be addressed")]
    ShapeOverflow { kind: ScalarKind, dims: Vec<usize> },

    #[error("{found} data cannot be stored as {kind}")]
    StorageMismatch {
        kind: ScalarKind,
        found: &'static str,
    },
}

/// Flat element storage. Floating kinds are held at f64 precision after
/// rounding to the element kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LiteralData {
    Bool(Vec<bool>),
    Int(Vec<i64>),
    Float(Vec<f64>),
}

impl LiteralData {
    pub fn len(&self) -> usize {
        match self {
            LiteralData::Bool(v) => v.len(),
            LiteralData::Int(v) => v.len(),
            LiteralData::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn storage_name(&self) -> &'static str {
        match self {
            LiteralData::Bool(_) => "bool",
            LiteralData::Int(_) => "integer",
            LiteralData::Float(_) => "floating-point",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorLiteral {
    kind: ScalarKind,
    dims: Vec<usize>,
    data: LiteralData,
}

impl TensorLiteral {
    pub fn new(kind: ScalarKind, dims: Vec<usize>, data: LiteralData) -> Result<Self, LiteralError> {
        let expected = dims
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| LiteralError::ShapeOverflow {
                kind,
                dims: dims.clone(),
            })?;
        if data.len() != expected {
            return Err(LiteralError::CountMismatch {
                kind,
                expected,
                actual: data.len(),
            });
        }
        let data = match (kind, data) {
            (ScalarKind::Bool, data @ LiteralData::Bool(_)) => data,
            (k, LiteralData::Int(values)) if k.is_integer() => {
                for &value in &values {
                    if wrap_int(value, k) != value {
                        return Err(LiteralError::OutOfRange { kind: k, value });
                    }
                }
                LiteralData::Int(values)
            }
            (k, LiteralData::Float(values)) if k.is_floating() => {
                LiteralData::Float(values.into_iter().map(|v| round_float(v, k)).collect())
            }
            // Integer spellings are accepted for floating kinds (`tensor<f32>{2}`).
            (k, LiteralData::Int(values)) if k.is_floating() => LiteralData::Float(
                values
                    .into_iter()
                    .map(|v| round_float(v as f64, k))
                    .collect(),
            ),
            (k, data) => {
                return Err(LiteralError::StorageMismatch {
                    kind: k,
                    found: data.storage_name(),
                })
            }
        };
        Ok(TensorLiteral { kind, dims, data })
    }

    /// Rank-0 integer literal.
    pub fn scalar_int(kind: ScalarKind, value: i64) -> Result<Self, LiteralError> {
        TensorLiteral::new(kind, Vec::new(), LiteralData::Int(vec![value]))
    }

    /// Rank-0 floating-point literal.
    pub fn scalar_float(kind: ScalarKind, value: f64) -> Result<Self, LiteralError> {
        TensorLiteral::new(kind, Vec::new(), LiteralData::Float(vec![value]))
    }

    pub fn scalar_bool(value: bool) -> Self {
        TensorLiteral {
            kind: ScalarKind::Bool,
            dims: Vec::new(),
            data: LiteralData::Bool(vec![value]),
        }
    }

    pub fn kind(&self) -> ScalarKind {
        self.kind
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn data(&self) -> &LiteralData {
        &self.data
    }

    /// Convert every element to `target`, keeping the shape.
    ///
    /// Integer targets wrap like a C cast after truncating floats toward zero;
    /// bool targets test against zero.
    pub fn recast(&self, target: ScalarKind) -> TensorLiteral {
        let data = match target {
            ScalarKind::Bool => LiteralData::Bool(match &self.data {
                LiteralData::Bool(v) => v.clone(),
                LiteralData::Int(v) => v.iter().map(|&x| x != 0).collect(),
                LiteralData::Float(v) => v.iter().map(|&x| x != 0.0).collect(),
            }),
            k if k.is_integer() => LiteralData::Int(match &self.data {
                LiteralData::Bool(v) => v.iter().map(|&b| b as i64).collect(),
                LiteralData::Int(v) => v.iter().map(|&x| wrap_int(x, k)).collect(),
                LiteralData::Float(v) => v.iter().map(|&x| wrap_int(x as i64, k)).collect(),
            }),
            k => LiteralData::Float(match &self.data {
                LiteralData::Bool(v) => v.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect(),
                LiteralData::Int(v) => v.iter().map(|&x| round_float(x as f64, k)).collect(),
                LiteralData::Float(v) => v.iter().map(|&x| round_float(x, k)).collect(),
            }),
        };
        TensorLiteral {
            kind: target,
            dims: self.dims.clone(),
            data,
        }
    }
}

fn wrap_int(value: i64, kind: ScalarKind) -> i64 {
    match kind {
        ScalarKind::Uint8 => value as u8 as i64,
        ScalarKind::Int8 => value as i8 as i64,
        ScalarKind::Int16 => value as i16 as i64,
        ScalarKind::Int32 => value as i32 as i64,
        _ => value,
    }
}

// Values are held as f64 but always rounded to what the element kind can hold.
fn round_float(value: f64, kind: ScalarKind) -> f64 {
    match kind {
        ScalarKind::Float64 => value,
        ScalarKind::Float16 => f16::from_f64(value).to_f64(),
        ScalarKind::BFloat16 => bf16::from_f64(value).to_f64(),
        _ => value as f32 as f64,
    }
}

/// Format a float so the textual IR lexer reads it back as a float.
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value == f64::INFINITY {
        "inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        format!("{value:?}")
    }
}

impl fmt::Display for TensorLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tensor<{}>", self.kind)?;
        if !self.dims.is_empty() {
            let dims: Vec<String> = self.dims.iter().map(|d| d.to_string()).collect();
            write!(f, "[{}]", dims.join(", "))?;
        }
        let items: Vec<String> = match &self.data {
            LiteralData::Bool(v) => v.iter().map(|b| b.to_string()).collect(),
            LiteralData::Int(v) => v.iter().map(|x| x.to_string()).collect(),
            LiteralData::Float(v) => v.iter().map(|&x| format_float(x)).collect(),
        };
        write!(f, "{{{}}}", items.join(", "))
    }
}
