// kind.rs — Scalar kinds, promotion lattice, and wire type table
//
// Scalar kinds are the element-type tags carried by graph values. Promotion
// is a lattice join matching the host tensor runtime's numeric promotion for
// mixed-type arithmetic, so exported casts preserve observable values.
//
// Preconditions: none.
// Postconditions: `join` is commutative, associative, idempotent; `Bool` is
//   the bottom element.
// Failure modes: kinds with no wire identifier return `None` from `wire_type`.
// Side effects: none.

use std::fmt;

use serde::{Deserialize, Serialize};

// ── Scalar kind ─────────────────────────────────────────────────────────────

/// Element type tag of a tensor value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScalarKind {
    #[serde(rename = "bool")]
    Bool,
    #[serde(rename = "u8")]
    Uint8,
    #[serde(rename = "i8")]
    Int8,
    #[serde(rename = "i16")]
    Int16,
    #[serde(rename = "i32")]
    Int32,
    #[serde(rename = "i64")]
    Int64,
    #[serde(rename = "f16")]
    Float16,
    #[serde(rename = "bf16")]
    BFloat16,
    #[serde(rename = "f32")]
    Float32,
    #[serde(rename = "f64")]
    Float64,
}

impl ScalarKind {
    /// Every kind, in declaration order.
    pub const ALL: [ScalarKind; 10] = [
        ScalarKind::Bool,
        ScalarKind::Uint8,
        ScalarKind::Int8,
        ScalarKind::Int16,
        ScalarKind::Int32,
        ScalarKind::Int64,
        ScalarKind::Float16,
        ScalarKind::BFloat16,
        ScalarKind::Float32,
        ScalarKind::Float64,
    ];

    /// Short name used by the textual IR (`f32`, `i64`, ...).
    pub const fn name(self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::Uint8 => "u8",
            ScalarKind::Int8 => "i8",
            ScalarKind::Int16 => "i16",
            ScalarKind::Int32 => "i32",
            ScalarKind::Int64 => "i64",
            ScalarKind::Float16 => "f16",
            ScalarKind::BFloat16 => "bf16",
            ScalarKind::Float32 => "f32",
            ScalarKind::Float64 => "f64",
        }
    }

    pub fn from_name(name: &str) -> Option<ScalarKind> {
        ScalarKind::ALL.into_iter().find(|k| k.name() == name)
    }

    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            ScalarKind::Uint8
                | ScalarKind::Int8
                | ScalarKind::Int16
                | ScalarKind::Int32
                | ScalarKind::Int64
        )
    }

    pub const fn is_floating(self) -> bool {
        matches!(
            self,
            ScalarKind::Float16 | ScalarKind::BFloat16 | ScalarKind::Float32 | ScalarKind::Float64
        )
    }

    /// ONNX `TensorProto.DataType` identifier for this kind.
    ///
    /// The table is closed: `BFloat16` has no entry, and conversions to it
    /// cannot be emitted.
    pub const fn wire_type(self) -> Option<i64> {
        match self {
            ScalarKind::Float32 => Some(1),
            ScalarKind::Uint8 => Some(2),
            ScalarKind::Int8 => Some(3),
            ScalarKind::Int16 => Some(5),
            ScalarKind::Int32 => Some(6),
            ScalarKind::Int64 => Some(7),
            ScalarKind::Bool => Some(9),
            ScalarKind::Float16 => Some(10),
            ScalarKind::Float64 => Some(11),
            ScalarKind::BFloat16 => None,
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Promotion lattice ───────────────────────────────────────────────────────

/// (family, rank): family 0 is bool, 1 integer, 2 floating point.
/// Kinds sharing a (family, rank) pair are incomparable; their join is one
/// step up (uint8 ⊔ int8 = int16, float16 ⊔ bfloat16 = float32).
fn promotion_rank(kind: ScalarKind) -> (u8, u8) {
    match kind {
        ScalarKind::Bool => (0, 0),
        ScalarKind::Uint8 | ScalarKind::Int8 => (1, 0),
        ScalarKind::Int16 => (1, 1),
        ScalarKind::Int32 => (1, 2),
        ScalarKind::Int64 => (1, 3),
        ScalarKind::Float16 | ScalarKind::BFloat16 => (2, 0),
        ScalarKind::Float32 => (2, 1),
        ScalarKind::Float64 => (2, 2),
    }
}

/// Least general kind that represents both `a` and `b`.
pub fn join(a: ScalarKind, b: ScalarKind) -> ScalarKind {
    if a == b {
        return a;
    }
    match (a, b) {
        (ScalarKind::Uint8, ScalarKind::Int8) | (ScalarKind::Int8, ScalarKind::Uint8) => {
            ScalarKind::Int16
        }
        (ScalarKind::Float16, ScalarKind::BFloat16) | (ScalarKind::BFloat16, ScalarKind::Float16) => {
            ScalarKind::Float32
        }
        _ => {
            if promotion_rank(a) >= promotion_rank(b) {
                a
            } else {
                b
            }
        }
    }
}

/// Fold a list of kinds with `join`. Empty input has no result.
pub fn fold_promote(kinds: &[ScalarKind]) -> Option<ScalarKind> {
    kinds.iter().copied().reduce(join)
}

// ── Tests ───────────────────────────────────────────────────────────────────
