// ast.rs — Syntax tree of the textual graph IR
//
// Produced by the parser, consumed by `load` which builds the arena graph.
// Every node carries a `SimpleSpan` for error reporting.
//
// Preconditions: produced by the parser from a valid or partially-valid token stream.
// Postconditions: each node's span covers the source range of the construct.
// Failure modes: none (data-only module).
// Side effects: none.

use chumsky::span::SimpleSpan;

use crate::kind::ScalarKind;

/// Byte-offset span (alias for chumsky's `SimpleSpan`).
pub type Span = SimpleSpan;

/// A value name without its `%` sigil.
#[derive(Debug, Clone, PartialEq)]
pub struct Name {
    pub name: String,
    pub span: Span,
}

/// A value definition: `%x` or `%x : f32`.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueDecl {
    pub name: Name,
    pub kind: Option<ScalarKind>,
}

// ── Regions ──

/// `graph(<params>) { ... }` or `block(<params>) { ... }`.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub params: Vec<ValueDecl>,
    pub insts: Vec<InstDef>,
    pub returns: Vec<Name>,
    pub span: Span,
}

// ── Instructions ──

/// `%a : k, %b = ns::Op[attr=v](%x, %y) { block(...) { ... } }`
#[derive(Debug, Clone, PartialEq)]
pub struct InstDef {
    pub outputs: Vec<ValueDecl>,
    pub op: String,
    pub op_span: Span,
    pub attrs: Vec<AttrDef>,
    pub inputs: Vec<Name>,
    pub regions: Vec<Block>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttrDef {
    pub name: String,
    pub value: AttrValue,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Str(String),
    Ints(Vec<i64>),
    Tensor(TensorSyntax),
}

// ── Tensor literals ──

/// `tensor<kind>{v}` or `tensor<kind>[d0, d1]{v, ...}` before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorSyntax {
    pub kind: ScalarKind,
    pub dims: Vec<usize>,
    pub elements: Vec<Element>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Element {
    Bool(bool),
    Int(i64),
    Float(f64),
}
