// sta — Scalar type analysis for exported tensor graphs
//
// Library root. The analysis itself lives in `scalar_types`; the textual IR
// front end, verifier and pipeline are the tooling around it.

pub mod ast;
pub mod dce;
pub mod diag;
pub mod infer;
pub mod ir;
pub mod kind;
pub mod lexer;
pub mod literal;
pub mod load;
pub mod op;
pub mod origin;
pub mod parser;
pub mod pipeline;
pub mod printer;
pub mod rewrite;
pub mod scalar_types;
pub mod verify;
