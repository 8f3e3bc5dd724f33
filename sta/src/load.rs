// load.rs — Build the arena graph from textual IR
//
// Walks the syntax tree produced by the parser and constructs a `Graph`:
// region parameters, instructions in source order, nested regions, returns.
// Value names are resolved lexically: a region sees its own earlier
// definitions and everything visible where its owning instruction appears.
// The results of an instruction are not visible inside its own regions.
//
// Preconditions: none.
// Postconditions: on success every value keeps its source name and kind
//   annotation, and region order equals source order.
// Failure modes: syntax errors (E0001), undefined names (E0002), duplicate
//   names (E0003) and malformed tensor literals (E0004) are returned as
//   diagnostics; loading continues past errors to report them all.
// Side effects: none.

use std::collections::HashMap;

use crate::ast::{AttrValue, Block, Element, InstDef, Name, Span, TensorSyntax, ValueDecl};
use crate::diag::{codes, has_errors, Diagnostic, Location};
use crate::ir::{Attr, Graph, RegionId, ValueId};
use crate::kind::ScalarKind;
use crate::literal::{LiteralData, TensorLiteral};
use crate::op::OpKind;
use crate::parser;

// ── Public API ──────────────────────────────────────────────────────────────

/// Parse textual IR and build the graph it describes.
pub fn parse_graph(source: &str) -> Result<Graph, Vec<Diagnostic>> {
    let result = parser::parse(source);
    if !result.errors.is_empty() {
        return Err(result
            .errors
            .iter()
            .map(|e| {
                Diagnostic::error(Location::Source(*e.span()), e.to_string())
                    .with_code(codes::PARSE)
            })
            .collect());
    }
    match result.graph {
        Some(block) => build_graph(&block),
        None => Err(vec![Diagnostic::error(Location::Graph, "no graph in input")
            .with_code(codes::PARSE)]),
    }
}

/// Build a graph from an already parsed syntax tree.
pub fn build_graph(block: &Block) -> Result<Graph, Vec<Diagnostic>> {
    let mut loader = Loader {
        graph: Graph::new(),
        scopes: vec![HashMap::new()],
        defined: HashMap::new(),
        placeholder: None,
        diagnostics: Vec::new(),
    };
    let root = loader.graph.root();
    loader.load_block(root, block);
    if has_errors(&loader.diagnostics) {
        Err(loader.diagnostics)
    } else {
        Ok(loader.graph)
    }
}

// ── Loader ──────────────────────────────────────────────────────────────────

struct Loader {
    graph: Graph,
    /// Innermost scope last.
    scopes: Vec<HashMap<String, ValueId>>,
    /// Every name defined so far, graph-wide, with its first definition.
    defined: HashMap<String, Span>,
    /// Stand-in operand for undefined names, so one typo reports once.
    placeholder: Option<ValueId>,
    diagnostics: Vec<Diagnostic>,
}

impl Loader {
    fn load_block(&mut self, region: RegionId, block: &Block) {
        let params: Vec<ValueId> = block
            .params
            .iter()
            .map(|decl| self.graph.add_param(region, decl.kind))
            .collect();
        let visible = self.declare(&params, &block.params);
        self.bring_into_scope(visible);

        for inst in &block.insts {
            self.load_inst(region, inst);
        }

        let returns: Vec<ValueId> = block.returns.iter().map(|n| self.lookup(n)).collect();
        self.graph.set_returns(region, &returns);
    }

    fn load_inst(&mut self, region: RegionId, def: &InstDef) {
        let inputs: Vec<ValueId> = def.inputs.iter().map(|n| self.lookup(n)).collect();
        let id = self
            .graph
            .append(region, OpKind::from_qualified(&def.op), &inputs, def.outputs.len());

        for attr in &def.attrs {
            let value = match &attr.value {
                AttrValue::Int(i) => Attr::Int(*i),
                AttrValue::Float(f) => Attr::Float(*f),
                AttrValue::Str(s) => Attr::Str(s.clone()),
                AttrValue::Ints(v) => Attr::Ints(v.clone()),
                AttrValue::Tensor(t) => match self.literal(t) {
                    Some(literal) => Attr::Tensor(literal),
                    None => continue,
                },
            };
            self.graph.set_attr(id, &attr.name, value);
        }

        let outputs = self.graph.inst(id).outputs().to_vec();
        for (&value, decl) in outputs.iter().zip(&def.outputs) {
            if let Some(kind) = decl.kind {
                self.graph.set_kind(value, kind);
            }
        }
        let visible = self.declare(&outputs, &def.outputs);

        for body in &def.regions {
            let nested = self.graph.add_region(id);
            self.scopes.push(HashMap::new());
            self.load_block(nested, body);
            self.scopes.pop();
        }

        self.bring_into_scope(visible);
    }

    /// Give freshly created values their source names. Returns the names that
    /// may enter scope; duplicates are reported and left out.
    fn declare(&mut self, values: &[ValueId], decls: &[ValueDecl]) -> Vec<(String, ValueId)> {
        let mut renames: Vec<(ValueId, &str)> = Vec::new();
        let mut visible = Vec::new();
        for (&value, decl) in values.iter().zip(decls) {
            let Name { name, span } = &decl.name;
            if let Some(first) = self.defined.get(name) {
                self.diagnostics.push(
                    Diagnostic::error(
                        Location::Source(*span),
                        format!("value '%{name}' is defined more than once"),
                    )
                    .with_code(codes::DUPLICATE_VALUE)
                    .with_cause("first defined here", Some(Location::Source(*first))),
                );
                continue;
            }
            self.defined.insert(name.clone(), *span);
            renames.push((value, name.as_str()));
            visible.push((name.clone(), value));
        }
        if let Err(err) = self.graph.rename_all(&renames) {
            let span = decls.first().map_or(Location::Graph, |d| Location::Source(d.name.span));
            self.diagnostics
                .push(Diagnostic::error(span, err.to_string()).with_code(codes::DUPLICATE_VALUE));
        }
        visible
    }

    fn bring_into_scope(&mut self, names: Vec<(String, ValueId)>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.extend(names);
        }
    }

    fn lookup(&mut self, name: &Name) -> ValueId {
        if let Some(&v) = self.scopes.iter().rev().find_map(|s| s.get(&name.name)) {
            return v;
        }
        self.diagnostics.push(
            Diagnostic::error(
                Location::Source(name.span),
                format!("undefined value '%{}'", name.name),
            )
            .with_code(codes::UNDEFINED_VALUE)
            .with_hint("values must be defined earlier in the same block or an enclosing one"),
        );
        self.placeholder()
    }

    fn placeholder(&mut self) -> ValueId {
        if let Some(v) = self.placeholder {
            return v;
        }
        let root = self.graph.root();
        let v = self.graph.add_param(root, None);
        self.placeholder = Some(v);
        v
    }

    fn literal(&mut self, t: &TensorSyntax) -> Option<TensorLiteral> {
        let data = match literal_data(t.kind, &t.elements) {
            Some(data) => data,
            None => {
                self.diagnostics.push(
                    Diagnostic::error(
                        Location::Source(t.span),
                        "tensor literal mixes bool and numeric elements",
                    )
                    .with_code(codes::BAD_LITERAL),
                );
                return None;
            }
        };
        match TensorLiteral::new(t.kind, t.dims.clone(), data) {
            Ok(literal) => Some(literal),
            Err(err) => {
                self.diagnostics.push(
                    Diagnostic::error(Location::Source(t.span), err.to_string())
                        .with_code(codes::BAD_LITERAL),
                );
                None
            }
        }
    }
}

/// Pick the storage for literal elements. Integers mixed with floats are
/// widened; bools never mix with numbers.
fn literal_data(kind: ScalarKind, elements: &[Element]) -> Option<LiteralData> {
    if elements.is_empty() {
        return Some(if kind == ScalarKind::Bool {
            LiteralData::Bool(Vec::new())
        } else if kind.is_integer() {
            LiteralData::Int(Vec::new())
        } else {
            LiteralData::Float(Vec::new())
        });
    }
    let bools: Option<Vec<bool>> = elements
        .iter()
        .map(|e| match e {
            Element::Bool(b) => Some(*b),
            _ => None,
        })
        .collect();
    if let Some(bools) = bools {
        return Some(LiteralData::Bool(bools));
    }
    let ints: Option<Vec<i64>> = elements
        .iter()
        .map(|e| match e {
            Element::Int(i) => Some(*i),
            _ => None,
        })
        .collect();
    if let Some(ints) = ints {
        return Some(LiteralData::Int(ints));
    }
    elements
        .iter()
        .map(|e| match e {
            Element::Int(i) => Some(*i as f64),
            Element::Float(f) => Some(*f),
            Element::Bool(_) => None,
        })
        .collect::<Option<Vec<f64>>>()
        .map(LiteralData::Float)
}

// ── Tests ───────────────────────────────────────────────────────────────────
