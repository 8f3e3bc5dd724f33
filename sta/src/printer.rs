// printer.rs — Textual IR output
//
// Renders a graph in the form `load::parse_graph` reads, so printing,
// parsing and printing again gives the same text. Attributes print in name
// order, instructions in region order, nested regions indented two spaces
// per level.
//
// Preconditions: none.
// Postconditions: output parses back to an equivalent graph.
// Failure modes: none.
// Side effects: none.

use std::fmt::{self, Write};

use crate::ir::{Attr, Graph, InstId, RegionId, ValueId};
use crate::lexer::escape_string;
use crate::literal::format_float;

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        out.push_str("graph");
        write_block(self, self.root(), 0, &mut out)?;
        f.write_str(&out)
    }
}

pub fn print_graph(graph: &Graph) -> String {
    graph.to_string()
}

fn write_block(g: &Graph, region: RegionId, depth: usize, out: &mut String) -> fmt::Result {
    let params: Vec<String> = g.region(region).params().iter().map(|&v| decl(g, v)).collect();
    writeln!(out, "({}) {{", params.join(", "))?;
    for inst in g.insts_of(region) {
        write_inst(g, inst, depth + 1, out)?;
    }
    indent(out, depth + 1);
    writeln!(out, "return ({})", refs(g, g.region(region).returns()))?;
    indent(out, depth);
    out.push('}');
    Ok(())
}

fn write_inst(g: &Graph, id: InstId, depth: usize, out: &mut String) -> fmt::Result {
    let inst = g.inst(id);
    indent(out, depth);
    if !inst.outputs().is_empty() {
        let outputs: Vec<String> = inst.outputs().iter().map(|&v| decl(g, v)).collect();
        write!(out, "{} = ", outputs.join(", "))?;
    }
    out.push_str(inst.op().qualified_name());
    if !inst.attrs().is_empty() {
        let attrs: Vec<String> = inst
            .attrs()
            .iter()
            .map(|(name, value)| format!("{}={}", name, attr(value)))
            .collect();
        write!(out, "[{}]", attrs.join(", "))?;
    }
    write!(out, "({})", refs(g, inst.inputs()))?;
    if !inst.regions().is_empty() {
        out.push_str(" {\n");
        for &region in inst.regions() {
            indent(out, depth + 1);
            out.push_str("block");
            write_block(g, region, depth + 1, out)?;
            out.push('\n');
        }
        indent(out, depth);
        out.push('}');
    }
    out.push('\n');
    Ok(())
}

fn decl(g: &Graph, v: ValueId) -> String {
    match g.kind(v) {
        Some(kind) => format!("%{} : {}", g.name(v), kind),
        None => format!("%{}", g.name(v)),
    }
}

fn refs(g: &Graph, values: &[ValueId]) -> String {
    let names: Vec<String> = values.iter().map(|&v| format!("%{}", g.name(v))).collect();
    names.join(", ")
}

fn attr(value: &Attr) -> String {
    match value {
        Attr::Int(i) => i.to_string(),
        Attr::Float(x) => format_float(*x),
        Attr::Str(s) => escape_string(s),
        Attr::Ints(v) => {
            let items: Vec<String> = v.iter().map(|i| i.to_string()).collect();
            format!("[{}]", items.join(", "))
        }
        Attr::Tensor(t) => t.to_string(),
    }
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}
