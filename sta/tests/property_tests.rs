// Property-based tests for analysis invariants.
//
// Two categories:
// 1. Promotion lattice laws: exhaustive check over all ScalarKind triples
// 2. Generated graphs: the pass leaves them consistent, well formed, and
//    stable under a second run
//
// Uses proptest with explicit configuration to prevent CI flakiness.

use proptest::prelude::*;
use sta::kind::{fold_promote, join, ScalarKind};
use sta::load::parse_graph;
use sta::scalar_types::scalar_type_analysis;
use sta::verify::{check_type_consistency, verify_graph};

// ── 1. Promotion lattice (exhaustive) ──────────────────────────────────────

#[test]
fn join_is_commutative_and_idempotent() {
    for a in ScalarKind::ALL {
        assert_eq!(join(a, a), a, "join({a}, {a}) is not {a}");
        for b in ScalarKind::ALL {
            assert_eq!(join(a, b), join(b, a), "join({a}, {b}) is not commutative");
        }
    }
}

#[test]
fn join_is_associative() {
    for a in ScalarKind::ALL {
        for b in ScalarKind::ALL {
            for c in ScalarKind::ALL {
                assert_eq!(
                    join(join(a, b), c),
                    join(a, join(b, c)),
                    "associativity violated for ({}, {}, {})",
                    a,
                    b,
                    c
                );
            }
        }
    }
}

#[test]
fn join_is_an_upper_bound() {
    for a in ScalarKind::ALL {
        for b in ScalarKind::ALL {
            let j = join(a, b);
            // a ≤ j and b ≤ j in the lattice order.
            assert_eq!(join(a, j), j, "{} is not above {}", j, a);
            assert_eq!(join(b, j), j, "{} is not above {}", j, b);
        }
    }
}

#[test]
fn join_is_least_among_upper_bounds() {
    for a in ScalarKind::ALL {
        for b in ScalarKind::ALL {
            let j = join(a, b);
            for c in ScalarKind::ALL {
                if join(a, c) == c && join(b, c) == c {
                    assert_eq!(join(j, c), c, "{} bounds {} and {} but not {}", c, a, b, j);
                }
            }
        }
    }
}

#[test]
fn bool_is_bottom() {
    for k in ScalarKind::ALL {
        assert_eq!(join(ScalarKind::Bool, k), k);
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 100,
        max_shrink_iters: 200,
        .. ProptestConfig::default()
    })]

    #[test]
    fn fold_promote_ignores_order(
        kinds in prop::collection::vec(prop::sample::select(ScalarKind::ALL.to_vec()), 1..8),
    ) {
        let mut reversed = kinds.clone();
        reversed.reverse();
        prop_assert_eq!(fold_promote(&kinds), fold_promote(&reversed));
        let folded = fold_promote(&kinds).unwrap();
        for &k in &kinds {
            prop_assert_eq!(join(k, folded), folded);
        }
    }
}

// ── 2. Graph generator ──────────────────────────────────────────────────────

/// Kinds that have a wire identifier, so every cast the pass wants is emitted.
const MAPPED_KINDS: [ScalarKind; 9] = [
    ScalarKind::Bool,
    ScalarKind::Uint8,
    ScalarKind::Int8,
    ScalarKind::Int16,
    ScalarKind::Int32,
    ScalarKind::Int64,
    ScalarKind::Float16,
    ScalarKind::Float32,
    ScalarKind::Float64,
];

const NUMERIC_KINDS: [ScalarKind; 8] = [
    ScalarKind::Uint8,
    ScalarKind::Int8,
    ScalarKind::Int16,
    ScalarKind::Int32,
    ScalarKind::Int64,
    ScalarKind::Float16,
    ScalarKind::Float32,
    ScalarKind::Float64,
];

#[derive(Debug, Clone)]
enum Step {
    Constant(ScalarKind, u8),
    Uniform(&'static str, Vec<usize>, Option<ScalarKind>),
    Compare(&'static str, usize, usize),
}

fn arb_kind() -> impl Strategy<Value = ScalarKind> {
    prop::sample::select(MAPPED_KINDS.to_vec())
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (prop::sample::select(NUMERIC_KINDS.to_vec()), 0u8..100)
            .prop_map(|(k, v)| Step::Constant(k, v)),
        (
            prop::sample::select(vec!["onnx::Add", "onnx::Sub", "onnx::Mul", "onnx::Div"]),
            prop::collection::vec(any::<usize>(), 2..4),
            prop::option::of(arb_kind()),
        )
            .prop_map(|(op, operands, out)| Step::Uniform(op, operands, out)),
        (
            prop::sample::select(vec!["onnx::Less", "onnx::Greater", "onnx::Equal"]),
            any::<usize>(),
            any::<usize>(),
        )
            .prop_map(|(op, a, b)| Step::Compare(op, a, b)),
    ]
}

/// Render a straight-line graph. Operand indices pick among the values
/// defined so far; parameters may be unannotated.
fn render(params: &[Option<ScalarKind>], steps: &[Step], return_all: bool) -> String {
    let mut names: Vec<String> = Vec::new();
    let mut decls: Vec<String> = Vec::new();
    for (i, kind) in params.iter().enumerate() {
        let name = format!("%p{}", i);
        decls.push(match kind {
            Some(k) => format!("{} : {}", name, k),
            None => name.clone(),
        });
        names.push(name);
    }

    let mut body = String::new();
    for (i, step) in steps.iter().enumerate() {
        let name = format!("%v{}", i);
        let pick = |index: usize| names[index % names.len()].clone();
        let line = match step {
            Step::Constant(kind, value) => {
                let literal = if kind.is_floating() {
                    format!("{}.5", value)
                } else {
                    value.to_string()
                };
                format!(
                    "{} : {} = onnx::Constant[value=tensor<{}>{{{}}}]()",
                    name, kind, kind, literal
                )
            }
            Step::Uniform(op, operands, out) => {
                let refs: Vec<String> = operands.iter().map(|&o| pick(o)).collect();
                match out {
                    Some(k) => format!("{} : {} = {}({})", name, k, op, refs.join(", ")),
                    None => format!("{} = {}({})", name, op, refs.join(", ")),
                }
            }
            Step::Compare(op, a, b) => {
                format!("{} : bool = {}({}, {})", name, op, pick(*a), pick(*b))
            }
        };
        body.push_str("  ");
        body.push_str(&line);
        body.push('\n');
        names.push(name);
    }

    let returns = if return_all {
        names.join(", ")
    } else {
        names.last().cloned().unwrap_or_default()
    };
    format!("graph({}) {{\n{}  return ({})\n}}", decls.join(", "), body, returns)
}

fn arb_graph() -> impl Strategy<Value = String> {
    (
        prop::collection::vec(prop::option::weighted(0.8, arb_kind()), 1..4),
        prop::collection::vec(arb_step(), 1..12),
        any::<bool>(),
    )
        .prop_map(|(params, steps, return_all)| render(&params, &steps, return_all))
}

// ── 3. Pass invariants on generated graphs ─────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 100,
        max_shrink_iters: 200,
        .. ProptestConfig::default()
    })]

    #[test]
    fn rewritten_graph_is_consistent_and_well_formed(source in arb_graph()) {
        let mut graph = parse_graph(&source)
            .unwrap_or_else(|d| panic!("generated graph failed to load:\n{}\n{:?}", source, d));
        let result = scalar_type_analysis(&mut graph);

        let errors: Vec<_> = result.diagnostics.iter().filter(|d| d.is_error()).collect();
        prop_assert!(errors.is_empty(), "pass errors for:\n{}\n{:?}", source, errors);

        let broken = verify_graph(&graph);
        prop_assert!(broken.is_empty(), "malformed after pass:\n{}\n{:#?}", graph, broken);

        let left = check_type_consistency(&graph);
        prop_assert!(left.is_empty(), "inconsistent after pass:\n{}\n{:?}", graph, left);
    }

    #[test]
    fn second_run_changes_nothing(source in arb_graph()) {
        let mut graph = parse_graph(&source).unwrap();
        scalar_type_analysis(&mut graph);
        let once = graph.to_string();

        let again = scalar_type_analysis(&mut graph);
        prop_assert_eq!(graph.to_string(), once);
        prop_assert_eq!(again.stats.constants_recast, 0);
        prop_assert_eq!(again.stats.casts_inserted, 0);
        prop_assert_eq!(again.stats.instructions_removed, 0);
    }

    #[test]
    fn pass_is_deterministic(source in arb_graph()) {
        let mut first = parse_graph(&source).unwrap();
        let mut second = parse_graph(&source).unwrap();
        let a = scalar_type_analysis(&mut first);
        let b = scalar_type_analysis(&mut second);
        prop_assert_eq!(first.to_string(), second.to_string());
        prop_assert_eq!(a.stats, b.stats);
    }

    #[test]
    fn printed_output_reparses_identically(source in arb_graph()) {
        let mut graph = parse_graph(&source).unwrap();
        scalar_type_analysis(&mut graph);
        let printed = graph.to_string();
        let reparsed = parse_graph(&printed)
            .unwrap_or_else(|d| panic!("printed graph failed to load:\n{}\n{:?}", printed, d));
        prop_assert_eq!(reparsed.to_string(), printed);
    }
}
