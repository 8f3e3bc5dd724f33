// Snapshot tests: lock the rewritten IR for the canonical analysis scenarios.
//
// Uses the library API (parse_graph → scalar_type_analysis) and snapshots the
// printed graph plus any diagnostics. Snapshots are inline; run
// `cargo insta review` after intentional output changes to update them.

use sta::load::parse_graph;
use sta::scalar_types::{scalar_type_analysis, AnalysisResult};
use sta::verify::{check_type_consistency, verify_graph};

/// Run the analysis and return the printed graph with the pass result.
fn analyze(source: &str) -> (String, AnalysisResult) {
    let mut graph = parse_graph(source).unwrap_or_else(|diags| {
        let msgs: Vec<String> = diags.iter().map(|d| d.to_string()).collect();
        panic!("source failed to load:\n{}", msgs.join("\n"))
    });
    let result = scalar_type_analysis(&mut graph);
    let broken = verify_graph(&graph);
    assert!(broken.is_empty(), "rewritten graph is malformed: {:#?}", broken);
    (graph.to_string(), result)
}

fn diagnostics(result: &AnalysisResult) -> String {
    let msgs: Vec<String> = result.diagnostics.iter().map(|d| d.to_string()).collect();
    msgs.join("\n")
}

#[test]
fn constant_operand_follows_tensor_kind() {
    let (printed, result) = analyze(
        "graph(%a : f32) {
           %b : i32 = onnx::Constant[value=tensor<i32>{2}]()
           %s : f32 = onnx::Add(%a, %b)
           return (%s)
         }",
    );
    insta::assert_snapshot!(printed, @r"
    graph(%a : f32) {
      %b.1 : f32 = onnx::Constant[value=tensor<f32>{2.0}]()
      %s : f32 = onnx::Add(%a, %b.1)
      return (%s)
    }
    ");
    assert!(result.diagnostics.is_empty());
    assert_eq!(result.stats.constants_recast, 1);
    assert_eq!(result.stats.instructions_removed, 1);
}

#[test]
fn comparison_casts_to_promoted_kind() {
    let (printed, result) = analyze(
        "graph(%a : f64, %b : f32) {
           %g : bool = onnx::Greater(%a, %b)
           return (%g)
         }",
    );
    insta::assert_snapshot!(printed, @r"
    graph(%a : f64, %b : f32) {
      %b.1 : f64 = onnx::Cast[to=11](%b)
      %g : bool = onnx::Greater(%a, %b.1)
      return (%g)
    }
    ");
    assert_eq!(result.stats.casts_inserted, 1);
    assert_eq!(result.stats.outputs_retyped, 0);
}

#[test]
fn shape_dimension_is_a_scalar_operand() {
    let source = "graph(%x : f32, %y : i64) {
  %shape : i64 = onnx::Shape(%x)
  %zero : i64 = onnx::Constant[value=tensor<i64>{0}]()
  %dim : i64 = onnx::Gather(%shape, %zero)
  %s : i64 = onnx::Add(%dim, %y)
  return (%s)
}";
    let (printed, result) = analyze(source);
    assert_eq!(printed, source);
    assert_eq!(result.stats.instructions_typed, 1);
    assert_eq!(result.stats.constants_recast + result.stats.casts_inserted, 0);
}

#[test]
fn all_scalar_operands_fold_their_kinds() {
    let (printed, result) = analyze(
        "graph() {
           %p : i16 = onnx::Constant[value=tensor<i16>{3}]()
           %q : i16 = onnx::Constant[value=tensor<i16>{4}]()
           %m = onnx::Mul(%p, %q)
           return (%m)
         }",
    );
    insta::assert_snapshot!(printed, @r"
    graph() {
      %p : i16 = onnx::Constant[value=tensor<i16>{3}]()
      %q : i16 = onnx::Constant[value=tensor<i16>{4}]()
      %m : i16 = onnx::Mul(%p, %q)
      return (%m)
    }
    ");
    assert_eq!(result.stats.constants_recast, 0);
    assert_eq!(result.stats.outputs_retyped, 1);
}

#[test]
fn conflicting_tensor_kinds_fall_back_to_first() {
    let (printed, result) = analyze(
        "graph(%t1 : f16, %t2 : f32) {
           %s = onnx::Add(%t1, %t2)
           return (%s)
         }",
    );
    insta::assert_snapshot!(printed, @r"
    graph(%t1 : f16, %t2 : f32) {
      %t2.1 : f16 = onnx::Cast[to=10](%t2)
      %s : f16 = onnx::Add(%t1, %t2.1)
      return (%s)
    }
    ");
    insta::assert_snapshot!(diagnostics(&result), @r"
    warning[W0101]: scalar kinds of tensor operands of onnx::Add (%s) disagree (f16, f32); using f16 from the first tensor operand
      hint: annotate the result kind of this instruction to make the choice explicit
    ");
}

#[test]
fn nested_region_constants_are_recast() {
    let (printed, _) = analyze(
        "graph(%p : bool, %x : f64) {
           %r : f64 = onnx::If(%p) {
             block() {
               %one : i64 = onnx::Constant[value=tensor<i64>{1}]()
               %t = onnx::Mul(%x, %one)
               return (%t)
             }
             block() {
               return (%x)
             }
           }
           return (%r)
         }",
    );
    insta::assert_snapshot!(printed, @r"
    graph(%p : bool, %x : f64) {
      %r : f64 = onnx::If(%p) {
        block() {
          %one.1 : f64 = onnx::Constant[value=tensor<f64>{1.0}]()
          %t : f64 = onnx::Mul(%x, %one.1)
          return (%t)
        }
        block() {
          return (%x)
        }
      }
      return (%r)
    }
    ");
}

#[test]
fn unmapped_target_skips_cast_but_recasts_constants() {
    let (printed, result) = analyze(
        "graph(%a : bf16, %b : f32) {
           %c : f32 = onnx::Constant[value=tensor<f32>{0.5}]()
           %s : bf16 = onnx::Add(%a, %b, %c)
           return (%s)
         }",
    );
    insta::assert_snapshot!(printed, @r"
    graph(%a : bf16, %b : f32) {
      %c.1 : bf16 = onnx::Constant[value=tensor<bf16>{0.5}]()
      %s : bf16 = onnx::Add(%a, %b, %c.1)
      return (%s)
    }
    ");
    insta::assert_snapshot!(diagnostics(&result), @r"
    warning[W0102]: scalar kind bf16 has no ONNX type; operand 1 (%b) of onnx::Add (%s) keeps kind f32
      hint: the exported graph has a type mismatch on this operand
    ");
    assert_eq!(result.stats.casts_skipped, 1);
}

#[test]
fn rewritten_scenarios_are_consistent() {
    let sources = [
        "graph(%a : f32) { %b : i32 = onnx::Constant[value=tensor<i32>{2}]() %s : f32 = onnx::Add(%a, %b) return (%s) }",
        "graph(%a : f64, %b : f32) { %g : bool = onnx::Greater(%a, %b) return (%g) }",
        "graph(%t1 : f16, %t2 : f32) { %s = onnx::Add(%t1, %t2) return (%s) }",
        "graph(%x : i32) { %c : f64 = onnx::Constant[value=tensor<f64>{1.5}]() %w = onnx::Sub(%x, %c) %e : bool = onnx::Equal(%w, %c) return (%e) }",
    ];
    for source in sources {
        let mut graph = parse_graph(source).unwrap();
        scalar_type_analysis(&mut graph);
        let left = check_type_consistency(&graph);
        assert!(left.is_empty(), "{}: {:?}", source, left);
    }
}
