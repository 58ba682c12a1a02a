use compile_js::analyze_program;
use compile_js::compile_program;
use compile_js::dump_hir;
use compile_js::resolve::FsResolver;
use compile_js::resolve::ResolvedModule;
use compile_js::CompileOptions;
use compile_js::CompileOutput;
use diagnostics::Diagnostic;
use diagnostics::FileId;
use diagnostics::Severity;
use estree_js::build::*;
use estree_js::node::Node;
use estree_js::operator::BinaryOp;
use estree_js::operator::LogicalOp;
use estree_js::parse_program_json;
use estree_js::stmt::Program;
use similar::ChangeTag;
use similar::TextDiff;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

fn options() -> CompileOptions {
  CompileOptions {
    module_name: "fact".to_string(),
    ..CompileOptions::default()
  }
}

fn compile(mut program: Node<Program>, options: &CompileOptions) -> Result<CompileOutput, Vec<Diagnostic>> {
  compile_program(
    &mut program,
    options,
    &FsResolver::default(),
    FileId(0),
    Path::new("."),
  )
}

fn compile_ok(program: Node<Program>) -> CompileOutput {
  match compile(program, &options()) {
    Ok(out) => out,
    Err(diags) => panic!("compilation failed: {diags:#?}"),
  }
}

fn assert_same_text(expected: &str, actual: &str) {
  if expected == actual {
    return;
  }
  let mut msg = String::from("generated code differs:\n");
  for change in TextDiff::from_lines(expected, actual).iter_all_changes() {
    let sign = match change.tag() {
      ChangeTag::Delete => "-",
      ChangeTag::Insert => "+",
      ChangeTag::Equal => " ",
    };
    msg.push_str(sign);
    msg.push_str(change.as_str().unwrap());
  }
  panic!("{}", msg);
}

fn fact_program() -> Node<Program> {
  // function fact(n) { if (n <= 2) return n; else return n * fact(n - 1); }
  // fact(5);
  let body = vec![if_(
    bin(BinaryOp::Le, id("n"), num(2.0)),
    ret(Some(id("n"))),
    Some(ret(Some(bin(
      BinaryOp::Mul,
      id("n"),
      call(id("fact"), vec![bin(BinaryOp::Sub, id("n"), num(1.0))]),
    )))),
  )];
  program(vec![
    func_decl("fact", &["n"], body),
    expr_stmt(call(id("fact"), vec![num(5.0)])),
  ])
}

fn fixture(name: &str) -> PathBuf {
  Path::new(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("fixtures")
    .join(name)
}

#[test]
fn json_fixture_compiles_like_built_tree() {
  let json = fs::read_to_string(fixture("fact.json")).unwrap();
  let from_json = compile_ok(parse_program_json(&json).unwrap());
  let from_build = compile_ok(fact_program());
  assert_same_text(&from_build.c_source, &from_json.c_source);
  assert!(from_json.diagnostics.is_empty());
}

#[test]
fn output_is_deterministic() {
  let a = compile_ok(fact_program()).c_source;
  let b = compile_ok(fact_program()).c_source;
  assert_same_text(&a, &b);
}

#[test]
fn recursive_calls_are_direct() {
  let c = compile_ok(fact_program()).c_source;
  assert_eq!(c.matches("fn1_fact(&frame, js_closure_env(").count(), 2, "{c}");
  assert!(!c.contains("js_call(&frame"), "{c}");
  assert!(c.contains("js_if_le(&frame, "), "{c}");
  assert!(c.contains("= js_mul_n(&frame, "), "{c}");
  assert!(c.contains("js_make_number(5)"), "{c}");
  assert!(c.contains("return js_main(argc, argv, fn0_fact);"), "{c}");
}

#[test]
fn short_circuit_branches_without_values() {
  // var a, b; if (a && b) a = 1;
  let p = program(vec![
    var(vec![("a", None), ("b", None)]),
    if_(
      logical(LogicalOp::And, id("a"), id("b")),
      expr_stmt(assign(id("a"), num(1.0))),
      None,
    ),
  ]);
  let c = compile_ok(p).c_source;
  assert_eq!(c.matches("js_is_true(").count(), 2, "{c}");
  assert!(!c.contains("JS_TRUE_VALUE"), "{c}");
}

#[test]
fn closures_share_captured_variables() {
  // function counter() { var n = 0; return function () { n = n + 1; return n; }; }
  let inner = func_expr(None, &[], vec![
    expr_stmt(assign(id("n"), bin(BinaryOp::Add, id("n"), num(1.0)))),
    ret(Some(id("n"))),
  ]);
  let p = program(vec![func_decl("counter", &[], vec![
    var(vec![("n", Some(num(0.0)))]),
    ret(Some(inner)),
  ])]);
  let c = compile_ok(p).c_source;
  assert!(c.contains("Env * escaped = js_new_env(&frame, env, 1);"), "{c}");
  assert!(c.contains("escaped->vars[0] = js_make_number(0);"), "{c}");
  assert!(c.contains("js_new_closure(&frame, escaped, fn2)"), "{c}");
  assert!(c.contains("env->vars[0]"), "{c}");
}

#[test]
fn errors_stop_before_code_generation() {
  // "use strict"; x = 1;
  let p = program(vec![
    directive("use strict"),
    expr_stmt(assign(id("x"), num(1.0))),
  ]);
  let diags = compile(p, &options()).unwrap_err();
  assert_eq!(diags.len(), 1);
  assert_eq!(diags[0].severity, Severity::Error);
  assert_eq!(diags[0].code, "JSC0001");
  assert_eq!(diags[0].message, "undeclared identifier 'x'");
}

#[test]
fn warnings_are_returned_with_output() {
  // var x; if (x == 1) x = 2;
  let p = program(vec![
    var(vec![("x", None)]),
    if_(
      bin(BinaryOp::LooseEq, id("x"), num(1.0)),
      expr_stmt(assign(id("x"), num(2.0))),
      None,
    ),
  ]);
  let out = compile_ok(p);
  assert_eq!(out.diagnostics.len(), 1);
  assert_eq!(out.diagnostics[0].severity, Severity::Warning);
  assert_eq!(out.diagnostics[0].code, "JSC0002");
  assert!(out.c_source.contains("js_if_loose_eq(&frame, "));
}

#[test]
fn required_modules_become_dependencies() {
  // var lib = require("./lib"); require("missing");
  let mut p = program(vec![
    var(vec![("lib", Some(call(id("require"), vec![str("./lib")])))]),
    expr_stmt(call(id("require"), vec![str("missing")])),
  ]);
  let resolver = |dir: &Path, spec: &str| ResolvedModule {
    path: dir.join(spec.trim_start_matches("./")).with_extension("js"),
    not_found: spec == "missing",
  };
  let out = compile_program(
    &mut p,
    &options(),
    &resolver,
    FileId(0),
    Path::new("/src"),
  )
  .unwrap();
  assert_eq!(out.dependencies.len(), 1);
  assert_eq!(out.dependencies[0].specifier, "./lib");
  assert_eq!(out.dependencies[0].path, PathBuf::from("/src/lib.js"));
  assert!(out
    .diagnostics
    .iter()
    .any(|d| d.message == "cannot resolve module 'missing'"));
  // The rewritten argument is what the program sees at run time.
  let table = out.c_source.find("s_strbuf[").unwrap();
  assert!(out.c_source[table..].contains("/src/lib.js"), "{}", out.c_source);
}

#[test]
fn hir_dump_sees_rewritten_requires() {
  let mut p = program(vec![var(vec![(
    "lib",
    Some(call(id("require"), vec![bin(BinaryOp::Add, str("./l"), str("ib"))])),
  )])]);
  let resolver = |dir: &Path, spec: &str| ResolvedModule {
    path: dir.join(spec.trim_start_matches("./")).with_extension("js"),
    not_found: false,
  };
  let analysis = analyze_program(&mut p, &options(), &resolver, FileId(0), Path::new("/src"));
  assert_eq!(analysis.report.error_count(), 0);
  assert_eq!(analysis.dependencies[0].path, PathBuf::from("/src/lib.js"));
  let hir = dump_hir(&analysis.module.expect("module")).unwrap();
  assert!(hir.contains("\"/src/lib.js\""), "{hir}");
  assert!(!hir.contains("./l"), "{hir}");
}

#[test]
fn native_splices_are_emitted_verbatim() {
  // var x = 2, y;
  // __asm__({}, [["r", y]], [["v", x]], [], "%[r] = js_twice(%[v]);");
  let p = program(vec![
    var(vec![("x", Some(num(2.0))), ("y", None)]),
    expr_stmt(call(id("__asm__"), vec![
      object(vec![]),
      array(vec![array(vec![str("r"), id("y")])]),
      array(vec![array(vec![str("v"), id("x")])]),
      array(vec![]),
      str("%[r] = js_twice(%[v]);"),
    ])),
  ]);
  let out = compile_ok(p);
  let line = out
    .c_source
    .lines()
    .find(|l| l.contains("js_twice("))
    .expect("splice line");
  assert!(line.trim_start().starts_with("locals["), "{line}");
  assert!(!line.contains("%["), "{line}");
}

#[test]
fn library_mode_has_no_main() {
  let out = compile(fact_program(), &CompileOptions {
    emit_main: false,
    ..options()
  })
  .unwrap();
  assert!(!out.c_source.contains("int main"));
  assert!(out.c_source.contains("TaggedValue jsmod_fact (StackFrame * caller, Env * env)"));
}
