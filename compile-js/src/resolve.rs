use crate::report::Reporter;
use derive_visitor::Drive;
use derive_visitor::DriveMut;
use derive_visitor::Visitor;
use derive_visitor::VisitorMut;
use estree_js::expr::Expr;
use estree_js::expr::Lit;
use estree_js::expr::LitValue;
use estree_js::expr::Pat;
use estree_js::func::ArrowBody;
use estree_js::func::ArrowFunc;
use estree_js::func::Func;
use estree_js::node::Loc;
use estree_js::node::Node;
use estree_js::stmt::Program;
use estree_js::stmt::Stmt;
use estree_js::stmt::VarDeclarator;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedModule {
  pub path: PathBuf,
  pub not_found: bool,
}

/// Maps a module specifier, as written in `require("...")`, to a file.
pub trait ModuleResolver {
  fn resolve(&self, from_dir: &Path, specifier: &str) -> ResolvedModule;
}

impl<F: Fn(&Path, &str) -> ResolvedModule> ModuleResolver for F {
  fn resolve(&self, from_dir: &Path, specifier: &str) -> ResolvedModule {
    self(from_dir, specifier)
  }
}

/// Lexically removes `.` segments and folds `..` into the preceding segment.
/// A `..` that would climb above the root of an absolute path is dropped; on
/// a relative path it is kept.
pub fn normalize_path(path: &Path) -> PathBuf {
  let mut parts: Vec<Component> = Vec::new();
  for c in path.components() {
    match c {
      Component::CurDir => {}
      Component::ParentDir => match parts.last() {
        Some(Component::Normal(_)) => {
          parts.pop();
        }
        Some(Component::RootDir | Component::Prefix(_)) => {}
        _ => parts.push(c),
      },
      c => parts.push(c),
    }
  }
  if parts.is_empty() {
    return PathBuf::from(".");
  }
  parts.iter().collect()
}

/// Resolves against the file system: relative and absolute specifiers from
/// the requesting directory, bare specifiers from `search_dirs` in order.
#[derive(Clone, Debug, Default)]
pub struct FsResolver {
  pub search_dirs: Vec<PathBuf>,
}

impl FsResolver {
  pub fn new(search_dirs: Vec<PathBuf>) -> FsResolver {
    FsResolver { search_dirs }
  }

  fn find_file(base: &Path) -> Option<PathBuf> {
    if base.is_file() {
      return Some(base.to_path_buf());
    }
    let mut with_ext = base.as_os_str().to_owned();
    with_ext.push(".js");
    let with_ext = PathBuf::from(with_ext);
    if with_ext.is_file() {
      return Some(with_ext);
    }
    let index = base.join("index.js");
    if index.is_file() {
      return Some(index);
    }
    None
  }
}

impl ModuleResolver for FsResolver {
  fn resolve(&self, from_dir: &Path, specifier: &str) -> ResolvedModule {
    let is_path = specifier.starts_with("./")
      || specifier.starts_with("../")
      || specifier == "."
      || specifier == ".."
      || Path::new(specifier).is_absolute();
    let candidates: Vec<PathBuf> = if is_path {
      vec![normalize_path(&from_dir.join(specifier))]
    } else {
      self
        .search_dirs
        .iter()
        .map(|d| normalize_path(&d.join(specifier)))
        .collect()
    };
    for c in candidates.iter() {
      if let Some(path) = Self::find_file(c) {
        return ResolvedModule {
          path: normalize_path(&path),
          not_found: false,
        };
      }
    }
    ResolvedModule {
      path: candidates
        .into_iter()
        .next()
        .unwrap_or_else(|| PathBuf::from(specifier)),
      not_found: true,
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dependency {
  pub specifier: String,
  pub path: PathBuf,
}

const REQUIRE: &str = "require";

/// Looks for a `var` or function declaration of a name in one function body,
/// without entering nested functions.
#[derive(Visitor)]
#[visitor(Stmt(enter), VarDeclarator(enter), Func(enter, exit), ArrowFunc(enter, exit))]
struct DeclaresName<'a> {
  name: &'a str,
  depth: usize,
  found: bool,
}

impl<'a> DeclaresName<'a> {
  fn enter_stmt(&mut self, stmt: &Stmt) {
    if let Stmt::FuncDecl(f) = stmt {
      if self.depth == 0 && f.id.as_ref().is_some_and(|id| id.stx.name == self.name) {
        self.found = true;
      }
    }
  }

  fn enter_var_declarator(&mut self, decl: &VarDeclarator) {
    if self.depth == 0 && decl.id.stx.as_id() == Some(self.name) {
      self.found = true;
    }
  }

  fn enter_func(&mut self, _: &Func) {
    self.depth += 1;
  }

  fn exit_func(&mut self, _: &Func) {
    self.depth -= 1;
  }

  fn enter_arrow_func(&mut self, _: &ArrowFunc) {
    self.depth += 1;
  }

  fn exit_arrow_func(&mut self, _: &ArrowFunc) {
    self.depth -= 1;
  }
}

fn declares(body: &[Node<Stmt>], name: &str) -> bool {
  let mut visitor = DeclaresName {
    name,
    depth: 0,
    found: false,
  };
  for stmt in body {
    stmt.drive(&mut visitor);
  }
  visitor.found
}

fn binds(params: &[Node<Pat>], name: &str) -> bool {
  params.iter().any(|p| p.stx.as_id() == Some(name))
}

type ExprNode = Node<Expr>;

#[derive(VisitorMut)]
#[visitor(ExprNode(exit), Func(enter, exit), ArrowFunc(enter, exit))]
struct RequireRewriter<'a> {
  resolver: &'a dyn ModuleResolver,
  from_dir: &'a Path,
  dependencies: Vec<Dependency>,
  warnings: Vec<(Loc, String)>,
  // One entry per enclosing function: whether it binds `require` itself.
  shadows: Vec<bool>,
}

impl<'a> RequireRewriter<'a> {
  fn enter_func(&mut self, func: &mut Func) {
    // A function's own name is visible in its body for declarations and
    // named expressions alike.
    let named = func.id.as_ref().is_some_and(|id| id.stx.name == REQUIRE);
    self.shadows.push(
      named || binds(&func.params, REQUIRE) || declares(&func.body.stx.body, REQUIRE),
    );
  }

  fn exit_func(&mut self, _: &mut Func) {
    self.shadows.pop();
  }

  fn enter_arrow_func(&mut self, func: &mut ArrowFunc) {
    let declared = match &func.body {
      ArrowBody::Block(b) => declares(&b.stx.body, REQUIRE),
      ArrowBody::Expr(_) => false,
    };
    self.shadows.push(declared || binds(&func.params, REQUIRE));
  }

  fn exit_arrow_func(&mut self, _: &mut ArrowFunc) {
    self.shadows.pop();
  }

  fn exit_expr_node(&mut self, node: &mut ExprNode) {
    let Expr::Call(call) = node.stx.as_mut() else {
      return;
    };
    if call.callee.stx.as_id() != Some(REQUIRE) || call.arguments.len() != 1 {
      return;
    }
    if self.shadows.iter().any(|s| *s) {
      return;
    }
    let arg = &mut call.arguments[0];
    let Some(specifier) = arg.stx.const_string() else {
      self.warnings.push((
        arg.loc,
        "require() argument is not a constant string".to_string(),
      ));
      return;
    };
    let resolved = self.resolver.resolve(self.from_dir, &specifier);
    if resolved.not_found {
      self
        .warnings
        .push((arg.loc, format!("cannot resolve module '{specifier}'")));
      return;
    }
    debug!(specifier = specifier.as_str(), path = %resolved.path.display(), "resolved dependency");
    let path = resolved.path.to_string_lossy().into_owned();
    self.dependencies.push(Dependency {
      specifier,
      path: resolved.path,
    });
    *arg = Node::new(arg.loc, Expr::Lit(Lit {
      value: LitValue::Str(path),
      regex: None,
      bigint: None,
      raw: None,
    }));
  }
}

/// Rewrites the constant argument of every resolvable `require(...)` call
/// to the resolved path and returns the dependencies in source order. The
/// argument may be a string literal or a `+` concatenation of them. Calls to
/// a locally declared `require` are left alone; anything else stays an
/// ordinary call and is reported as a warning.
pub fn rewrite_requires(
  program: &mut Node<Program>,
  resolver: &dyn ModuleResolver,
  from_dir: &Path,
  report: &mut Reporter,
) -> Vec<Dependency> {
  let mut visitor = RequireRewriter {
    resolver,
    from_dir,
    dependencies: Vec::new(),
    warnings: Vec::new(),
    shadows: vec![declares(&program.stx.body, REQUIRE)],
  };
  program.drive_mut(&mut visitor);
  for (loc, message) in visitor.warnings {
    report.warning(&loc, message);
  }
  visitor.dependencies
}

#[cfg(test)]
mod tests {
  use super::*;
  use diagnostics::FileId;
  use estree_js::build::*;
  use estree_js::operator::BinaryOp;
  use std::fs;

  #[test]
  fn normalizes_dot_segments() {
    assert_eq!(normalize_path(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
    assert_eq!(normalize_path(Path::new("/../x")), PathBuf::from("/x"));
    assert_eq!(normalize_path(Path::new("../a/../b")), PathBuf::from("../b"));
    assert_eq!(normalize_path(Path::new("a/..")), PathBuf::from("."));
  }

  #[test]
  fn fs_resolver_tries_extensions_and_index() {
    let root = std::env::temp_dir().join(format!("compile-js-resolve-{}", std::process::id()));
    let lib = root.join("lib");
    fs::create_dir_all(lib.join("pkg")).unwrap();
    fs::write(root.join("util.js"), "").unwrap();
    fs::write(lib.join("pkg").join("index.js"), "").unwrap();
    let resolver = FsResolver::new(vec![lib.clone()]);

    let r = resolver.resolve(&root.join("sub"), "../util");
    assert_eq!(r, ResolvedModule {
      path: root.join("util.js"),
      not_found: false,
    });
    let r = resolver.resolve(&root, "pkg");
    assert_eq!(r.path, lib.join("pkg").join("index.js"));
    assert!(!r.not_found);
    assert!(resolver.resolve(&root, "./missing").not_found);
    assert!(resolver.resolve(&root, "missing").not_found);

    fs::remove_dir_all(&root).unwrap();
  }

  #[test]
  fn rewrites_constant_requires_only() {
    let mut program = program(vec![
      var(vec![("a", Some(call(id("require"), vec![str("./a")])))]),
      var(vec![("b", Some(call(id("require"), vec![str("./nope")])))]),
      expr_stmt(call(id("require"), vec![id("name")])),
    ]);
    let resolver = |dir: &Path, spec: &str| ResolvedModule {
      path: dir.join(spec.trim_start_matches("./")).with_extension("js"),
      not_found: spec == "./nope",
    };
    let mut report = Reporter::new(FileId(0));
    let deps = rewrite_requires(&mut program, &resolver, Path::new("/src"), &mut report);
    assert_eq!(deps, vec![Dependency {
      specifier: "./a".into(),
      path: PathBuf::from("/src/a.js"),
    }]);
    assert_eq!(report.diagnostics().len(), 2);
    assert_eq!(report.error_count(), 0);

    let estree_js::stmt::Stmt::VarDecl(decl) = program.stx.body[0].stx.as_ref() else {
      panic!("expected var");
    };
    let init = decl.declarations[0].stx.init.as_ref().unwrap();
    let Expr::Call(c) = init.stx.as_ref() else {
      panic!("expected call");
    };
    assert_eq!(c.arguments[0].stx.as_str_lit(), Some("/src/a.js"));
  }

  fn stub_resolver(dir: &Path, spec: &str) -> ResolvedModule {
    ResolvedModule {
      path: dir.join(spec.trim_start_matches("./")).with_extension("js"),
      not_found: false,
    }
  }

  fn first_argument(stmt: &Node<estree_js::stmt::Stmt>) -> Option<&str> {
    let estree_js::stmt::Stmt::Expr(e) = stmt.stx.as_ref() else {
      panic!("expected expression statement");
    };
    let Expr::Call(c) = e.expression.stx.as_ref() else {
      panic!("expected call");
    };
    c.arguments[0].stx.as_str_lit()
  }

  #[test]
  fn folds_concatenated_specifiers() {
    let mut program = program(vec![expr_stmt(call(id("require"), vec![bin(
      BinaryOp::Add,
      str("./l"),
      bin(BinaryOp::Add, str("i"), str("b")),
    )]))]);
    let mut report = Reporter::new(FileId(0));
    let deps = rewrite_requires(&mut program, &stub_resolver, Path::new("/src"), &mut report);
    assert_eq!(deps, vec![Dependency {
      specifier: "./lib".into(),
      path: PathBuf::from("/src/lib.js"),
    }]);
    assert!(report.diagnostics().is_empty());
    assert_eq!(first_argument(&program.stx.body[0]), Some("/src/lib.js"));
  }

  #[test]
  fn local_require_is_left_alone() {
    let mut nested = program(vec![
      func_decl("load", &["require"], vec![expr_stmt(call(id("require"), vec![
        str("./a"),
      ]))]),
      func_decl("other", &[], vec![
        var(vec![("require", None)]),
        expr_stmt(call(id("require"), vec![id("x")])),
      ]),
      expr_stmt(call(id("require"), vec![str("./b")])),
    ]);
    let mut report = Reporter::new(FileId(0));
    let deps = rewrite_requires(&mut nested, &stub_resolver, Path::new("/src"), &mut report);
    assert_eq!(deps.len(), 1);
    assert_eq!(deps[0].specifier, "./b");
    assert!(report.diagnostics().is_empty());
    assert_eq!(first_argument(&nested.stx.body[2]), Some("/src/b.js"));

    let mut top = program(vec![
      var(vec![("require", Some(id("load")))]),
      expr_stmt(call(id("require"), vec![str("./c")])),
    ]);
    let deps = rewrite_requires(&mut top, &stub_resolver, Path::new("/src"), &mut report);
    assert!(deps.is_empty());
    assert_eq!(first_argument(&top.stx.body[1]), Some("./c"));
  }
}
