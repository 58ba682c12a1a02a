//! Ahead-of-time compiler from an ESTree JavaScript syntax tree to C.
//!
//! The pipeline is: `require` rewriting, hoisting, lowering into HIR (one
//! [`hir::builder::FunctionBuilder`] per source function), storage layout
//! ([`escape`]) and finally C emission ([`backend`]). Any error stops the
//! pipeline before code generation.

pub mod backend;
pub mod escape;
pub mod hir;
pub mod lower;
pub mod report;
pub mod resolve;
pub mod scope;

use backend::EmitOptions;
use diagnostics::Diagnostic;
use diagnostics::FileId;
use estree_js::node::Node;
use estree_js::stmt::Program;
use hir::builder::ModuleBuilder;
use lower::Compiler;
use report::Reporter;
use resolve::rewrite_requires;
use resolve::Dependency;
use resolve::ModuleResolver;
use std::path::Path;
use tracing::debug;
use tracing::debug_span;

#[derive(Clone, Debug)]
pub struct CompileOptions {
  /// Compile everything as strict code, as if each body began with
  /// `"use strict"`.
  pub strict: bool,
  /// Names the top-level function and the exported initializer.
  pub module_name: String,
  /// Path placed in the `#include` of the runtime.
  pub runtime_header: String,
  pub emit_main: bool,
}

impl Default for CompileOptions {
  fn default() -> Self {
    CompileOptions {
      strict: false,
      module_name: "main".to_string(),
      runtime_header: "jsc-runtime.h".to_string(),
      emit_main: true,
    }
  }
}

#[derive(Debug)]
pub struct CompileOutput {
  pub c_source: String,
  /// Warnings and notes.
  pub diagnostics: Vec<Diagnostic>,
  pub dependencies: Vec<Dependency>,
}

fn fail_if_errors(report: Reporter) -> Result<Reporter, Vec<Diagnostic>> {
  if report.error_count() > 0 {
    debug!(errors = report.error_count(), "stopping after errors");
    return Err(report.into_diagnostics());
  }
  Ok(report)
}

/// Lowers a program into a finished module, laid out and ready for code
/// generation. Errors are recorded in `report`; the module is only returned
/// when there are none.
fn lower_program(program: &Node<Program>, options: &CompileOptions, report: &mut Reporter) -> Option<ModuleBuilder> {
  let mut compiler = Compiler::new(report);
  let hoisted = compiler.begin_program(program, &options.module_name, options.strict);
  if compiler.error_count() > 0 {
    return None;
  }
  compiler.compile_program_body(program, hoisted);
  if compiler.error_count() > 0 {
    return None;
  }
  let mut module = compiler.into_module();
  escape::finalize_module(&mut module);
  module.intern_immediates();
  Some(module)
}

/// Everything before code generation: the finished module, if lowering
/// succeeded, with the dependencies and diagnostics gathered on the way.
#[derive(Debug)]
pub struct Analysis {
  pub module: Option<ModuleBuilder>,
  pub dependencies: Vec<Dependency>,
  pub report: Reporter,
}

/// Rewrites `require` calls, then lowers the program. Both C generation and
/// HIR inspection start from here.
pub fn analyze_program(
  program: &mut Node<Program>,
  options: &CompileOptions,
  resolver: &dyn ModuleResolver,
  file: FileId,
  from_dir: &Path,
) -> Analysis {
  let mut report = Reporter::new(file);
  let dependencies = rewrite_requires(program, resolver, from_dir, &mut report);
  let module = lower_program(program, options, &mut report);
  Analysis {
    module,
    dependencies,
    report,
  }
}

/// Compiles one program to a C translation unit.
///
/// # Examples
///
/// ```
/// use compile_js::compile_program;
/// use compile_js::resolve::FsResolver;
/// use compile_js::CompileOptions;
/// use diagnostics::FileId;
/// use estree_js::build::*;
/// use std::path::Path;
///
/// let mut p = program(vec![var(vec![("x", Some(num(1.0)))])]);
/// let out = compile_program(
///   &mut p,
///   &CompileOptions::default(),
///   &FsResolver::default(),
///   FileId(0),
///   Path::new("."),
/// )
/// .unwrap();
/// assert!(out.c_source.contains("int main (int argc, char ** argv)"));
/// ```
pub fn compile_program(
  program: &mut Node<Program>,
  options: &CompileOptions,
  resolver: &dyn ModuleResolver,
  file: FileId,
  from_dir: &Path,
) -> Result<CompileOutput, Vec<Diagnostic>> {
  let span = debug_span!("compile_program", module = options.module_name.as_str());
  let _enter = span.enter();

  let analysis = analyze_program(program, options, resolver, file, from_dir);
  let report = fail_if_errors(analysis.report)?;
  let Some(module) = analysis.module else {
    return Err(report.into_diagnostics());
  };

  let c_source = backend::module_to_c(&module, &EmitOptions {
    module_name: &options.module_name,
    runtime_header: &options.runtime_header,
    emit_main: options.emit_main,
  });
  debug!(bytes = c_source.len(), "generated C");
  Ok(CompileOutput {
    c_source,
    diagnostics: report.into_diagnostics(),
    dependencies: analysis.dependencies,
  })
}

/// The finished HIR of a module as pretty-printed JSON, for inspection.
pub fn dump_hir(module: &ModuleBuilder) -> serde_json::Result<String> {
  serde_json::to_string_pretty(module)
}
