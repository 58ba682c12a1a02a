//! C code generation from laid-out HIR.
//!
//! A module becomes one translation unit: the runtime include, headers
//! injected by `__asmh__`, the packed string table, prototypes of every
//! function, the function definitions and finally an entry point.

pub mod function;
pub mod literal;
pub mod strings;

use crate::hir::builder::ModuleBuilder;
use function::c_function_name;
use function::emit_function;
use function::emit_prototype;
use literal::c_ident_suffix;
use literal::emit_c_comment_text;
use literal::emit_c_string;
use std::fmt;
use strings::StringTable;
use tracing::debug_span;

#[derive(Clone, Debug)]
pub struct EmitOptions<'a> {
  pub module_name: &'a str,
  pub runtime_header: &'a str,
  /// Emit `main`. Otherwise an exported initializer named after the module
  /// runs the top-level code.
  pub emit_main: bool,
}

pub fn emit_module<W: fmt::Write>(out: &mut W, module: &ModuleBuilder, options: &EmitOptions) -> fmt::Result {
  let span = debug_span!("codegen", funcs = module.funcs.len(), strings = module.strings().len());
  let _enter = span.enter();

  out.write_str("/* Generated from ")?;
  emit_c_comment_text(out, options.module_name)?;
  out.write_str(". */\n")?;
  out.write_str("#include ")?;
  emit_c_string(out, options.runtime_header)?;
  out.write_char('\n')?;
  for h in module.headers() {
    out.write_str(h)?;
    if !h.ends_with('\n') {
      out.write_char('\n')?;
    }
  }
  out.write_char('\n')?;

  let strings = StringTable::build(module.strings());
  strings.emit(out)?;
  out.write_char('\n')?;

  for fb in module.funcs.iter() {
    emit_prototype(out, fb)?;
  }
  for fb in module.funcs.iter() {
    out.write_char('\n')?;
    emit_function(out, module, fb, &strings)?;
  }
  out.write_char('\n')?;

  let top = c_function_name(module.top_level());
  let init_strings = format!(
    "  js_init_strings(s_strbuf, s_strconst, {});\n",
    strings.len()
  );
  if options.emit_main {
    out.write_str("int main (int argc, char ** argv)\n{\n")?;
    out.write_str(&init_strings)?;
    writeln!(out, "  return js_main(argc, argv, {top});")?;
  } else {
    writeln!(
      out,
      "TaggedValue jsmod_{} (StackFrame * caller, Env * env)\n{{",
      c_ident_suffix(options.module_name)
    )?;
    out.write_str(&init_strings)?;
    out.write_str("  TaggedValue thisArg = JS_UNDEFINED_VALUE;\n")?;
    writeln!(out, "  return {top}(caller, env, 1, &thisArg);")?;
  }
  out.write_str("}\n")
}

/// Convenience wrapper around [`emit_module`] producing a `String`.
pub fn module_to_c(module: &ModuleBuilder, options: &EmitOptions) -> String {
  let mut out = String::new();
  emit_module(&mut out, module, options).unwrap();
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::lower::tests::lower;
  use estree_js::build::*;

  fn options(emit_main: bool) -> EmitOptions<'static> {
    EmitOptions {
      module_name: "demo.js",
      runtime_header: "jsc/runtime.h",
      emit_main,
    }
  }

  #[test]
  fn unit_sections_appear_in_order() {
    // __asmh__("#include <stdio.h>"); var s = "hi"; function f() { return s; }
    let p = program(vec![
      expr_stmt(call(id("__asmh__"), vec![str("#include <stdio.h>")])),
      var(vec![("s", Some(str("hi")))]),
      func_decl("f", &[], vec![ret(Some(id("s")))]),
    ]);
    let (mut m, r) = lower(&p, false);
    assert_eq!(r.error_count(), 0);
    m.intern_immediates();
    let c = module_to_c(&m, &options(true));
    let positions: Vec<usize> = [
      "#include \"jsc/runtime.h\"",
      "#include <stdio.h>",
      "static const char s_strbuf[3] =",
      "static TaggedValue fn0_test ",
      "static TaggedValue fn1_f (",
      "/* top level",
      "int main (int argc, char ** argv)",
    ]
    .iter()
    .map(|s| c.find(s).unwrap_or_else(|| panic!("missing {s:?} in\n{c}")))
    .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "{c}");
    assert!(c.contains("js_init_strings(s_strbuf, s_strconst, 1);"));
    assert!(c.contains("return js_main(argc, argv, fn0_test);"));
  }

  #[test]
  fn library_units_export_an_initializer() {
    let p = program(vec![]);
    let (m, _) = lower(&p, false);
    let c = module_to_c(&m, &options(false));
    assert!(!c.contains("int main"));
    assert!(c.contains("TaggedValue jsmod_demo_js (StackFrame * caller, Env * env)"));
    assert!(c.contains("return fn0_test(caller, env, 1, &thisArg);"));
  }
}
