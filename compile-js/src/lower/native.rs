use super::expr::is_simple;
use super::Compiler;
use crate::hir::AsmPart;
use crate::hir::Inst;
use crate::hir::RValue;
use estree_js::expr::ArrayExpr;
use estree_js::expr::CallExpr;
use estree_js::expr::Expr;
use estree_js::expr::Lit;
use estree_js::expr::LitValue;
use estree_js::expr::ObjectMember;
use estree_js::node::Loc;
use estree_js::node::Node;
use std::fmt;
use tracing::debug;

/// Splits a splice template into text and binding references. `%[name]`
/// references the binding called `name`; `%%` is a literal `%`.
pub(crate) fn parse_template(template: &str, names: &[&str]) -> Result<(Vec<AsmPart>, Vec<usize>), String> {
  let mut parts = Vec::new();
  let mut uses = vec![0usize; names.len()];
  let mut text = String::new();
  let mut rest = template;
  while let Some(i) = rest.find('%') {
    text.push_str(&rest[..i]);
    rest = &rest[i + 1..];
    if let Some(r) = rest.strip_prefix('%') {
      text.push('%');
      rest = r;
      continue;
    }
    let Some(r) = rest.strip_prefix('[') else {
      return Err("'%' must be followed by '%' or '['".to_string());
    };
    let Some(end) = r.find(']') else {
      return Err("unterminated binding reference".to_string());
    };
    let name = &r[..end];
    let Some(idx) = names.iter().position(|n| *n == name) else {
      return Err(format!("undeclared binding '{name}'"));
    };
    uses[idx] += 1;
    if !text.is_empty() {
      parts.push(AsmPart::Text(std::mem::take(&mut text)));
    }
    parts.push(AsmPart::Binding(idx));
    rest = &r[end + 1..];
  }
  text.push_str(rest);
  if !text.is_empty() {
    parts.push(AsmPart::Text(text));
  }
  Ok((parts, uses))
}

/// A template written back from its parts, for debug output.
pub(crate) struct TemplateText<'t> {
  pub parts: &'t [AsmPart],
  pub names: &'t [&'t str],
}

impl fmt::Display for TemplateText<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for p in self.parts {
      match p {
        AsmPart::Text(t) => f.write_str(&t.replace('%', "%%"))?,
        AsmPart::Binding(i) => write!(f, "%[{}]", self.names.get(*i).copied().unwrap_or("?"))?,
      }
    }
    Ok(())
  }
}

enum BindingKind<'e> {
  Result(&'e Node<Expr>),
  Input,
  Clobber,
}

struct Binding<'e> {
  name: String,
  loc: Loc,
  kind: BindingKind<'e>,
  value: RValue,
}

impl<'a> Compiler<'a> {
  /// Lowers `__asm__(options, results, inputs, clobbers, template)` and
  /// `__asmh__(text)`.
  pub(super) fn native_call(&mut self, name: &str, c: &CallExpr, loc: &Loc) -> RValue {
    if name == "__asmh__" {
      match c.arguments.as_slice() {
        [text] => match text.stx.const_string() {
          Some(text) => self.module.add_header(&text),
          None => self.error(&text.loc, "__asmh__ argument must be a constant string"),
        },
        _ => self.error(loc, "__asmh__ expects exactly one argument"),
      }
      return RValue::UNDEFINED;
    }

    let [options, results, inputs, clobbers, template] = c.arguments.as_slice() else {
      self.error(loc, "__asm__ expects 5 arguments");
      return RValue::UNDEFINED;
    };
    let pure = self.asm_options(options);
    let Some(template_text) = template.stx.const_string() else {
      self.error(&template.loc, "__asm__ template must be a constant string");
      return RValue::UNDEFINED;
    };

    let mut bindings: Vec<Binding> = Vec::new();
    for (entry, lhs) in self.asm_entries(results, 2) {
      let value = self.fb().alloc_temp();
      bindings.push(Binding {
        name: entry.0,
        loc: entry.1,
        kind: BindingKind::Result(lhs.expect("pair entry")),
        value,
      });
    }
    let input_entries = self.asm_entries(inputs, 2);
    for (i, (entry, e)) in input_entries.iter().enumerate() {
      let e = e.expect("pair entry");
      let v = self.compile_expr(e, true, None);
      let later_simple = input_entries[i + 1..]
        .iter()
        .all(|(_, e)| e.map_or(true, is_simple));
      let v = if later_simple { v } else { self.pin(v) };
      bindings.push(Binding {
        name: entry.0.clone(),
        loc: entry.1,
        kind: BindingKind::Input,
        value: v,
      });
    }
    for (entry, _) in self.asm_entries(clobbers, 1) {
      let value = self.fb().alloc_temp();
      bindings.push(Binding {
        name: entry.0,
        loc: entry.1,
        kind: BindingKind::Clobber,
        value,
      });
    }

    for (i, b) in bindings.iter().enumerate() {
      if bindings[..i].iter().any(|o| o.name == b.name) {
        let msg = format!("duplicate binding '{}'", b.name);
        self.error(&b.loc, msg);
      }
    }
    let names: Vec<String> = bindings.iter().map(|b| b.name.clone()).collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    let parsed = parse_template(&template_text, &names);
    let (parts, uses) = match parsed {
      Ok(p) => p,
      Err(msg) => {
        self.error(&template.loc, msg);
        self.release_bindings(&bindings);
        return RValue::UNDEFINED;
      }
    };
    for (b, n) in bindings.iter().zip(uses) {
      match n {
        0 => self.error(&b.loc, format!("binding '{}' is not used", b.name)),
        1 => {}
        _ => self.warning(
          &b.loc,
          format!("binding '{}' is referenced {n} times", b.name),
        ),
      }
    }

    let result_count = bindings
      .iter()
      .filter(|b| matches!(b.kind, BindingKind::Result(_)))
      .count();
    debug!(
      template = %TemplateText {
        parts: &parts,
        names: &names,
      },
      pure,
      "native splice"
    );
    if pure && result_count == 0 {
      self.report.note(loc, "pure native splice has no results and is dropped");
      self.release_bindings(&bindings);
      return RValue::UNDEFINED;
    }
    self.fb().push(Inst::Asm {
      bindings: bindings.iter().map(|b| b.value.clone()).collect(),
      result_count,
      parts,
    });
    for b in bindings.iter() {
      if let BindingKind::Result(lhs) = b.kind {
        let lv = self.lvalue(lhs, false);
        self.lvalue_write(&lv, b.value.clone());
        self.lvalue_release(lv);
      }
    }
    self.release_bindings(&bindings);
    RValue::UNDEFINED
  }

  fn release_bindings(&mut self, bindings: &[Binding]) {
    for b in bindings {
      self.release(&b.value);
    }
  }

  /// `{ pure: true }` is the only option.
  fn asm_options(&mut self, options: &Node<Expr>) -> bool {
    let Expr::Object(o) = options.stx.as_ref() else {
      self.error(&options.loc, "__asm__ options must be an object literal");
      return false;
    };
    let mut pure = false;
    for m in o.properties.iter() {
      let ObjectMember::Property(p) = m.stx.as_ref() else {
        self.error(&m.loc, "invalid __asm__ option");
        continue;
      };
      let key = match p.key.stx.as_ref() {
        Expr::Id(id) if !p.computed => Some(id.name.as_str()),
        _ => p.key.stx.as_str_lit(),
      };
      match (key, p.value.stx.as_ref()) {
        (
          Some("pure"),
          Expr::Lit(Lit {
            value: LitValue::Bool(b),
            ..
          }),
        ) => pure = *b,
        _ => self.error(&m.loc, "invalid __asm__ option"),
      }
    }
    pure
  }

  /// Parses an array of `[name]` or `[name, expr]` entries.
  fn asm_entries<'e>(&mut self, list: &'e Node<Expr>, arity: usize) -> Vec<((String, Loc), Option<&'e Node<Expr>>)> {
    let Expr::Array(ArrayExpr { elements }) = list.stx.as_ref() else {
      self.error(&list.loc, "__asm__ bindings must be an array literal");
      return Vec::new();
    };
    let mut out = Vec::new();
    for el in elements.iter().flatten() {
      let entry = match el.stx.as_ref() {
        Expr::Array(ArrayExpr { elements }) if elements.len() == arity => elements,
        _ => {
          self.error(&el.loc, format!("__asm__ binding must be an array of {arity}"));
          continue;
        }
      };
      let Some(name) = entry[0].as_ref().and_then(|e| e.stx.const_string()) else {
        self.error(&el.loc, "__asm__ binding name must be a constant string");
        continue;
      };
      let value = if arity == 2 {
        match entry[1].as_ref() {
          Some(e) => Some(e),
          None => {
            self.error(&el.loc, "__asm__ binding is missing its expression");
            continue;
          }
        }
      } else {
        None
      };
      out.push(((name, el.loc), value));
    }
    out
  }
}
