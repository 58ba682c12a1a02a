use super::Compiler;
use crate::scope::VariableId;
use estree_js::func::Func;
use estree_js::node::Loc;
use estree_js::node::Node;
use estree_js::operator::VarKind;
use estree_js::stmt::ForInit;
use estree_js::stmt::Stmt;
use estree_js::stmt::VarDecl;

impl<'a> Compiler<'a> {
  /// Registers every `var` and function declaration of a function body in
  /// its var scope without lowering any expression. Nested function bodies
  /// are not entered. Returns the function declarations to instantiate, in
  /// source order.
  pub(super) fn hoist_body<'f>(&mut self, body: &'f [Node<Stmt>]) -> Vec<(VariableId, &'f Func, Loc)> {
    let mut funcs = Vec::new();
    for stmt in body {
      self.hoist_stmt(stmt, &mut funcs);
    }
    funcs
  }

  fn hoist_stmt<'f>(&mut self, stmt: &'f Node<Stmt>, funcs: &mut Vec<(VariableId, &'f Func, Loc)>) {
    match stmt.stx.as_ref() {
      Stmt::FuncDecl(func) => {
        if let Some(v) = self.declare_function(func, &stmt.loc) {
          funcs.push((v, func, stmt.loc));
        }
      }
      Stmt::VarDecl(decl) => self.declare_vars(decl, &stmt.loc),
      Stmt::Block(b) => {
        for s in b.body.iter() {
          self.hoist_stmt(s, funcs);
        }
      }
      Stmt::If(s) => {
        self.hoist_stmt(&s.consequent, funcs);
        if let Some(alt) = &s.alternate {
          self.hoist_stmt(alt, funcs);
        }
      }
      Stmt::Label(s) => self.hoist_stmt(&s.body, funcs),
      Stmt::With(s) => self.hoist_stmt(&s.body, funcs),
      Stmt::Switch(s) => {
        for case in s.cases.iter() {
          for c in case.stx.consequent.iter() {
            self.hoist_stmt(c, funcs);
          }
        }
      }
      Stmt::Try(s) => {
        for c in s.block.stx.body.iter() {
          self.hoist_stmt(c, funcs);
        }
        if let Some(h) = &s.handler {
          for c in h.stx.body.stx.body.iter() {
            self.hoist_stmt(c, funcs);
          }
        }
        if let Some(f) = &s.finalizer {
          for c in f.stx.body.iter() {
            self.hoist_stmt(c, funcs);
          }
        }
      }
      Stmt::While(s) => self.hoist_stmt(&s.body, funcs),
      Stmt::DoWhile(s) => self.hoist_stmt(&s.body, funcs),
      Stmt::For(s) => {
        if let Some(ForInit::Var(decl)) = &s.init {
          self.declare_vars(&decl.stx, &decl.loc);
        }
        self.hoist_stmt(&s.body, funcs);
      }
      Stmt::ForIn(s) | Stmt::ForOf(s) => {
        if let ForInit::Var(decl) = &s.left {
          self.declare_vars(&decl.stx, &decl.loc);
        }
        self.hoist_stmt(&s.body, funcs);
      }
      Stmt::Empty(_)
      | Stmt::Expr(_)
      | Stmt::Break(_)
      | Stmt::Continue(_)
      | Stmt::Return(_)
      | Stmt::Throw(_)
      | Stmt::Debugger(_)
      | Stmt::ClassDecl(_) => {}
    }
  }

  fn declare_function(&mut self, func: &Func, loc: &Loc) -> Option<VariableId> {
    let Some(id) = &func.id else {
      self.error(loc, "function declaration without a name");
      return None;
    };
    let name = id.stx.name.as_str();
    let var_scope = self.scopes.scope(self.ctx().scope).var_scope;
    let v = match self.scopes.lookup_local(var_scope, name) {
      Some(existing) if self.scopes.var(existing).read_only => {
        self.strict_error(&id.loc, format!("cannot redeclare read-only '{name}'"));
        let shadow = self.new_variable(var_scope, name, true, None);
        self.ctx_mut().shadows.insert(name.to_string(), shadow);
        shadow
      }
      Some(existing) => {
        if self.scopes.var(existing).is_function {
          self.warning(&id.loc, format!("function '{name}' hides an earlier declaration"));
          self.label_declaration(existing);
        }
        existing
      }
      None => self.new_variable(var_scope, name, false, None),
    };
    let var = self.scopes.var_mut(v);
    var.declared = true;
    var.declared_at.get_or_insert(id.loc);
    var.is_function = true;
    if var.initialized {
      var.assigned = true;
    } else {
      var.initialized = true;
    }
    Some(v)
  }

  fn declare_vars(&mut self, decl: &VarDecl, loc: &Loc) {
    if decl.kind != VarKind::Var {
      self.error(
        loc,
        "block-scoped declarations are not supported, compiling as 'var'",
      );
    }
    let var_scope = self.scopes.scope(self.ctx().scope).var_scope;
    for d in decl.declarations.iter() {
      let Some(name) = d.stx.id.stx.as_id() else {
        // Reported when the declarator is lowered.
        continue;
      };
      match self.scopes.lookup_local(var_scope, name) {
        Some(existing) if self.scopes.var(existing).read_only => {
          self.strict_error(&d.loc, format!("cannot redeclare read-only '{name}'"));
          if !self.ctx().shadows.contains_key(name) {
            let shadow = self.new_variable(var_scope, name, true, None);
            self.scopes.var_mut(shadow).declared = true;
            self.ctx_mut().shadows.insert(name.to_string(), shadow);
          }
        }
        Some(existing) => {
          if self.scopes.var(existing).is_function {
            self.warning(&d.loc, format!("variable '{name}' redeclares a function"));
            self.label_declaration(existing);
          }
          let var = self.scopes.var_mut(existing);
          var.declared = true;
          var.declared_at.get_or_insert(d.loc);
        }
        None => {
          let v = self.new_variable(var_scope, name, false, None);
          let var = self.scopes.var_mut(v);
          var.declared = true;
          var.declared_at = Some(d.loc);
        }
      }
    }
  }

  fn label_declaration(&mut self, v: VariableId) {
    if let Some(at) = self.scopes.var(v).declared_at {
      self.report.label_last(&at, "previous declaration");
    }
  }
}
