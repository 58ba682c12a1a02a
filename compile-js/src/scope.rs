use crate::hir::FuncId;
use crate::hir::Imm;
use crate::hir::VarId;
use ahash::HashMap;
use ahash::HashMapExt;
use estree_js::node::Loc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableId(pub u32);

#[derive(Debug)]
pub struct Scope {
  pub parent: Option<ScopeId>,
  pub level: u32,
  /// Nearest function-level scope, where `var` declarations land.
  pub var_scope: ScopeId,
  /// The function whose code this scope belongs to.
  pub ctx: FuncId,
  names: HashMap<String, VariableId>,
  order: Vec<VariableId>,
}

impl Scope {
  /// Variables in declaration order.
  pub fn variables(&self) -> &[VariableId] {
    &self.order
  }
}

/// A source-level binding.
#[derive(Debug)]
pub struct Variable {
  pub name: String,
  pub ctx: FuncId,
  pub read_only: bool,
  /// Set only for compiler-provided constants such as `undefined`.
  pub constant: Option<Imm>,
  pub declared: bool,
  /// Where the first `var` or function declaration of the name appeared.
  pub declared_at: Option<Loc>,
  pub initialized: bool,
  pub assigned: bool,
  pub accessed: bool,
  pub escapes: bool,
  pub is_function: bool,
  pub func_ref: Option<FuncId>,
  pub hvar: Option<VarId>,
}

impl Variable {
  fn new(name: &str, ctx: FuncId) -> Variable {
    Variable {
      name: name.to_string(),
      ctx,
      read_only: false,
      constant: None,
      declared: false,
      declared_at: None,
      initialized: false,
      assigned: false,
      accessed: false,
      escapes: false,
      is_function: false,
      func_ref: None,
      hvar: None,
    }
  }

  /// Records a read or write from the code of function `from`.
  pub fn set_accessed(&mut self, from: FuncId) {
    self.accessed = true;
    if from != self.ctx {
      self.escapes = true;
    }
  }
}

/// Arena of every scope and variable of a compilation.
#[derive(Debug, Default)]
pub struct ScopeTree {
  scopes: Vec<Scope>,
  vars: Vec<Variable>,
}

impl ScopeTree {
  pub fn new() -> ScopeTree {
    ScopeTree::default()
  }

  /// Creates a scope. A function-level scope is its own `var_scope`.
  pub fn new_scope(&mut self, parent: Option<ScopeId>, ctx: FuncId, function_level: bool) -> ScopeId {
    let id = ScopeId(self.scopes.len() as u32);
    let (level, var_scope) = match parent {
      Some(p) => {
        let p = &self.scopes[p.0 as usize];
        (p.level + 1, if function_level { id } else { p.var_scope })
      }
      None => (0, id),
    };
    self.scopes.push(Scope {
      parent,
      level,
      var_scope,
      ctx,
      names: HashMap::new(),
      order: Vec::new(),
    });
    id
  }

  pub fn scope(&self, id: ScopeId) -> &Scope {
    &self.scopes[id.0 as usize]
  }

  pub fn var(&self, id: VariableId) -> &Variable {
    &self.vars[id.0 as usize]
  }

  pub fn var_mut(&mut self, id: VariableId) -> &mut Variable {
    &mut self.vars[id.0 as usize]
  }

  pub fn lookup_local(&self, scope: ScopeId, name: &str) -> Option<VariableId> {
    self.scope(scope).names.get(name).copied()
  }

  /// Resolves `name` through the scope chain.
  pub fn lookup(&self, mut scope: ScopeId, name: &str) -> Option<VariableId> {
    loop {
      if let Some(v) = self.lookup_local(scope, name) {
        return Some(v);
      };
      scope = self.scope(scope).parent?;
    }
  }

  /// Binds a fresh variable in `scope`, replacing any existing binding of the
  /// same name there.
  pub fn declare(&mut self, scope: ScopeId, name: &str) -> VariableId {
    let id = self.declare_anonymous(scope, name);
    let s = &mut self.scopes[scope.0 as usize];
    s.names.insert(name.to_string(), id);
    s.order.push(id);
    id
  }

  /// Creates a variable owned by `scope`'s function that no name resolves to.
  pub fn declare_anonymous(&mut self, scope: ScopeId, name: &str) -> VariableId {
    let id = VariableId(self.vars.len() as u32);
    let ctx = self.scope(scope).ctx;
    self.vars.push(Variable::new(name, ctx));
    id
  }

  pub fn declare_constant(&mut self, scope: ScopeId, name: &str, value: Imm) -> VariableId {
    let id = self.declare(scope, name);
    let v = self.var_mut(id);
    v.read_only = true;
    v.constant = Some(value);
    v.declared = true;
    v.initialized = true;
    id
  }
}
