//! Storage layout for variables, run once per function after its body and
//! all nested functions have been lowered.

use crate::hir::builder::Layout;
use crate::hir::builder::ModuleBuilder;
use crate::hir::Callee;
use crate::hir::FuncId;
use crate::hir::Inst;
use crate::hir::RValue;
use crate::hir::Storage;
use crate::hir::VarId;
use ahash::HashMap;
use ahash::HashMapExt;
use tracing::debug;
use tracing::debug_span;

/// Assigns every accessed variable of `func` exactly one storage location.
///
/// Locals are numbered after the temporaries: first the call argument
/// staging slots, then non-escaping variables, then non-escaping parameters.
/// Escaping variables get dense environment indices in declaration order.
/// Parameters that end up elsewhere are copied in the entry block.
pub fn layout_function(module: &mut ModuleBuilder, func: FuncId) {
  let span = debug_span!("layout", func = func.0);
  let _enter = span.enter();
  let fb = module.func_mut(func);

  let arg_slot_base = fb.local_count();
  for _ in 0..fb.arg_slot_count {
    fb.new_local(false);
  }

  // (accessed, escapes, is_param)
  let flags: Vec<(bool, bool, bool)> = fb
    .vars
    .iter()
    .map(|v| (v.accessed, v.escapes, v.param.is_some()))
    .collect();
  let mut storage = vec![None; flags.len()];
  for want_param in [false, true] {
    for (i, (accessed, escapes, is_param)) in flags.iter().enumerate() {
      if *accessed && !*escapes && *is_param == want_param {
        storage[i] = Some(Storage::Local(fb.new_local(false)));
      }
    }
  }
  let mut env_size = 0;
  for (i, (accessed, escapes, _)) in flags.iter().enumerate() {
    if *accessed && *escapes {
      storage[i] = Some(Storage::Env(env_size));
      env_size += 1;
    }
  }

  let mut copies = Vec::new();
  for (i, (v, s)) in fb.vars.iter_mut().zip(storage).enumerate() {
    v.storage = match (s, v.param) {
      (Some(s), Some(p)) => {
        copies.push(Inst::Assign {
          dest: RValue::Var(VarId {
            func,
            index: i as u32,
          }),
          src: RValue::Param(p),
        });
        Some(s)
      }
      (Some(s), None) => Some(s),
      (None, Some(p)) => Some(Storage::Param(p)),
      (None, None) => None,
    };
  }
  for c in copies {
    fb.insert_prologue(c);
  }

  fb.layout = Some(Layout {
    env_size,
    arg_slot_base,
    local_count: fb.local_count(),
    env_chain: Vec::new(),
  });
  debug!(
    env_size,
    locals = fb.local_count(),
    arg_slots = fb.arg_slot_count,
    "laid out function"
  );
}

/// Module-wide passes once every function is laid out: environment chains
/// and direct-call rewriting.
pub fn finalize_module(module: &mut ModuleBuilder) {
  let span = debug_span!("finalize_module", funcs = module.funcs.len());
  let _enter = span.enter();

  let env_sizes: Vec<u32> = module
    .funcs
    .iter()
    .map(|f| layout_of(module, f.id).env_size)
    .collect();
  let parents: Vec<Option<FuncId>> = module.funcs.iter().map(|f| f.parent).collect();
  for f in module.funcs.iter_mut() {
    let mut chain = Vec::new();
    let mut cur = Some(f.id);
    while let Some(id) = cur {
      if env_sizes[id.0 as usize] > 0 {
        chain.push(id);
      }
      cur = parents[id.0 as usize];
    }
    f.layout
      .as_mut()
      .unwrap_or_else(|| panic!("function {:?} was not laid out", f.id))
      .env_chain = chain;
  }

  let mut known: HashMap<VarId, FuncId> = HashMap::new();
  for f in module.funcs.iter() {
    for (i, v) in f.vars.iter().enumerate() {
      if let Some(target) = v.func_ref {
        known.insert(
          VarId {
            func: f.id,
            index: i as u32,
          },
          target,
        );
      }
    }
  }
  let mut direct = 0;
  for f in module.funcs.iter_mut() {
    for callee in f.calls_mut() {
      let (var, closure) = match callee {
        Callee::Ind(RValue::Var(v)) => (*v, RValue::Var(*v)),
        Callee::Pinned { var, copy } => (*var, copy.clone()),
        _ => continue,
      };
      *callee = match known.get(&var) {
        Some(target) => {
          direct += 1;
          Callee::Direct {
            func: *target,
            closure,
          }
        }
        None => Callee::Ind(closure),
      };
    }
  }
  debug!(direct, "rewrote direct calls");
}

fn layout_of(module: &ModuleBuilder, func: FuncId) -> &Layout {
  module
    .func(func)
    .layout
    .as_ref()
    .unwrap_or_else(|| panic!("function {func:?} was not laid out"))
}

/// Number of `parent` links to follow from the environment a function was
/// created with to reach `owner`'s environment.
pub fn env_hops(module: &ModuleBuilder, from: FuncId, owner: FuncId) -> usize {
  let chain = &layout_of(module, from).env_chain;
  let outer = if chain.first() == Some(&from) {
    &chain[1..]
  } else {
    &chain[..]
  };
  outer
    .iter()
    .position(|f| *f == owner)
    .unwrap_or_else(|| panic!("{owner:?} is not an ancestor environment of {from:?}"))
}
