use super::fold;
use super::ArgSlotId;
use super::BlockId;
use super::Callee;
use super::FuncId;
use super::Imm;
use super::Inst;
use super::Jump;
use super::Label;
use super::LocalId;
use super::OpCode;
use super::ParamId;
use super::RValue;
use super::Var;
use super::VarId;
use ahash::HashMap;
use ahash::HashMapExt;
use serde::Serialize;

#[derive(Clone, Debug, Serialize)]
pub struct BasicBlock {
  pub id: BlockId,
  pub body: Vec<Inst>,
  pub jump: Option<Jump>,
  /// Mirrors the targets of `jump`.
  pub succ: Vec<Label>,
}

impl BasicBlock {
  fn new(id: BlockId) -> BasicBlock {
    BasicBlock {
      id,
      body: Vec::new(),
      jump: None,
      succ: Vec::new(),
    }
  }

  pub fn is_closed(&self) -> bool {
    self.jump.is_some()
  }

  pub fn is_empty(&self) -> bool {
    self.body.is_empty() && self.jump.is_none()
  }

  pub fn push(&mut self, inst: Inst) {
    assert!(!self.is_closed(), "push to closed block {:?}", self.id);
    self.body.push(inst);
  }

  /// Appends to a block regardless of whether it has been closed. The
  /// instruction still executes before the terminator.
  pub fn insert_before_jump(&mut self, inst: Inst) {
    self.body.push(inst);
  }

  pub fn set_jump(&mut self, jump: Jump) {
    assert!(!self.is_closed(), "block {:?} closed twice", self.id);
    self.succ = jump.targets();
    self.jump = Some(jump);
  }
}

/// Facts decided by escape analysis once a function is complete.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Layout {
  /// Number of escaping variables stored in this function's environment.
  pub env_size: u32,
  /// First local used for call argument staging.
  pub arg_slot_base: u32,
  /// Total locals including temporaries, staging slots and variable slots.
  pub local_count: u32,
  /// This function and its ancestors that own an environment, innermost
  /// first. The runtime links environments in exactly this order.
  pub env_chain: Vec<FuncId>,
}

#[derive(Debug, Serialize)]
pub struct FunctionBuilder {
  pub id: FuncId,
  pub parent: Option<FuncId>,
  pub name: Option<String>,
  /// Function nesting depth; the top-level function is 0.
  pub level: u32,
  pub strict: bool,
  /// Declared parameters plus `this`, which is always parameter 0.
  pub param_count: u32,
  pub vars: Vec<Var>,
  local_count: u32,
  is_temp: Vec<bool>,
  temp_stack: Vec<LocalId>,
  pub arg_slot_count: u32,
  pub blocks: Vec<BasicBlock>,
  labels: Vec<Option<BlockId>>,
  cur: BlockId,
  pub entry: BlockId,
  pub exit_label: Label,
  pub ret_value: RValue,
  pub closures: Vec<FuncId>,
  pub try_count: u32,
  pub layout: Option<Layout>,
  closed: bool,
}

impl FunctionBuilder {
  fn new(id: FuncId, parent: Option<FuncId>, level: u32, name: Option<String>, strict: bool) -> Self {
    let mut fb = FunctionBuilder {
      id,
      parent,
      name,
      level,
      strict,
      param_count: 1,
      vars: Vec::new(),
      local_count: 0,
      is_temp: Vec::new(),
      temp_stack: Vec::new(),
      arg_slot_count: 0,
      blocks: vec![BasicBlock::new(BlockId(0))],
      labels: Vec::new(),
      cur: BlockId(0),
      entry: BlockId(0),
      exit_label: Label(0),
      ret_value: RValue::UNDEFINED,
      closures: Vec::new(),
      try_count: 0,
      layout: None,
      closed: false,
    };
    fb.exit_label = fb.new_label();
    fb.ret_value = RValue::Local(fb.new_local(false));
    // The entry block only holds the prologue, which escape analysis fills in
    // before the jump to the body.
    let body = fb.new_label();
    fb.set_jump(Jump::Goto(body));
    fb.place_label(body);
    fb
  }

  pub fn is_closed(&self) -> bool {
    self.closed
  }

  pub fn this_param(&self) -> RValue {
    RValue::Param(ParamId(0))
  }

  pub fn add_param(&mut self) -> ParamId {
    let p = ParamId(self.param_count);
    self.param_count += 1;
    p
  }

  pub fn new_var(&mut self, name: &str, param: Option<ParamId>) -> VarId {
    let index = self.vars.len() as u32;
    self.vars.push(Var {
      name: name.to_string(),
      level: self.level,
      param,
      accessed: false,
      escapes: false,
      func_ref: None,
      storage: None,
    });
    VarId {
      func: self.id,
      index,
    }
  }

  pub fn var(&self, id: VarId) -> &Var {
    assert_eq!(id.func, self.id, "variable of another function");
    &self.vars[id.index as usize]
  }

  pub fn var_mut(&mut self, id: VarId) -> &mut Var {
    assert_eq!(id.func, self.id, "variable of another function");
    &mut self.vars[id.index as usize]
  }

  // Blocks and labels.

  pub fn new_label(&mut self) -> Label {
    self.labels.push(None);
    Label(self.labels.len() as u32 - 1)
  }

  pub fn label_block(&self, label: Label) -> Option<BlockId> {
    self.labels[label.0 as usize]
  }

  pub fn block(&self, id: BlockId) -> &BasicBlock {
    &self.blocks[id.0 as usize]
  }

  pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
    &mut self.blocks[id.0 as usize]
  }

  pub fn cur_block(&self) -> &BasicBlock {
    self.block(self.cur)
  }

  fn open_block(&mut self) -> BlockId {
    let id = BlockId(self.blocks.len() as u32);
    self.blocks.push(BasicBlock::new(id));
    self.cur = id;
    id
  }

  /// Whether code emitted now could execute. False after a terminator until
  /// the next label is placed.
  pub fn is_reachable(&self) -> bool {
    !self.cur_block().is_closed()
  }

  /// Binds `label` to the start of a block. Control falls through into it
  /// from the current block if that is still open.
  pub fn place_label(&mut self, label: Label) {
    assert!(
      self.labels[label.0 as usize].is_none(),
      "label {:?} placed twice",
      label
    );
    let (closed, empty) = (self.cur_block().is_closed(), self.cur_block().is_empty());
    if closed {
      self.open_block();
    } else if !empty {
      self.set_jump(Jump::Goto(label));
      self.open_block();
    }
    assert!(self.cur_block().is_empty());
    self.labels[label.0 as usize] = Some(self.cur);
  }

  pub fn push(&mut self, inst: Inst) {
    assert!(!self.closed, "push to finished function {:?}", self.id);
    if self.cur_block().is_closed() {
      // Unreachable code still gets a block so that it can be checked; the
      // block is never laid out.
      self.open_block();
    }
    self.block_mut(self.cur).push(inst);
  }

  pub fn set_jump(&mut self, jump: Jump) {
    if self.cur_block().is_closed() {
      self.open_block();
    }
    self.block_mut(self.cur).set_jump(jump);
  }

  pub fn goto(&mut self, label: Label) {
    self.set_jump(Jump::Goto(label));
  }

  /// Appends to the entry block ahead of its jump into the body.
  pub fn insert_prologue(&mut self, inst: Inst) {
    self.block_mut(self.entry).insert_before_jump(inst);
  }

  // Locals and temporaries.

  pub fn new_local(&mut self, temp: bool) -> LocalId {
    let id = LocalId(self.local_count);
    self.local_count += 1;
    self.is_temp.push(temp);
    id
  }

  pub fn local_count(&self) -> u32 {
    self.local_count
  }

  pub fn is_temp(&self, v: &RValue) -> bool {
    match v {
      RValue::Local(l) => self.is_temp[l.0 as usize],
      _ => false,
    }
  }

  pub fn alloc_temp(&mut self) -> RValue {
    let l = match self.temp_stack.pop() {
      Some(l) => l,
      None => self.new_local(true),
    };
    RValue::Local(l)
  }

  /// Returns a temporary to the free list. Anything else is ignored so that
  /// callers can release every operand unconditionally.
  pub fn release(&mut self, v: &RValue) {
    if let RValue::Local(l) = v {
      if self.is_temp[l.0 as usize] {
        assert!(!self.temp_stack.contains(l), "temporary {l:?} released twice");
        self.temp_stack.push(*l);
      }
    }
  }

  /// Takes a specific released temporary back, so that both arms of a branch
  /// can write the same destination.
  pub fn alloc_specific(&mut self, v: &RValue) {
    let RValue::Local(l) = v else {
      panic!("{v:?} is not a temporary");
    };
    let pos = self
      .temp_stack
      .iter()
      .rposition(|t| t == l)
      .unwrap_or_else(|| panic!("temporary {l:?} is not free"));
    self.temp_stack.remove(pos);
  }

  // Instruction generation.

  pub fn gen_assign(&mut self, dest: RValue, src: RValue) {
    if dest != src {
      self.push(Inst::Assign { dest, src });
    }
  }

  pub fn fold_binop(op: OpCode, a: &RValue, b: &RValue) -> Option<RValue> {
    fold::fold_binop(op, a.imm()?, b.imm()?).map(RValue::Imm)
  }

  pub fn fold_unop(op: OpCode, a: &RValue) -> Option<RValue> {
    fold::fold_unop(op, a.imm()?).map(RValue::Imm)
  }

  pub fn gen_binop(&mut self, op: OpCode, dest: RValue, mut a: RValue, mut b: RValue) {
    assert!(op.is_binary(), "{op:?} is not a binary opcode");
    if let Some(v) = Self::fold_binop(op, &a, &b) {
      self.gen_assign(dest, v);
      return;
    }
    if op.is_commutative() && ((a.is_imm() && !b.is_imm()) || (b == dest && a != dest)) {
      std::mem::swap(&mut a, &mut b);
    }
    self.push(Inst::Binop { op, dest, a, b });
  }

  pub fn gen_unop(&mut self, op: OpCode, dest: RValue, a: RValue) {
    assert!(op.is_unary(), "{op:?} is not a unary opcode");
    if let Some(v) = Self::fold_unop(op, &a) {
      self.gen_assign(dest, v);
      return;
    }
    self.push(Inst::Unop { op, dest, a });
  }

  /// Branches on a relational opcode. A constant condition becomes a goto and
  /// its outcome is returned.
  pub fn gen_if(
    &mut self,
    op: OpCode,
    mut a: RValue,
    mut b: RValue,
    on_true: Label,
    on_false: Label,
  ) -> Option<bool> {
    if let Some(RValue::Imm(v)) = Self::fold_binop(op, &a, &b) {
      let taken = fold::to_boolean(&v);
      self.goto(if taken { on_true } else { on_false });
      return Some(taken);
    }
    if op.is_commutative() && a.is_imm() && !b.is_imm() {
      std::mem::swap(&mut a, &mut b);
    }
    self.set_jump(Jump::If {
      op: op.to_cond(),
      a,
      b,
      on_true,
      on_false,
    });
    None
  }

  pub fn gen_if_true(&mut self, value: RValue, on_true: Label, on_false: Label) -> Option<bool> {
    if let Some(v) = value.imm() {
      let taken = fold::to_boolean(v);
      self.goto(if taken { on_true } else { on_false });
      return Some(taken);
    }
    self.set_jump(Jump::IfTrue {
      value,
      on_true,
      on_false,
    });
    None
  }

  /// Stages `this` and the arguments into arg slots and calls.
  pub fn gen_call(&mut self, dest: Option<RValue>, callee: Callee, this: RValue, args: Vec<RValue>) {
    let argc = args.len() as u32 + 1;
    self.arg_slot_count = self.arg_slot_count.max(argc);
    for (i, v) in std::iter::once(this).chain(args).enumerate() {
      self.push(Inst::Assign {
        dest: RValue::ArgSlot(ArgSlotId(i as u32)),
        src: v,
      });
    }
    self.push(Inst::Call { dest, callee, argc });
  }

  pub fn gen_ret(&mut self, value: RValue) {
    let ret = self.ret_value.clone();
    self.gen_assign(ret, value);
    self.goto(self.exit_label);
  }

  pub fn new_try_index(&mut self) -> u32 {
    self.try_count += 1;
    self.try_count - 1
  }

  /// Places the exit block. No further code may be generated.
  pub fn finish(&mut self) {
    let exit = self.exit_label;
    self.place_label(exit);
    let ret = self.ret_value.clone();
    self.set_jump(Jump::Ret(ret));
    self.closed = true;
  }

  pub fn exit_block(&self) -> BlockId {
    self
      .label_block(self.exit_label)
      .unwrap_or_else(|| panic!("function {:?} was not finished", self.id))
  }

  /// Calls whose callee is a variable, for direct-call rewriting.
  pub fn calls_mut(&mut self) -> impl Iterator<Item = &mut Callee> + '_ {
    self
      .blocks
      .iter_mut()
      .flat_map(|b| b.body.iter_mut())
      .filter_map(|inst| match inst {
        Inst::Call { callee, .. } => Some(callee),
        _ => None,
      })
  }
}

/// All functions of one translation unit plus the module-wide tables.
#[derive(Debug, Default, Serialize)]
pub struct ModuleBuilder {
  pub funcs: Vec<FunctionBuilder>,
  strings: Vec<String>,
  #[serde(skip)]
  string_ids: HashMap<String, u32>,
  headers: Vec<String>,
}

impl ModuleBuilder {
  pub fn new() -> ModuleBuilder {
    ModuleBuilder {
      funcs: Vec::new(),
      strings: Vec::new(),
      string_ids: HashMap::new(),
      headers: Vec::new(),
    }
  }

  pub fn new_function(&mut self, parent: Option<FuncId>, name: Option<String>, strict: bool) -> FuncId {
    let id = FuncId(self.funcs.len() as u32);
    let level = match parent {
      Some(p) => {
        self.funcs[p.0 as usize].closures.push(id);
        self.funcs[p.0 as usize].level + 1
      }
      None => {
        assert!(self.funcs.is_empty(), "only the top-level function has no parent");
        0
      }
    };
    self
      .funcs
      .push(FunctionBuilder::new(id, parent, level, name, strict));
    id
  }

  pub fn top_level(&self) -> &FunctionBuilder {
    &self.funcs[0]
  }

  pub fn func(&self, id: FuncId) -> &FunctionBuilder {
    &self.funcs[id.0 as usize]
  }

  pub fn func_mut(&mut self, id: FuncId) -> &mut FunctionBuilder {
    &mut self.funcs[id.0 as usize]
  }

  pub fn var(&self, id: VarId) -> &Var {
    self.func(id.func).var(id)
  }

  pub fn var_mut(&mut self, id: VarId) -> &mut Var {
    self.func_mut(id.func).var_mut(id)
  }

  pub fn intern(&mut self, s: &str) -> u32 {
    if let Some(id) = self.string_ids.get(s) {
      return *id;
    }
    let id = self.strings.len() as u32;
    self.strings.push(s.to_string());
    self.string_ids.insert(s.to_string(), id);
    id
  }

  pub fn string_id(&self, s: &str) -> Option<u32> {
    self.string_ids.get(s).copied()
  }

  pub fn strings(&self) -> &[String] {
    &self.strings
  }

  /// Registers a raw header fragment once.
  pub fn add_header(&mut self, text: &str) {
    if !self.headers.iter().any(|h| h == text) {
      self.headers.push(text.to_string());
    }
  }

  pub fn headers(&self) -> &[String] {
    &self.headers
  }

  /// Interns every string immediate used by any function.
  pub fn intern_immediates(&mut self) {
    let mut found = Vec::new();
    for f in self.funcs.iter() {
      for b in f.blocks.iter() {
        for inst in b.body.iter() {
          inst.for_each_operand(|v| {
            if let RValue::Imm(Imm::Str(s)) = v {
              found.push(s.clone());
            }
          });
        }
        if let Some(j) = &b.jump {
          j.for_each_operand(|v| {
            if let RValue::Imm(Imm::Str(s)) = v {
              found.push(s.clone());
            }
          });
        }
      }
    }
    for s in found {
      self.intern(&s);
    }
  }
}

impl Inst {
  pub fn for_each_operand(&self, mut f: impl FnMut(&RValue)) {
    match self {
      Inst::Closure { dest, .. }
      | Inst::Create { dest, .. }
      | Inst::CreateArguments { dest }
      | Inst::LoadSc { dest, .. } => f(dest),
      Inst::EndTry { .. } => {}
      Inst::Asm { bindings, .. } => bindings.iter().for_each(&mut f),
      Inst::Assign { dest, src } => {
        f(dest);
        f(src);
      }
      Inst::Binop { dest, a, b, .. } => {
        f(dest);
        f(a);
        f(b);
      }
      Inst::Unop { dest, a, .. } => {
        f(dest);
        f(a);
      }
      Inst::Get { dest, obj, key } => {
        f(dest);
        f(obj);
        f(key);
      }
      Inst::Put { obj, key, value } => {
        f(obj);
        f(key);
        f(value);
      }
      Inst::Call { dest, callee, .. } => {
        if let Some(d) = dest {
          f(d);
        }
        match callee {
          Callee::Ind(v) | Callee::Cons(v) | Callee::Pinned { copy: v, .. } => f(v),
          Callee::Direct { closure, .. } => f(closure),
        }
      }
    }
  }
}

impl Jump {
  pub fn for_each_operand(&self, mut f: impl FnMut(&RValue)) {
    match self {
      Jump::Ret(v) | Jump::Throw(v) => f(v),
      Jump::Switch { value, .. } | Jump::IfTrue { value, .. } => f(value),
      Jump::If { a, b, .. } => {
        f(a);
        f(b);
      }
      Jump::Goto(_) | Jump::BeginTry { .. } => {}
    }
  }
}
