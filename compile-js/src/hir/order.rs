use super::builder::FunctionBuilder;
use super::BlockId;

/// Layout order of a finished function's blocks: a preorder depth-first walk
/// from the entry that visits successors last-to-first, with the exit block
/// placed at the end. Unreachable blocks are omitted.
pub fn block_order(fb: &FunctionBuilder) -> Vec<BlockId> {
  let exit = fb.exit_block();
  let mut seen = vec![false; fb.blocks.len()];
  let mut order = Vec::new();
  // Each frame is a block and how many of its successors have been tried.
  let mut stack: Vec<(BlockId, usize)> = Vec::new();

  seen[exit.0 as usize] = true;
  seen[fb.entry.0 as usize] = true;
  order.push(fb.entry);
  stack.push((fb.entry, 0));

  while let Some((b, tried)) = stack.last_mut() {
    let succ = &fb.block(*b).succ;
    if *tried == succ.len() {
      stack.pop();
      continue;
    };
    let label = succ[succ.len() - 1 - *tried];
    *tried += 1;
    let target = fb
      .label_block(label)
      .unwrap_or_else(|| panic!("jump to unplaced label {label:?}"));
    if !seen[target.0 as usize] {
      seen[target.0 as usize] = true;
      order.push(target);
      stack.push((target, 0));
    }
  }
  order.push(exit);
  order
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::hir::builder::ModuleBuilder;
  use crate::hir::Jump;
  use crate::hir::RValue;

  #[test]
  fn successors_visited_in_reverse_and_exit_last() {
    let mut m = ModuleBuilder::new();
    let f = m.new_function(None, None, false);
    let fb = m.func_mut(f);
    let cond = fb.alloc_temp();
    let (then_l, else_l, join) = (fb.new_label(), fb.new_label(), fb.new_label());
    let head = fb.cur_block().id;
    fb.gen_if_true(cond, then_l, else_l);
    fb.place_label(then_l);
    let then_b = fb.cur_block().id;
    fb.gen_ret(RValue::num(1.0));
    fb.place_label(else_l);
    let else_b = fb.cur_block().id;
    fb.goto(join);
    fb.place_label(join);
    let join_b = fb.cur_block().id;
    fb.gen_ret(RValue::num(2.0));
    fb.finish();

    let order = block_order(fb);
    assert_eq!(
      order,
      vec![fb.entry, head, else_b, join_b, then_b, fb.exit_block()]
    );
  }

  #[test]
  fn unreachable_blocks_are_dropped() {
    let mut m = ModuleBuilder::new();
    let f = m.new_function(None, None, false);
    let fb = m.func_mut(f);
    fb.gen_ret(RValue::UNDEFINED);
    // Dead code after the return lands in its own block.
    fb.set_jump(Jump::Throw(RValue::num(0.0)));
    let dead = fb.cur_block().id;
    fb.finish();
    let order = block_order(fb);
    assert!(!order.contains(&dead));
    assert_eq!(order.last(), Some(&fb.exit_block()));
    assert_eq!(order.len(), 3);
  }
}
