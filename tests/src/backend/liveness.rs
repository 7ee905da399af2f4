use jitil_backend::liveness::{address_mode, AddressMode, UseCount};
use jitil_backend::Liveness;
use jitil_core::{Block, Cond, InstIdx, OperandSlot};

#[test]
fn test_use_counts_saturate() {
    let mut b = Block::new(0);
    let a = b.gen_load_greg(0);
    let x = b.gen_add(a, a);
    let y = b.gen_sub(x, a);
    b.gen_store_greg(y, 1);
    let live = Liveness::analyze(&b);
    assert_eq!(live.len(), b.len());
    assert_eq!(live.use_count(a), UseCount::Many);
    assert_eq!(live.use_count(x), UseCount::One);
    assert_eq!(live.use_count(y), UseCount::One);
    assert_eq!(live.last_use(a), Some(y));
    assert_eq!(live.last_use(y), Some(InstIdx(3)));
}

#[test]
fn test_last_use_flag_on_final_reader() {
    let mut b = Block::new(0);
    let a = b.gen_load_greg(0);
    let c = b.gen_load_greg(1);
    let x = b.gen_add(a, c);
    let y = b.gen_add(x, c);
    b.gen_store_greg(y, 2);
    let live = Liveness::analyze(&b);

    assert!(live.is_last_use_of(x, a));
    assert!(!live.is_last_use_of(x, c));
    assert!(live.is_last_use_of(y, c));
    assert!(live.is_last_use_of(y, x));

    let uses: Vec<_> = live.operand_uses(y).collect();
    assert_eq!(uses.len(), 2);
    assert_eq!(uses[0].operand, x);
    assert_eq!(uses[0].slot, OperandSlot::First);
    assert_eq!(uses[1].operand, c);
    assert_eq!(uses[1].slot, OperandSlot::Second);
}

#[test]
fn test_dead_values_are_skipped() {
    let mut b = Block::new(0);
    let a = b.gen_load_greg(0);
    let c = b.gen_load_greg(1);
    let dead = b.gen_xor(a, c);
    let st = b.gen_store_greg(a, 2);
    let live = Liveness::analyze(&b);

    assert!(!live.is_used(dead));
    assert!(!live.needs_code(&b, dead));
    // A dead instruction does not keep its operands alive.
    assert!(!live.is_used(c));
    assert!(live.needs_code(&b, st));
    assert_eq!(live.use_count(a), UseCount::One);
}

#[test]
fn test_immediates_are_not_marked() {
    let mut b = Block::new(0);
    let a = b.gen_load_greg(0);
    let k = b.gen_const(3);
    let s = b.gen_shl(a, k);
    b.gen_store_greg(s, 0);
    let seven = b.gen_const(7);
    b.gen_store_greg(seven, 1);
    let live = Liveness::analyze(&b);

    assert!(!live.is_used(k));
    assert!(!live.is_used(seven));
    assert_eq!(live.operand_uses(s).count(), 1);
}

#[test]
fn test_constant_first_operand_is_materialized() {
    let mut b = Block::new(0);
    let k = b.gen_const(3);
    let a = b.gen_load_greg(0);
    let s = b.gen_sub(k, a);
    b.gen_store_greg(s, 0);
    let live = Liveness::analyze(&b);
    assert!(live.is_used(k));
}

#[test]
fn test_address_folding() {
    let mut b = Block::new(0);
    let base = b.gen_load_greg(1);
    let addr = b.gen_add_imm(base, 8);
    let v = b.gen_load32(addr);
    b.gen_store_greg(v, 3);
    let live = Liveness::analyze(&b);

    assert_eq!(address_mode(&b, addr), AddressMode::BaseDisp(base, 8));
    assert!(!live.is_used(addr));
    assert!(live.is_last_use_of(v, base));
}

#[test]
fn test_address_modes() {
    let mut b = Block::new(0);
    let k = b.gen_const(0x8000_0000);
    let r = b.gen_load_greg(0);
    let q = b.gen_load_greg(1);
    let sum = b.gen_add(r, q);
    assert_eq!(address_mode(&b, k), AddressMode::Imm(0x8000_0000));
    assert_eq!(address_mode(&b, r), AddressMode::BaseDisp(r, 0));
    assert_eq!(address_mode(&b, sum), AddressMode::BaseDisp(sum, 0));
}

#[test]
fn test_unused_float_load_is_dropped() {
    let mut b = Block::new(0);
    let base = b.gen_load_greg(1);
    let f = b.gen_load_single(base);
    let i = b.gen_load32(base);
    let live = Liveness::analyze(&b);

    assert!(!live.needs_code(&b, f));
    // Integer loads may fault and are kept.
    assert!(live.needs_code(&b, i));
    assert_eq!(live.use_count(base), UseCount::One);
}

#[test]
fn test_branch_over_compare_marks_compare_inputs() {
    let mut b = Block::new(0);
    let a = b.gen_load_greg(0);
    let c = b.gen_load_greg(1);
    let cmp = b.gen_icmp(Cond::Ult, a, c);
    let dest = b.gen_const(0x8000_0100);
    let br = b.gen_branch_cond(cmp, dest);
    let live = Liveness::analyze(&b);

    assert!(!live.is_used(cmp));
    assert!(!live.is_used(dest));
    assert!(live.is_last_use_of(br, a));
    assert!(live.is_last_use_of(br, c));
}

#[test]
fn test_branch_on_plain_value() {
    let mut b = Block::new(0);
    let flag = b.gen_load_carry();
    let dest = b.gen_load_link();
    let br = b.gen_branch_cond(flag, dest);
    let live = Liveness::analyze(&b);
    assert!(live.is_last_use_of(br, flag));
    assert!(live.is_last_use_of(br, dest));
}

#[test]
fn test_idle_branch_marks_polled_value() {
    let mut b = Block::new(0);
    let v = b.gen_load_greg(5);
    let br = b.gen_idle_branch(v, 0, 0x8000_0000);
    let live = Liveness::analyze(&b);
    let cmp = b.inst(br).op1.unwrap();
    assert!(!live.is_used(cmp));
    assert!(live.is_last_use_of(br, v));
}
