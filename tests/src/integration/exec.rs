//! Blocks compiled and run on the host.

use std::cell::{Cell, RefCell};

use jitil_backend::x86_64::Reg;
use jitil_backend::{BackendConfig, CompiledBlock, ExitTarget, Runtime, Translator};
use jitil_core::guest::*;
use jitil_core::{Block, Cond, GuestState};

thread_local! {
    static READ_VALUE: Cell<u32> = const { Cell::new(0) };
    static READS: RefCell<Vec<u32>> = const { RefCell::new(Vec::new()) };
    static WRITES: RefCell<Vec<(u32, u32)>> = const { RefCell::new(Vec::new()) };
    static INTERPRETED: RefCell<Vec<u32>> = const { RefCell::new(Vec::new()) };
    static IDLE_CALLS: Cell<u32> = const { Cell::new(0) };
}

extern "C" fn read(addr: u32) -> u32 {
    READS.with(|r| r.borrow_mut().push(addr));
    READ_VALUE.with(|v| v.get())
}

extern "C" fn read64(addr: u32) -> u64 {
    read(addr) as u64
}

extern "C" fn write(addr: u32, value: u32) {
    WRITES.with(|w| w.borrow_mut().push((addr, value)));
}

extern "C" fn write64(addr: u32, value: u64) {
    write(addr, value as u32);
}

extern "C" fn interpret(inst: u32) {
    INTERPRETED.with(|i| i.borrow_mut().push(inst));
}

extern "C" fn idle() {
    IDLE_CALLS.with(|c| c.set(c.get() + 1));
}

fn runtime() -> Runtime {
    Runtime::default()
        .with_memory([read, read, read], read64, [write, write, write], write64)
        .with_interpreter(interpret)
        .with_idle(idle)
}

fn translator(config: BackendConfig) -> Translator {
    crate::init_logging();
    READ_VALUE.with(|v| v.set(0));
    READS.with(|r| r.borrow_mut().clear());
    WRITES.with(|w| w.borrow_mut().clear());
    INTERPRETED.with(|i| i.borrow_mut().clear());
    IDLE_CALLS.with(|c| c.set(0));
    Translator::new(config.with_code_buffer_size(64 * 1024)).unwrap()
}

fn config() -> BackendConfig {
    BackendConfig::new(runtime())
}

fn run(t: &Translator, c: &CompiledBlock, state: &mut GuestState) -> usize {
    // SAFETY: `c` comes from `t` and the hooks above accept any input.
    unsafe { t.execute(c, state) }
}

#[test]
fn test_load_add_store() {
    let mut t = translator(config());
    let mut b = Block::new(0x8000_0000);
    let base = b.gen_load_greg(1);
    let addr = b.gen_add_imm(base, 8);
    let v = b.gen_load32(addr);
    let s = b.gen_add_imm(v, 5);
    b.gen_store_greg(s, 3);
    b.exit_pc = 0x8000_0010;
    let c = t.compile(&b).unwrap();

    READ_VALUE.with(|v| v.set(0x100));
    let mut state = GuestState::new();
    state.gpr[1] = 0x1000;
    let exit = run(&t, &c, &mut state);

    assert_eq!(exit, 0);
    assert_eq!(state.gpr[3], 0x105);
    assert_eq!(state.gpr[1], 0x1000);
    assert_eq!(state.pc, 0x8000_0010);
    READS.with(|r| assert_eq!(*r.borrow(), [0x1008]));
}

#[test]
fn test_conditional_branch() {
    let mut t = translator(config());
    let mut b = Block::new(0x100);
    let a = b.gen_load_greg(4);
    let k = b.gen_const(5);
    let cmp = b.gen_icmp(Cond::Eq, a, k);
    let dest = b.gen_const(0x200);
    b.gen_branch_cond(cmp, dest);
    b.exit_pc = 0x104;
    let c = t.compile(&b).unwrap();

    let mut state = GuestState::new();
    state.gpr[4] = 5;
    assert_eq!(run(&t, &c, &mut state), 0);
    assert_eq!(state.pc, 0x200);

    state.gpr[4] = 6;
    assert_eq!(run(&t, &c, &mut state), 1);
    assert_eq!(state.pc, 0x104);
}

#[test]
fn test_signed_compare_value() {
    let mut t = translator(config());
    let mut b = Block::new(0);
    let a = b.gen_load_greg(0);
    let c2 = b.gen_load_greg(1);
    let lt = b.gen_icmp(Cond::Slt, a, c2);
    b.gen_store_greg(lt, 2);
    let ult = b.gen_icmp(Cond::Ult, a, c2);
    b.gen_store_greg(ult, 3);
    let c = t.compile(&b).unwrap();

    let mut state = GuestState::new();
    state.gpr[0] = (-1i32) as u32;
    state.gpr[1] = 1;
    run(&t, &c, &mut state);
    assert_eq!(state.gpr[2], 1);
    assert_eq!(state.gpr[3], 0);
}

#[test]
fn test_runtime_call_preserves_caller_saved() {
    let int_order = [Reg::Rsi as u8, Reg::Rdi as u8];
    let mut t = translator(config().with_int_order(&int_order));
    let mut b = Block::new(0);
    let a = b.gen_load_greg(0);
    let x = b.gen_load_greg(1);
    let addr = b.gen_const(0x2000);
    let v = b.gen_load32(addr);
    let s1 = b.gen_add(a, v);
    b.gen_store_greg(s1, 3);
    let s2 = b.gen_add(x, v);
    b.gen_store_greg(s2, 4);
    let c = t.compile(&b).unwrap();

    READ_VALUE.with(|r| r.set(10));
    let mut state = GuestState::new();
    state.gpr[0] = 7;
    state.gpr[1] = 10;
    run(&t, &c, &mut state);

    assert_eq!(state.gpr[3], 17);
    assert_eq!(state.gpr[4], 20);
    assert_eq!(c.stats.evictions, 1);
    assert_eq!(c.stats.spill_stores, 1);
    assert_eq!(c.stats.reloads, 1);
    assert_eq!(c.frame_size, 16);
}

#[test]
fn test_store_through_hook() {
    let mut t = translator(config());
    let mut b = Block::new(0);
    let v = b.gen_load_greg(0);
    let base = b.gen_load_greg(1);
    let addr = b.gen_add_imm(base, 4);
    b.gen_store32(v, addr);
    let k = b.gen_const(0x77);
    b.gen_store8(k, base);
    let c = t.compile(&b).unwrap();

    let mut state = GuestState::new();
    state.gpr[0] = 0xDEAD;
    state.gpr[1] = 0x3000;
    run(&t, &c, &mut state);
    WRITES.with(|w| assert_eq!(*w.borrow(), [(0x3004, 0xDEAD), (0x3000, 0x77)]));
}

#[test]
fn test_float_compare_to_cr() {
    let mut t = translator(config());
    let mut b = Block::new(0);
    let f = b.gen_load_freg(0);
    let g = b.gen_load_freg(1);
    let r = b.gen_fdcmp_cr(f, g, false);
    b.gen_store_cr(r, 0);
    let c = t.compile(&b).unwrap();

    for (a, bv, expected) in [(1.0, 2.0, 8), (3.0, 2.0, 4), (2.0, 2.0, 2), (f64::NAN, 2.0, 1)] {
        let mut state = GuestState::new();
        state.ps[0][0] = a;
        state.ps[1][0] = bv;
        run(&t, &c, &mut state);
        assert_eq!(state.cr_val[0], expected, "{a} vs {bv}");
        assert_eq!(state.fpscr, 0);
    }
}

#[test]
fn test_ordered_compare_with_quiet_nan() {
    let mut t = translator(config());
    let mut b = Block::new(0);
    let f = b.gen_load_freg(0);
    let g = b.gen_load_freg(1);
    let r = b.gen_fdcmp_cr(f, g, true);
    b.gen_store_cr(r, 1);
    let c = t.compile(&b).unwrap();

    let mut state = GuestState::new();
    state.ps[0][0] = f64::NAN;
    state.ps[1][0] = 1.0;
    run(&t, &c, &mut state);
    assert_eq!(state.cr_val[1], 1);
    assert_eq!(state.fpscr, FPSCR_FX | FPSCR_VXVC);
}

#[test]
fn test_float_add() {
    let mut t = translator(config());
    let mut b = Block::new(0);
    let f = b.gen_load_freg(0);
    let g = b.gen_load_freg(1);
    let s = b.gen_fdadd(f, g);
    b.gen_store_freg(s, 2);
    let c = t.compile(&b).unwrap();

    let mut state = GuestState::new();
    state.ps[0] = [1.5, 7.0];
    state.ps[1] = [2.25, 9.0];
    run(&t, &c, &mut state);
    assert_eq!(state.ps[2][0], 3.75);
}

#[test]
fn test_fallback_to_interpreter() {
    let mut t = translator(config());
    let mut b = Block::new(0x8000_0000);
    let a = b.gen_load_greg(0);
    b.gen_fallback_to_interpreter(0x7C00_0378, 0x8000_0004);
    b.gen_store_greg(a, 1);
    b.exit_pc = 0x8000_000C;
    let c = t.compile(&b).unwrap();

    let mut state = GuestState::new();
    state.gpr[0] = 42;
    run(&t, &c, &mut state);

    INTERPRETED.with(|i| assert_eq!(*i.borrow(), [0x7C00_0378]));
    assert_eq!(state.gpr[1], 42);
    assert_eq!(state.npc, 0x8000_0008);
    assert_eq!(state.pc, 0x8000_000C);
    assert_eq!(c.stats.spill_stores, 1);
    assert_eq!(c.stats.reloads, 1);
}

#[test]
fn test_idle_branch() {
    let mut t = translator(config());
    let mut b = Block::new(0x8000_0000);
    let v = b.gen_load_greg(5);
    b.gen_idle_branch(v, 0, 0x8000_0000);
    b.exit_pc = 0x8000_0008;
    let c = t.compile(&b).unwrap();
    assert_eq!(c.exits[0].target, ExitTarget::Exception);

    let mut state = GuestState::new();
    state.gpr[5] = 1;
    assert_eq!(run(&t, &c, &mut state), 1);
    assert_eq!(IDLE_CALLS.with(|c| c.get()), 0);
    assert_eq!(state.pc, 0x8000_0008);

    state.gpr[5] = 0;
    assert_eq!(run(&t, &c, &mut state), 0);
    assert_eq!(IDLE_CALLS.with(|c| c.get()), 1);
    assert_eq!(state.pc, 0x8000_0000);
}

#[test]
fn test_system_call() {
    let mut t = translator(config());
    let mut b = Block::new(0x100);
    b.gen_system_call(0x100);
    let c = t.compile(&b).unwrap();

    let mut state = GuestState::new();
    assert_eq!(run(&t, &c, &mut state), 0);
    assert_eq!(state.exceptions, EXCEPTION_SYSCALL);
    assert_eq!(state.pc, 0x104);
}

#[test]
fn test_return_from_interrupt() {
    let mut t = translator(config());
    let mut b = Block::new(0x500);
    b.gen_rfi_exit();
    let c = t.compile(&b).unwrap();

    let mut state = GuestState::new();
    state.srr0 = 0x1234;
    state.srr1 = 0xFFFF_FFFF;
    assert_eq!(run(&t, &c, &mut state), 0);
    assert_eq!(state.msr, RFI_MSR_MASK & RFI_MSR_CLEAR);
    assert_eq!(state.npc, 0x1234);
    assert_eq!(state.pc, 0x1234);
}

#[test]
fn test_external_exception_check() {
    let mut t = translator(config());
    let mut b = Block::new(0x100);
    b.gen_ext_exception_check(0x100);
    b.exit_pc = 0x104;
    let c = t.compile(&b).unwrap();

    let mut state = GuestState::new();
    state.exceptions = EXCEPTION_EXTERNAL_INT;
    assert_eq!(run(&t, &c, &mut state), 1, "interrupts masked");
    state.msr = MSR_EE;
    assert_eq!(run(&t, &c, &mut state), 0);
    assert_eq!(state.pc, 0x100);
    state.exceptions |= EXCEPTION_DSI;
    state.pc = 0;
    assert_eq!(run(&t, &c, &mut state), 1, "synchronous exception first");
    assert_eq!(state.pc, 0x104);
}

#[test]
fn test_carry_roundtrip() {
    let mut t = translator(config());
    let mut b = Block::new(0);
    let ca = b.gen_load_carry();
    b.gen_store_greg(ca, 0);
    let c = t.compile(&b).unwrap();

    let mut state = GuestState::new();
    state.set_carry(true);
    run(&t, &c, &mut state);
    assert_eq!(state.gpr[0], 1);
    state.set_carry(false);
    run(&t, &c, &mut state);
    assert_eq!(state.gpr[0], 0);
}

#[test]
fn test_shifts_and_rotate() {
    let mut t = translator(config());
    let mut b = Block::new(0);
    let a = b.gen_load_greg(0);
    let n = b.gen_load_greg(1);
    let four = b.gen_const(4);
    let rol = b.gen_rol(a, four);
    b.gen_store_greg(rol, 2);
    let shr = b.gen_shrl(a, n);
    b.gen_store_greg(shr, 3);
    let sar = b.gen_sarl(a, n);
    b.gen_store_greg(sar, 4);
    let c = t.compile(&b).unwrap();

    let mut state = GuestState::new();
    state.gpr[0] = 0x8000_0001;
    state.gpr[1] = 4;
    run(&t, &c, &mut state);
    assert_eq!(state.gpr[2], 0x0000_0018);
    assert_eq!(state.gpr[3], 0x0800_0000);
    assert_eq!(state.gpr[4], 0xF800_0000);
}

#[test]
fn test_count_leading_zeros() {
    let mut t = translator(config());
    let mut b = Block::new(0);
    let a = b.gen_load_greg(0);
    let n = b.gen_cntlzw(a);
    b.gen_store_greg(n, 1);
    let c = t.compile(&b).unwrap();

    for (value, zeros) in [(0x0001_0000, 15), (0, 32), (0xFFFF_FFFF, 0), (1, 31)] {
        let mut state = GuestState::new();
        state.gpr[0] = value;
        run(&t, &c, &mut state);
        assert_eq!(state.gpr[1], zeros, "{value:#x}");
    }
}

#[test]
fn test_mul_high_unsigned() {
    let mut t = translator(config());
    let mut b = Block::new(0);
    let a = b.gen_load_greg(0);
    let x = b.gen_load_greg(1);
    let hi = b.gen_mul_high_unsigned(a, x);
    b.gen_store_greg(hi, 2);
    let c = t.compile(&b).unwrap();

    for (l, r, expected) in [(0xFFFF_FFFF, 0xFFFF_FFFF, 0xFFFF_FFFE), (0x1_0000, 0x1_0000, 1), (3, 5, 0)] {
        let mut state = GuestState::new();
        state.gpr[0] = l;
        state.gpr[1] = r;
        run(&t, &c, &mut state);
        assert_eq!(state.gpr[2], expected);
    }
}

#[test]
fn test_integer_compare_to_cr() {
    let mut t = translator(config());
    let mut b = Block::new(0);
    let a = b.gen_load_greg(0);
    let x = b.gen_load_greg(1);
    let signed = b.gen_icmp_cr_signed(a, x);
    b.gen_store_cr(signed, 0);
    let unsigned = b.gen_icmp_cr_unsigned(a, x);
    b.gen_store_cr(unsigned, 1);
    let k = b.gen_const(0x8000_0000);
    let wide = b.gen_icmp_cr_unsigned(x, k);
    b.gen_store_cr(wide, 2);
    let c = t.compile(&b).unwrap();

    let mut state = GuestState::new();
    state.gpr[0] = (-1i32) as u32;
    state.gpr[1] = 1;
    run(&t, &c, &mut state);
    assert_eq!(state.cr_val[0], (-2i64) as u64);
    assert_eq!(state.cr_val[1], 0xFFFF_FFFE);
    assert_eq!(state.cr_val[2], 1u64.wrapping_sub(0x8000_0000));
}

#[test]
fn test_fast_cr_bits() {
    let mut t = translator(config());
    let mut b = Block::new(0);
    let cr = b.gen_load_cr(0);
    let so = b.gen_fastcr_so_set(cr);
    b.gen_store_greg(so, 0);
    let eq = b.gen_fastcr_eq_set(cr);
    b.gen_store_greg(eq, 1);
    let gt = b.gen_fastcr_gt_set(cr);
    b.gen_store_greg(gt, 2);
    let lt = b.gen_fastcr_lt_set(cr);
    b.gen_store_greg(lt, 3);
    let c = t.compile(&b).unwrap();

    // [so, eq, gt, lt]
    let cases: [(u64, [u32; 4]); 5] = [
        (0, [0, 1, 0, 0]),
        (5, [0, 0, 1, 0]),
        (0xC000_0000_0000_0001, [0, 0, 0, 1]),
        ((1 << 61) | 1, [1, 0, 1, 0]),
        (0x1_0000_0000, [0, 1, 1, 0]),
    ];
    for (value, bits) in cases {
        let mut state = GuestState::new();
        state.cr_val[0] = value;
        run(&t, &c, &mut state);
        assert_eq!(state.gpr[..4], bits, "{value:#x}");
    }
}

#[test]
fn test_sign_extend() {
    let mut t = translator(config());
    let mut b = Block::new(0);
    let a = b.gen_load_greg(0);
    let byte = b.gen_sext8(a);
    b.gen_store_greg(byte, 1);
    let half = b.gen_sext16(a);
    b.gen_store_greg(half, 2);
    let c = t.compile(&b).unwrap();

    let mut state = GuestState::new();
    state.gpr[0] = 0x1234_80F0;
    run(&t, &c, &mut state);
    assert_eq!(state.gpr[1], 0xFFFF_FFF0);
    assert_eq!(state.gpr[2], 0xFFFF_80F0);

    state.gpr[0] = 0x7F7F;
    run(&t, &c, &mut state);
    assert_eq!(state.gpr[1], 0x7F);
    assert_eq!(state.gpr[2], 0x7F7F);
}

/// Low 64 bits of a register holding the pair `[ps0, ps1]`.
fn pair(ps0: f32, ps1: f32) -> f64 {
    f64::from_bits(((ps1.to_bits() as u64) << 32) | ps0.to_bits() as u64)
}

fn unpair(v: f64) -> (f32, f32) {
    let bits = v.to_bits();
    (f32::from_bits(bits as u32), f32::from_bits((bits >> 32) as u32))
}

#[test]
fn test_paired_merges() {
    let mut t = translator(config());
    let mut b = Block::new(0);
    let a = b.gen_load_freg(0);
    let x = b.gen_load_freg(1);
    let m00 = b.gen_fpmerge00(a, x);
    b.gen_store_freg(m00, 2);
    let m01 = b.gen_fpmerge01(a, x);
    b.gen_store_freg(m01, 3);
    let m10 = b.gen_fpmerge10(a, x);
    b.gen_store_freg(m10, 4);
    let m11 = b.gen_fpmerge11(a, x);
    b.gen_store_freg(m11, 5);
    let c = t.compile(&b).unwrap();

    let mut state = GuestState::new();
    state.ps[0][0] = pair(1.0, 2.0);
    state.ps[1][0] = pair(3.0, 4.0);
    run(&t, &c, &mut state);
    assert_eq!(unpair(state.ps[2][0]), (1.0, 3.0));
    assert_eq!(unpair(state.ps[3][0]), (1.0, 4.0));
    assert_eq!(unpair(state.ps[4][0]), (2.0, 3.0));
    assert_eq!(unpair(state.ps[5][0]), (2.0, 4.0));
}

#[test]
fn test_negation() {
    let mut t = translator(config());
    let mut b = Block::new(0);
    let p = b.gen_load_freg(0);
    let d = b.gen_load_freg(1);
    let ps = b.gen_fpneg(p);
    b.gen_store_freg(ps, 2);
    let ss = b.gen_fsneg(p);
    b.gen_store_freg(ss, 3);
    let dd = b.gen_fdneg(d);
    b.gen_store_freg(dd, 4);
    let c = t.compile(&b).unwrap();

    let mut state = GuestState::new();
    state.ps[0][0] = pair(1.5, 2.0);
    state.ps[1] = [3.0, 8.0];
    run(&t, &c, &mut state);
    assert_eq!(unpair(state.ps[2][0]), (-1.5, -2.0));
    assert_eq!(unpair(state.ps[3][0]), (-1.5, 2.0));
    assert_eq!(state.ps[4], [-3.0, 8.0]);
}

#[test]
fn test_paired_duplicates() {
    let mut t = translator(config());
    let mut b = Block::new(0);
    let a = b.gen_load_freg(0);
    let d0 = b.gen_fpdup0(a);
    b.gen_store_freg(d0, 1);
    let d1 = b.gen_fpdup1(a);
    b.gen_store_freg(d1, 2);
    let c = t.compile(&b).unwrap();

    let mut state = GuestState::new();
    state.ps[0][0] = pair(1.0, 2.0);
    run(&t, &c, &mut state);
    assert_eq!(unpair(state.ps[1][0]), (1.0, 1.0));
    assert_eq!(unpair(state.ps[2][0]), (2.0, 2.0));
}

#[test]
fn test_precision_conversions() {
    let mut t = translator(config());
    let mut b = Block::new(0);
    let single = b.gen_load_freg(0);
    let dup = b.gen_dup_single_to_mreg(single);
    b.gen_store_freg(dup, 4);
    let double = b.gen_load_freg(1);
    let narrow = b.gen_double_to_single(double);
    b.gen_store_freg(narrow, 5);
    let packed = b.gen_load_freg(2);
    let wide = b.gen_expand_packed_to_mreg(packed);
    b.gen_store_freg(wide, 6);
    let mreg = b.gen_load_freg(3);
    let compact = b.gen_compact_mreg_to_packed(mreg);
    b.gen_store_freg(compact, 7);
    let c = t.compile(&b).unwrap();

    let mut state = GuestState::new();
    state.ps[0][0] = pair(1.5, 0.0);
    state.ps[1][0] = 2.5;
    state.ps[2][0] = pair(1.5, -2.0);
    state.ps[3] = [0.25, -8.0];
    run(&t, &c, &mut state);
    assert_eq!(state.ps[4], [1.5, 1.5]);
    assert_eq!(unpair(state.ps[5][0]).0, 2.5);
    assert_eq!(state.ps[6], [1.5, -2.0]);
    assert_eq!(unpair(state.ps[7][0]), (0.25, -8.0));
}

#[test]
fn test_insert_double() {
    let mut t = translator(config());
    let mut b = Block::new(0);
    let a = b.gen_load_freg(0);
    let x = b.gen_load_freg(1);
    let r = b.gen_insert_double_in_mreg(a, x);
    b.gen_store_freg(r, 2);
    let c = t.compile(&b).unwrap();

    let mut state = GuestState::new();
    state.ps[0] = [5.0, 6.0];
    state.ps[1] = [7.0, 8.0];
    run(&t, &c, &mut state);
    assert_eq!(state.ps[2], [5.0, 8.0]);
}

#[test]
fn test_load_flushes_single_denormal() {
    let mut t = translator(config());
    let mut b = Block::new(0);
    let f = b.gen_load_freg_den_to_zero(0);
    b.gen_store_freg(f, 1);
    let c = t.compile(&b).unwrap();

    let mut state = GuestState::new();
    state.ps[0] = [-1e-40, 4.0];
    run(&t, &c, &mut state);
    assert_eq!(state.ps[1][0].to_bits(), (-0.0f64).to_bits());
    assert_eq!(state.ps[1][1], 4.0);

    for normal in [1.0, -2.0e-30, 0.0] {
        state.ps[0] = [normal, 4.0];
        run(&t, &c, &mut state);
        assert_eq!(state.ps[1][0].to_bits(), normal.to_bits());
    }
}

#[test]
fn test_store_fprf() {
    let mut t = translator(config());
    let mut b = Block::new(0);
    let v = b.gen_load_greg(0);
    b.gen_store_fprf(v);
    let c = t.compile(&b).unwrap();

    let mut state = GuestState::new();
    state.fpscr = 0xFFFF_FFFF;
    state.gpr[0] = 0x02;
    run(&t, &c, &mut state);
    assert_eq!(state.fpscr, 0xFFFE_2FFF);

    state.fpscr = 0;
    state.gpr[0] = 0x3F;
    run(&t, &c, &mut state);
    assert_eq!(state.fpscr, 0x1F << 12);
}

#[test]
fn test_fp_unavailable_exception() {
    let mut t = translator(config());
    let mut b = Block::new(0x100);
    b.gen_fp_exception_check(0x100);
    let k = b.gen_const(1);
    b.gen_store_greg(k, 0);
    b.exit_pc = 0x104;
    b.downcount = 3;
    let c = t.compile(&b).unwrap();
    assert_eq!(c.exits[0].target, ExitTarget::Exception);

    let mut state = GuestState::new();
    state.downcount = 100;
    assert_eq!(run(&t, &c, &mut state), 0);
    assert_eq!(state.exceptions, EXCEPTION_FPU_UNAVAILABLE);
    assert_eq!(state.downcount, 97);
    assert_eq!(state.pc, 0x100);
    assert_eq!(state.gpr[0], 0);

    let mut state = GuestState::new();
    state.msr = MSR_FP;
    state.downcount = 100;
    assert_eq!(run(&t, &c, &mut state), 1);
    assert_eq!(state.exceptions, 0);
    assert_eq!(state.downcount, 100);
    assert_eq!(state.pc, 0x104);
    assert_eq!(state.gpr[0], 1);
}

#[test]
fn test_short_idle_loop() {
    let mut t = translator(config());
    let mut b = Block::new(0x200);
    b.gen_short_idle_loop(0x200);
    b.exit_pc = 0x208;
    let c = t.compile(&b).unwrap();
    assert_eq!(c.exits[0].target, ExitTarget::Exception);

    let mut state = GuestState::new();
    assert_eq!(run(&t, &c, &mut state), 0);
    assert_eq!(IDLE_CALLS.with(|c| c.get()), 1);
    assert_eq!(state.pc, 0x200);
}
