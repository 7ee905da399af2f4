use jitil_backend::code_buffer::CodeBuffer;
use jitil_backend::translate::worst_case_size;
use jitil_backend::x86_64::Reg;
use jitil_backend::{compile_block, BackendConfig, CompiledBlock, ExitTarget, X86_64CodeGen};
use jitil_core::guest::gpr_offset;
use jitil_core::{Block, Cond, Inst, InstIdx, Opcode};

fn compile(block: &Block, config: &BackendConfig) -> (CodeBuffer, CompiledBlock) {
    crate::init_logging();
    let cg = X86_64CodeGen::new();
    let mut buf = CodeBuffer::new(64 * 1024).unwrap();
    let compiled = compile_block(block, &cg, &mut buf, config);
    (buf, compiled)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn le(v: i32) -> [u8; 4] {
    v.to_le_bytes()
}

/// gpr3 = read32(gpr1 + 8) + 5
fn load_add_store() -> Block {
    let mut b = Block::new(0x8000_0000);
    let base = b.gen_load_greg(1);
    let addr = b.gen_add_imm(base, 8);
    let v = b.gen_load32(addr);
    let s = b.gen_add_imm(v, 5);
    b.gen_store_greg(s, 3);
    b.exit_pc = 0x8000_0010;
    b
}

#[test]
fn test_folded_address_and_register_reuse() {
    let b = load_add_store();
    let (buf, c) = compile(&b, &BackendConfig::default());
    let code = buf.code(c.entry, c.end());

    let mut head = vec![0x48, 0x81, 0xEC, 0, 0, 0, 0];
    // mov ebx, [rbp+gpr1]
    head.extend([0x8B, 0x9D]);
    head.extend(le(gpr_offset(1)));
    // lea ecx, [rbx+8]; mov rdi, rcx
    head.extend([0x8D, 0x4B, 0x08, 0x48, 0x89, 0xCF]);
    assert_eq!(&code[..head.len()], &head[..]);

    // call rax; mov ebx, eax; add ebx, 5; mov [rbp+gpr3], ebx
    let mut tail = vec![0xFF, 0xD0, 0x89, 0xC3, 0x83, 0xC3, 0x05, 0x89, 0x9D];
    tail.extend(le(gpr_offset(3)));
    assert!(find(code, &tail).is_some());

    assert_eq!(c.start_pc, 0x8000_0000);
    assert_eq!(c.frame_size, 0);
    assert_eq!(c.stats.allocations, 2);
    assert_eq!(c.stats.evictions, 0);
    assert!(c.size <= worst_case_size(&b));
}

/// `r = op(a, x)` where only `x` dies at `r`.
fn op2_dies(op: fn(&mut Block, InstIdx, InstIdx) -> InstIdx, float: bool) -> Block {
    let mut b = Block::new(0);
    let (a, x) = if float {
        (b.gen_load_freg(0), b.gen_load_freg(1))
    } else {
        (b.gen_load_greg(0), b.gen_load_greg(1))
    };
    let r = op(&mut b, a, x);
    if float {
        b.gen_store_freg(r, 2);
        b.gen_store_freg(a, 3);
    } else {
        b.gen_store_greg(r, 2);
        b.gen_store_greg(a, 3);
    }
    b
}

#[test]
fn test_add_takes_dying_op2_register() {
    let (_, c) = compile(&op2_dies(Block::gen_add, false), &BackendConfig::default());
    assert_eq!(c.stats.allocations, 2);
    assert_eq!(c.stats.evictions, 0);
}

#[test]
fn test_mul_takes_dying_op2_register() {
    let (buf, c) = compile(&op2_dies(Block::gen_mul, false), &BackendConfig::default());
    assert_eq!(c.stats.allocations, 2);
    // imul r12d, ebx
    assert!(find(buf.code(c.entry, c.end()), &[0x44, 0x0F, 0xAF, 0xE3]).is_some());
}

#[test]
fn test_fdadd_takes_dying_op2_register() {
    let (buf, c) = compile(&op2_dies(Block::gen_fdadd, true), &BackendConfig::default());
    assert_eq!(c.stats.allocations, 2);
    // addsd xmm3, xmm2
    assert!(find(buf.code(c.entry, c.end()), &[0xF2, 0x0F, 0x58, 0xDA]).is_some());
}

#[test]
fn test_sub_keeps_op1_order() {
    let (_, c) = compile(&op2_dies(Block::gen_sub, false), &BackendConfig::default());
    assert_eq!(c.stats.allocations, 3);
    let (_, c) = compile(&op2_dies(Block::gen_fdsub, true), &BackendConfig::default());
    assert_eq!(c.stats.allocations, 3);
}

#[test]
fn test_final_exit_layout() {
    let b = load_add_store();
    let (buf, c) = compile(&b, &BackendConfig::default());

    assert_eq!(c.exits.len(), 1);
    let last = c.final_exit().unwrap();
    assert_eq!(last.index, 0);
    assert_eq!(last.target, ExitTarget::Known(0x8000_0010));

    // add rsp, 0; xor eax, eax; jmp rel32
    let at = last.jump_offset;
    assert_eq!(buf.code(at - 9, at), [0x48, 0x81, 0xC4, 0, 0, 0, 0, 0x31, 0xC0]);
    assert_eq!(buf.code(at, at + 1), [0xE9]);
    let rel = buf.read_u32(at + 1) as i32;
    assert_eq!(at as i64 + 5 + rel as i64, 0);
    // Trap after the final jump.
    assert_eq!(buf.code(c.end() - 2, c.end()), [0x0F, 0x0B]);
}

#[test]
fn test_branch_on_compare_uses_negated_jcc() {
    let mut b = Block::new(0x100);
    let a = b.gen_load_greg(4);
    let k = b.gen_const(5);
    let cmp = b.gen_icmp(Cond::Eq, a, k);
    let dest = b.gen_const(0x200);
    b.gen_branch_cond(cmp, dest);
    b.exit_pc = 0x104;
    let (buf, c) = compile(&b, &BackendConfig::default());
    let code = buf.code(c.entry, c.end());

    // cmp ebx, 5; jne
    let p = find(code, &[0x83, 0xFB, 0x05, 0x0F, 0x85]).unwrap();
    let rel = buf.read_u32(c.entry + p + 5) as usize;
    let skip_to = c.entry + p + 9 + rel;

    assert_eq!(c.exits.len(), 2);
    assert_eq!(c.exits[0].index, 0);
    assert_eq!(c.exits[0].target, ExitTarget::Known(0x200));
    assert_eq!(c.exits[1].index, 1);
    assert_eq!(c.exits[1].target, ExitTarget::Known(0x104));
    // Not taken resumes right after the taken path's jump.
    assert_eq!(skip_to, c.exits[0].jump_offset + 5);
}

#[test]
fn test_exit_kinds() {
    let mut b = Block::new(0x100);
    b.gen_dsi_exception_check(0x100);
    let lr = b.gen_load_link();
    b.gen_branch_uncond(lr);
    b.exit_pc = 0x108;
    let (_buf, c) = compile(&b, &BackendConfig::default());

    let targets: Vec<_> = c.exits.iter().map(|e| e.target).collect();
    assert_eq!(
        targets,
        [ExitTarget::Exception, ExitTarget::Dynamic, ExitTarget::Known(0x108)]
    );
    for (i, e) in c.exits.iter().enumerate() {
        assert_eq!(e.index as usize, i);
    }
}

#[test]
fn test_frame_sized_to_spills() {
    let mut b = Block::new(0);
    let v: Vec<_> = (0..3).map(|r| b.gen_load_greg(r)).collect();
    for (n, &x) in v.iter().enumerate() {
        b.gen_store_greg(x, 8 + n);
    }
    let config = BackendConfig::default().with_int_order(&[Reg::Rbx as u8, Reg::R12 as u8]);
    let (buf, c) = compile(&b, &config);
    let code = buf.code(c.entry, c.end());

    assert_eq!(c.frame_size, 16);
    assert_eq!(&code[..7], [0x48, 0x81, 0xEC, 0x10, 0, 0, 0]);
    assert!(find(code, &[0x48, 0x81, 0xC4, 0x10, 0, 0, 0]).is_some());
    assert_eq!(c.stats.evictions, 1);
    assert_eq!(c.stats.spill_stores, 1);
    assert_eq!(c.stats.reloads, 1);
}

#[test]
fn test_dead_code_emits_nothing() {
    let mut b = Block::new(0);
    let a = b.gen_load_greg(0);
    let c2 = b.gen_load_greg(1);
    b.gen_mul(a, c2);
    let (_, empty) = compile(&Block::new(0), &BackendConfig::default());
    let (_, c) = compile(&b, &BackendConfig::default());
    assert_eq!(c.size, empty.size);
    assert_eq!(c.stats.allocations, 0);
}

#[test]
fn test_ir_dump_enabled() {
    let b = load_add_store();
    let config = BackendConfig::default().with_dump_ir(true);
    let (_, c) = compile(&b, &config);
    assert_eq!(c.exits.len(), 1);
}

#[test]
#[should_panic(expected = "failed verification")]
fn test_malformed_block_is_rejected() {
    let mut b = Block::new(0x100);
    b.push(Inst::unary(Opcode::Not, InstIdx(3)));
    compile(&b, &BackendConfig::default());
}
