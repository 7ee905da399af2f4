use jitil_backend::code_buffer::CodeBuffer;
use jitil_backend::x86_64::emitter::*;
use jitil_backend::x86_64::{Reg, Xmm};
use jitil_core::Cond;

fn emit(f: impl FnOnce(&mut CodeBuffer)) -> Vec<u8> {
    let mut buf = CodeBuffer::new(4096).unwrap();
    f(&mut buf);
    buf.as_slice().to_vec()
}

#[test]
fn test_arith_imm_forms() {
    // add ebx, 5
    assert_eq!(
        emit(|b| emit_arith_ri(b, ArithOp::Add, false, Reg::Rbx, 5)),
        [0x83, 0xC3, 0x05]
    );
    // cmp r12d, 0x1000
    assert_eq!(
        emit(|b| emit_arith_ri(b, ArithOp::Cmp, false, Reg::R12, 0x1000)),
        [0x41, 0x81, 0xFC, 0x00, 0x10, 0x00, 0x00]
    );
    // sub rsp, imm32 always uses the long form
    let mut buf = CodeBuffer::new(4096).unwrap();
    let at = emit_arith_ri32(&mut buf, ArithOp::Sub, true, Reg::Rsp, 0);
    assert_eq!(at, 3);
    assert_eq!(buf.as_slice(), [0x48, 0x81, 0xEC, 0, 0, 0, 0]);
}

#[test]
fn test_arith_memory_operands() {
    // or dword [rbp+0x40], 2
    assert_eq!(
        emit(|b| emit_arith_rm_i(b, ArithOp::Or, false, Rm::Mem(Reg::Rbp, 0x40), 2)),
        [0x83, 0x4D, 0x40, 0x02]
    );
    // add esi, [rsp+16]
    assert_eq!(
        emit(|b| emit_arith_r_rm(b, ArithOp::Add, false, Reg::Rsi, Rm::Mem(Reg::Rsp, 16))),
        [0x03, 0x74, 0x24, 0x10]
    );
    // xor r9d, ebx
    assert_eq!(
        emit(|b| emit_arith_rr(b, ArithOp::Xor, false, Reg::R9, Reg::Rbx)),
        [0x44, 0x33, 0xCB]
    );
}

#[test]
fn test_mov_forms() {
    // mov ebx, eax
    assert_eq!(emit(|b| emit_mov_rr(b, false, Reg::Rbx, Reg::Rax)), [0x89, 0xC3]);
    // mov rdi, rcx
    assert_eq!(emit(|b| emit_mov_rr(b, true, Reg::Rdi, Reg::Rcx)), [0x48, 0x89, 0xCF]);
    // mov eax, 0x12345678
    assert_eq!(
        emit(|b| emit_mov_ri(b, false, Reg::Rax, 0x1234_5678)),
        [0xB8, 0x78, 0x56, 0x34, 0x12]
    );
    // zero goes through xor
    assert_eq!(emit(|b| emit_mov_ri(b, false, Reg::Rcx, 0)), [0x31, 0xC9]);
    // movabs r10, imm64
    let bytes = emit(|b| emit_mov_ri(b, true, Reg::R10, 0x1_0000_0000));
    assert_eq!(&bytes[..2], [0x49, 0xBA]);
    assert_eq!(&bytes[2..], 0x1_0000_0000u64.to_le_bytes());
}

#[test]
fn test_load_store_addressing() {
    // mov eax, [rbp]: RBP base needs a zero disp8
    assert_eq!(emit(|b| emit_load(b, false, Reg::Rax, Reg::Rbp, 0)), [0x8B, 0x45, 0x00]);
    // mov [r12], ecx: R12 base needs a SIB byte
    assert_eq!(
        emit(|b| emit_store(b, false, Reg::Rcx, Reg::R12, 0)),
        [0x41, 0x89, 0x0C, 0x24]
    );
    // mov [rbp+0x200], ebx
    assert_eq!(
        emit(|b| emit_store(b, false, Reg::Rbx, Reg::Rbp, 0x200)),
        [0x89, 0x9D, 0x00, 0x02, 0x00, 0x00]
    );
    // lea ecx, [rbx+8]
    assert_eq!(emit(|b| emit_lea(b, false, Reg::Rcx, Reg::Rbx, 8)), [0x8D, 0x4B, 0x08]);
    // mov dword [rbp+4], 7
    assert_eq!(
        emit(|b| emit_store_imm(b, false, Reg::Rbp, 4, 7)),
        [0xC7, 0x45, 0x04, 0x07, 0x00, 0x00, 0x00]
    );
}

#[test]
fn test_setcc_byte_registers() {
    // sete cl
    assert_eq!(emit(|b| emit_setcc(b, X86Cond::Je, Reg::Rcx)), [0x0F, 0x94, 0xC1]);
    // setne sil needs an empty REX
    assert_eq!(
        emit(|b| emit_setcc(b, X86Cond::Jne, Reg::Rsi)),
        [0x40, 0x0F, 0x95, 0xC6]
    );
}

#[test]
fn test_cond_mapping() {
    assert_eq!(X86Cond::from_cond(Cond::Ult), X86Cond::Jb);
    assert_eq!(X86Cond::from_cond(Cond::Sge), X86Cond::Jge);
    assert_eq!(X86Cond::Je.invert(), X86Cond::Jne);
    assert_eq!(X86Cond::Jb.invert(), X86Cond::Jae);
    assert_eq!(X86Cond::Jle.invert(), X86Cond::Jg);
    assert_eq!(
        X86Cond::from_cond(Cond::Sgt.invert()),
        X86Cond::from_cond(Cond::Sgt).invert()
    );
}

#[test]
fn test_forward_jumps() {
    let mut buf = CodeBuffer::new(4096).unwrap();
    let j = emit_jcc_fwd(&mut buf, X86Cond::Jne);
    assert_eq!(j.offset(), 2);
    emit_ud2(&mut buf);
    set_jump_target(&mut buf, j);
    assert_eq!(buf.code(0, 2), [0x0F, 0x85]);
    assert_eq!(buf.read_u32(2), 2);

    let k = emit_jmp_fwd(&mut buf);
    set_jump_target(&mut buf, k);
    assert_eq!(buf.code(8, 9), [0xE9]);
    assert_eq!(buf.read_u32(9), 0);
}

#[test]
fn test_backward_jump() {
    let mut buf = CodeBuffer::new(4096).unwrap();
    emit_ret(&mut buf);
    emit_jmp(&mut buf, 0);
    // rel32 is relative to the end of the 5-byte jump.
    assert_eq!(buf.read_u32(2) as i32, -6);
}

#[test]
fn test_sse_forms() {
    // addsd xmm2, xmm3
    assert_eq!(
        emit(|b| emit_sse(b, OPC_ADDSD, Xmm::Xmm2, Xmm::Xmm3.into())),
        [0xF2, 0x0F, 0x58, 0xD3]
    );
    // mulps xmm9, xmm2
    assert_eq!(
        emit(|b| emit_sse(b, OPC_MULPS, Xmm::Xmm9, Xmm::Xmm2.into())),
        [0x44, 0x0F, 0x59, 0xCA]
    );
    // movapd [rsp+32], xmm10
    assert_eq!(
        emit(|b| emit_movapd_store(b, Xmm::Xmm10, Reg::Rsp, 32)),
        [0x66, 0x44, 0x0F, 0x29, 0x54, 0x24, 0x20]
    );
    // movq rdx, xmm3
    assert_eq!(
        emit(|b| emit_movd_from_xmm(b, true, Reg::Rdx, Xmm::Xmm3)),
        [0x66, 0x48, 0x0F, 0x7E, 0xDA]
    );
    // shufps xmm4, xmm4, 0xE5
    assert_eq!(
        emit(|b| emit_sse_ib(b, OPC_SHUFPS, Xmm::Xmm4, Xmm::Xmm4.into(), 0xE5)),
        [0x0F, 0xC6, 0xE4, 0xE5]
    );
}

#[test]
fn test_movapd_self_copy_elided() {
    assert!(emit(|b| emit_movapd(b, Xmm::Xmm5, Xmm::Xmm5.into())).is_empty());
    assert_eq!(
        emit(|b| emit_movapd(b, Xmm::Xmm5, Xmm::Xmm6.into())),
        [0x66, 0x0F, 0x28, 0xEE]
    );
}

#[test]
fn test_push_pop_call() {
    assert_eq!(emit(|b| emit_push(b, Reg::R15)), [0x41, 0x57]);
    assert_eq!(emit(|b| emit_pop(b, Reg::Rbx)), [0x5B]);
    assert_eq!(emit(|b| emit_call_reg(b, Reg::Rax)), [0xFF, 0xD0]);
    assert_eq!(emit(|b| emit_jmp_reg(b, Reg::Rsi)), [0xFF, 0xE6]);
}
