//! IR dump: human-readable listing of a block.

use std::io::Write;

use crate::block::Block;
use crate::inst::{Inst, InstIdx};
use crate::opcode::Opcode;
use crate::types::ValueClass;

/// Payload suffix for opcodes that carry one in `param`.
fn fmt_param(inst: &Inst) -> Option<String> {
    match inst.opc {
        Opcode::Const => Some(format!("$0x{:x}", inst.param)),
        Opcode::LoadGReg | Opcode::StoreGReg => Some(format!("r{}", inst.param)),
        Opcode::LoadFReg | Opcode::LoadFRegDENToZero | Opcode::StoreFReg => {
            Some(format!("f{}", inst.param))
        }
        Opcode::LoadCR | Opcode::StoreCR => Some(format!("cr{}", inst.param)),
        Opcode::LoadGQR | Opcode::StoreGQR => Some(format!("gqr{}", inst.param)),
        Opcode::StoreSRR => Some(format!("srr{}", inst.param)),
        Opcode::FDCmpCR => Some(if inst.param != 0 { "ordered" } else { "unordered" }.into()),
        _ => None,
    }
}

/// Dump all instructions of `block` to the given writer.
pub fn dump_block(block: &Block, w: &mut impl Write) -> std::io::Result<()> {
    dump_block_with(block, w, |_, _| Ok(()))
}

/// Dump instructions with an annotation callback.
///
/// `anno` is called at the end of every line with the instruction's
/// handle; the back end uses it to mark dead instructions.
pub fn dump_block_with(
    block: &Block,
    w: &mut impl Write,
    anno: impl Fn(InstIdx, &mut dyn Write) -> std::io::Result<()>,
) -> std::io::Result<()> {
    writeln!(
        w,
        " ---- block 0x{:08x} -> 0x{:08x} ({} insts)",
        block.start_pc,
        block.exit_pc,
        block.len()
    )?;
    for (idx, inst) in block.iter() {
        if inst.opc == Opcode::Count {
            writeln!(w, " {idx:>5}: <invalid>")?;
            continue;
        }
        let def = inst.opc.def();
        if def.result == ValueClass::None {
            write!(w, " {:>5}  {}", "", def.name)?;
        } else {
            write!(w, " {idx:>5} = {}", def.name)?;
        }

        let mut sep = " ";
        for (_, operand) in inst.operands() {
            if block.is_imm(operand) {
                write!(w, "{sep}$0x{:x}", block.imm_value64(operand))?;
            } else {
                write!(w, "{sep}{operand}")?;
            }
            sep = ", ";
        }
        if let Some(p) = fmt_param(inst) {
            write!(w, "{sep}{p}")?;
        }
        anno(idx, w)?;
        writeln!(w)?;
    }
    Ok(())
}

/// Dump to a `String`.
pub fn dump_to_string(block: &Block) -> String {
    let mut out = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = dump_block(block, &mut out);
    String::from_utf8_lossy(&out).into_owned()
}
