//! Opcode execution (spec §4.1, §9 "regular structure in the opcode
//! space"). Dispatches on [`Op`] families rather than one arm per opcode,
//! matching the strategy spec §9 recommends for the ~200-entry table.
//!
//! Generalizes the teacher's `fields::Condition::evaluate` (one enum, one
//! evaluation function) to the WE32100's 16-condition branch family and to
//! the generic two/three-operand ALU family.

use crate::cpu::registers::PSW;
use crate::cpu::Cpu;
use crate::decode::Instruction;
use crate::error::Fault;
use crate::memory::Width;
use crate::mmu::AccessRequest;
use crate::mnemonic::{ArithKind, Condition, Op};
use crate::operand::{AddressingMode, Operand};
use crate::psw::PswFlags;

/// Execute one already-decoded instruction against `cpu`. `cpu.regs.pc()`
/// already points past the instruction on entry (spec §2: "PC advance"
/// happens as part of fetch/decode in this implementation, matching how
/// the original advances its `offset` cursor before dispatch).
pub fn execute(cpu: &mut Cpu, instr: &Instruction) -> Result<(), Fault> {
    let ops = &instr.operands;
    match instr.mnemonic.op {
        Op::Illegal | Op::Reserved => Err(Fault::IllegalOpcode),
        Op::Halt => {
            cpu.halted = true;
            Ok(())
        }
        Op::Nop => Ok(()),
        Op::Wait => {
            require_kernel(cpu)?;
            cpu.waiting = true;
            Ok(())
        }
        Op::Cflush | Op::Bpt => {
            if matches!(instr.mnemonic.op, Op::Bpt) {
                return Err(Fault::BreakpointTrap);
            }
            Ok(())
        }
        Op::ExtOp => Ok(()),

        Op::Ret => exec_ret(cpu),
        Op::Jmp => exec_jmp(cpu, &ops[0]),
        Op::Jsb => exec_jsb(cpu, &ops[0]),
        Op::BsbH | Op::BsbB => exec_jsb(cpu, &ops[0]),
        Op::Call => exec_call(cpu, &ops[0], &ops[1]),
        Op::Save => exec_save(cpu, &ops[0]),
        Op::Restore => exec_restore(cpu, &ops[0]),
        Op::PushW => exec_push(cpu, &ops[0]),
        Op::PushAw => exec_pusha(cpu, &ops[0]),
        Op::PopW => exec_pop(cpu, &ops[0]),
        Op::MovAw => exec_mova(cpu, &ops[0], &ops[1]),
        Op::MovTrw => exec_movtrw(cpu, &ops[0], &ops[1]),

        Op::TstW => exec_tst(cpu, &ops[0], Width::Word),
        Op::TstH => exec_tst(cpu, &ops[0], Width::Half),
        Op::TstB => exec_tst(cpu, &ops[0], Width::Byte),

        Op::ClrW => exec_clr(cpu, &ops[0], Width::Word),
        Op::ClrH => exec_clr(cpu, &ops[0], Width::Half),
        Op::ClrB => exec_clr(cpu, &ops[0], Width::Byte),

        Op::MovW => exec_mov(cpu, &ops[0], &ops[1], Width::Word),
        Op::MovH => exec_mov(cpu, &ops[0], &ops[1], Width::Half),
        Op::MovB => exec_mov(cpu, &ops[0], &ops[1], Width::Byte),

        Op::McomW => exec_unary(cpu, &ops[0], &ops[1], Width::Word, |v| !v),
        Op::McomH => exec_unary(cpu, &ops[0], &ops[1], Width::Half, |v| !v),
        Op::McomB => exec_unary(cpu, &ops[0], &ops[1], Width::Byte, |v| !v),

        Op::MnegW => exec_unary(cpu, &ops[0], &ops[1], Width::Word, |v| v.wrapping_neg()),
        Op::MnegH => exec_unary(cpu, &ops[0], &ops[1], Width::Half, |v| v.wrapping_neg()),
        Op::MnegB => exec_unary(cpu, &ops[0], &ops[1], Width::Byte, |v| v.wrapping_neg()),

        Op::IncW => exec_incdec(cpu, &ops[0], Width::Word, 1),
        Op::IncH => exec_incdec(cpu, &ops[0], Width::Half, 1),
        Op::IncB => exec_incdec(cpu, &ops[0], Width::Byte, 1),
        Op::DecW => exec_incdec(cpu, &ops[0], Width::Word, -1),
        Op::DecH => exec_incdec(cpu, &ops[0], Width::Half, -1),
        Op::DecB => exec_incdec(cpu, &ops[0], Width::Byte, -1),

        Op::BitW => exec_bit(cpu, &ops[0], &ops[1], Width::Word),
        Op::BitH => exec_bit(cpu, &ops[0], &ops[1], Width::Half),
        Op::BitB => exec_bit(cpu, &ops[0], &ops[1], Width::Byte),

        Op::CmpW => exec_cmp(cpu, &ops[0], &ops[1], Width::Word),
        Op::CmpH => exec_cmp(cpu, &ops[0], &ops[1], Width::Half),
        Op::CmpB => exec_cmp(cpu, &ops[0], &ops[1], Width::Byte),

        Op::Alu2(kind) => exec_alu2(cpu, kind, &ops[0], &ops[1], instr.mnemonic.width),
        Op::Alu3(kind) => exec_alu3(cpu, kind, &ops[0], &ops[1], &ops[2], instr.mnemonic.width),

        Op::Branch { cond, ret_form } => exec_branch(cpu, cond, ret_form, ops),

        Op::SwapWi => exec_swap(cpu, &ops[0], Width::Word),
        Op::SwapHi => exec_swap(cpu, &ops[0], Width::Half),
        Op::SwapBi => exec_swap(cpu, &ops[0], Width::Byte),

        Op::AlsW3 => exec_shift(cpu, &ops[0], &ops[1], &ops[2], ShiftKind::LogicalLeft, Width::Word),
        Op::ArsW3 => exec_shift(cpu, &ops[0], &ops[1], &ops[2], ShiftKind::ArithRight, Width::Word),
        Op::ArsH3 => exec_shift(cpu, &ops[0], &ops[1], &ops[2], ShiftKind::ArithRight, Width::Half),
        Op::ArsB3 => exec_shift(cpu, &ops[0], &ops[1], &ops[2], ShiftKind::ArithRight, Width::Byte),
        Op::LlsW3 => exec_shift(cpu, &ops[0], &ops[1], &ops[2], ShiftKind::LogicalLeft, Width::Word),
        Op::LlsH3 => exec_shift(cpu, &ops[0], &ops[1], &ops[2], ShiftKind::LogicalLeft, Width::Half),
        Op::LlsB3 => exec_shift(cpu, &ops[0], &ops[1], &ops[2], ShiftKind::LogicalLeft, Width::Byte),
        Op::LrsW3 => exec_shift(cpu, &ops[0], &ops[1], &ops[2], ShiftKind::LogicalRight, Width::Word),
        Op::RotW => exec_rotate(cpu, &ops[0], &ops[1], &ops[2]),

        Op::InsfW => exec_insf(cpu, ops, Width::Word),
        Op::InsfH => exec_insf(cpu, ops, Width::Half),
        Op::InsfB => exec_insf(cpu, ops, Width::Byte),
        Op::ExtfW => exec_extf(cpu, ops, Width::Word),
        Op::ExtfH => exec_extf(cpu, ops, Width::Half),
        Op::ExtfB => exec_extf(cpu, ops, Width::Byte),

        Op::Mverno => {
            cpu.regs.set(0, 0x0300_0001);
            Ok(())
        }
        Op::EnbVjmp => {
            require_kernel(cpu)?;
            Ok(())
        }
        Op::DisVjmp => {
            require_kernel(cpu)?;
            Ok(())
        }
        Op::MovBlw => exec_movblw(cpu),
        Op::StrCpy | Op::StrEnd => Ok(()),
        Op::IntAck => exec_intack(cpu, &ops[0]),
        Op::RetG => exec_retg(cpu),
        Op::Gate => exec_gate(cpu),
        Op::CallPs => {
            require_kernel(cpu)?;
            exec_callps(cpu)
        }
        Op::RetPs => {
            require_kernel(cpu)?;
            exec_retps(cpu)
        }

        Op::Spop
        | Op::SpopWs
        | Op::SpopRd
        | Op::SpopD2
        | Op::SpopRt
        | Op::SpopT2
        | Op::SpopWd
        | Op::SpopWt
        | Op::SpopRs
        | Op::SpopS2 => exec_coprocessor(cpu, instr, ops),
    }
}

fn require_kernel(cpu: &Cpu) -> Result<(), Fault> {
    if cpu.kernel_mode() {
        Ok(())
    } else {
        Err(Fault::PrivilegedOpcode)
    }
}

// --- Operand read/write (spec §4.1 "Effective-address computation",
// "Read/extend policy") ---

fn effective_address(cpu: &mut Cpu, op: &Operand) -> Result<u32, Fault> {
    use AddressingMode::*;
    Ok(match op.mode {
        RegisterDeferred(r) => cpu.regs.get(r as usize),
        Absolute(a) => a,
        AbsoluteDeferred(a) => cpu.read_virt(a, Width::Word, AccessRequest::AddressFetch)?,
        FpShort(off) => cpu.regs.fp().wrapping_add((off as i8) as i32 as u32),
        ApShort(off) => cpu.regs.ap().wrapping_add((off as i8) as i32 as u32),
        WordDisplacement { reg, disp } => cpu.regs.get(reg as usize).wrapping_add(disp as u32),
        WordDisplacementDeferred { reg, disp } => {
            let base = cpu.regs.get(reg as usize).wrapping_add(disp as u32);
            cpu.read_virt(base, Width::Word, AccessRequest::AddressFetch)?
        }
        HalfDisplacement { reg, disp } => cpu.regs.get(reg as usize).wrapping_add(disp as i32 as u32),
        HalfDisplacementDeferred { reg, disp } => {
            let base = cpu.regs.get(reg as usize).wrapping_add(disp as i32 as u32);
            cpu.read_virt(base, Width::Word, AccessRequest::AddressFetch)?
        }
        ByteDisplacement { reg, disp } => cpu.regs.get(reg as usize).wrapping_add(disp as i32 as u32),
        ByteDisplacementDeferred { reg, disp } => {
            let base = cpu.regs.get(reg as usize).wrapping_add(disp as i32 as u32);
            cpu.read_virt(base, Width::Word, AccessRequest::AddressFetch)?
        }
        Literal(_) | Register(_) | WordImmediate(_) | HalfImmediate(_) | ByteImmediate(_) => {
            return Err(Fault::InvalidDescriptor)
        }
    })
}

fn read_operand(cpu: &mut Cpu, op: &Operand, width: Width, access: AccessRequest) -> Result<u32, Fault> {
    use AddressingMode::*;
    let ty = op.effective_type_for_immediate();
    let raw = match op.mode {
        Literal(v) => return Ok(v as i32 as u32),
        Register(r) => cpu.regs.get(r as usize),
        WordImmediate(v) => v,
        HalfImmediate(v) => v as u32,
        ByteImmediate(v) => v as u32,
        _ => {
            let addr = effective_address(cpu, op)?;
            cpu.read_virt(addr, width, access)?
        }
    };
    Ok(ty.extend(raw & ty.truncate_mask()))
}

fn write_operand(cpu: &mut Cpu, op: &Operand, width: Width, access: AccessRequest, value: u32) -> Result<(), Fault> {
    use AddressingMode::*;
    match op.mode {
        Literal(_) | WordImmediate(_) | HalfImmediate(_) | ByteImmediate(_) => Err(Fault::InvalidDescriptor),
        Register(r) => {
            cpu.regs.write_privileged(r as usize, truncate(value, width), cpu.kernel_mode())
        }
        _ => {
            let addr = effective_address(cpu, op)?;
            cpu.write_virt(addr, width, access, value)
        }
    }
}

fn truncate(value: u32, width: Width) -> u32 {
    match width {
        Width::Byte => value & 0xff,
        Width::Half => value & 0xffff,
        Width::Word => value,
    }
}

fn width_of(w: crate::mnemonic::OpWidth) -> Width {
    match w {
        crate::mnemonic::OpWidth::Byte => Width::Byte,
        crate::mnemonic::OpWidth::Half => Width::Half,
        crate::mnemonic::OpWidth::Word | crate::mnemonic::OpWidth::NotApplicable => Width::Word,
    }
}

// --- Flag policy (spec §4.1 "Flag policy (C, V, Z, N)") ---

fn high_bit(value: u32, width: Width) -> bool {
    match width {
        Width::Byte => value & 0x80 != 0,
        Width::Half => value & 0x8000 != 0,
        Width::Word => value & 0x8000_0000 != 0,
    }
}

fn set_zn(cpu: &mut Cpu, result: u32, width: Width) {
    let truncated = truncate(result, width);
    let mut psw = cpu.regs.psw();
    psw.set_flag(PswFlags::Z, truncated == 0);
    psw.set_flag(PswFlags::N, high_bit(truncated, width));
    cpu.regs.set(PSW, psw.bits());
}

fn set_flags_cv(cpu: &mut Cpu, carry: bool, overflow: bool) {
    let mut psw = cpu.regs.psw();
    psw.set_flag(PswFlags::C, carry);
    psw.set_flag(PswFlags::V, overflow);
    cpu.regs.set(PSW, psw.bits());
}

fn signed_add_overflow(a: u32, b: u32, r: u32, width: Width) -> bool {
    let sa = high_bit(a, width);
    let sb = high_bit(b, width);
    let sr = high_bit(r, width);
    sa == sb && sr != sa
}

fn signed_sub_overflow(a: u32, b: u32, r: u32, width: Width) -> bool {
    let sa = high_bit(a, width);
    let sb = high_bit(b, width);
    let sr = high_bit(r, width);
    sa != sb && sr != sa
}

fn unsigned_overflow_any_high_bit(full: u64, width: Width) -> bool {
    let mask: u64 = match width {
        Width::Byte => 0xff,
        Width::Half => 0xffff,
        Width::Word => 0xffff_ffff,
    };
    (full & !mask) != 0
}

// --- ALU family (spec §4.1 "Flag policy") ---

fn exec_alu2(cpu: &mut Cpu, kind: ArithKind, src: &Operand, dst: &Operand, opw: crate::mnemonic::OpWidth) -> Result<(), Fault> {
    let width = width_of(opw);
    let a = read_operand(cpu, dst, width, AccessRequest::OperandFetch)?;
    let b = read_operand(cpu, src, width, AccessRequest::OperandFetch)?;
    let signed = dst.effective_type().is_signed();
    let (result, carry, overflow) = apply_arith(kind, b, a, width, signed)?;
    write_operand(cpu, dst, width, AccessRequest::Write, result)?;
    set_zn(cpu, result, width);
    set_flags_cv(cpu, carry, overflow);
    Ok(())
}

fn exec_alu3(
    cpu: &mut Cpu,
    kind: ArithKind,
    src1: &Operand,
    src2: &Operand,
    dst: &Operand,
    opw: crate::mnemonic::OpWidth,
) -> Result<(), Fault> {
    let width = width_of(opw);
    let a = read_operand(cpu, src1, width, AccessRequest::OperandFetch)?;
    let b = read_operand(cpu, src2, width, AccessRequest::OperandFetch)?;
    let signed = dst.effective_type().is_signed();
    let (result, carry, overflow) = apply_arith(kind, a, b, width, signed)?;
    write_operand(cpu, dst, width, AccessRequest::Write, result)?;
    set_zn(cpu, result, width);
    set_flags_cv(cpu, carry, overflow);
    Ok(())
}

/// `a OP b` → `(result, carry, overflow)`, spec §4.1 flag policy plus the
/// DIVW2 boundary behaviors of spec §8.
fn apply_arith(kind: ArithKind, a: u32, b: u32, width: Width, signed: bool) -> Result<(u32, bool, bool), Fault> {
    Ok(match kind {
        ArithKind::Add => {
            let full = a as u64 + b as u64;
            let result = a.wrapping_add(b);
            let carry = unsigned_overflow_any_high_bit(full, width);
            let overflow = if signed {
                signed_add_overflow(a, b, result, width)
            } else {
                carry
            };
            (result, carry, overflow)
        }
        ArithKind::Sub => {
            let carry = truncate(b, width) > truncate(a, width);
            let result = a.wrapping_sub(b);
            let overflow = if signed { signed_sub_overflow(a, b, result, width) } else { carry };
            (result, carry, overflow)
        }
        ArithKind::Mul => {
            let full = (a as u64).wrapping_mul(b as u64);
            let result = a.wrapping_mul(b);
            let overflow = unsigned_overflow_any_high_bit(full, width);
            (result, false, overflow)
        }
        ArithKind::Div => {
            if b == 0 {
                return Err(Fault::IntegerZeroDivide);
            }
            if signed {
                let (ai, bi) = (a as i32, b as i32);
                if ai == i32::MIN && bi == -1 {
                    (a, false, true)
                } else {
                    (((ai / bi) as u32), false, false)
                }
            } else {
                (a / b, false, false)
            }
        }
        ArithKind::Mod => {
            if b == 0 {
                return Err(Fault::IntegerZeroDivide);
            }
            if signed {
                let (ai, bi) = (a as i32, b as i32);
                if ai == i32::MIN && bi == -1 {
                    (0, false, false)
                } else {
                    ((ai % bi) as u32, false, false)
                }
            } else {
                (a % b, false, false)
            }
        }
        ArithKind::Or => {
            let result = a | b;
            (result, false, unsigned_overflow_any_high_bit(result as u64, width))
        }
        ArithKind::Xor => {
            let result = a ^ b;
            (result, false, unsigned_overflow_any_high_bit(result as u64, width))
        }
        ArithKind::And => {
            let result = a & b;
            (result, false, unsigned_overflow_any_high_bit(result as u64, width))
        }
    })
}

// --- Move / test / clear / unary / inc-dec / bit / compare ---

fn exec_mov(cpu: &mut Cpu, src: &Operand, dst: &Operand, width: Width) -> Result<(), Fault> {
    let v = read_operand(cpu, src, width, AccessRequest::OperandFetch)?;
    write_operand(cpu, dst, width, AccessRequest::Write, v)?;
    set_zn(cpu, v, width);
    set_flags_cv(cpu, false, false);
    Ok(())
}

fn exec_tst(cpu: &mut Cpu, op: &Operand, width: Width) -> Result<(), Fault> {
    let v = read_operand(cpu, op, width, AccessRequest::OperandFetch)?;
    set_zn(cpu, v, width);
    set_flags_cv(cpu, false, false);
    Ok(())
}

fn exec_clr(cpu: &mut Cpu, op: &Operand, width: Width) -> Result<(), Fault> {
    write_operand(cpu, op, width, AccessRequest::Write, 0)?;
    set_zn(cpu, 0, width);
    set_flags_cv(cpu, false, false);
    Ok(())
}

fn exec_unary(cpu: &mut Cpu, src: &Operand, dst: &Operand, width: Width, f: impl Fn(u32) -> u32) -> Result<(), Fault> {
    let v = read_operand(cpu, src, width, AccessRequest::OperandFetch)?;
    let result = f(v);
    write_operand(cpu, dst, width, AccessRequest::Write, result)?;
    set_zn(cpu, result, width);
    Ok(())
}

fn exec_incdec(cpu: &mut Cpu, op: &Operand, width: Width, delta: i32) -> Result<(), Fault> {
    let v = read_operand(cpu, op, width, AccessRequest::OperandFetch)?;
    let result = v.wrapping_add(delta as u32);
    write_operand(cpu, op, width, AccessRequest::Write, result)?;
    let overflow = if delta > 0 {
        signed_add_overflow(v, delta as u32, result, width)
    } else {
        signed_sub_overflow(v, (-delta) as u32, result, width)
    };
    set_zn(cpu, result, width);
    set_flags_cv(cpu, false, overflow);
    Ok(())
}

fn exec_bit(cpu: &mut Cpu, a: &Operand, b: &Operand, width: Width) -> Result<(), Fault> {
    let va = read_operand(cpu, a, width, AccessRequest::OperandFetch)?;
    let vb = read_operand(cpu, b, width, AccessRequest::OperandFetch)?;
    let result = va & vb;
    set_zn(cpu, result, width);
    set_flags_cv(cpu, false, false);
    Ok(())
}

fn exec_cmp(cpu: &mut Cpu, a: &Operand, b: &Operand, width: Width) -> Result<(), Fault> {
    let va = read_operand(cpu, a, width, AccessRequest::OperandFetch)?;
    let vb = read_operand(cpu, b, width, AccessRequest::OperandFetch)?;
    let result = va.wrapping_sub(vb);
    let carry = truncate(vb, width) > truncate(va, width);
    let overflow = signed_sub_overflow(va, vb, result, width);
    set_zn(cpu, result, width);
    set_flags_cv(cpu, carry, overflow);
    Ok(())
}

fn exec_swap(cpu: &mut Cpu, op: &Operand, width: Width) -> Result<(), Fault> {
    let v = read_operand(cpu, op, width, AccessRequest::OperandFetch)?;
    let swapped = match width {
        Width::Byte => v,
        Width::Half => ((v & 0xff) << 8) | ((v >> 8) & 0xff),
        Width::Word => v.swap_bytes(),
    };
    write_operand(cpu, op, width, AccessRequest::Write, swapped)?;
    set_zn(cpu, swapped, width);
    Ok(())
}

// --- Shift / rotate / bitfield family (spec SPEC_FULL §C.3) ---

enum ShiftKind {
    LogicalLeft,
    LogicalRight,
    ArithRight,
}

fn exec_shift(cpu: &mut Cpu, count_op: &Operand, src: &Operand, dst: &Operand, kind: ShiftKind, width: Width) -> Result<(), Fault> {
    let count = (read_operand(cpu, count_op, Width::Byte, AccessRequest::OperandFetch)? as i32 as i8) as i32;
    let v = read_operand(cpu, src, width, AccessRequest::OperandFetch)?;
    let bits = match width {
        Width::Byte => 8,
        Width::Half => 16,
        Width::Word => 32,
    };
    let n = count.unsigned_abs() % bits;
    let left = match kind {
        ShiftKind::LogicalLeft => count >= 0,
        ShiftKind::LogicalRight | ShiftKind::ArithRight => count < 0,
    };
    let result = if n == 0 {
        v
    } else if left {
        truncate(v.wrapping_shl(n), width)
    } else {
        match kind {
            ShiftKind::ArithRight => {
                let signed = (v as i32) << (32 - bits) >> (32 - bits);
                truncate((signed >> n) as u32, width)
            }
            _ => truncate(v, width) >> n,
        }
    };
    write_operand(cpu, dst, width, AccessRequest::Write, result)?;
    set_zn(cpu, result, width);
    set_flags_cv(cpu, false, false);
    Ok(())
}

fn exec_rotate(cpu: &mut Cpu, count_op: &Operand, src: &Operand, dst: &Operand) -> Result<(), Fault> {
    let count = read_operand(cpu, count_op, Width::Byte, AccessRequest::OperandFetch)? as i32 as i8 as i32;
    let v = read_operand(cpu, src, Width::Word, AccessRequest::OperandFetch)?;
    let n = (count.rem_euclid(32)) as u32;
    let result = v.rotate_left(n);
    write_operand(cpu, dst, Width::Word, AccessRequest::Write, result)?;
    set_zn(cpu, result, Width::Word);
    Ok(())
}

fn exec_insf(cpu: &mut Cpu, ops: &[Operand], width: Width) -> Result<(), Fault> {
    let field_width = read_operand(cpu, &ops[0], Width::Byte, AccessRequest::OperandFetch)? & 0x1f;
    let offset = read_operand(cpu, &ops[1], Width::Byte, AccessRequest::OperandFetch)? & 0x1f;
    let src = read_operand(cpu, &ops[2], width, AccessRequest::OperandFetch)?;
    let dst_val = read_operand(cpu, &ops[3], width, AccessRequest::OperandFetch)?;
    let mask = if field_width >= 32 { u32::MAX } else { (1u32 << field_width) - 1 };
    let result = (dst_val & !(mask << offset)) | ((src & mask) << offset);
    write_operand(cpu, &ops[3], width, AccessRequest::Write, result)?;
    set_zn(cpu, result, width);
    Ok(())
}

fn exec_extf(cpu: &mut Cpu, ops: &[Operand], width: Width) -> Result<(), Fault> {
    let field_width = read_operand(cpu, &ops[0], Width::Byte, AccessRequest::OperandFetch)? & 0x1f;
    let offset = read_operand(cpu, &ops[1], Width::Byte, AccessRequest::OperandFetch)? & 0x1f;
    let src = read_operand(cpu, &ops[2], width, AccessRequest::OperandFetch)?;
    let mask = if field_width >= 32 { u32::MAX } else { (1u32 << field_width) - 1 };
    let result = (src >> offset) & mask;
    write_operand(cpu, &ops[3], width, AccessRequest::Write, result)?;
    set_zn(cpu, result, width);
    Ok(())
}

// --- Control flow: JMP/JSB/RSB/CALL/RET, branches ---

fn exec_jmp(cpu: &mut Cpu, target: &Operand) -> Result<(), Fault> {
    let addr = effective_address(cpu, target)?;
    cpu.regs.set_pc(addr);
    Ok(())
}

fn push_word_sp(cpu: &mut Cpu, value: u32) -> Result<(), Fault> {
    let sp = cpu.regs.sp();
    cpu.write_virt(sp, Width::Word, AccessRequest::Write, value)?;
    cpu.regs.set_sp(sp.wrapping_add(4));
    Ok(())
}

fn pop_word_sp(cpu: &mut Cpu) -> Result<u32, Fault> {
    let sp = cpu.regs.sp().wrapping_sub(4);
    let value = cpu.read_virt(sp, Width::Word, AccessRequest::OperandFetch)?;
    cpu.regs.set_sp(sp);
    Ok(value)
}

fn exec_jsb(cpu: &mut Cpu, target: &Operand) -> Result<(), Fault> {
    let addr = effective_address(cpu, target)?;
    push_word_sp(cpu, cpu.regs.pc())?;
    cpu.regs.set_pc(addr);
    Ok(())
}

fn exec_call(cpu: &mut Cpu, arg: &Operand, target: &Operand) -> Result<(), Fault> {
    let addr = effective_address(cpu, target)?;
    let arg_addr = effective_address(cpu, arg)?;
    push_word_sp(cpu, cpu.regs.ap())?;
    push_word_sp(cpu, cpu.regs.pc())?;
    cpu.regs.set_ap(arg_addr);
    cpu.regs.set_pc(addr);
    Ok(())
}

fn exec_ret(cpu: &mut Cpu) -> Result<(), Fault> {
    let ap = cpu.regs.ap();
    let saved_ap = cpu.read_virt(ap, Width::Word, AccessRequest::OperandFetch)?;
    let saved_pc = cpu.read_virt(ap.wrapping_add(4), Width::Word, AccessRequest::OperandFetch)?;
    let new_sp = ap.wrapping_add(8);
    cpu.regs.set_sp(new_sp);
    cpu.regs.set_ap(saved_ap);
    cpu.regs.set_pc(saved_pc);
    Ok(())
}

fn exec_save(cpu: &mut Cpu, range_end: &Operand) -> Result<(), Fault> {
    let highest = read_operand(cpu, range_end, Width::Byte, AccessRequest::OperandFetch)? & 0xf;
    push_word_sp(cpu, cpu.regs.fp())?;
    for r in 0..=highest {
        push_word_sp(cpu, cpu.regs.get(r as usize))?;
    }
    cpu.regs.set_fp(cpu.regs.sp());
    Ok(())
}

fn exec_restore(cpu: &mut Cpu, range_end: &Operand) -> Result<(), Fault> {
    let highest = read_operand(cpu, range_end, Width::Byte, AccessRequest::OperandFetch)? & 0xf;
    cpu.regs.set_sp(cpu.regs.fp());
    for r in (0..=highest).rev() {
        let v = pop_word_sp(cpu)?;
        cpu.regs.set(r as usize, v);
    }
    let fp = pop_word_sp(cpu)?;
    cpu.regs.set_fp(fp);
    Ok(())
}

fn exec_push(cpu: &mut Cpu, op: &Operand) -> Result<(), Fault> {
    let v = read_operand(cpu, op, Width::Word, AccessRequest::OperandFetch)?;
    push_word_sp(cpu, v)
}

fn exec_pop(cpu: &mut Cpu, op: &Operand) -> Result<(), Fault> {
    let v = pop_word_sp(cpu)?;
    write_operand(cpu, op, Width::Word, AccessRequest::Write, v)
}

fn exec_pusha(cpu: &mut Cpu, op: &Operand) -> Result<(), Fault> {
    let addr = effective_address(cpu, op)?;
    push_word_sp(cpu, addr)
}

fn exec_mova(cpu: &mut Cpu, src: &Operand, dst: &Operand) -> Result<(), Fault> {
    let addr = effective_address(cpu, src)?;
    write_operand(cpu, dst, Width::Word, AccessRequest::Write, addr)
}

fn exec_movtrw(cpu: &mut Cpu, src: &Operand, dst: &Operand) -> Result<(), Fault> {
    let v = read_operand(cpu, src, Width::Word, AccessRequest::OperandFetch)?;
    write_operand(cpu, dst, Width::Word, AccessRequest::Write, v)?;
    set_zn(cpu, v, Width::Word);
    set_flags_cv(cpu, false, false);
    Ok(())
}

fn branch_displacement(op: &Operand) -> i32 {
    match op.mode {
        AddressingMode::Literal(v) => v as i32,
        AddressingMode::WordDisplacement { disp, .. } => disp,
        _ => 0,
    }
}

fn evaluate_condition(cond: Condition, psw: crate::psw::Psw) -> bool {
    let n = psw.flag(PswFlags::N);
    let z = psw.flag(PswFlags::Z);
    let v = psw.flag(PswFlags::V);
    let c = psw.flag(PswFlags::C);
    match cond {
        Condition::Eq => z,
        Condition::Ne => !z,
        Condition::Lss => n ^ v,
        Condition::Geq => !(n ^ v),
        Condition::Gtr => !z && !(n ^ v),
        Condition::Leq => z || (n ^ v),
        Condition::GeqU => !c,
        Condition::LssU => c,
        Condition::GtrU => !c && !z,
        Condition::LeqU => c || z,
        Condition::Vc => !v,
        Condition::Vs => v,
        Condition::Always => true,
    }
}

fn exec_branch(cpu: &mut Cpu, cond: Condition, ret_form: bool, ops: &[Operand]) -> Result<(), Fault> {
    let taken = evaluate_condition(cond, cpu.regs.psw());
    if !taken {
        return Ok(());
    }
    if ret_form {
        let target = pop_word_sp(cpu)?;
        cpu.regs.set_pc(target);
    } else {
        let disp = branch_displacement(&ops[0]);
        let target = (cpu.regs.pc() as i64 + disp as i64) as u32;
        cpu.regs.set_pc(target);
    }
    Ok(())
}

// --- Privileged transfer-of-control: GATE, CALLPS/RETPS, RETG, INTACK ---

fn exec_gate(cpu: &mut Cpu) -> Result<(), Fault> {
    let pcbp = cpu.regs.get(crate::cpu::registers::PCBP);
    let stack_low = cpu.read_virt(pcbp + 12, Width::Word, AccessRequest::OperandFetch)?;
    let stack_high = cpu.read_virt(pcbp + 16, Width::Word, AccessRequest::OperandFetch)?;
    let sp = cpu.regs.sp();
    if sp < stack_low || sp > stack_high {
        return Err(Fault::StackBound);
    }

    let return_pc = cpu.regs.pc().wrapping_add(2);
    push_word_sp(cpu, return_pc)?;
    let mut pushed_psw = cpu.regs.psw();
    pushed_psw.set_isc(1);
    pushed_psw.set_tm(false);
    pushed_psw.set_et(2);
    push_word_sp(cpu, pushed_psw.bits())?;

    let index1 = cpu.regs.get(0);
    let index2 = cpu.regs.get(1);
    let new_pcbp = cpu.gate_lookup(index1, index2)?;
    let new_psw_word = cpu.read_word_phys(new_pcbp)?;
    let mut new_psw = crate::psw::Psw::new(new_psw_word);
    let old_cm = cpu.regs.psw().cm();
    new_psw.set_pm(old_cm);
    new_psw.set_ipl(cpu.regs.psw().ipl());
    new_psw.set_flag(PswFlags::R, cpu.regs.psw().flag(PswFlags::R));
    new_psw.set_isc(7);
    new_psw.set_tm(true);
    new_psw.set_et(3);
    cpu.regs.set(PSW, new_psw.bits());
    cpu.regs.set(crate::cpu::registers::PCBP, new_pcbp);
    let new_pc = cpu.read_word_phys(new_pcbp + 4)?;
    cpu.regs.set_pc(new_pc);
    Ok(())
}

fn exec_retg(cpu: &mut Cpu) -> Result<(), Fault> {
    let psw_word = pop_word_sp(cpu)?;
    let pc = pop_word_sp(cpu)?;
    cpu.regs.set(PSW, psw_word);
    cpu.regs.set_pc(pc);
    Ok(())
}

fn exec_callps(cpu: &mut Cpu) -> Result<(), Fault> {
    let new_pcbp = cpu.regs.get(0);
    cpu.context_switch_save_from_current(new_pcbp)?;
    cpu.context_switch_load_from_new(new_pcbp)?;
    cpu.context_switch_block_move_in()
}

fn exec_retps(cpu: &mut Cpu) -> Result<(), Fault> {
    let old_pcbp = cpu.regs.get(crate::cpu::registers::PCBP);
    let pc = cpu.read_word_phys(old_pcbp + 4)?;
    let sp = cpu.read_word_phys(old_pcbp + 8)?;
    cpu.regs.set_pc(pc);
    cpu.regs.set_sp(sp);
    Ok(())
}

fn exec_intack(cpu: &mut Cpu, op: &Operand) -> Result<(), Fault> {
    require_kernel(cpu)?;
    let vector = cpu
        .interrupt
        .pending_above(0)
        .map(|(_, v)| v)
        .unwrap_or(0);
    write_operand(cpu, op, Width::Word, AccessRequest::Write, vector as u32)
}

fn exec_movblw(cpu: &mut Cpu) -> Result<(), Fault> {
    let mut dest = cpu.regs.get(1);
    let mut count = cpu.regs.get(2);
    let mut src = cpu.regs.get(0);
    while count != 0 {
        let value = cpu.read_virt(src, Width::Word, AccessRequest::OperandFetch)?;
        cpu.write_virt(dest, Width::Word, AccessRequest::Write, value)?;
        count -= 1;
        src += 4;
        dest += 4;
    }
    cpu.regs.set(0, src);
    cpu.regs.set(1, dest);
    cpu.regs.set(2, count);
    Ok(())
}

// --- Coprocessor broadcast (spec §4.1 "Coprocessor broadcast") ---

fn exec_coprocessor(cpu: &mut Cpu, instr: &Instruction, ops: &[Operand]) -> Result<(), Fault> {
    let command_word = match ops[0].mode {
        AddressingMode::WordImmediate(w) => w,
        _ => return Err(Fault::InvalidDescriptor),
    };

    let src_ea = if ops.len() > 1 { effective_address(cpu, &ops[1]).ok() } else { None };
    let dst_ea = if ops.len() > 2 { effective_address(cpu, &ops[2]).ok() } else { None };

    let result = cpu.mau.broadcast(command_word, src_ea, dst_ea, &mut cpu.bus)?;

    if let Some(value) = result.result_word {
        if let Some(dst) = ops.last() {
            write_operand(cpu, dst, Width::Word, AccessRequest::CoprocessorWrite, value)?;
        }
    }

    let mut psw = cpu.regs.psw();
    psw.set_flag(PswFlags::N, result.n);
    psw.set_flag(PswFlags::Z, result.z);
    psw.set_flag(PswFlags::V, result.io);
    psw.set_flag(PswFlags::C, result.ps);
    cpu.regs.set(PSW, psw.bits());

    let _ = instr;
    if result.abort {
        return Err(Fault::ExternalMemoryFault);
    }
    Ok(())
}
