//! MAU opcode execution (spec §4.3 "Operation contract per op").

use super::decimal;
use super::extended::ExtendedFloat;
use super::{CommandWord, Mau, MauOp, MauResult, OperandSpec, RoundMode};
use crate::error::Fault;
use crate::memory::{Bus, Width};

fn read_memory_operand(spec: OperandSpec, ea: Option<u32>, bus: &mut Bus) -> Result<ExtendedFloat, Fault> {
    let addr = ea.ok_or(Fault::InvalidDescriptor)?;
    match spec {
        OperandSpec::MemorySingle => {
            let bits = bus.read(addr, Width::Word)?;
            Ok(ExtendedFloat::from_single_bits(bits))
        }
        OperandSpec::MemoryDouble => {
            let hi = bus.read(addr, Width::Word)? as u64;
            let lo = bus.read(addr + 4, Width::Word)? as u64;
            Ok(ExtendedFloat::from_double_bits((hi << 32) | lo))
        }
        OperandSpec::MemoryExtended => {
            let hi = bus.read(addr, Width::Word)?;
            let mid = bus.read(addr + 4, Width::Word)?;
            let lo = bus.read(addr + 8, Width::Word)?;
            Ok(ExtendedFloat::from_extended_words(hi, mid, lo))
        }
        OperandSpec::Register(_) => Err(Fault::InvalidDescriptor),
    }
}

fn write_memory_operand(spec: OperandSpec, ea: Option<u32>, bus: &mut Bus, value: ExtendedFloat) -> Result<(), Fault> {
    let addr = ea.ok_or(Fault::InvalidDescriptor)?;
    match spec {
        OperandSpec::MemorySingle => bus.write(addr, Width::Word, value.to_single_bits()),
        OperandSpec::MemoryDouble => {
            let bits = value.to_double_bits();
            bus.write(addr, Width::Word, (bits >> 32) as u32)?;
            bus.write(addr + 4, Width::Word, bits as u32)
        }
        OperandSpec::MemoryExtended => {
            let (hi, mid, lo) = value.to_extended_words();
            bus.write(addr, Width::Word, hi)?;
            bus.write(addr + 4, Width::Word, mid)?;
            bus.write(addr + 8, Width::Word, lo)
        }
        OperandSpec::Register(_) => Err(Fault::InvalidDescriptor),
    }
}

fn read_operand(mau: &mut Mau, spec: OperandSpec, ea: Option<u32>, bus: &mut Bus) -> Result<ExtendedFloat, Fault> {
    match spec {
        OperandSpec::Register(r) => Ok(mau.registers[r as usize & 0x3]),
        _ => read_memory_operand(spec, ea, bus),
    }
}

/// Writes the addressed operand and latches it into the Data Register,
/// mirroring spec §4.3's "destination DR updated" contract for every
/// opcode that produces a float result (LDR/EROF read DR directly).
fn write_operand(mau: &mut Mau, spec: OperandSpec, ea: Option<u32>, bus: &mut Bus, value: ExtendedFloat) -> Result<(), Fault> {
    mau.dr = value;
    match spec {
        OperandSpec::Register(r) => {
            mau.registers[r as usize & 0x3] = value;
            Ok(())
        }
        _ => write_memory_operand(spec, ea, bus, value),
    }
}

/// Clears N/Z/ECP while preserving the sticky bits (spec §4.3 "Operation
/// contract per op": "Clear N/Z/ECP (but preserve sticky ... )").
fn clear_transient_flags(mau: &mut Mau) {
    mau.n = false;
    mau.z = false;
    mau.unordered = false;
}

fn latch_flags(mau: &mut Mau, flags: super::extended::ArithFlags) {
    mau.sticky.invalid |= flags.invalid;
    mau.sticky.divide_by_zero |= flags.divide_by_zero;
    mau.sticky.inexact |= flags.inexact;
}

/// Propagates NaN per spec §4.3 "Propagate NaNs": signaling NaN raises
/// Invalid; the output NaN is the larger-magnitude fraction operand (source
/// 1 on a tie), with the quiet bit forced set.
fn propagate_nan(mau: &mut Mau, a: ExtendedFloat, b: Option<ExtendedFloat>) -> Option<ExtendedFloat> {
    let candidates: Vec<ExtendedFloat> = std::iter::once(a).chain(b).filter(|v| v.is_nan()).collect();
    if candidates.is_empty() {
        return None;
    }
    if candidates.iter().any(|v| v.nan_is_signaling) {
        mau.sticky.invalid = true;
    }
    let winner = candidates.into_iter().reduce(|acc, v| if v.nan_payload() > acc.nan_payload() { v } else { acc }).unwrap();
    Some(ExtendedFloat { nan_is_signaling: false, ..winner })
}

fn binary_arith(mau: &mut Mau, opcode: MauOp, a: ExtendedFloat, b: ExtendedFloat) -> ExtendedFloat {
    if let Some(nan) = propagate_nan(mau, a, Some(b)) {
        return nan;
    }
    let mode = mau.round_mode;
    let (result, flags) = match opcode {
        MauOp::Add => a.add(b, mode),
        MauOp::Sub => a.sub(b, mode),
        MauOp::Mul => a.mul(b, mode),
        MauOp::Div => {
            if b.is_zero() {
                mau.sticky.divide_by_zero = true;
                if mau.masks.divide_by_zero {
                    return ExtendedFloat::quiet_nan();
                }
                return ExtendedFloat::infinity(a.is_negative() ^ b.is_negative());
            }
            a.div(b, mode)
        }
        MauOp::Rem => a.rem(b, mode),
        _ => unreachable!("binary_arith only dispatches the five binary opcodes"),
    };
    latch_flags(mau, flags);
    result
}

fn set_compare_flags(mau: &mut Mau, a: ExtendedFloat, b: ExtendedFloat, swap: bool) {
    if a.is_nan() || b.is_nan() {
        mau.unordered = true;
        mau.n = false;
        mau.z = false;
        if a.nan_is_signaling || b.nan_is_signaling {
            mau.sticky.invalid = true;
        }
        return;
    }
    let (lhs, rhs) = if swap { (b, a) } else { (a, b) };
    mau.z = lhs.equals(rhs);
    mau.n = lhs.less_than(rhs);
    mau.unordered = false;
}

/// Computes the mask-gated ECP bit and the corresponding abort (spec
/// §4.3: "If an unmasked exception is present (ECP) at opcode completion,
/// the MAU causes the CPU to raise an external memory fault... unless the
/// opcode is one of {NOP, RDASR, WRASR, EROF, LDR}").
fn finish(mau: &Mau, cmd: &CommandWord, result_word: Option<u32>, n: bool, z: bool) -> MauResult {
    let io = mau.sticky.invalid && mau.masks.invalid;
    let ps = mau.sticky.divide_by_zero || mau.sticky.overflow || mau.sticky.underflow;
    let abort = io && !matches!(cmd.opcode, MauOp::Nop | MauOp::RdAsr | MauOp::WrAsr | MauOp::Erof | MauOp::Ldr);
    MauResult { result_word, n, z, io, ps, abort }
}

pub fn execute(
    mau: &mut Mau,
    cmd: CommandWord,
    src_ea: Option<u32>,
    dst_ea: Option<u32>,
    bus: &mut Bus,
) -> Result<MauResult, Fault> {
    clear_transient_flags(mau);

    let mut result_word = None;

    match cmd.opcode {
        MauOp::Nop => {}

        MauOp::Add | MauOp::Sub | MauOp::Mul | MauOp::Div | MauOp::Rem => {
            let a = read_operand(mau, cmd.src1, src_ea, bus)?;
            let b = read_operand(mau, cmd.src2, src_ea, bus)?;
            let result = binary_arith(mau, cmd.opcode, a, b);
            write_operand(mau, cmd.dst, dst_ea, bus, result)?;
            mau.z = result.is_zero();
            mau.n = result.is_negative() && !result.is_zero();
        }

        MauOp::Sqrt => {
            let a = read_operand(mau, cmd.src1, src_ea, bus)?;
            let result = if let Some(nan) = propagate_nan(mau, a, None) {
                nan
            } else {
                let (result, flags) = a.sqrt(mau.round_mode);
                latch_flags(mau, flags);
                result
            };
            write_operand(mau, cmd.dst, dst_ea, bus, result)?;
            mau.z = result.is_zero();
        }

        MauOp::Abs => {
            let a = read_operand(mau, cmd.src1, src_ea, bus)?;
            let result = a.abs();
            write_operand(mau, cmd.dst, dst_ea, bus, result)?;
            mau.z = result.is_zero();
        }

        MauOp::Neg => {
            let a = read_operand(mau, cmd.src1, src_ea, bus)?;
            let result = a.neg();
            write_operand(mau, cmd.dst, dst_ea, bus, result)?;
            mau.z = result.is_zero();
            mau.n = result.is_negative() && !result.is_zero();
        }

        MauOp::Move => {
            let a = read_operand(mau, cmd.src1, src_ea, bus)?;
            write_operand(mau, cmd.dst, dst_ea, bus, a)?;
            mau.z = a.is_zero();
            mau.n = a.is_negative();
        }

        MauOp::Cmp | MauOp::Cmpe => {
            let a = read_operand(mau, cmd.src1, src_ea, bus)?;
            let b = read_operand(mau, cmd.src2, src_ea, bus)?;
            set_compare_flags(mau, a, b, false);
        }
        MauOp::Cmps | MauOp::Cmpes => {
            let a = read_operand(mau, cmd.src1, src_ea, bus)?;
            let b = read_operand(mau, cmd.src2, src_ea, bus)?;
            set_compare_flags(mau, a, b, true);
        }

        MauOp::RdAsr => {
            let bits = pack_asr(mau);
            if let Some(addr) = dst_ea {
                bus.write(addr, Width::Word, bits)?;
            }
            result_word = Some(bits);
        }
        MauOp::WrAsr => {
            let bits = match src_ea {
                Some(addr) => bus.read(addr, Width::Word)?,
                None => 0,
            };
            unpack_asr(mau, bits);
        }

        // LDR loads the Data Register from the addressed operand; EROF
        // extracts DR's current contents to the destination (spec §4.3
        // "LDR, EROF (load/extract DR)").
        MauOp::Ldr => {
            mau.dr = read_operand(mau, cmd.src1, src_ea, bus)?;
        }
        MauOp::Erof => {
            let dr = mau.dr;
            write_operand(mau, cmd.dst, dst_ea, bus, dr)?;
        }

        MauOp::Rtoi => {
            let a = read_operand(mau, cmd.src1, src_ea, bus)?;
            let (result, inexact) = a.round_to_integer(mau.round_mode);
            mau.sticky.inexact |= inexact;
            write_operand(mau, cmd.dst, dst_ea, bus, result)?;
            mau.z = result.is_zero();
            mau.n = result.is_negative() && !result.is_zero();
        }

        MauOp::Ftoi => {
            let a = read_operand(mau, cmd.src1, src_ea, bus)?;
            let (value, inexact, invalid) = a.to_i32_saturating(mau.round_mode);
            mau.sticky.inexact |= inexact;
            mau.sticky.invalid |= invalid;
            if let Some(addr) = dst_ea {
                bus.write(addr, Width::Word, value as u32)?;
            }
            result_word = Some(value as u32);
            mau.z = value == 0;
            mau.n = value < 0;
        }

        MauOp::Itof => {
            let raw = match src_ea {
                Some(addr) => bus.read(addr, Width::Word)?,
                None => 0,
            } as i32;
            let result = ExtendedFloat::from_i64(raw as i64);
            write_operand(mau, cmd.dst, dst_ea, bus, result)?;
            mau.z = raw == 0;
            mau.n = raw < 0;
        }

        MauOp::Dtof => {
            let words = [
                src_ea.map(|a| bus.read(a, Width::Word)).transpose()?.unwrap_or(0),
                src_ea.map(|a| bus.read(a + 4, Width::Word)).transpose()?.unwrap_or(0),
                src_ea.map(|a| bus.read(a + 8, Width::Word)).transpose()?.unwrap_or(0),
            ];
            let value = decimal::bcd_to_i64(words)?;
            let result = ExtendedFloat::from_i64(value);
            write_operand(mau, cmd.dst, dst_ea, bus, result)?;
            mau.z = value == 0;
            mau.n = value < 0;
        }

        MauOp::Ftod => {
            let a = read_operand(mau, cmd.src1, src_ea, bus)?;
            let (saturated, _inexact, invalid) = a.to_i64_saturating(mau.round_mode);
            mau.sticky.invalid |= invalid;
            let words = decimal::i64_to_bcd(saturated);
            if let Some(addr) = dst_ea {
                bus.write(addr, Width::Word, words[0])?;
                bus.write(addr + 4, Width::Word, words[1])?;
                bus.write(addr + 8, Width::Word, words[2])?;
            }
        }

        MauOp::Unknown => {
            let mut result = finish(mau, &cmd, None, mau.n, mau.z);
            result.abort = true;
            return Ok(result);
        }
    }

    Ok(finish(mau, &cmd, result_word, mau.n, mau.z))
}

fn pack_asr(mau: &Mau) -> u32 {
    (mau.n as u32)
        | ((mau.z as u32) << 1)
        | ((mau.unordered as u32) << 2)
        | ((mau.sticky.invalid as u32) << 3)
        | ((mau.sticky.divide_by_zero as u32) << 4)
        | ((mau.sticky.overflow as u32) << 5)
        | ((mau.sticky.underflow as u32) << 6)
        | ((mau.sticky.inexact as u32) << 7)
        | ((mau.masks.invalid as u32) << 8)
        | ((mau.masks.divide_by_zero as u32) << 9)
        | ((mau.masks.overflow as u32) << 10)
        | ((mau.masks.underflow as u32) << 11)
        | ((mau.masks.inexact as u32) << 12)
        | ((mau.round_mode as u32) << 13)
}

fn unpack_asr(mau: &mut Mau, bits: u32) {
    mau.n = bits & 1 != 0;
    mau.z = bits & (1 << 1) != 0;
    mau.unordered = bits & (1 << 2) != 0;
    mau.sticky.invalid = bits & (1 << 3) != 0;
    mau.sticky.divide_by_zero = bits & (1 << 4) != 0;
    mau.sticky.overflow = bits & (1 << 5) != 0;
    mau.sticky.underflow = bits & (1 << 6) != 0;
    mau.sticky.inexact = bits & (1 << 7) != 0;
    mau.masks.invalid = bits & (1 << 8) != 0;
    mau.masks.divide_by_zero = bits & (1 << 9) != 0;
    mau.masks.overflow = bits & (1 << 10) != 0;
    mau.masks.underflow = bits & (1 << 11) != 0;
    mau.masks.inexact = bits & (1 << 12) != 0;
    mau.round_mode = match (bits >> 13) & 0x3 {
        0 => RoundMode::NearestEven,
        1 => RoundMode::TowardPositive,
        2 => RoundMode::TowardNegative,
        _ => RoundMode::TowardZero,
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Ram;

    fn scratch_bus() -> Bus {
        let mut bus = Bus::new();
        bus.attach(0, 4096, Box::new(Ram::new(4096)));
        bus
    }

    fn command(opcode: MauOp, src1: OperandSpec, src2: OperandSpec, dst: OperandSpec) -> CommandWord {
        CommandWord { coprocessor_id: super::super::MAU_COPROCESSOR_ID, opcode, src1, src2, dst }
    }

    #[test]
    fn divide_by_zero_without_mask_produces_infinity() {
        let mut mau = Mau::new();
        mau.registers[0] = ExtendedFloat::from_i64(1);
        mau.registers[1] = ExtendedFloat::ZERO;
        let mut bus = scratch_bus();
        let cmd = command(MauOp::Div, OperandSpec::Register(0), OperandSpec::Register(1), OperandSpec::Register(2));
        let result = execute(&mut mau, cmd, None, None, &mut bus).unwrap();
        assert!(mau.registers[2].is_infinite());
        assert!(mau.sticky.divide_by_zero);
        assert!(result.ps);
        assert!(!result.abort, "divide-by-zero without the mask set must not assert ECP");
    }

    #[test]
    fn signaling_nan_operand_sets_invalid() {
        let mut mau = Mau::new();
        mau.registers[0] = ExtendedFloat::signaling_nan();
        mau.registers[1] = ExtendedFloat::from_i64(2);
        let mut bus = scratch_bus();
        let cmd = command(MauOp::Add, OperandSpec::Register(0), OperandSpec::Register(1), OperandSpec::Register(2));
        execute(&mut mau, cmd, None, None, &mut bus).unwrap();
        assert!(mau.sticky.invalid);
        assert!(mau.registers[2].is_nan());
    }

    #[test]
    fn signaling_nan_with_invalid_mask_aborts() {
        let mut mau = Mau::new();
        mau.masks.invalid = true;
        mau.registers[0] = ExtendedFloat::signaling_nan();
        mau.registers[1] = ExtendedFloat::from_i64(2);
        let mut bus = scratch_bus();
        let cmd = command(MauOp::Add, OperandSpec::Register(0), OperandSpec::Register(1), OperandSpec::Register(2));
        let result = execute(&mut mau, cmd, None, None, &mut bus).unwrap();
        assert!(result.io);
        assert!(result.abort, "an unmasked-turned-enabled invalid exception must raise ECP abort");
    }

    #[test]
    fn itof_ftoi_round_trip_for_representable_integers() {
        let mut mau = Mau::new();
        let mut bus = scratch_bus();
        bus.write(0, Width::Word, (-42i32) as u32).unwrap();
        let cmd = command(MauOp::Itof, OperandSpec::Register(0), OperandSpec::Register(0), OperandSpec::Register(1));
        execute(&mut mau, cmd, Some(0), None, &mut bus).unwrap();
        assert_eq!(mau.registers[1].to_i32_saturating(RoundMode::NearestEven).0, -42);
    }

    #[test]
    fn ldr_erof_round_trip_through_data_register() {
        let mut mau = Mau::new();
        mau.registers[0] = ExtendedFloat::from_i64(9);
        let mut bus = scratch_bus();
        let ldr = command(MauOp::Ldr, OperandSpec::Register(0), OperandSpec::Register(0), OperandSpec::Register(0));
        execute(&mut mau, ldr, None, None, &mut bus).unwrap();
        assert_eq!(mau.dr.to_i32_saturating(RoundMode::NearestEven).0, 9);

        mau.dr = ExtendedFloat::from_i64(-3);
        let erof = command(MauOp::Erof, OperandSpec::Register(0), OperandSpec::Register(0), OperandSpec::Register(2));
        execute(&mut mau, erof, None, None, &mut bus).unwrap();
        assert_eq!(mau.registers[2].to_i32_saturating(RoundMode::NearestEven).0, -3);
    }

    #[test]
    fn binary_op_latches_result_into_data_register() {
        let mut mau = Mau::new();
        mau.registers[0] = ExtendedFloat::from_i64(2);
        mau.registers[1] = ExtendedFloat::from_i64(3);
        let mut bus = scratch_bus();
        let cmd = command(MauOp::Add, OperandSpec::Register(0), OperandSpec::Register(1), OperandSpec::Register(2));
        execute(&mut mau, cmd, None, None, &mut bus).unwrap();
        assert_eq!(mau.dr.to_i32_saturating(RoundMode::NearestEven).0, 5);
    }

    #[test]
    fn round_toward_positive_rounds_add_result_up_not_to_nearest_int() {
        let mut mau = Mau::new();
        mau.round_mode = RoundMode::TowardPositive;
        mau.registers[0] = ExtendedFloat::from_single_bits(1.5f32.to_bits());
        mau.registers[1] = ExtendedFloat::from_single_bits(1.25f32.to_bits());
        let mut bus = scratch_bus();
        let cmd = command(MauOp::Add, OperandSpec::Register(0), OperandSpec::Register(1), OperandSpec::Register(2));
        execute(&mut mau, cmd, None, None, &mut bus).unwrap();
        assert_eq!(f32::from_bits(mau.registers[2].to_single_bits()), 2.75);
    }
}
