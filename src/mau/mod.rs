//! The MAU IEEE-754 coprocessor (spec §4.3).
//!
//! Every `SPOP*`/`Spop` family opcode in `cpu/exec.rs` is routed here via
//! [`Mau::broadcast`], mirroring the command-word protocol of spec §4.3:
//! coprocessor ID byte, 5-bit opcode, source/destination specs. Internal
//! arithmetic (see `extended::ExtendedFloat`) runs on integer-decomposed
//! sign/exponent/significand fields rather than the host's hardware
//! `f64`, per spec §4.3's "Bit-exact float arithmetic" requirement.

pub mod decimal;
pub mod extended;
pub mod ops;

use crate::error::Fault;
use crate::memory::{Bus, Width};

/// Coprocessor ID this MAU answers to (spec §4.3 "Command word": "Messages
/// with a foreign coprocessor ID return not-for-me").
pub const MAU_COPROCESSOR_ID: u8 = 0x0c;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundMode {
    NearestEven,
    TowardPositive,
    TowardNegative,
    TowardZero,
}

/// Sticky exception bits, latched independently of the enable mask (spec
/// §4.3 "preserve sticky overflow/underflow/inexact/invalid/divide-by-zero").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StickyFlags {
    pub invalid: bool,
    pub divide_by_zero: bool,
    pub overflow: bool,
    pub underflow: bool,
    pub inexact: bool,
}

/// Which sticky classes raise ECP (exception pending) when set (spec §4.3:
/// "if the matching mask is enabled, additionally set ECP").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExceptionMasks {
    pub invalid: bool,
    pub divide_by_zero: bool,
    pub overflow: bool,
    pub underflow: bool,
    pub inexact: bool,
}

/// A source or destination operand spec, decoded from the command word's
/// 3/4-bit spec fields (spec §4.3 "Command word": "Specs name F0..F3 or
/// memory-single/double/triple").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandSpec {
    Register(u8),
    MemorySingle,
    MemoryDouble,
    MemoryExtended,
}

impl OperandSpec {
    pub fn decode(bits: u8) -> Self {
        match bits {
            0..=3 => OperandSpec::Register(bits),
            4 => OperandSpec::MemorySingle,
            5 => OperandSpec::MemoryDouble,
            _ => OperandSpec::MemoryExtended,
        }
    }

    pub fn width(self) -> Option<Width> {
        match self {
            OperandSpec::MemorySingle => Some(Width::Word),
            OperandSpec::MemoryDouble | OperandSpec::MemoryExtended => None,
            OperandSpec::Register(_) => None,
        }
    }
}

/// The decoded command word (spec §4.3 "Command word").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandWord {
    pub coprocessor_id: u8,
    pub opcode: MauOp,
    pub src1: OperandSpec,
    pub src2: OperandSpec,
    pub dst: OperandSpec,
}

impl CommandWord {
    pub fn decode(word: u32) -> Self {
        let coprocessor_id = (word >> 24) as u8;
        let opcode_bits = ((word >> 19) & 0x1f) as u8;
        let src1 = OperandSpec::decode(((word >> 16) & 0x7) as u8);
        let src2 = OperandSpec::decode(((word >> 13) & 0x7) as u8);
        let dst = OperandSpec::decode(((word >> 9) & 0xf) as u8);
        CommandWord { coprocessor_id, opcode: MauOp::decode(opcode_bits), src1, src2, dst }
    }
}

/// Representative opcode set (spec §4.3 "Opcodes").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MauOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Sqrt,
    Abs,
    Neg,
    Cmp,
    Cmpe,
    Cmps,
    Cmpes,
    Move,
    RdAsr,
    WrAsr,
    Ldr,
    Erof,
    Rtoi,
    Ftoi,
    Itof,
    Dtof,
    Ftod,
    Nop,
    Unknown,
}

impl MauOp {
    pub fn decode(bits: u8) -> Self {
        match bits {
            0 => MauOp::Add,
            1 => MauOp::Sub,
            2 => MauOp::Mul,
            3 => MauOp::Div,
            4 => MauOp::Rem,
            5 => MauOp::Sqrt,
            6 => MauOp::Abs,
            7 => MauOp::Neg,
            8 => MauOp::Cmp,
            9 => MauOp::Cmpe,
            10 => MauOp::Cmps,
            11 => MauOp::Cmpes,
            12 => MauOp::Move,
            13 => MauOp::RdAsr,
            14 => MauOp::WrAsr,
            15 => MauOp::Ldr,
            16 => MauOp::Erof,
            17 => MauOp::Rtoi,
            18 => MauOp::Ftoi,
            19 => MauOp::Itof,
            20 => MauOp::Dtof,
            21 => MauOp::Ftod,
            22 => MauOp::Nop,
            _ => MauOp::Unknown,
        }
    }
}

/// Result of a single broadcast (spec §4.3 "Status flags": "the CPU's
/// N/Z/V/C are mirrored from the MAU's ASR bits N/Z/IO/PS").
#[derive(Debug, Clone, Copy, Default)]
pub struct MauResult {
    pub result_word: Option<u32>,
    pub n: bool,
    pub z: bool,
    pub io: bool,
    pub ps: bool,
    pub abort: bool,
}

/// The MAU's architectural state: four extended-precision registers F0-F3,
/// a Data Register DR, the accumulator status register (ASR) bits, sticky
/// exception flags, and round control (spec §3 "MAU State").
pub struct Mau {
    pub registers: [extended::ExtendedFloat; 4],
    pub dr: extended::ExtendedFloat,
    pub round_mode: RoundMode,
    pub masks: ExceptionMasks,
    pub sticky: StickyFlags,
    pub n: bool,
    pub z: bool,
    pub unordered: bool,
}

impl Mau {
    pub fn new() -> Self {
        Mau {
            registers: [extended::ExtendedFloat::ZERO; 4],
            dr: extended::ExtendedFloat::ZERO,
            round_mode: RoundMode::NearestEven,
            masks: ExceptionMasks::default(),
            sticky: StickyFlags::default(),
            n: false,
            z: false,
            unordered: false,
        }
    }

    /// Dispatches one coprocessor broadcast (spec §4.1 "Coprocessor
    /// broadcast", §4.3 "Operation contract per op").
    pub fn broadcast(
        &mut self,
        command_word: u32,
        src_ea: Option<u32>,
        dst_ea: Option<u32>,
        bus: &mut Bus,
    ) -> Result<MauResult, Fault> {
        let cmd = CommandWord::decode(command_word);
        if cmd.coprocessor_id != MAU_COPROCESSOR_ID {
            return Ok(MauResult { abort: true, ..Default::default() });
        }
        ops::execute(self, cmd, src_ea, dst_ea, bus)
    }
}

impl Default for Mau {
    fn default() -> Self {
        Self::new()
    }
}
