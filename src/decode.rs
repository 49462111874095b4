//! Instruction fetch and operand descriptor decode (spec §4.1 "Decode",
//! §6 "Instruction encoding (bit-exact)").
//!
//! Generalizes the teacher's `EAMode::from` (read extension words straight
//! off a `MemoryHandle` cursor) to the WE32100's variable-length encoding:
//! opcode byte (or `0x30`-prefixed two-byte opcode), then zero or more
//! operand descriptor bytes, each of which may itself carry 1-4 trailing
//! bytes of literal/immediate/displacement data.

use crate::error::Fault;
use crate::mnemonic::{self, EncodingShape, MnemonicEntry, Op, OpWidth, HWORD_OPS, OPS};
use crate::operand::{AddressingMode, DataType, Operand};

/// Byte-level cursor over the instruction stream, fed by a closure so the
/// decoder stays independent of how physical/virtual fetches are wired up
/// (matching the teacher's `MemoryHandle` abstraction over a raw `Bus`).
pub struct Fetcher<'a> {
    pub pc: u32,
    read_byte: Box<dyn FnMut(u32) -> Result<u8, Fault> + 'a>,
}

impl<'a> Fetcher<'a> {
    pub fn new(pc: u32, read_byte: impl FnMut(u32) -> Result<u8, Fault> + 'a) -> Self {
        Fetcher { pc, read_byte: Box::new(read_byte) }
    }

    fn byte(&mut self) -> Result<u8, Fault> {
        let b = (self.read_byte)(self.pc)?;
        self.pc = self.pc.wrapping_add(1);
        Ok(b)
    }

    fn half(&mut self) -> Result<u16, Fault> {
        let lo = self.byte()? as u16;
        let hi = self.byte()? as u16;
        Ok(lo | (hi << 8))
    }

    fn word(&mut self) -> Result<u32, Fault> {
        let lo = self.half()? as u32;
        let hi = self.half()? as u32;
        Ok(lo | (hi << 16))
    }
}

/// A fully decoded instruction: its static shape plus the concrete operands
/// read from the stream (spec §4.1 "Decode").
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub mnemonic: &'static MnemonicEntry,
    pub operands: Vec<Operand>,
    /// Total length in bytes, including the opcode.
    pub length: u32,
}

/// Decode one instruction starting at `fetcher.pc`. On return,
/// `fetcher.pc` points just past the instruction (spec §4.1 "Fetch").
pub fn decode_instruction(fetcher: &mut Fetcher) -> Result<Instruction, Fault> {
    let start = fetcher.pc;
    let first = fetcher.byte()?;

    let (entry, is_hword): (&'static MnemonicEntry, bool) = if first == 0x30 {
        let second = fetcher.byte()?;
        let code = 0x3000 | second as u16;
        let (_, _, _, _, _, _) = *mnemonic::lookup_hword(code).ok_or(Fault::IllegalOpcode)?;
        (hword_as_mnemonic(code)?, true)
    } else {
        (&OPS[first as usize], false)
    };

    if entry.op_count < 0 {
        return Err(Fault::IllegalOpcode);
    }
    if matches!(entry.op, Op::Illegal) {
        return Err(Fault::IllegalOpcode);
    }

    let mut operands = Vec::with_capacity(entry.op_count.max(0) as usize);

    match entry.shape {
        EncodingShape::None => {}
        EncodingShape::EmbeddedByte => {
            let raw = fetcher.byte()? as i8;
            operands.push(Operand {
                mode: AddressingMode::Literal(raw),
                reg: 15,
                default_type: DataType::SignedByte,
                expanded_type: None,
            });
        }
        EncodingShape::EmbeddedHalf => {
            let raw = fetcher.half()? as i16;
            operands.push(Operand {
                mode: AddressingMode::WordDisplacement { reg: 15, disp: raw as i32 },
                reg: 15,
                default_type: DataType::SignedHalf,
                expanded_type: None,
            });
        }
        EncodingShape::Coprocessor => {
            let cmd = fetcher.word()?;
            operands.push(Operand {
                mode: AddressingMode::WordImmediate(cmd),
                reg: 15,
                default_type: DataType::UnsignedWord,
                expanded_type: None,
            });
            for i in 1..entry.op_count {
                let width = operand_width(entry, i, is_hword);
                operands.push(decode_operand(fetcher, width)?);
            }
        }
        EncodingShape::Descriptor => {
            for i in 0..entry.op_count {
                let width = operand_width(entry, i, is_hword);
                operands.push(decode_operand(fetcher, width)?);
            }
        }
    }

    Ok(Instruction { mnemonic: entry, operands, length: fetcher.pc - start })
}

fn operand_width(entry: &MnemonicEntry, _index: i8, _is_hword: bool) -> OpWidth {
    entry.width
}

/// The two-byte table's entries share the `mnemonic` struct shape but live
/// in a separate static array keyed by opcode value rather than index;
/// bridge the two so `decode_instruction` can treat both uniformly.
fn hword_as_mnemonic(code: u16) -> Result<&'static MnemonicEntry, Fault> {
    static CACHE: once_static::OnceArray = once_static::OnceArray::new();
    CACHE.get_or_init(code)
}

/// Minimal lazily-built mirror of [`HWORD_OPS`] as [`MnemonicEntry`]s,
/// avoiding a `lazy_static`/`once_cell` dependency the teacher never pulls
/// in: the table is tiny (11 entries) and immutable once built.
mod once_static {
    use super::*;
    use std::sync::OnceLock;

    pub struct OnceArray(OnceLock<[MnemonicEntry; 11]>);

    impl OnceArray {
        pub const fn new() -> Self {
            OnceArray(OnceLock::new())
        }

        pub fn get_or_init(&'static self, code: u16) -> Result<&'static MnemonicEntry, Fault> {
            let table = self.0.get_or_init(|| {
                let mut out = [MnemonicEntry {
                    name: "???",
                    op_count: -1,
                    shape: EncodingShape::None,
                    width: OpWidth::NotApplicable,
                    op: Op::Illegal,
                    src_op1: -1,
                    src_op2: -1,
                    src_op3: -1,
                    dst_op: -1,
                }; 11];
                for (i, (_, name, op_count, shape, width, op)) in HWORD_OPS.iter().enumerate() {
                    out[i] = MnemonicEntry {
                        name,
                        op_count: *op_count,
                        shape: *shape,
                        width: *width,
                        op: *op,
                        src_op1: -1,
                        src_op2: -1,
                        src_op3: -1,
                        dst_op: if *op_count > 0 { 0 } else { -1 },
                    };
                }
                out
            });
            HWORD_OPS
                .iter()
                .position(|e| e.0 == code)
                .map(|i| &table[i])
                .ok_or(Fault::IllegalOpcode)
        }
    }
}

/// Decode one operand descriptor byte and its trailing data, per the
/// architecture's 16 addressing modes (spec §4.1 "Operand descriptor
/// decoding").
fn decode_operand(fetcher: &mut Fetcher, width: OpWidth) -> Result<Operand, Fault> {
    let descriptor = fetcher.byte()?;
    let mode = descriptor >> 4;
    let reg = descriptor & 0xf;
    let default_type = width_default_type(width);

    let (addressing, expanded_type) = match mode {
        0..=3 => {
            // Short literal: the descriptor byte itself is the value,
            // sign-extended as a plain two's-complement i8.
            (AddressingMode::Literal(descriptor as i8), None)
        }
        15 => (AddressingMode::Literal(descriptor as i8), None),
        4 => {
            if reg == 15 {
                (AddressingMode::WordImmediate(fetcher.word()?), None)
            } else {
                (AddressingMode::Register(reg), None)
            }
        }
        5 => {
            if reg == 15 {
                (AddressingMode::HalfImmediate(fetcher.half()?), None)
            } else if reg == 11 {
                return Err(Fault::InvalidDescriptor);
            } else {
                (AddressingMode::RegisterDeferred(reg), None)
            }
        }
        6 => {
            if reg == 15 {
                (AddressingMode::ByteImmediate(fetcher.byte()?), None)
            } else if reg == 9 {
                (AddressingMode::FpShort(fetcher.byte()?), None)
            } else {
                return Err(Fault::InvalidDescriptor);
            }
        }
        7 => {
            if reg == 15 {
                (AddressingMode::Absolute(fetcher.word()?), None)
            } else if reg == 10 {
                (AddressingMode::ApShort(fetcher.byte()?), None)
            } else {
                return Err(Fault::InvalidDescriptor);
            }
        }
        8 => (AddressingMode::WordDisplacement { reg, disp: fetcher.word()? as i32 }, None),
        9 => (AddressingMode::WordDisplacementDeferred { reg, disp: fetcher.word()? as i32 }, None),
        10 => (AddressingMode::HalfDisplacement { reg, disp: fetcher.half()? as i16 }, None),
        11 => (AddressingMode::HalfDisplacementDeferred { reg, disp: fetcher.half()? as i16 }, None),
        12 => (AddressingMode::ByteDisplacement { reg, disp: fetcher.byte()? as i8 }, None),
        13 => (AddressingMode::ByteDisplacementDeferred { reg, disp: fetcher.byte()? as i8 }, None),
        14 => {
            if reg == 15 {
                (AddressingMode::AbsoluteDeferred(fetcher.word()?), None)
            } else if matches!(reg, 0 | 2 | 3 | 4 | 6 | 7) {
                let etype = DataType::from_expand_reg(reg)?;
                let inner = decode_operand(fetcher, width_for_type(etype))?;
                (inner.mode, Some(etype))
            } else {
                return Err(Fault::ReservedDataType);
            }
        }
        _ => return Err(Fault::InvalidDescriptor),
    };

    Ok(Operand { mode: addressing, reg, default_type, expanded_type })
}

fn width_default_type(width: OpWidth) -> DataType {
    match width {
        OpWidth::Byte => DataType::UnsignedByte,
        OpWidth::Half => DataType::SignedHalf,
        OpWidth::Word | OpWidth::NotApplicable => DataType::SignedWord,
    }
}

fn width_for_type(ty: DataType) -> OpWidth {
    match ty.width() {
        crate::memory::Width::Byte => OpWidth::Byte,
        crate::memory::Width::Half => OpWidth::Half,
        crate::memory::Width::Word => OpWidth::Word,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetch_from(bytes: &'static [u8]) -> Fetcher<'static> {
        Fetcher::new(0, move |addr| {
            bytes.get(addr as usize).copied().ok_or(Fault::UnmappedMemory)
        })
    }

    #[test]
    fn decodes_halt_with_no_operands() {
        let mut f = fetch_from(&[0x00]);
        let instr = decode_instruction(&mut f).unwrap();
        assert_eq!(instr.mnemonic.name, "halt");
        assert_eq!(instr.operands.len(), 0);
        assert_eq!(instr.length, 1);
    }

    #[test]
    fn decodes_addw2_register_register() {
        // ADDW2 %r1, %r2: opcode 0x9c, descriptors 0x41 (mode 4 reg 1), 0x42
        let mut f = fetch_from(&[0x9c, 0x41, 0x42]);
        let instr = decode_instruction(&mut f).unwrap();
        assert_eq!(instr.mnemonic.name, "ADDW2");
        assert_eq!(instr.operands.len(), 2);
        assert_eq!(instr.operands[0].mode, AddressingMode::Register(1));
        assert_eq!(instr.operands[1].mode, AddressingMode::Register(2));
        assert_eq!(instr.length, 3);
    }

    #[test]
    fn decodes_word_immediate_operand() {
        // MOVW &0x12345678, %r0: opcode 0x84, descriptor 0x4f + word, 0x40
        let mut f = fetch_from(&[0x84, 0x4f, 0x78, 0x56, 0x34, 0x12, 0x40]);
        let instr = decode_instruction(&mut f).unwrap();
        assert_eq!(instr.operands[0].mode, AddressingMode::WordImmediate(0x1234_5678));
        assert_eq!(instr.operands[1].mode, AddressingMode::Register(0));
    }

    #[test]
    fn reg11_register_deferred_is_invalid() {
        let mut f = fetch_from(&[0x84, 0x5b, 0x40]);
        assert_eq!(decode_instruction(&mut f), Err(Fault::InvalidDescriptor));
    }

    #[test]
    fn illegal_opcode_is_rejected() {
        let mut f = fetch_from(&[0x01]);
        assert_eq!(decode_instruction(&mut f), Err(Fault::IllegalOpcode));
    }

    #[test]
    fn unknown_hword_opcode_is_illegal() {
        let mut f = fetch_from(&[0x30, 0xff]);
        assert_eq!(decode_instruction(&mut f), Err(Fault::IllegalOpcode));
    }

    #[test]
    fn known_hword_opcode_decodes() {
        let mut f = fetch_from(&[0x30, 0x45]);
        let instr = decode_instruction(&mut f).unwrap();
        assert_eq!(instr.mnemonic.name, "RETG");
        assert_eq!(instr.length, 2);
    }

    #[test]
    fn expanded_data_type_wraps_inner_operand() {
        // MOVW, first operand mode 14 reg 3 (unsigned byte expand) wrapping
        // a mode-6 byte immediate.
        let mut f = fetch_from(&[0x84, 0xe3, 0x6f, 0x05, 0x40]);
        let instr = decode_instruction(&mut f).unwrap();
        assert_eq!(instr.operands[0].expanded_type, Some(DataType::UnsignedByte));
        assert_eq!(instr.operands[0].mode, AddressingMode::ByteImmediate(5));
    }
}
