//! Operand descriptors and addressing modes (spec §3 "Operand", §4.1
//! "Operand descriptor decoding" / "Effective-address computation", §9
//! Design Notes' tagged-variant recommendation).
//!
//! This generalizes the teacher's `fields::EAMode` (a flat enum over the
//! 68000's dozen-odd addressing modes, built in `EAMode::from` by reading
//! extension words straight off the instruction stream) to the WE32100's
//! 16 addressing modes plus the expanded-data-type wrapper.

use crate::error::Fault;
use crate::memory::Width;

/// Default/expanded operand data type (spec §3 Operand, §4.1 "Read/extend
/// policy").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    UnsignedByte,
    UnsignedHalf,
    UnsignedWord,
    SignedByte,
    SignedHalf,
    SignedWord,
}

impl DataType {
    pub fn width(self) -> Width {
        match self {
            DataType::UnsignedByte | DataType::SignedByte => Width::Byte,
            DataType::UnsignedHalf | DataType::SignedHalf => Width::Half,
            DataType::UnsignedWord | DataType::SignedWord => Width::Word,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(self, DataType::SignedByte | DataType::SignedHalf | DataType::SignedWord)
    }

    /// Default type for a width per spec §4.1: "Bytes are *by default*
    /// unsigned; halves and words are *by default* signed."
    pub fn default_for(width: Width) -> Self {
        match width {
            Width::Byte => DataType::UnsignedByte,
            Width::Half => DataType::SignedHalf,
            Width::Word => DataType::SignedWord,
        }
    }

    /// Expanded-type override encoding, spec §4.1: "mode=14 with reg in
    /// {0,2,3,4,6,7}" maps to `{unsigned word, unsigned half, unsigned
    /// byte, signed word, signed half, signed byte}` in that reg order,
    /// matching the original's `case 0/2/3/4/6/7` dispatch in
    /// `decode_operand`.
    pub fn from_expand_reg(reg: u8) -> Result<Self, Fault> {
        match reg {
            0 => Ok(DataType::UnsignedWord),
            2 => Ok(DataType::UnsignedHalf),
            3 => Ok(DataType::UnsignedByte),
            4 => Ok(DataType::SignedWord),
            6 => Ok(DataType::SignedHalf),
            7 => Ok(DataType::SignedByte),
            _ => Err(Fault::ReservedDataType),
        }
    }

    /// Sign/zero-extend a raw value already truncated to this type's width
    /// into a 32-bit intermediate (spec §4.1 "Read/extend policy").
    pub fn extend(self, raw: u32) -> u32 {
        match self {
            DataType::UnsignedByte => raw & 0xff,
            DataType::UnsignedHalf => raw & 0xffff,
            DataType::UnsignedWord => raw,
            DataType::SignedByte => (raw as u8 as i8 as i32) as u32,
            DataType::SignedHalf => (raw as u16 as i16 as i32) as u32,
            DataType::SignedWord => raw,
        }
    }

    pub fn truncate_mask(self) -> u32 {
        match self.width() {
            Width::Byte => 0xff,
            Width::Half => 0xffff,
            Width::Word => 0xffff_ffff,
        }
    }
}

/// Addressing mode, decoded from an operand descriptor byte (spec §4.1,
/// §6 "Instruction encoding (bit-exact)", §9 recommended tagged variant).
///
/// Reserved/illegal descriptor combinations are rejected at decode time
/// rather than represented, per spec §9 ("Illegal combinations become
/// unrepresentable").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    /// Modes 0-3 and 15: literal value embedded in the descriptor byte
    /// itself. Always 8-bit signed, ignores expanded types (spec §4.1).
    Literal(i8),
    Register(u8),
    RegisterDeferred(u8),
    WordImmediate(u32),
    HalfImmediate(u16),
    ByteImmediate(u8),
    Absolute(u32),
    AbsoluteDeferred(u32),
    FpShort(u8),
    ApShort(u8),
    WordDisplacement { reg: u8, disp: i32 },
    WordDisplacementDeferred { reg: u8, disp: i32 },
    HalfDisplacement { reg: u8, disp: i16 },
    HalfDisplacementDeferred { reg: u8, disp: i16 },
    ByteDisplacement { reg: u8, disp: i8 },
    ByteDisplacementDeferred { reg: u8, disp: i8 },
}

impl AddressingMode {
    /// True for modes that have no effective address (literal/immediate
    /// forms); writing to one of these is `InvalidDescriptor` (spec §4.1
    /// "Effective-address computation").
    pub fn has_effective_address(self) -> bool {
        !matches!(
            self,
            AddressingMode::Literal(_)
                | AddressingMode::Register(_)
                | AddressingMode::WordImmediate(_)
                | AddressingMode::HalfImmediate(_)
                | AddressingMode::ByteImmediate(_)
        )
    }
}

/// A fully decoded operand descriptor (spec §3 "Operand").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operand {
    pub mode: AddressingMode,
    /// Register number as encoded in the descriptor's low nibble, kept
    /// around for disassembly/trace even where `mode` already captures it.
    pub reg: u8,
    pub default_type: DataType,
    pub expanded_type: Option<DataType>,
}

impl Operand {
    pub fn effective_type(&self) -> DataType {
        self.expanded_type.unwrap_or(self.default_type)
    }

    /// Literal and immediate forms always use their own fixed width/sign
    /// regardless of expanded type overrides (spec §4.1: "Literals ...
    /// always 8-bit signed and ignore expanded types. Immediates are
    /// width-fixed by mode but take sign from expanded type.").
    pub fn effective_type_for_immediate(&self) -> DataType {
        match self.mode {
            AddressingMode::Literal(_) => DataType::SignedByte,
            AddressingMode::ByteImmediate(_) => {
                if self.expanded_type.map(|t| t.is_signed()).unwrap_or(false) {
                    DataType::SignedByte
                } else {
                    DataType::UnsignedByte
                }
            }
            AddressingMode::HalfImmediate(_) => {
                if self.expanded_type.map(|t| t.is_signed()).unwrap_or(false) {
                    DataType::SignedHalf
                } else {
                    DataType::UnsignedHalf
                }
            }
            AddressingMode::WordImmediate(_) => {
                if self.expanded_type.map(|t| t.is_signed()).unwrap_or(false) {
                    DataType::SignedWord
                } else {
                    DataType::UnsignedWord
                }
            }
            _ => self.effective_type(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_reg_maps_to_spec_table() {
        assert_eq!(DataType::from_expand_reg(0).unwrap(), DataType::UnsignedWord);
        assert_eq!(DataType::from_expand_reg(2).unwrap(), DataType::UnsignedHalf);
        assert_eq!(DataType::from_expand_reg(3).unwrap(), DataType::UnsignedByte);
        assert_eq!(DataType::from_expand_reg(4).unwrap(), DataType::SignedWord);
        assert_eq!(DataType::from_expand_reg(6).unwrap(), DataType::SignedHalf);
        assert_eq!(DataType::from_expand_reg(7).unwrap(), DataType::SignedByte);
        assert_eq!(DataType::from_expand_reg(1), Err(Fault::ReservedDataType));
    }

    #[test]
    fn byte_default_unsigned_half_word_default_signed() {
        assert_eq!(DataType::default_for(Width::Byte), DataType::UnsignedByte);
        assert_eq!(DataType::default_for(Width::Half), DataType::SignedHalf);
        assert_eq!(DataType::default_for(Width::Word), DataType::SignedWord);
    }

    #[test]
    fn sign_extension_matches_type() {
        assert_eq!(DataType::SignedByte.extend(0xff), 0xffff_ffff);
        assert_eq!(DataType::UnsignedByte.extend(0xff), 0x0000_00ff);
        assert_eq!(DataType::SignedHalf.extend(0x8000), 0xffff_8000);
        assert_eq!(DataType::UnsignedHalf.extend(0x8000), 0x0000_8000);
    }

    #[test]
    fn literal_and_non_expanded_immediate_have_no_effective_address() {
        assert!(!AddressingMode::Literal(5).has_effective_address());
        assert!(!AddressingMode::Register(3).has_effective_address());
        assert!(!AddressingMode::WordImmediate(9).has_effective_address());
        assert!(AddressingMode::WordDisplacement { reg: 2, disp: 4 }.has_effective_address());
        assert!(AddressingMode::RegisterDeferred(2).has_effective_address());
    }
}
