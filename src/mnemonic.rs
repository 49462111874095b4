//! The primary and two-byte ("hword") opcode tables (spec §6 "Instruction
//! encoding (bit-exact)"), transcribed in full from the architecture's own
//! opcode map.
//!
//! This is the WE32100 analogue of the teacher's `fields.rs` constant
//! tables (`EAMode`'s per-mode byte counts, `Condition`'s per-code
//! evaluation) but one order of magnitude larger, so it is kept as a flat
//! data table plus a small classification enum (`Op`) that groups opcodes
//! into execution families. `decode.rs` and `cpu/exec.rs` dispatch on `Op`
//! rather than matching 256 opcodes individually.

/// How an instruction's trailing bytes are laid out, per the architecture's
/// four encoding shapes (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingShape {
    /// No operands follow the opcode byte.
    None,
    /// One or more operand descriptors follow (the general case).
    Descriptor,
    /// A single embedded signed byte displacement follows (short branches).
    EmbeddedByte,
    /// A single embedded signed half displacement follows.
    EmbeddedHalf,
    /// A coprocessor command word (4 bytes) precedes further descriptors.
    Coprocessor,
}

/// Operand width carried by the opcode's mnemonic suffix (W/H/B), or `None`
/// for opcodes whose operands are untyped (branches, coprocessor ops).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpWidth {
    NotApplicable,
    Word,
    Half,
    Byte,
}

/// Execution family, used for generic dispatch instead of one match arm per
/// opcode (spec §9 Design Notes, "regular structure in the opcode space").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Illegal,
    Halt,
    Wait,
    Nop,
    Ret,
    RetG,
    RetPs,
    CallPs,
    Gate,
    Cflush,
    Bpt,
    ExtOp,
    Mverno,
    EnbVjmp,
    DisVjmp,
    MovBlw,
    StrEnd,
    IntAck,
    StrCpy,
    Jmp,
    Jsb,
    Call,
    Save,
    Restore,
    PushW,
    PushAw,
    PopW,
    MovAw,
    MovTrw,
    SwapWi,
    SwapHi,
    SwapBi,
    TstW,
    TstH,
    TstB,
    ClrW,
    ClrH,
    ClrB,
    MovW,
    MovH,
    MovB,
    McomW,
    McomH,
    McomB,
    MnegW,
    MnegH,
    MnegB,
    IncW,
    IncH,
    IncB,
    DecW,
    DecH,
    DecB,
    BitW,
    BitH,
    BitB,
    CmpW,
    CmpH,
    CmpB,
    /// Two-operand ALU: `dst op= src`. `ArithKind` distinguishes the
    /// operation; width comes from the opcode's own `width` field.
    Alu2(ArithKind),
    /// Three-operand ALU: `dst = src1 op src2`.
    Alu3(ArithKind),
    /// Branch on condition (spec §3 "Condition"); `cond` selects the PSW
    /// flag test, `Relative` short-branch forms carry the embedded
    /// displacement, `R*` forms are the zero-operand "return if" variants.
    Branch { cond: Condition, ret_form: bool },
    AlsW3,
    ArsW3,
    ArsH3,
    ArsB3,
    LlsW3,
    LlsH3,
    LlsB3,
    LrsW3,
    RotW,
    InsfW,
    InsfH,
    InsfB,
    ExtfW,
    ExtfH,
    ExtfB,
    Spop,
    SpopWs,
    SpopRd,
    SpopD2,
    SpopRt,
    SpopT2,
    SpopWd,
    SpopWt,
    SpopRs,
    SpopS2,
    BsbH,
    BsbB,
    Reserved,
}

/// Branch condition codes (spec §3 "Condition"), matching PSW N/Z/V/C.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Geq,
    Gtr,
    Lss,
    Leq,
    GeqU,
    GtrU,
    LssU,
    LeqU,
    Vc,
    Vs,
    Eq,
    Ne,
    Always,
}

impl ArithKind {
    pub const fn all_two_three() -> &'static [ArithKind] {
        &[
            ArithKind::Add,
            ArithKind::Sub,
            ArithKind::Mul,
            ArithKind::Div,
            ArithKind::Mod,
            ArithKind::Or,
            ArithKind::Xor,
            ArithKind::And,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithKind {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Or,
    Xor,
    And,
}

/// A decoded opcode's static shape, independent of the particular operand
/// values it will be given at runtime (spec §6, mirroring the original's
/// `mnemonic` struct).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MnemonicEntry {
    pub name: &'static str,
    pub op_count: i8,
    pub shape: EncodingShape,
    pub width: OpWidth,
    pub op: Op,
    /// Operand index (0-based) that is read, or -1 if none (matches the
    /// original's `src_op1`).
    pub src_op1: i8,
    pub src_op2: i8,
    pub src_op3: i8,
    /// Operand index that is written, or -1 (matches the original's
    /// `dst_op`).
    pub dst_op: i8,
}

const NA_W: OpWidth = OpWidth::NotApplicable;

macro_rules! m {
    ($name:expr, $count:expr, $shape:expr, $width:expr, $op:expr, $s1:expr, $s2:expr, $s3:expr, $d:expr) => {
        MnemonicEntry {
            name: $name,
            op_count: $count,
            shape: $shape,
            width: $width,
            op: $op,
            src_op1: $s1,
            src_op2: $s2,
            src_op3: $s3,
            dst_op: $d,
        }
    };
}

use EncodingShape::*;
use OpWidth::*;

/// The 256-entry primary opcode table, transcribed verbatim (spec §6).
pub static OPS: [MnemonicEntry; 256] = [
    m!("halt", 0, None, NA_W, Op::Halt, -1, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("SPOPRD", 2, Coprocessor, Word, Op::SpopRd, 1, -1, -1, -1),
    m!("SPOPD2", 3, Coprocessor, Word, Op::SpopD2, 1, -1, -1, 2),
    m!("MOVAW", 2, Descriptor, Word, Op::MovAw, 0, -1, -1, 1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("SPOPRT", 2, Coprocessor, Word, Op::SpopRt, 1, -1, -1, -1),
    m!("SPOPT2", 3, Coprocessor, Word, Op::SpopT2, 1, -1, -1, 2),
    m!("RET", 0, None, NA_W, Op::Ret, -1, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("MOVTRW", 2, Descriptor, Word, Op::MovTrw, 0, -1, -1, 1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("SAVE", 1, Descriptor, Word, Op::Save, 0, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("SPOPWD", 2, Coprocessor, Word, Op::SpopWd, -1, -1, -1, 1),
    m!("EXTOP", 1, EmbeddedByte, NA_W, Op::ExtOp, -1, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("SPOPWT", 2, Coprocessor, Word, Op::SpopWt, -1, -1, -1, 1),
    m!("RESTORE", 1, Descriptor, Word, Op::Restore, 0, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("SWAPWI", 1, Descriptor, Word, Op::SwapWi, -1, -1, -1, 0),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("SWAPHI", 1, Descriptor, Half, Op::SwapHi, -1, -1, -1, 0),
    m!("SWAPBI", 1, Descriptor, Byte, Op::SwapBi, -1, -1, -1, 0),
    m!("POPW", 1, Descriptor, Word, Op::PopW, -1, -1, -1, 0),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("SPOPRS", 2, Coprocessor, Word, Op::SpopRs, 1, -1, -1, -1),
    m!("SPOPS2", 3, Coprocessor, Word, Op::SpopS2, 1, -1, -1, 2),
    m!("JMP", 1, Descriptor, NA_W, Op::Jmp, -1, -1, -1, 0),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("CFLUSH", 0, None, NA_W, Op::Cflush, -1, -1, -1, -1),
    m!("TSTW", 1, Descriptor, Word, Op::TstW, 0, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("TSTH", 1, Descriptor, Half, Op::TstH, 0, -1, -1, -1),
    m!("TSTB", 1, Descriptor, Byte, Op::TstB, 0, -1, -1, -1),
    m!("CALL", 2, Descriptor, Word, Op::Call, 0, -1, -1, 1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("BPT", 0, None, NA_W, Op::Bpt, -1, -1, -1, -1),
    m!("WAIT", 0, None, NA_W, Op::Wait, -1, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1), // 0x30: two-byte prefix
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("SPOP", 1, Coprocessor, Word, Op::Spop, -1, -1, -1, -1),
    m!("SPOPWS", 2, Coprocessor, Word, Op::SpopWs, -1, -1, -1, 1),
    m!("JSB", 1, Descriptor, Word, Op::Jsb, -1, -1, -1, 0),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("BSBH", 1, EmbeddedHalf, NA_W, Op::BsbH, -1, -1, -1, 0),
    m!("BSBB", 1, EmbeddedByte, NA_W, Op::BsbB, -1, -1, -1, 0),
    m!("BITW", 2, Descriptor, Word, Op::BitW, 0, 1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("BITH", 2, Descriptor, Half, Op::BitH, 0, 1, -1, -1),
    m!("BITB", 2, Descriptor, Byte, Op::BitB, 0, 1, -1, -1),
    m!("CMPW", 2, Descriptor, Word, Op::CmpW, 0, 1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("CMPH", 2, Descriptor, Half, Op::CmpH, 0, 1, -1, -1),
    m!("CMPB", 2, Descriptor, Byte, Op::CmpB, 0, 1, -1, -1),
    m!("RGEQ", 0, None, NA_W, Op::Branch { cond: Condition::Geq, ret_form: true }, -1, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("BGEH", 1, EmbeddedHalf, NA_W, Op::Branch { cond: Condition::Geq, ret_form: false }, -1, -1, -1, 0),
    m!("BGEB", 1, EmbeddedByte, NA_W, Op::Branch { cond: Condition::Geq, ret_form: false }, -1, -1, -1, 0),
    m!("RGTR", 0, None, NA_W, Op::Branch { cond: Condition::Gtr, ret_form: true }, -1, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("BGH", 1, EmbeddedHalf, NA_W, Op::Branch { cond: Condition::Gtr, ret_form: false }, -1, -1, -1, 0),
    m!("BGB", 1, EmbeddedByte, NA_W, Op::Branch { cond: Condition::Gtr, ret_form: false }, -1, -1, -1, 0),
    m!("RLSS", 0, None, NA_W, Op::Branch { cond: Condition::Lss, ret_form: true }, -1, -1, -1, 0),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("BLH", 1, EmbeddedHalf, NA_W, Op::Branch { cond: Condition::Lss, ret_form: false }, -1, -1, -1, 0),
    m!("BLB", 1, EmbeddedByte, NA_W, Op::Branch { cond: Condition::Lss, ret_form: false }, -1, -1, -1, 0),
    m!("RLEQ", 0, None, NA_W, Op::Branch { cond: Condition::Leq, ret_form: true }, -1, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("BLEH", 1, EmbeddedHalf, NA_W, Op::Branch { cond: Condition::Leq, ret_form: false }, -1, -1, -1, 0),
    m!("BLEB", 1, EmbeddedByte, NA_W, Op::Branch { cond: Condition::Leq, ret_form: false }, -1, -1, -1, 0),
    m!("BGEQU", 0, None, NA_W, Op::Branch { cond: Condition::GeqU, ret_form: true }, -1, -1, -1, 0),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("BGEUH", 1, EmbeddedHalf, NA_W, Op::Branch { cond: Condition::GeqU, ret_form: false }, -1, -1, -1, 0),
    m!("BGEUB", 1, EmbeddedByte, NA_W, Op::Branch { cond: Condition::GeqU, ret_form: false }, -1, -1, -1, 0),
    m!("RGTRU", 0, None, NA_W, Op::Branch { cond: Condition::GtrU, ret_form: true }, -1, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("BGUH", 1, EmbeddedHalf, NA_W, Op::Branch { cond: Condition::GtrU, ret_form: false }, -1, -1, -1, 0),
    m!("BGUB", 1, EmbeddedByte, NA_W, Op::Branch { cond: Condition::GtrU, ret_form: false }, -1, -1, -1, 0),
    m!("RLSSU", 0, None, NA_W, Op::Branch { cond: Condition::LssU, ret_form: true }, -1, -1, -1, 0),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("BLUH", 1, EmbeddedHalf, NA_W, Op::Branch { cond: Condition::LssU, ret_form: false }, -1, -1, -1, 0),
    m!("BLUB", 1, EmbeddedByte, NA_W, Op::Branch { cond: Condition::LssU, ret_form: false }, -1, -1, -1, 0),
    m!("RLEQU", 0, None, NA_W, Op::Branch { cond: Condition::LeqU, ret_form: true }, -1, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("BLEUH", 1, EmbeddedHalf, NA_W, Op::Branch { cond: Condition::LeqU, ret_form: false }, -1, -1, -1, 0),
    m!("BLEUB", 1, EmbeddedByte, NA_W, Op::Branch { cond: Condition::LeqU, ret_form: false }, -1, -1, -1, 0),
    m!("RVC", 0, None, NA_W, Op::Branch { cond: Condition::Vc, ret_form: true }, -1, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("BVCH", 1, EmbeddedHalf, NA_W, Op::Branch { cond: Condition::Vc, ret_form: false }, -1, -1, -1, 0),
    m!("BVCB", 1, EmbeddedByte, NA_W, Op::Branch { cond: Condition::Vc, ret_form: false }, -1, -1, -1, 0),
    m!("RNEQU", 0, None, NA_W, Op::Branch { cond: Condition::Ne, ret_form: true }, -1, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("BNEH", 1, EmbeddedHalf, NA_W, Op::Branch { cond: Condition::Ne, ret_form: false }, -1, -1, -1, 0),
    m!("BNEB", 1, EmbeddedByte, NA_W, Op::Branch { cond: Condition::Ne, ret_form: false }, -1, -1, -1, 0),
    m!("RVS", 0, None, NA_W, Op::Branch { cond: Condition::Vs, ret_form: true }, -1, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("BVSH", 1, EmbeddedHalf, NA_W, Op::Branch { cond: Condition::Vs, ret_form: false }, -1, -1, -1, 0),
    m!("BVSB", 1, EmbeddedByte, NA_W, Op::Branch { cond: Condition::Vs, ret_form: false }, -1, -1, -1, 0),
    m!("REQLU", 0, None, NA_W, Op::Branch { cond: Condition::Eq, ret_form: true }, -1, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("BEH", 1, EmbeddedHalf, NA_W, Op::Branch { cond: Condition::Eq, ret_form: false }, -1, -1, -1, 0),
    m!("BEB", 1, EmbeddedByte, NA_W, Op::Branch { cond: Condition::Eq, ret_form: false }, -1, -1, -1, 0),
    m!("NOP", 0, None, NA_W, Op::Nop, -1, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("NOP3", 0, None, NA_W, Op::Nop, -1, -1, -1, -1),
    m!("NOP2", 0, None, NA_W, Op::Nop, -1, -1, -1, -1),
    m!("RNEQ", 0, None, NA_W, Op::Branch { cond: Condition::Ne, ret_form: true }, -1, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("BNEH", 1, EmbeddedHalf, NA_W, Op::Branch { cond: Condition::Ne, ret_form: false }, -1, -1, -1, 0),
    m!("BNEB", 1, EmbeddedByte, NA_W, Op::Branch { cond: Condition::Ne, ret_form: false }, -1, -1, -1, 0),
    m!("RSB", 0, None, NA_W, Op::Branch { cond: Condition::Always, ret_form: true }, -1, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("BRH", 1, EmbeddedHalf, NA_W, Op::Branch { cond: Condition::Always, ret_form: false }, -1, -1, -1, 0),
    m!("BRB", 1, EmbeddedByte, NA_W, Op::Branch { cond: Condition::Always, ret_form: false }, -1, -1, -1, 0),
    m!("REQL", 0, None, NA_W, Op::Branch { cond: Condition::Eq, ret_form: true }, -1, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("BEH", 1, EmbeddedHalf, NA_W, Op::Branch { cond: Condition::Eq, ret_form: false }, -1, -1, -1, 0),
    m!("BEB", 1, EmbeddedByte, NA_W, Op::Branch { cond: Condition::Eq, ret_form: false }, -1, -1, -1, 0),
    m!("CLRW", 1, Descriptor, Word, Op::ClrW, -1, -1, -1, 0),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("CLRH", 1, Descriptor, Half, Op::ClrH, -1, -1, -1, 0),
    m!("CLRB", 1, Descriptor, Byte, Op::ClrB, -1, -1, -1, 0),
    m!("MOVW", 2, Descriptor, Word, Op::MovW, 0, -1, -1, 1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("MOVH", 2, Descriptor, Half, Op::MovH, 0, -1, -1, 1),
    m!("MOVB", 2, Descriptor, Byte, Op::MovB, 0, -1, -1, 1),
    m!("MCOMW", 2, Descriptor, Word, Op::McomW, 0, -1, -1, 1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("MCOMH", 2, Descriptor, Half, Op::McomH, 0, -1, -1, 1),
    m!("MCOMB", 2, Descriptor, Byte, Op::McomB, 0, -1, -1, 1),
    m!("MNEGW", 2, Descriptor, Word, Op::MnegW, 0, -1, -1, 1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("MNEGH", 2, Descriptor, Half, Op::MnegH, 0, -1, -1, 1),
    m!("MNEGB", 2, Descriptor, Byte, Op::MnegB, 0, -1, -1, 1),
    m!("INCW", 1, Descriptor, Word, Op::IncW, -1, -1, -1, 0),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("INCH", 1, Descriptor, Half, Op::IncH, -1, -1, -1, 0),
    m!("INCB", 1, Descriptor, Byte, Op::IncB, -1, -1, -1, 0),
    m!("DECW", 1, Descriptor, Word, Op::DecW, -1, -1, -1, 0),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("DECH", 1, Descriptor, Half, Op::DecH, -1, -1, -1, 0),
    m!("DECB", 1, Descriptor, Byte, Op::DecB, -1, -1, -1, 0),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("ADDW2", 2, Descriptor, Word, Op::Alu2(ArithKind::Add), 0, -1, -1, 1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("ADDH2", 2, Descriptor, Half, Op::Alu2(ArithKind::Add), 0, -1, -1, 1),
    m!("ADDB2", 2, Descriptor, Byte, Op::Alu2(ArithKind::Add), 0, -1, -1, 1),
    m!("PUSHW", 1, Descriptor, Word, Op::PushW, 0, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("MODW2", 2, Descriptor, Word, Op::Alu2(ArithKind::Mod), 0, -1, -1, 1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("MODH2", 2, Descriptor, Half, Op::Alu2(ArithKind::Mod), 0, -1, -1, 1),
    m!("MODB2", 2, Descriptor, Byte, Op::Alu2(ArithKind::Mod), 0, -1, -1, 1),
    m!("MULW2", 2, Descriptor, Word, Op::Alu2(ArithKind::Mul), 0, -1, -1, 1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("MULH2", 2, Descriptor, Half, Op::Alu2(ArithKind::Mul), 0, -1, -1, 1),
    m!("MULB2", 2, Descriptor, Byte, Op::Alu2(ArithKind::Mul), 0, -1, -1, 1),
    m!("DIVW2", 2, Descriptor, Word, Op::Alu2(ArithKind::Div), 0, -1, -1, 1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("DIVH2", 2, Descriptor, Half, Op::Alu2(ArithKind::Div), 0, -1, -1, 1),
    m!("DIVB2", 2, Descriptor, Byte, Op::Alu2(ArithKind::Div), 0, -1, -1, 1),
    m!("ORW2", 2, Descriptor, Word, Op::Alu2(ArithKind::Or), 0, -1, -1, 1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("ORH2", 2, Descriptor, Half, Op::Alu2(ArithKind::Or), 0, -1, -1, 1),
    m!("ORB2", 2, Descriptor, Byte, Op::Alu2(ArithKind::Or), 0, -1, -1, 1),
    m!("XORW2", 2, Descriptor, Word, Op::Alu2(ArithKind::Xor), 0, -1, -1, 1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("XORH2", 2, Descriptor, Half, Op::Alu2(ArithKind::Xor), 0, -1, -1, 1),
    m!("XORB2", 2, Descriptor, Byte, Op::Alu2(ArithKind::Xor), 0, -1, -1, 1),
    m!("ANDW2", 2, Descriptor, Word, Op::Alu2(ArithKind::And), 0, -1, -1, 1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("ANDH2", 2, Descriptor, Half, Op::Alu2(ArithKind::And), 0, -1, -1, 1),
    m!("ANDB2", 2, Descriptor, Byte, Op::Alu2(ArithKind::And), 0, -1, -1, 1),
    m!("SUBW2", 2, Descriptor, Word, Op::Alu2(ArithKind::Sub), 0, -1, -1, 1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("SUBH2", 2, Descriptor, Half, Op::Alu2(ArithKind::Sub), 0, -1, -1, 1),
    m!("SUBB2", 2, Descriptor, Byte, Op::Alu2(ArithKind::Sub), 0, -1, -1, 1),
    m!("ALSW3", 3, Descriptor, Word, Op::AlsW3, 0, 1, -1, 2),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("ARSW3", 3, Descriptor, Word, Op::ArsW3, 0, 1, -1, 2),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("ARSH3", 3, Descriptor, Half, Op::ArsH3, 0, 1, -1, 2),
    m!("ARSB3", 3, Descriptor, Byte, Op::ArsB3, 0, 1, -1, 2),
    m!("INSFW", 4, Descriptor, Word, Op::InsfW, 0, 1, 2, 3),
    m!("???", -1, Descriptor, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("INSFH", 4, Descriptor, Half, Op::InsfH, 0, 1, 2, 3),
    m!("INSFB", 4, Descriptor, Byte, Op::InsfB, 0, 1, 2, 3),
    m!("EXTFW", 4, Descriptor, Word, Op::ExtfW, 0, 1, 2, 3),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("EXTFH", 4, Descriptor, Half, Op::ExtfH, 0, 1, 2, 3),
    m!("EXTFB", 4, Descriptor, Byte, Op::ExtfB, 0, 1, 2, 3),
    m!("LLSW3", 3, Descriptor, Word, Op::LlsW3, 0, 1, -1, 2),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("LLSH3", 3, Descriptor, Half, Op::LlsH3, 0, 1, -1, 2),
    m!("LLSB3", 3, Descriptor, Byte, Op::LlsB3, 0, 1, -1, 2),
    m!("LRSW3", 3, Descriptor, Word, Op::LrsW3, 0, 1, -1, 2),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("ROTW", 3, Descriptor, Word, Op::RotW, 0, 1, -1, 2),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("ADDW3", 3, Descriptor, Word, Op::Alu3(ArithKind::Add), 0, 1, -1, 2),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("ADDH3", 3, Descriptor, Half, Op::Alu3(ArithKind::Add), 0, 1, -1, 2),
    m!("ADDB3", 3, Descriptor, Byte, Op::Alu3(ArithKind::Add), 0, 1, -1, 2),
    m!("PUSHAW", 1, Descriptor, Word, Op::PushAw, 0, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("MODW3", 3, Descriptor, Word, Op::Alu3(ArithKind::Mod), 0, 1, -1, 2),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("MODH3", 3, Descriptor, Half, Op::Alu3(ArithKind::Mod), 0, 1, -1, 2),
    m!("MODB3", 3, Descriptor, Byte, Op::Alu3(ArithKind::Mod), 0, 1, -1, 2),
    m!("MULW3", 3, Descriptor, Word, Op::Alu3(ArithKind::Mul), 0, 1, -1, 2),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("MULH3", 3, Descriptor, Half, Op::Alu3(ArithKind::Mul), 0, 1, -1, 2),
    m!("MULB3", 3, Descriptor, Byte, Op::Alu3(ArithKind::Mul), 0, 1, -1, 2),
    m!("DIVW3", 3, Descriptor, Word, Op::Alu3(ArithKind::Div), 0, 1, -1, 2),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("DIVH3", 3, Descriptor, Half, Op::Alu3(ArithKind::Div), 0, 1, -1, 2),
    m!("DIVB3", 3, Descriptor, Byte, Op::Alu3(ArithKind::Div), 0, 1, -1, 2),
    m!("ORW3", 3, Descriptor, Word, Op::Alu3(ArithKind::Or), 0, 1, -1, 2),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("ORH3", 3, Descriptor, Half, Op::Alu3(ArithKind::Or), 0, 1, -1, 2),
    m!("ORB3", 3, Descriptor, Byte, Op::Alu3(ArithKind::Or), 0, 1, -1, 2),
    m!("XORW3", 3, Descriptor, Word, Op::Alu3(ArithKind::Xor), 0, 1, -1, 2),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("XORH3", 3, Descriptor, Half, Op::Alu3(ArithKind::Xor), 0, 1, -1, 2),
    m!("XORB3", 3, Descriptor, Byte, Op::Alu3(ArithKind::Xor), 0, 1, -1, 2),
    m!("ANDW3", 3, Descriptor, Word, Op::Alu3(ArithKind::And), 0, 1, -1, 2),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("ANDH3", 3, Descriptor, Half, Op::Alu3(ArithKind::And), 0, 1, -1, 2),
    m!("ANDB3", 3, Descriptor, Byte, Op::Alu3(ArithKind::And), 0, 1, -1, 2),
    m!("SUBW3", 3, Descriptor, Word, Op::Alu3(ArithKind::Sub), 0, 1, -1, 2),
    m!("???", -1, None, NA_W, Op::Illegal, -1, -1, -1, -1),
    m!("SUBH3", 3, Descriptor, Half, Op::Alu3(ArithKind::Sub), 0, 1, -1, 2),
    m!("SUBB3", 3, Descriptor, Byte, Op::Alu3(ArithKind::Sub), 0, 1, -1, 2),
];

/// Two-byte ("0x30" prefixed) opcode table (spec §6 "Two-byte
/// instructions"). Keyed by the full `0x30xx` hword value.
pub static HWORD_OPS: [(u16, &str, i8, EncodingShape, OpWidth, Op); 11] = [
    (0x3009, "MVERNO", 0, None, NA_W, Op::Mverno),
    (0x300d, "ENBVJMP", 0, None, NA_W, Op::EnbVjmp),
    (0x3013, "DISVJMP", 0, None, NA_W, Op::DisVjmp),
    (0x3019, "MOVBLW", 0, None, NA_W, Op::MovBlw),
    (0x301f, "STREND", 0, None, NA_W, Op::StrEnd),
    (0x302f, "INTACK", 1, Descriptor, Word, Op::IntAck),
    (0x3035, "STRCPY", 0, None, NA_W, Op::StrCpy),
    (0x3045, "RETG", 0, None, NA_W, Op::RetG),
    (0x3061, "GATE", 0, None, NA_W, Op::Gate),
    (0x30ac, "CALLPS", 0, None, NA_W, Op::CallPs),
    (0x30c8, "RETPS", 0, None, NA_W, Op::RetPs),
];

pub fn lookup_hword(code: u16) -> Option<&'static (u16, &'static str, i8, EncodingShape, OpWidth, Op)> {
    HWORD_OPS.iter().find(|entry| entry.0 == code)
}
