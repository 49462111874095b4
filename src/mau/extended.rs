//! The extended-precision (80-bit) working format (spec §4.3 "Data
//! formats").
//!
//! Every register holds a sign bit, an unbiased binary exponent, and a
//! 64-bit explicit-integer-bit significand (mirroring the WE32106's
//! 1-15-64 layout). Arithmetic (`add`/`sub`/`mul`/`div`/`sqrt`/`rem`)
//! works entirely on these integer fields — aligning, multiplying, and
//! dividing the raw significands with `u128` intermediates and rounding
//! the result with explicit guard/round/sticky bits — rather than
//! promoting through the host's hardware `f64`, which cannot carry the
//! format's 15-bit exponent range or its "unused" 16 bits bit-for-bit
//! (spec §4.3, "Bit-exact float arithmetic"). The 16 unused bits above
//! sign+exponent are still carried through word-transfers untouched.

use crate::mau::RoundMode;

const EXTENDED_BIAS: i32 = 16383;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Class {
    Zero,
    Finite,
    Infinite,
    Nan,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtendedFloat {
    pub sign: bool,
    pub(crate) class: Class,
    /// Unbiased exponent such that the represented value is
    /// `mantissa * 2^(exponent - 63)`. Meaningless for Zero/Infinite/Nan.
    pub(crate) exponent: i32,
    /// Explicit-integer-bit significand; bit 63 is set for every
    /// normalized finite nonzero value.
    pub(crate) mantissa: u64,
    pub nan_is_signaling: bool,
    /// 16 bits above sign+exponent that arithmetic never touches.
    pub unused: u16,
}

/// Flags an arithmetic primitive wants latched into the MAU's sticky
/// register; overflow/underflow are detected at format-narrowing time
/// instead, since extended's own exponent range is never exceeded here.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArithFlags {
    pub invalid: bool,
    pub divide_by_zero: bool,
    pub inexact: bool,
}

#[derive(Clone, Copy)]
struct Residue {
    guard: bool,
    sticky: bool,
}

impl Residue {
    const NONE: Residue = Residue { guard: false, sticky: false };

    fn nonzero(self) -> bool {
        self.guard || self.sticky
    }
}

fn extract_residue(remainder: u128, shift: u32) -> Residue {
    if shift == 0 {
        return Residue::NONE;
    }
    let guard_bit = 1u128 << (shift - 1);
    Residue { guard: remainder & guard_bit != 0, sticky: remainder & (guard_bit - 1) != 0 }
}

/// Rounds a 64-bit significand per `mode`, given the bits that were
/// shifted out of it. Returns the rounded significand and whether any
/// discarded bits were nonzero (Inexact).
fn round_mantissa(mantissa: u64, residue: Residue, sign: bool, mode: RoundMode) -> (u64, bool) {
    let inexact = residue.nonzero();
    let round_up = match mode {
        RoundMode::NearestEven => residue.guard && (residue.sticky || mantissa & 1 != 0),
        RoundMode::TowardZero => false,
        RoundMode::TowardPositive => inexact && !sign,
        RoundMode::TowardNegative => inexact && sign,
    };
    (if round_up { mantissa.wrapping_add(1) } else { mantissa }, inexact)
}

/// Normalizes a raw significand so its value is `mantissa * 2^(exponent
/// - 63)`, returning the shifted-out guard/sticky bits.
fn normalize(mut mantissa: u64, mut exponent: i32) -> (u64, i32, bool) {
    if mantissa == 0 {
        return (0, 0, true);
    }
    let shift = mantissa.leading_zeros();
    mantissa <<= shift;
    exponent -= shift as i32;
    (mantissa, exponent, false)
}

/// Normalizes a wide (up to 128-bit) intermediate `w`, where the true
/// value is `w * 2^exp_of_bit0`, into a 64-bit significand plus residue.
fn normalize_wide(w: u128, exp_of_bit0: i32) -> (u64, i32, bool, Residue) {
    if w == 0 {
        return (0, 0, true, Residue::NONE);
    }
    let top = 127 - w.leading_zeros() as i32;
    if top >= 63 {
        let shift = (top - 63) as u32;
        let mantissa = (w >> shift) as u64;
        let remainder = w & ((1u128 << shift) - 1);
        (mantissa, exp_of_bit0 + top, false, extract_residue(remainder, shift))
    } else {
        let shift = (63 - top) as u32;
        let mantissa = (w as u64) << shift;
        (mantissa, exp_of_bit0 + top, false, Residue::NONE)
    }
}

/// Digit-by-digit integer square root: returns `(floor(sqrt(x)), x -
/// floor(sqrt(x))^2)`.
fn isqrt_u128(x: u128) -> (u64, u128) {
    if x == 0 {
        return (0, 0);
    }
    let mut bit: u128 = 1u128 << 126;
    while bit > x {
        bit >>= 2;
    }
    let mut remainder = x;
    let mut result: u128 = 0;
    while bit != 0 {
        if remainder >= result + bit {
            remainder -= result + bit;
            result = (result >> 1) + bit;
        } else {
            result >>= 1;
        }
        bit >>= 2;
    }
    (result as u64, remainder)
}

impl ExtendedFloat {
    pub const ZERO: ExtendedFloat =
        ExtendedFloat { sign: false, class: Class::Zero, exponent: 0, mantissa: 0, nan_is_signaling: false, unused: 0 };

    fn finite(sign: bool, exponent: i32, mantissa: u64) -> Self {
        let (mantissa, exponent, is_zero) = normalize(mantissa, exponent);
        if is_zero {
            ExtendedFloat { sign, ..ExtendedFloat::ZERO }
        } else {
            ExtendedFloat { sign, class: Class::Finite, exponent, mantissa, nan_is_signaling: false, unused: 0 }
        }
    }

    pub fn infinity(sign: bool) -> Self {
        ExtendedFloat { sign, class: Class::Infinite, exponent: 0, mantissa: 0, nan_is_signaling: false, unused: 0 }
    }

    pub fn quiet_nan() -> Self {
        ExtendedFloat { sign: false, class: Class::Nan, exponent: 0, mantissa: 1 << 62, nan_is_signaling: false, unused: 0 }
    }

    pub fn signaling_nan() -> Self {
        ExtendedFloat { sign: false, class: Class::Nan, exponent: 0, mantissa: 1 << 61, nan_is_signaling: true, unused: 0 }
    }

    pub fn is_zero(self) -> bool {
        matches!(self.class, Class::Zero)
    }

    pub fn is_nan(self) -> bool {
        matches!(self.class, Class::Nan)
    }

    pub fn is_infinite(self) -> bool {
        matches!(self.class, Class::Infinite)
    }

    pub fn is_negative(self) -> bool {
        self.sign
    }

    pub(crate) fn nan_payload(self) -> u64 {
        self.mantissa
    }

    pub fn neg(self) -> Self {
        ExtendedFloat { sign: !self.sign, ..self }
    }

    pub fn abs(self) -> Self {
        ExtendedFloat { sign: false, ..self }
    }

    pub fn equals(self, rhs: Self) -> bool {
        if self.is_nan() || rhs.is_nan() {
            return false;
        }
        if self.is_zero() && rhs.is_zero() {
            return true;
        }
        self.sign == rhs.sign
            && self.is_infinite() == rhs.is_infinite()
            && self.exponent == rhs.exponent
            && self.mantissa == rhs.mantissa
    }

    fn magnitude_less_than(self, rhs: Self) -> bool {
        if self.is_zero() {
            return !rhs.is_zero();
        }
        if rhs.is_zero() {
            return false;
        }
        if self.is_infinite() {
            return false;
        }
        if rhs.is_infinite() {
            return true;
        }
        (self.exponent, self.mantissa) < (rhs.exponent, rhs.mantissa)
    }

    pub fn less_than(self, rhs: Self) -> bool {
        if self.is_nan() || rhs.is_nan() || self.equals(rhs) {
            return false;
        }
        match (self.sign, rhs.sign) {
            (true, false) => true,
            (false, true) => false,
            (false, false) => self.magnitude_less_than(rhs),
            (true, true) => rhs.magnitude_less_than(self),
        }
    }

    pub fn from_i64(value: i64) -> Self {
        if value == 0 {
            return ExtendedFloat::ZERO;
        }
        let sign = value < 0;
        let magnitude = value.unsigned_abs();
        let shift = magnitude.leading_zeros();
        ExtendedFloat::finite(sign, 63 - shift as i32, magnitude << shift)
    }

    /// Rounds toward an integer value per `mode`, returning the exact
    /// (unsaturated) result as `i128` plus whether rounding was inexact.
    fn round_to_i128(self, mode: RoundMode) -> (i128, bool) {
        if !matches!(self.class, Class::Finite) {
            return (0, false);
        }
        if self.exponent >= 63 {
            let shift = (self.exponent - 63) as u32;
            let magnitude = (self.mantissa as i128) << shift;
            return (if self.sign { -magnitude } else { magnitude }, false);
        }
        let shift = (63 - self.exponent) as u32;
        if shift >= 64 {
            let inexact = self.mantissa != 0;
            let round_up = match mode {
                RoundMode::NearestEven | RoundMode::TowardZero => false,
                RoundMode::TowardPositive => inexact && !self.sign,
                RoundMode::TowardNegative => inexact && self.sign,
            };
            let v = round_up as i128;
            return (if self.sign { -v } else { v }, inexact);
        }
        let whole = (self.mantissa >> shift) as i128;
        let remainder = self.mantissa & ((1u64 << shift) - 1);
        let halfway = 1u64 << (shift - 1);
        let guard = remainder & halfway != 0;
        let sticky = remainder & (halfway - 1) != 0;
        let inexact = remainder != 0;
        let round_up = match mode {
            RoundMode::NearestEven => guard && (sticky || whole & 1 != 0),
            RoundMode::TowardZero => false,
            RoundMode::TowardPositive => inexact && !self.sign,
            RoundMode::TowardNegative => inexact && self.sign,
        };
        let whole = if round_up { whole + 1 } else { whole };
        (if self.sign { -whole } else { whole }, inexact)
    }

    /// Rounds to the nearest representable integer-valued float (Rtoi).
    pub fn round_to_integer(self, mode: RoundMode) -> (Self, bool) {
        match self.class {
            Class::Zero | Class::Infinite | Class::Nan => (self, false),
            Class::Finite => {
                let (v, inexact) = self.round_to_i128(mode);
                if v == 0 {
                    return (ExtendedFloat { sign: self.sign, ..ExtendedFloat::ZERO }, inexact);
                }
                (ExtendedFloat::from_i64(v.clamp(i64::MIN as i128, i64::MAX as i128) as i64), inexact)
            }
        }
    }

    pub fn to_i32_saturating(self, mode: RoundMode) -> (i32, bool, bool) {
        match self.class {
            Class::Nan | Class::Infinite => (if self.sign { i32::MIN } else { i32::MAX }, true, true),
            Class::Zero => (0, false, false),
            Class::Finite => {
                let (v, inexact) = self.round_to_i128(mode);
                if v > i32::MAX as i128 || v < i32::MIN as i128 {
                    (if self.sign { i32::MIN } else { i32::MAX }, true, true)
                } else {
                    (v as i32, inexact, false)
                }
            }
        }
    }

    pub fn to_i64_saturating(self, mode: RoundMode) -> (i64, bool, bool) {
        match self.class {
            Class::Nan | Class::Infinite => (if self.sign { i64::MIN } else { i64::MAX }, true, true),
            Class::Zero => (0, false, false),
            Class::Finite => {
                let (v, inexact) = self.round_to_i128(mode);
                if v > i64::MAX as i128 || v < i64::MIN as i128 {
                    (if self.sign { i64::MIN } else { i64::MAX }, true, true)
                } else {
                    (v as i64, inexact, false)
                }
            }
        }
    }

    pub fn add(self, rhs: Self, mode: RoundMode) -> (Self, ArithFlags) {
        self.add_sub(rhs, false, mode)
    }

    pub fn sub(self, rhs: Self, mode: RoundMode) -> (Self, ArithFlags) {
        self.add_sub(rhs, true, mode)
    }

    fn add_sub(self, rhs: Self, negate_rhs: bool, mode: RoundMode) -> (Self, ArithFlags) {
        let mut flags = ArithFlags::default();
        let rhs = ExtendedFloat { sign: rhs.sign ^ negate_rhs, ..rhs };

        if self.is_infinite() || rhs.is_infinite() {
            return match (self.is_infinite(), rhs.is_infinite()) {
                (true, true) if self.sign != rhs.sign => {
                    flags.invalid = true;
                    (ExtendedFloat::quiet_nan(), flags)
                }
                (true, _) => (ExtendedFloat::infinity(self.sign), flags),
                _ => (ExtendedFloat::infinity(rhs.sign), flags),
            };
        }
        if self.is_zero() && rhs.is_zero() {
            let sign = if self.sign == rhs.sign { self.sign } else { mode == RoundMode::TowardNegative };
            return (ExtendedFloat { sign, ..ExtendedFloat::ZERO }, flags);
        }
        if self.is_zero() {
            return (rhs, flags);
        }
        if rhs.is_zero() {
            return (self, flags);
        }

        let (hi, lo) = if self.exponent >= rhs.exponent { (self, rhs) } else { (rhs, self) };
        let shift = (hi.exponent - lo.exponent) as u32;
        let hi_wide = (hi.mantissa as u128) << 64;
        let lo_wide = (lo.mantissa as u128) << 64;
        let mut lo_shifted = if shift >= 128 { 0 } else { lo_wide >> shift };
        let sticky_lost = if shift == 0 {
            false
        } else if shift >= 128 {
            lo_wide != 0
        } else {
            (lo_wide << (128 - shift)) != 0
        };
        if sticky_lost {
            lo_shifted |= 1;
        }

        let (w, exp_of_bit0, sign) = if hi.sign == lo.sign {
            let (sum, carry) = hi_wide.overflowing_add(lo_shifted);
            if carry {
                let dropped = sum & 1;
                let mut w = (sum >> 1) | (1u128 << 127);
                if dropped != 0 {
                    w |= 1;
                }
                (w, hi.exponent - 127 + 1, hi.sign)
            } else {
                (sum, hi.exponent - 127, hi.sign)
            }
        } else if hi_wide >= lo_shifted {
            (hi_wide - lo_shifted, hi.exponent - 127, hi.sign)
        } else {
            (lo_shifted - hi_wide, hi.exponent - 127, lo.sign)
        };

        let (mantissa, exponent, is_zero, residue) = normalize_wide(w, exp_of_bit0);
        if is_zero {
            let zero_sign = mode == RoundMode::TowardNegative;
            return (ExtendedFloat { sign: zero_sign, ..ExtendedFloat::ZERO }, flags);
        }
        let (rounded, inexact) = round_mantissa(mantissa, residue, sign, mode);
        flags.inexact = inexact;
        let result = if rounded < mantissa {
            ExtendedFloat::finite(sign, exponent + 1, 1u64 << 63)
        } else {
            ExtendedFloat::finite(sign, exponent, rounded)
        };
        (result, flags)
    }

    pub fn mul(self, rhs: Self, mode: RoundMode) -> (Self, ArithFlags) {
        let mut flags = ArithFlags::default();
        let sign = self.sign ^ rhs.sign;
        if self.is_infinite() || rhs.is_infinite() {
            if self.is_zero() || rhs.is_zero() {
                flags.invalid = true;
                return (ExtendedFloat::quiet_nan(), flags);
            }
            return (ExtendedFloat::infinity(sign), flags);
        }
        if self.is_zero() || rhs.is_zero() {
            return (ExtendedFloat { sign, ..ExtendedFloat::ZERO }, flags);
        }
        let product = (self.mantissa as u128) * (rhs.mantissa as u128);
        let exp_of_bit0 = self.exponent + rhs.exponent - 126;
        let (mantissa, exponent, is_zero, residue) = normalize_wide(product, exp_of_bit0);
        if is_zero {
            return (ExtendedFloat { sign, ..ExtendedFloat::ZERO }, flags);
        }
        let (rounded, inexact) = round_mantissa(mantissa, residue, sign, mode);
        flags.inexact = inexact;
        let result = if rounded < mantissa {
            ExtendedFloat::finite(sign, exponent + 1, 1u64 << 63)
        } else {
            ExtendedFloat::finite(sign, exponent, rounded)
        };
        (result, flags)
    }

    pub fn div(self, rhs: Self, mode: RoundMode) -> (Self, ArithFlags) {
        let mut flags = ArithFlags::default();
        let sign = self.sign ^ rhs.sign;
        if self.is_infinite() && rhs.is_infinite() {
            flags.invalid = true;
            return (ExtendedFloat::quiet_nan(), flags);
        }
        if self.is_infinite() {
            return (ExtendedFloat::infinity(sign), flags);
        }
        if rhs.is_infinite() {
            return (ExtendedFloat { sign, ..ExtendedFloat::ZERO }, flags);
        }
        if rhs.is_zero() {
            flags.divide_by_zero = true;
            return (ExtendedFloat::infinity(sign), flags);
        }
        if self.is_zero() {
            return (ExtendedFloat { sign, ..ExtendedFloat::ZERO }, flags);
        }
        let numerator = (self.mantissa as u128) << 64;
        let divisor = rhs.mantissa as u128;
        let mut quotient = numerator / divisor;
        if numerator % divisor != 0 {
            quotient |= 1;
        }
        let exp_of_bit0 = self.exponent - rhs.exponent - 64;
        let (mantissa, exponent, is_zero, residue) = normalize_wide(quotient, exp_of_bit0);
        if is_zero {
            return (ExtendedFloat { sign, ..ExtendedFloat::ZERO }, flags);
        }
        let (rounded, inexact) = round_mantissa(mantissa, residue, sign, mode);
        flags.inexact = inexact;
        let result = if rounded < mantissa {
            ExtendedFloat::finite(sign, exponent + 1, 1u64 << 63)
        } else {
            ExtendedFloat::finite(sign, exponent, rounded)
        };
        (result, flags)
    }

    pub fn rem(self, rhs: Self, mode: RoundMode) -> (Self, ArithFlags) {
        let mut flags = ArithFlags::default();
        if self.is_infinite() || rhs.is_zero() {
            flags.invalid = true;
            return (ExtendedFloat::quiet_nan(), flags);
        }
        if rhs.is_infinite() || self.is_zero() {
            return (ExtendedFloat { sign: self.sign, ..self }, flags);
        }
        let (q, _) = self.div(rhs, RoundMode::TowardZero);
        let (q_int, _) = q.round_to_integer(RoundMode::TowardZero);
        let (prod, _) = q_int.mul(rhs, RoundMode::TowardZero);
        let (result, sub_flags) = self.sub(prod, mode);
        flags.inexact = sub_flags.inexact;
        (ExtendedFloat { sign: result.sign, ..result }, flags)
    }

    pub fn sqrt(self, mode: RoundMode) -> (Self, ArithFlags) {
        let mut flags = ArithFlags::default();
        if self.sign && !self.is_zero() {
            flags.invalid = true;
            return (ExtendedFloat::quiet_nan(), flags);
        }
        if self.is_zero() || self.is_infinite() {
            return (self, flags);
        }
        let p = self.exponent - 63;
        let (shifted, a) = if p.rem_euclid(2) == 0 { ((self.mantissa as u128) << 64, 64i32) } else { ((self.mantissa as u128) << 63, 63i32) };
        let b = (p - a) / 2;
        let (s, remainder) = isqrt_u128(shifted);
        let inexact = remainder != 0;
        let round_up = match mode {
            RoundMode::NearestEven => inexact && (2 * remainder > 2 * (s as u128) + 1),
            RoundMode::TowardZero | RoundMode::TowardNegative => false,
            RoundMode::TowardPositive => inexact,
        };
        flags.inexact = inexact;
        let (mantissa, exponent) = if round_up && s == u64::MAX { (1u64 << 63, b + 1) } else if round_up { (s + 1, b) } else { (s, b) };
        (ExtendedFloat::finite(false, exponent + 63, mantissa), flags)
    }

    /// From a single-precision (32-bit) IEEE-754 word (spec §4.3 "Data
    /// formats": "Single (32b: 1-8-23)").
    pub fn from_single_bits(bits: u32) -> Self {
        decode_ieee(bits as u64, 8, 23, 127)
    }

    pub fn to_single_bits(self) -> u32 {
        encode_ieee(self, 8, 23, 127) as u32
    }

    /// From a double-precision (64-bit) IEEE-754 word, spec §4.3 "Double
    /// (64b: 1-11-52)".
    pub fn from_double_bits(bits: u64) -> Self {
        decode_ieee(bits, 11, 52, 1023)
    }

    pub fn to_double_bits(self) -> u64 {
        encode_ieee(self, 11, 52, 1023)
    }

    /// From the 96-bit memory encoding of extended precision: a 16-bit
    /// unused field, a 1-15 sign+exponent field, and a 64-bit explicit
    /// significand (spec §4.3 "Extended (96b stored, 1-15-64 used)").
    pub fn from_extended_words(hi: u32, mid: u32, lo: u32) -> Self {
        let unused = (hi >> 16) as u16;
        let low16 = (hi & 0xffff) as u16;
        let sign = (low16 >> 15) & 1 != 0;
        let exp_field = low16 & 0x7fff;
        let mantissa = ((mid as u64) << 32) | lo as u64;

        let mut result = if exp_field == 0x7fff {
            if mantissa == 0 {
                ExtendedFloat::infinity(sign)
            } else {
                let signaling = mantissa & (1 << 62) == 0;
                ExtendedFloat { sign, class: Class::Nan, exponent: 0, mantissa, nan_is_signaling: signaling, unused: 0 }
            }
        } else if exp_field == 0 {
            if mantissa == 0 {
                ExtendedFloat { sign, ..ExtendedFloat::ZERO }
            } else {
                ExtendedFloat::finite(sign, 1 - EXTENDED_BIAS, mantissa)
            }
        } else {
            ExtendedFloat::finite(sign, exp_field as i32 - EXTENDED_BIAS, mantissa)
        };
        result.unused = unused;
        result
    }

    pub fn to_extended_words(self) -> (u32, u32, u32) {
        let sign_bit = (self.sign as u32) << 15;
        let (exp_field, mantissa): (u32, u64) = match self.class {
            Class::Zero => (0, 0),
            Class::Infinite => (0x7fff, 0),
            Class::Nan => (0x7fff, if self.mantissa == 0 { 1 << 62 } else { self.mantissa }),
            Class::Finite => {
                let e = self.exponent + EXTENDED_BIAS;
                if e <= 0 {
                    (0, 0)
                } else if e >= 0x7fff {
                    (0x7fff, 0)
                } else {
                    (e as u32, self.mantissa)
                }
            }
        };
        let hi = ((self.unused as u32) << 16) | sign_bit | exp_field;
        ((hi), (mantissa >> 32) as u32, mantissa as u32)
    }
}

fn decode_ieee(bits: u64, exp_width: u32, frac_width: u32, bias: i32) -> ExtendedFloat {
    let total = 1 + exp_width + frac_width;
    let sign = (bits >> (total - 1)) & 1 != 0;
    let exp_mask = (1u64 << exp_width) - 1;
    let exp_field = (bits >> frac_width) & exp_mask;
    let frac_mask = (1u64 << frac_width) - 1;
    let frac = bits & frac_mask;

    if exp_field == exp_mask {
        if frac == 0 {
            return ExtendedFloat::infinity(sign);
        }
        let signaling = frac & (1 << (frac_width - 1)) == 0;
        return ExtendedFloat {
            sign,
            class: Class::Nan,
            exponent: 0,
            mantissa: frac << (64 - frac_width),
            nan_is_signaling: signaling,
            unused: 0,
        };
    }
    if exp_field == 0 {
        if frac == 0 {
            return ExtendedFloat { sign, ..ExtendedFloat::ZERO };
        }
        return ExtendedFloat::finite(sign, 1 - bias, frac << (64 - frac_width));
    }
    let mantissa = (1u64 << 63) | (frac << (64 - frac_width - 1));
    ExtendedFloat::finite(sign, exp_field as i32 - bias, mantissa)
}

fn round_shift_right(mantissa: u64, shift: u32) -> u64 {
    if shift == 0 {
        return mantissa;
    }
    if shift >= 64 {
        return 0;
    }
    let quotient = mantissa >> shift;
    let remainder = mantissa & ((1u64 << shift) - 1);
    let half = 1u64 << (shift - 1);
    let guard = remainder & half != 0;
    let sticky = remainder & (half - 1) != 0;
    if guard && (sticky || quotient & 1 != 0) { quotient + 1 } else { quotient }
}

fn encode_ieee(value: ExtendedFloat, exp_width: u32, frac_width: u32, bias: i32) -> u64 {
    let total = 1 + exp_width + frac_width;
    let sign_bit = (value.sign as u64) << (total - 1);
    let exp_all_ones = (1u64 << exp_width) - 1;
    match value.class {
        Class::Zero => sign_bit,
        Class::Infinite => sign_bit | (exp_all_ones << frac_width),
        Class::Nan => {
            let quiet_bit = if value.nan_is_signaling { 0 } else { 1u64 << (frac_width - 1) };
            let mut payload = value.mantissa >> (64 - frac_width);
            if value.nan_is_signaling && payload == 0 {
                payload = 1;
            }
            sign_bit | (exp_all_ones << frac_width) | quiet_bit | (payload & (exp_all_ones >> 1))
        }
        Class::Finite => {
            let max_unbiased = (1i32 << exp_width) - 2 - bias;
            let min_unbiased = 1 - bias;
            if value.exponent > max_unbiased {
                return sign_bit | (exp_all_ones << frac_width);
            }
            if value.exponent < min_unbiased {
                return sign_bit;
            }
            let shift = 63 - frac_width;
            let r = round_shift_right(value.mantissa, shift);
            let mut exponent = value.exponent;
            let frac = if r == 1u64 << (frac_width + 1) {
                exponent += 1;
                if exponent > max_unbiased {
                    return sign_bit | (exp_all_ones << frac_width);
                }
                0
            } else {
                r & ((1u64 << frac_width) - 1)
            };
            let exp_field = (exponent + bias) as u64;
            sign_bit | (exp_field << frac_width) | frac
        }
    }
}

impl Default for ExtendedFloat {
    fn default() -> Self {
        Self::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_round_trip_preserves_value() {
        let ext = ExtendedFloat::from_single_bits(1.5f32.to_bits());
        assert_eq!(f32::from_bits(ext.to_single_bits()), 1.5);
    }

    #[test]
    fn quiet_vs_signaling_nan_distinguished_by_bit() {
        let signaling_bits = 0x7f80_0001u32;
        let quiet_bits = 0x7fc0_0001u32;
        assert!(ExtendedFloat::from_single_bits(signaling_bits).nan_is_signaling);
        assert!(!ExtendedFloat::from_single_bits(quiet_bits).nan_is_signaling);
    }

    #[test]
    fn add_matches_known_sum() {
        let a = ExtendedFloat::from_single_bits(1.5f32.to_bits());
        let b = ExtendedFloat::from_single_bits(1.25f32.to_bits());
        let (sum, flags) = a.add(b, RoundMode::NearestEven);
        assert_eq!(f32::from_bits(sum.to_single_bits()), 2.75);
        assert!(!flags.inexact);
    }

    #[test]
    fn sub_cancels_to_zero() {
        let a = ExtendedFloat::from_i64(7);
        let (result, _) = a.sub(a, RoundMode::NearestEven);
        assert!(result.is_zero());
    }

    #[test]
    fn mul_matches_known_product() {
        let a = ExtendedFloat::from_i64(6);
        let b = ExtendedFloat::from_i64(7);
        let (result, _) = a.mul(b, RoundMode::NearestEven);
        assert_eq!(result.round_to_i128(RoundMode::NearestEven).0, 42);
    }

    #[test]
    fn div_matches_known_quotient() {
        let a = ExtendedFloat::from_i64(10);
        let b = ExtendedFloat::from_i64(4);
        let (result, flags) = a.div(b, RoundMode::NearestEven);
        assert_eq!(f32::from_bits(result.to_single_bits()), 2.5);
        assert!(!flags.inexact);
    }

    #[test]
    fn sqrt_of_perfect_square_is_exact() {
        let a = ExtendedFloat::from_i64(16);
        let (result, flags) = a.sqrt(RoundMode::NearestEven);
        assert_eq!(result.round_to_i128(RoundMode::NearestEven).0, 4);
        assert!(!flags.inexact);
    }

    #[test]
    fn round_toward_positive_rounds_nonzero_residue_up() {
        let a = ExtendedFloat::from_single_bits(1.5f32.to_bits());
        let b = ExtendedFloat::from_single_bits(1.25f32.to_bits());
        let (sum, _) = a.add(b, RoundMode::TowardPositive);
        assert_eq!(f32::from_bits(sum.to_single_bits()), 2.75);

        // Toward +inf, a result that loses precision in f32 must round
        // up rather than truncate toward the nearest representable ULP.
        let big = ExtendedFloat::from_i64(1 << 30);
        let tiny = ExtendedFloat::from_single_bits(1.0f32.to_bits());
        let (sum, flags) = big.add(tiny, RoundMode::TowardPositive);
        assert!(flags.inexact);
        assert!(sum.round_to_i128(RoundMode::TowardZero).0 > 1 << 30);
    }

    #[test]
    fn extended_word_round_trip_preserves_unused_bits() {
        let mut value = ExtendedFloat::from_i64(-42);
        value.unused = 0xBEEF;
        let (hi, mid, lo) = value.to_extended_words();
        let round_tripped = ExtendedFloat::from_extended_words(hi, mid, lo);
        assert_eq!(round_tripped.unused, 0xBEEF);
        assert_eq!(round_tripped.round_to_i128(RoundMode::NearestEven).0, -42);
    }
}
