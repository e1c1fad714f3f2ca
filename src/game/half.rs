//! IEEE 754 binary16 conversion.
//!
//! The browser clients decode state packets with a hand-rolled half-float
//! parser that assumes round-toward-zero mantissa truncation, so the
//! conversion is implemented bit-by-bit here instead of going through a
//! hardware or library f16 type with a different rounding mode.

/// Encodes an f32 as a binary16 bit pattern, truncating the mantissa.
pub fn f32_to_half(value: f32) -> u16 {
    let bits = value.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    let exp = ((bits >> 23) & 0xff) as i32;
    let mantissa = bits & 0x007f_ffff;

    if exp == 0xff {
        // Infinity keeps a zero mantissa, NaN becomes quiet NaN.
        return if mantissa != 0 { sign | 0x7e00 } else { sign | 0x7c00 };
    }

    let half_exp = exp - 127 + 15;
    if half_exp >= 0x1f {
        // Overflow to infinity.
        return sign | 0x7c00;
    }
    if half_exp <= 0 {
        if half_exp < -10 {
            // Too small even for a subnormal.
            return sign;
        }
        // Subnormal: shift in the hidden bit, truncate.
        let full = mantissa | 0x0080_0000;
        let shift = 14 - half_exp;
        return sign | (full >> shift) as u16;
    }

    sign | ((half_exp as u16) << 10) | (mantissa >> 13) as u16
}

/// Decodes a binary16 bit pattern into an f32.
pub fn half_to_f32(half: u16) -> f32 {
    let sign = ((half as u32) & 0x8000) << 16;
    let exp = ((half >> 10) & 0x1f) as u32;
    let mantissa = (half & 0x03ff) as u32;

    let bits = match exp {
        0 => {
            if mantissa == 0 {
                sign
            } else {
                // Subnormal half: value = mantissa * 2^-24.
                let magnitude = mantissa as f32 * 2f32.powi(-24);
                return if sign != 0 { -magnitude } else { magnitude };
            }
        }
        0x1f => {
            if mantissa == 0 {
                sign | 0x7f80_0000
            } else {
                sign | 0x7fc0_0000
            }
        }
        _ => sign | ((exp + 112) << 23) | (mantissa << 13),
    };
    f32::from_bits(bits)
}

/// Appends a half-precision value to a packet buffer, little-endian.
pub fn push_half(buf: &mut Vec<u8>, value: f32) {
    buf.extend_from_slice(&f32_to_half(value).to_le_bytes());
}

/// Reads a little-endian half-precision value from a packet buffer.
pub fn read_half(buf: &[u8]) -> f32 {
    half_to_f32(u16::from_le_bytes([buf[0], buf[1]]))
}
