// SPDX-FileCopyrightText: 2025 Contributors to the SH Mobile Video project.
// SPDX-License-Identifier: Apache-2.0

//! Fixed-point resize ratios for the VEU scaler.
//!
//! The VEU resizes each axis by a 4.12 fixed-point step (`mantissa.fraction`)
//! and, for exact 2x/4x/8x enlargement, by pixel repetition instead. The
//! formulas follow the SuperH hardware manual and must stay bit-exact: a
//! rounding difference moves the visible output edge.

/// One in 4.12 fixed point.
const FIXPOINT_ONE: u32 = 4096;

/// The fraction is programmed in steps of 8.
const FRACTION_MASK: u32 = !0x07;

/// Register values for one axis, recomputed on every geometry change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScaleParameters {
    /// Integer part of the resize step
    pub mantissa: u32,

    /// Fractional part of the resize step, 1/4096 units, multiple of 8
    pub fraction: u32,

    /// Pixel repeat count for 2x (1), 4x (3) and 8x (7) enlargement
    pub repeat: u32,

    /// Source extent to program for this axis, rounded up to 4 pixels
    pub adjusted_size_in: u32,
}

impl ScaleParameters {
    /// The 16-bit half of the resize-scale register (`VRFCR`) for this axis.
    pub fn scale_field(&self) -> u32 {
        ((self.mantissa << 12) | self.fraction) & 0xffff
    }

    /// The 16-bit half of the resize-clip register (`VRFSR`) for this axis.
    pub fn clip_field(&self, crop_out: u32) -> u32 {
        ((self.repeat << 12) | crop_out) & 0xffff
    }
}

/// Computes the resize registers for one axis.
///
/// `size_in` is the source extent, `size_out` the scaled extent and
/// `crop_out` the part of the scaled extent that lands on screen. All three
/// must be non-zero. Intermediates are 64-bit, so no extent overflows; the
/// caller checks that the results fit their register fields.
pub fn compute_scale(size_in: u32, size_out: u32, crop_out: u32) -> ScaleParameters {
    let adjusted_size_in =
        ((u64::from(size_in) * u64::from(crop_out)) / u64::from(size_out) + 3) & !3;
    let adjusted_size_in = u32::try_from(adjusted_size_in).unwrap_or(u32::MAX);
    let (mantissa, fraction, repeat) = scale_step(size_in, size_out, crop_out);

    ScaleParameters {
        mantissa,
        fraction,
        repeat,
        adjusted_size_in,
    }
}

fn scale_step(size_in: u32, size_out: u32, crop_out: u32) -> (u32, u32, u32) {
    if size_in == size_out {
        // A zero step disables the scaler, which would also disable cropping.
        let mantissa = u32::from(crop_out != size_out);
        return (mantissa, 0, 0);
    }

    let upscale = size_out > size_in;

    if upscale {
        let fixpoint = fixed_ratio(u64::from(size_in), u64::from(size_out));
        let mantissa = fixpoint / FIXPOINT_ONE;
        let fraction = (fixpoint % FIXPOINT_ONE) & FRACTION_MASK;

        let repeat = match fraction {
            0x800 => 1,
            0x400 => 3,
            0x200 => 7,
            _ => 0,
        };
        if repeat != 0 {
            return (mantissa, fraction, repeat);
        }
    }

    let fixpoint = fixed_ratio(u64::from(size_in.saturating_sub(1)), u64::from(size_out) + 1);
    let mantissa = fixpoint / FIXPOINT_ONE;
    let mut fraction = fixpoint % FIXPOINT_ONE;

    if fraction & 0x07 != 0 {
        fraction &= FRACTION_MASK;
        if upscale {
            fraction = fraction.wrapping_sub(8);
        } else {
            fraction += 8;
        }
    }

    (mantissa, fraction, 0)
}

/// `FIXPOINT_ONE * num / den`, saturated to `u32`.
fn fixed_ratio(num: u64, den: u64) -> u32 {
    u32::try_from(u64::from(FIXPOINT_ONE) * num / den).unwrap_or(u32::MAX)
}
