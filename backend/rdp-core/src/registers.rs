//! RDP render state registers that the caches read from

use crate::num::GetBit;
use bincode::{Decode, Encode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum CycleType {
    #[default]
    OneCycle = 0,
    TwoCycle = 1,
    Copy = 2,
    Fill = 3,
}

impl CycleType {
    #[must_use]
    pub fn from_bits(bits: u32) -> Self {
        match bits & 3 {
            0 => Self::OneCycle,
            1 => Self::TwoCycle,
            2 => Self::Copy,
            3 => Self::Fill,
            _ => unreachable!("value & 3 is always <= 3"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum TlutMode {
    #[default]
    None,
    Rgba16,
    Ia16,
}

impl TlutMode {
    #[must_use]
    pub fn from_bits(bits: u32) -> Self {
        match bits & 3 {
            // 1 is not a valid hardware setting; treat it the same as disabled
            0 | 1 => Self::None,
            2 => Self::Rgba16,
            3 => Self::Ia16,
            _ => unreachable!("value & 3 is always <= 3"),
        }
    }

    #[must_use]
    pub fn to_bits(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Rgba16 => 2,
            Self::Ia16 => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum TexelFormat {
    #[default]
    Rgba,
    Yuv,
    ColorIndex,
    IntensityAlpha,
    Intensity,
}

impl TexelFormat {
    #[must_use]
    pub fn from_bits(bits: u32) -> Self {
        match bits & 7 {
            0 => Self::Rgba,
            1 => Self::Yuv,
            2 => Self::ColorIndex,
            3 => Self::IntensityAlpha,
            // 5-7 are undefined; hardware decodes them as I
            _ => Self::Intensity,
        }
    }

    #[must_use]
    pub fn to_bits(self) -> u8 {
        match self {
            Self::Rgba => 0,
            Self::Yuv => 1,
            Self::ColorIndex => 2,
            Self::IntensityAlpha => 3,
            Self::Intensity => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Encode, Decode)]
pub enum TexelSize {
    #[default]
    Four = 0,
    Eight = 1,
    Sixteen = 2,
    ThirtyTwo = 3,
}

impl TexelSize {
    #[must_use]
    pub fn from_bits(bits: u32) -> Self {
        match bits & 3 {
            0 => Self::Four,
            1 => Self::Eight,
            2 => Self::Sixteen,
            3 => Self::ThirtyTwo,
            _ => unreachable!("value & 3 is always <= 3"),
        }
    }

    #[inline]
    #[must_use]
    pub fn shift(self) -> u32 {
        self as u32
    }

    /// Bytes occupied by `texels` texels of this size, rounded up to a whole byte
    #[inline]
    #[must_use]
    pub fn bytes_for(self, texels: u32) -> u32 {
        ((texels << self.shift()) + 1) >> 1
    }
}

/// Blender mux inputs for one cycle: P*A + M*B
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlenderCycle {
    pub m1a: u8,
    pub m1b: u8,
    pub m2a: u8,
    pub m2b: u8,
}

/// Raw SetOtherMode state; `h` is the high word and `l` is the low word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub struct OtherMode {
    pub h: u32,
    pub l: u32,
}

impl OtherMode {
    pub const G_AC_THRESHOLD: u32 = 1;

    #[must_use]
    pub fn new(h: u32, l: u32) -> Self {
        Self { h, l }
    }

    #[inline]
    #[must_use]
    pub fn cycle_type(self) -> CycleType {
        CycleType::from_bits(self.h.bits(20..=21))
    }

    /// Texture filter conversion bits: bit 0 is `bi_lerp1`, bit 1 is `bi_lerp0`
    #[inline]
    #[must_use]
    pub fn bilerp(self) -> u32 {
        self.h.bits(10..=11)
    }

    #[inline]
    #[must_use]
    pub fn tlut_mode(self) -> TlutMode {
        TlutMode::from_bits(self.h.bits(14..=15))
    }

    #[inline]
    #[must_use]
    pub fn alpha_compare(self) -> u32 {
        self.l.bits(0..=1)
    }

    #[inline]
    #[must_use]
    pub fn cvg_x_alpha(self) -> bool {
        self.l.bit(12)
    }

    #[inline]
    #[must_use]
    pub fn force_blender(self) -> bool {
        self.l.bit(14)
    }

    #[inline]
    #[must_use]
    pub fn blender_cycle_1(self) -> BlenderCycle {
        BlenderCycle {
            m1a: self.l.bits(30..=31) as u8,
            m1b: self.l.bits(26..=27) as u8,
            m2a: self.l.bits(22..=23) as u8,
            m2b: self.l.bits(18..=19) as u8,
        }
    }

    #[inline]
    #[must_use]
    pub fn blender_cycle_2(self) -> BlenderCycle {
        BlenderCycle {
            m1a: self.l.bits(28..=29) as u8,
            m1b: self.l.bits(24..=25) as u8,
            m2a: self.l.bits(20..=21) as u8,
            m2b: self.l.bits(16..=17) as u8,
        }
    }

    /// Replace the blender mux fields for both cycles
    #[must_use]
    pub fn with_blender(mut self, cycle_1: BlenderCycle, cycle_2: BlenderCycle) -> Self {
        let c1 = (u32::from(cycle_1.m1a & 3) << 30)
            | (u32::from(cycle_1.m1b & 3) << 26)
            | (u32::from(cycle_1.m2a & 3) << 22)
            | (u32::from(cycle_1.m2b & 3) << 18);
        let c2 = (u32::from(cycle_2.m1a & 3) << 28)
            | (u32::from(cycle_2.m1b & 3) << 24)
            | (u32::from(cycle_2.m2a & 3) << 20)
            | (u32::from(cycle_2.m2b & 3) << 16);
        self.l = (self.l & 0xFFFF) | c1 | c2;
        self
    }

    #[must_use]
    pub fn with_cycle_type(mut self, cycle_type: CycleType) -> Self {
        self.h = (self.h & !(3 << 20)) | ((cycle_type as u32) << 20);
        self
    }

    #[must_use]
    pub fn with_force_blender(mut self, force_blender: bool) -> Self {
        self.l = (self.l & !(1 << 14)) | (u32::from(force_blender) << 14);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blender_fields_round_trip_through_low_word() {
        let c1 = BlenderCycle { m1a: 3, m1b: 2, m2a: 1, m2b: 0 };
        let c2 = BlenderCycle { m1a: 0, m1b: 1, m2a: 2, m2b: 3 };
        let mode = OtherMode::new(0, 0x0000_4001).with_blender(c1, c2);

        assert_eq!(c1, mode.blender_cycle_1());
        assert_eq!(c2, mode.blender_cycle_2());
        assert!(mode.force_blender());
        assert_eq!(1, mode.alpha_compare());
    }

    #[test]
    fn high_word_fields() {
        // 2-cycle, RGBA16 TLUT, bi_lerp0 set
        let mode = OtherMode::new((1 << 20) | (2 << 14) | (1 << 11), 0);
        assert_eq!(CycleType::TwoCycle, mode.cycle_type());
        assert_eq!(TlutMode::Rgba16, mode.tlut_mode());
        assert_eq!(0b10, mode.bilerp());

        let mode = mode.with_cycle_type(CycleType::Fill);
        assert_eq!(CycleType::Fill, mode.cycle_type());
        assert_eq!(TlutMode::Rgba16, mode.tlut_mode());
    }

    #[test]
    fn texel_size_bytes() {
        assert_eq!(2, TexelSize::Four.bytes_for(4));
        assert_eq!(3, TexelSize::Four.bytes_for(5));
        assert_eq!(8, TexelSize::Sixteen.bytes_for(4));
        assert_eq!(16, TexelSize::ThirtyTwo.bytes_for(4));
    }
}
