//! Combiner key used to select a cached shader program
//!
//! A key combines the raw 64-bit SetCombine mux with the render mode state that changes how the
//! combiner output looks: primitive type, cycle type, texture filter, whether alpha matters, and a
//! classification of the blender setup into a handful of cheap fast paths.

use crate::registers::{BlenderCycle, CycleType, OtherMode};
use bincode::de::{BorrowDecoder, Decoder};
use bincode::enc::Encoder;
use bincode::error::{DecodeError, EncodeError};
use bincode::{BorrowDecode, Decode, Encode};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::io;

const MUX_MASK: u64 = (1 << 56) - 1;

const RECT_BIT: u32 = 56;
const CYCLE_TYPE_SHIFT: u32 = 57;
const BILERP_SHIFT: u32 = 59;
const NO_ALPHA_BIT: u32 = 61;
const FAST_PATH_SHIFT: u32 = 62;

/// Blender configurations that can be reproduced without the general blender emulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Encode, Decode)]
pub enum FastPath {
    #[default]
    Disabled = 0,
    /// Combiner output is written as-is
    Pass = 1,
    /// Standard alpha blending against memory color
    Translucent = 2,
    /// Combiner output passed through both blender cycles unchanged
    PassTwice = 3,
}

impl FastPath {
    #[must_use]
    pub fn from_bits(bits: u64) -> Self {
        match bits & 3 {
            0 => Self::Disabled,
            1 => Self::Pass,
            2 => Self::Translucent,
            3 => Self::PassTwice,
            _ => unreachable!("value & 3 is always <= 3"),
        }
    }

    fn classify(other_mode: OtherMode) -> Self {
        // P=pixel, A=pixel alpha, M=memory, B=1-A
        const TRANSLUCENT: (u8, u8, u8, u8) = (0, 0, 1, 0);
        // P=pixel, A=fog alpha, M=fog color, B=1-A
        const FOG: (u8, u8, u8, u8) = (3, 2, 0, 0);
        // P=fog color, A=shade alpha, M=pixel, B=0
        const FOG_FIRST: (u8, u8, u8, u8) = (0, 3, 0, 2);

        let fields = |cycle: BlenderCycle| (cycle.m1a, cycle.m1b, cycle.m2a, cycle.m2b);
        let force_blender = other_mode.force_blender();
        let c1 = other_mode.blender_cycle_1();
        let c2 = other_mode.blender_cycle_2();

        match other_mode.cycle_type() {
            CycleType::OneCycle => {
                if force_blender && fields(c1) == TRANSLUCENT {
                    Self::Translucent
                } else if !force_blender && c1.m1a == 0 {
                    Self::Pass
                } else {
                    Self::Disabled
                }
            }
            CycleType::TwoCycle => {
                if fields(c1) == FOG {
                    if force_blender && fields(c2) == TRANSLUCENT {
                        Self::Translucent
                    } else if !force_blender && c2.m1a == 0 {
                        Self::Pass
                    } else {
                        Self::Disabled
                    }
                } else if fields(c1) == FOG_FIRST && !force_blender && c2.m1a == 0 {
                    Self::PassTwice
                } else {
                    Self::Disabled
                }
            }
            CycleType::Copy | CycleType::Fill => Self::Disabled,
        }
    }
}

/// Render state that affects combiner output but is not part of the combine mux
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub struct RenderState {
    pub other_mode: OtherMode,
    /// Drawing a rectangle rather than a triangle
    pub rect_mode: bool,
}

/// Identifies a combiner program.
///
/// Equality, ordering, and hashing all use [`CombinerKey::packed`], which places the mode flags in
/// the otherwise-unused top byte of the mux. The packed value is also what save states store.
#[derive(Debug, Clone, Copy)]
pub struct CombinerKey {
    mux: u64,
    rect: bool,
    cycle_type: CycleType,
    bilerp: u8,
    no_alpha: bool,
    fast_path: FastPath,
}

impl CombinerKey {
    /// Key for "no combiner configured yet"
    pub const EMPTY: Self = Self {
        mux: 0,
        rect: false,
        cycle_type: CycleType::OneCycle,
        bilerp: 0,
        no_alpha: false,
        fast_path: FastPath::Disabled,
    };

    /// Unpack a key from its 64-bit packed form
    #[must_use]
    pub fn from_packed(packed: u64) -> Self {
        Self {
            mux: packed & MUX_MASK,
            rect: (packed >> RECT_BIT) & 1 != 0,
            cycle_type: CycleType::from_bits((packed >> CYCLE_TYPE_SHIFT) as u32),
            bilerp: ((packed >> BILERP_SHIFT) & 3) as u8,
            no_alpha: (packed >> NO_ALPHA_BIT) & 1 != 0,
            fast_path: FastPath::from_bits(packed >> FAST_PATH_SHIFT),
        }
    }

    /// Key from a raw mux value without consulting render state.
    ///
    /// The mux is taken as-is; any bits in its top byte read back as mode flags.
    #[must_use]
    pub fn from_mux(mux: u64) -> Self {
        Self::from_packed(mux)
    }

    /// Key for a SetCombine mux under the given render state
    #[must_use]
    pub fn with_render_state(mux: u64, state: &RenderState) -> Self {
        let other_mode = state.other_mode;
        let cycle_type = other_mode.cycle_type();

        let want_alpha = match cycle_type {
            CycleType::Fill => false,
            CycleType::OneCycle | CycleType::TwoCycle | CycleType::Copy => {
                other_mode.alpha_compare() & OtherMode::G_AC_THRESHOLD != 0
            }
        } || other_mode.cvg_x_alpha();

        let key = Self {
            mux: mux & MUX_MASK,
            rect: state.rect_mode,
            cycle_type,
            bilerp: other_mode.bilerp() as u8,
            no_alpha: !want_alpha,
            fast_path: FastPath::classify(other_mode),
        };

        log::trace!("Combiner key for mux {mux:016X}: {:016X} ({:?})", key.packed(), key.fast_path);

        key
    }

    #[must_use]
    pub fn packed(&self) -> u64 {
        self.mux
            | (u64::from(self.rect) << RECT_BIT)
            | ((self.cycle_type as u64) << CYCLE_TYPE_SHIFT)
            | (u64::from(self.bilerp & 3) << BILERP_SHIFT)
            | (u64::from(self.no_alpha) << NO_ALPHA_BIT)
            | ((self.fast_path as u64) << FAST_PATH_SHIFT)
    }

    /// The combine mux without mode flags
    #[inline]
    #[must_use]
    pub fn mux(&self) -> u64 {
        self.mux
    }

    #[inline]
    #[must_use]
    pub fn cycle_type(&self) -> CycleType {
        self.cycle_type
    }

    #[inline]
    #[must_use]
    pub fn bilerp(&self) -> u32 {
        self.bilerp.into()
    }

    #[inline]
    #[must_use]
    pub fn is_rect_key(&self) -> bool {
        self.rect
    }

    #[inline]
    #[must_use]
    pub fn no_alpha(&self) -> bool {
        self.no_alpha
    }

    #[inline]
    #[must_use]
    pub fn fast_path(&self) -> FastPath {
        self.fast_path
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packed() == 0
    }

    /// Read a packed key as 8 little-endian bytes
    ///
    /// # Errors
    ///
    /// Propagates any error from the reader, including unexpected EOF.
    pub fn read<R: io::Read>(reader: &mut R) -> io::Result<Self> {
        let mut bytes = [0; 8];
        reader.read_exact(&mut bytes)?;
        Ok(Self::from_packed(u64::from_le_bytes(bytes)))
    }

    /// Write the packed key as 8 little-endian bytes
    ///
    /// # Errors
    ///
    /// Propagates any error from the writer.
    pub fn write<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.packed().to_le_bytes())
    }
}

impl Default for CombinerKey {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl PartialEq for CombinerKey {
    fn eq(&self, other: &Self) -> bool {
        self.packed() == other.packed()
    }
}

impl Eq for CombinerKey {}

impl PartialOrd for CombinerKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CombinerKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.packed().cmp(&other.packed())
    }
}

impl Hash for CombinerKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.packed().hash(state);
    }
}

impl Encode for CombinerKey {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        self.packed().encode(encoder)
    }
}

impl<Context> Decode<Context> for CombinerKey {
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
        let packed = u64::decode(decoder)?;
        Ok(Self::from_packed(packed))
    }
}

impl<'de, Context> BorrowDecode<'de, Context> for CombinerKey {
    fn borrow_decode<D: BorrowDecoder<'de, Context = Context>>(
        decoder: &mut D,
    ) -> Result<Self, DecodeError> {
        let packed = u64::borrow_decode(decoder)?;
        Ok(Self::from_packed(packed))
    }
}
