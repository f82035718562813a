//! TMEM texel decoding to RGBA8

use crate::registers::{TexelFormat, TexelSize, TlutMode};
use crate::texture::TileDescriptor;
use crate::tmem::{PALETTE_BASE, Tmem};

const RGB_5_TO_8: &[u8; 32] = &[
    0, 8, 16, 25, 33, 41, 49, 58, 66, 74, 82, 90, 99, 107, 115, 123, 132, 140, 148, 156, 165, 173,
    181, 189, 197, 206, 214, 222, 230, 239, 247, 255,
];

// 3-bit intensity in IA4
const I_3_TO_8: &[u8; 8] = &[0, 36, 73, 109, 146, 182, 219, 255];

const LOW_BANK_MASK: u32 = 0x7FF;
const HIGH_BANK: u32 = 0x800;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTexture {
    pub width: u32,
    pub height: u32,
    /// RGBA8, row-major
    pub pixels: Vec<u8>,
}

fn rgba5551(texel: u16) -> [u8; 4] {
    let r = (texel >> 11) & 0x1F;
    let g = (texel >> 6) & 0x1F;
    let b = (texel >> 1) & 0x1F;
    let a = if texel & 1 != 0 { 255 } else { 0 };
    [RGB_5_TO_8[r as usize], RGB_5_TO_8[g as usize], RGB_5_TO_8[b as usize], a]
}

fn ia16(texel: u16) -> [u8; 4] {
    let [i, a] = texel.to_be_bytes();
    [i, i, i, a]
}

fn ia8(texel: u8) -> [u8; 4] {
    let i = (texel >> 4) * 17;
    [i, i, i, (texel & 0xF) * 17]
}

fn ia4(texel: u8) -> [u8; 4] {
    let i = I_3_TO_8[usize::from((texel >> 1) & 7)];
    [i, i, i, if texel & 1 != 0 { 255 } else { 0 }]
}

fn intensity8(texel: u8) -> [u8; 4] {
    [texel; 4]
}

fn intensity4(texel: u8) -> [u8; 4] {
    [(texel & 0xF) * 17; 4]
}

fn yuv(y: u8, u: u8, v: u8) -> [u8; 4] {
    let y = f32::from(y);
    let u = f32::from(u) - 128.0;
    let v = f32::from(v) - 128.0;

    let r = y + 1.402 * v;
    let g = y - 0.344 * u - 0.714 * v;
    let b = y + 1.772 * u;
    [r.clamp(0.0, 255.0) as u8, g.clamp(0.0, 255.0) as u8, b.clamp(0.0, 255.0) as u8, 255]
}

struct TexelReader<'a> {
    tmem: &'a Tmem,
    tile: &'a TileDescriptor,
    tlut: TlutMode,
    palette: bool,
}

impl TexelReader<'_> {
    fn palette_entry(&self, index: u8) -> [u8; 4] {
        let entry = self.tmem.read_u16(PALETTE_BASE as u32 + (u32::from(index) << 3));
        match self.tlut {
            TlutMode::Ia16 => ia16(entry),
            TlutMode::Rgba16 | TlutMode::None => rgba5551(entry),
        }
    }

    // `row` is the byte address of the row start; odd rows have their 32-bit words swapped
    fn read(&self, row: u32, s: u32, odd_row: bool) -> [u8; 4] {
        let swizzle = if odd_row { 4 } else { 0 };
        let address = |byte_offset: u32| (row + byte_offset) ^ swizzle;

        match self.tile.size {
            TexelSize::Four => {
                let byte = self.tmem.read_u8(address(s >> 1));
                let texel = if s & 1 == 0 { byte >> 4 } else { byte & 0xF };
                if self.palette {
                    self.palette_entry(((self.tile.palette & 0xF) << 4) | texel)
                } else if self.tile.format == TexelFormat::IntensityAlpha {
                    ia4(texel)
                } else {
                    intensity4(texel)
                }
            }
            TexelSize::Eight => {
                let texel = self.tmem.read_u8(address(s));
                if self.palette {
                    self.palette_entry(texel)
                } else if self.tile.format == TexelFormat::IntensityAlpha {
                    ia8(texel)
                } else {
                    intensity8(texel)
                }
            }
            TexelSize::Sixteen => match self.tile.format {
                TexelFormat::Yuv => {
                    // Texel pairs share chroma: U Y0 V Y1
                    let pair = (s & !1) << 1;
                    let u = self.tmem.read_u8(address(pair));
                    let y = self.tmem.read_u8(address(pair + 1 + ((s & 1) << 1)));
                    let v = self.tmem.read_u8(address(pair + 2));
                    yuv(y, u, v)
                }
                TexelFormat::IntensityAlpha | TexelFormat::Intensity => {
                    ia16(self.tmem.read_u16(address(s << 1)))
                }
                TexelFormat::Rgba | TexelFormat::ColorIndex => {
                    rgba5551(self.tmem.read_u16(address(s << 1)))
                }
            },
            TexelSize::ThirtyTwo => {
                let low = address(s << 1) & LOW_BANK_MASK;
                let [r, g] = self.tmem.read_u16(low).to_be_bytes();
                let [b, a] = self.tmem.read_u16(low | HIGH_BANK).to_be_bytes();
                [r, g, b, a]
            }
        }
    }
}

/// Decode the texels a tile describes into RGBA8.
///
/// Coordinates past the clamp size repeat the edge texel; masking and mirroring are left to the
/// sampler.
#[must_use]
pub fn decode_tile(tmem: &Tmem, tile: &TileDescriptor, tlut: TlutMode) -> DecodedTexture {
    let size = tile.texture_size(tlut);
    let stride = tile.row_stride(&size);
    let base = tile.tmem << 3;
    let reader = TexelReader { tmem, tile, tlut, palette: tile.uses_palette(tlut) };

    let mut pixels = Vec::with_capacity((size.width * size.height * 4) as usize);
    for y in 0..size.height {
        let t = y.min(size.clamp_height - 1);
        let row = base + t * stride;
        for x in 0..size.width {
            let s = x.min(size.clamp_width - 1);
            pixels.extend_from_slice(&reader.read(row, s, t & 1 != 0));
        }
    }

    DecodedTexture { width: size.width, height: size.height, pixels }
}
