//! Texture identity, sizing, and the content-hashed texture cache

pub mod cache;
pub mod decode;
mod list;


use crate::registers::{TexelFormat, TexelSize, TlutMode};
use crate::tmem::{PALETTE_BASE, TMEM_LEN, Tmem};
use bincode::{Decode, Encode};

pub use cache::{
    BoundTexture, FrameBufferTextureId, TextureCache, TextureCacheError, TextureCacheStats,
    TextureUnit,
};
pub use list::TextureId;

/// Wrap parameters for one texture axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub struct TileAxis {
    /// Wrap mask as a power of two exponent; 0 disables masking
    pub mask: u8,
    pub shift: u8,
    pub clamp: bool,
    pub mirror: bool,
}

impl TileAxis {
    /// Multiplier applied to texture coordinates by the tile shift
    #[must_use]
    pub fn shift_scale(self) -> f32 {
        match self.shift {
            0 => 1.0,
            shift @ 1..=10 => 1.0 / f32::from(1_u16 << shift),
            shift => f32::from(1_u16 << (16 - shift.min(16))),
        }
    }

    fn to_bits(self) -> u8 {
        (self.mask & 0xF) | (u8::from(self.clamp) << 4) | (u8::from(self.mirror) << 5)
    }
}

/// SetTile and SetTileSize state for one of the eight tile descriptors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub struct TileDescriptor {
    pub format: TexelFormat,
    pub size: TexelSize,
    /// Qword address in TMEM
    pub tmem: u32,
    /// Qwords per row
    pub line: u32,
    pub palette: u8,
    pub s: TileAxis,
    pub t: TileAxis,
    /// 10.2 fixed point
    pub uls: u32,
    pub ult: u32,
    pub lrs: u32,
    pub lrt: u32,
    /// RDRAM address the tile's texels were last loaded from
    pub image_address: u32,
    /// Mipmap levels including the base level
    pub levels: u8,
}

impl TileDescriptor {
    #[inline]
    #[must_use]
    pub fn tile_width(&self) -> u32 {
        (self.lrs >> 2).saturating_sub(self.uls >> 2) + 1
    }

    #[inline]
    #[must_use]
    pub fn tile_height(&self) -> u32 {
        (self.lrt >> 2).saturating_sub(self.ult >> 2) + 1
    }

    /// Whether texels are palette indices for the given TLUT mode
    #[inline]
    #[must_use]
    pub fn uses_palette(&self, tlut: TlutMode) -> bool {
        matches!(self.size, TexelSize::Four | TexelSize::Eight)
            && (tlut != TlutMode::None || self.format == TexelFormat::ColorIndex)
    }

    // TLUT textures can only use the lower half of TMEM, and 32-bit texels occupy both halves
    fn max_texels(&self, tlut: TlutMode) -> u32 {
        let half = tlut != TlutMode::None;
        match (self.size, half) {
            (TexelSize::Four, false) => 8192,
            (TexelSize::Four, true) | (TexelSize::Eight, false) => 4096,
            (TexelSize::Eight, true) | (TexelSize::Sixteen, _) => 2048,
            (TexelSize::ThirtyTwo, _) => 1024,
        }
    }

    /// Dimensions of the texture this tile describes
    #[must_use]
    pub fn texture_size(&self, tlut: TlutMode) -> TextureSize {
        let max_texels = self.max_texels(tlut);
        let tile_width = self.tile_width();
        let tile_height = self.tile_height();

        let mask_width = if self.s.mask != 0 { 1 << self.s.mask.min(10) } else { tile_width };
        let mask_height = if self.t.mask != 0 { 1 << self.t.mask.min(10) } else { tile_height };

        let (mut width, mut height) = if mask_width * mask_height <= max_texels {
            (mask_width, mask_height)
        } else {
            (tile_width, tile_height)
        };
        width = width.min(max_texels);
        height = height.clamp(1, (max_texels / width).max(1));

        let clamp_width = if self.s.clamp { tile_width.min(width) } else { width };
        let clamp_height = if self.t.clamp { tile_height.min(height) } else { height };

        TextureSize { width, height, clamp_width, clamp_height }
    }

    /// Bytes between the starts of consecutive rows in TMEM (per bank for 32-bit textures)
    #[must_use]
    pub fn row_stride(&self, size: &TextureSize) -> u32 {
        if self.line != 0 {
            return self.line << 3;
        }

        // 32-bit texels keep 16 bits in each bank
        let bank_size = match self.size {
            TexelSize::ThirtyTwo => TexelSize::Sixteen,
            texel_size => texel_size,
        };
        bank_size.bytes_for(size.width).next_multiple_of(8)
    }

    /// Byte range in TMEM (in the low bank for 32-bit textures) holding this tile's texels
    fn tmem_range(&self, size: &TextureSize) -> (u32, u32) {
        let offset = (self.tmem << 3) & (TMEM_LEN as u32 - 1);
        (offset, self.row_stride(size) * size.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureSize {
    /// Logical N64 dimensions
    pub width: u32,
    pub height: u32,
    /// Dimensions past which coordinates clamp
    pub clamp_width: u32,
    pub clamp_height: u32,
}

/// Content identity of the texture a tile currently describes.
///
/// Hashes the resident texel bytes (both banks for 32-bit textures), folds in the palette CRC for
/// palette-indexed textures, then folds in the format, size, shift, and wrap parameters. Two tiles
/// whose TMEM bytes, palettes, and parameters all match always produce the same CRC.
#[must_use]
pub fn texture_content_crc(tmem: &Tmem, tile: &TileDescriptor, tlut: TlutMode) -> u32 {
    let size = tile.texture_size(tlut);
    let (offset, len) = tile.tmem_range(&size);

    let mut crc = tmem.region_crc(offset, len);

    if tile.size == TexelSize::ThirtyTwo {
        let high_offset = (offset as usize) | PALETTE_BASE;
        let high_len = (len as usize).min(TMEM_LEN - high_offset);
        crc = tmem.crc(crc, &tmem.bytes()[high_offset..high_offset + high_len]);
    }

    if tile.uses_palette(tlut) {
        let palette_crc = match tile.size {
            TexelSize::Four => tmem.palette_crc(tile.palette),
            _ => tmem.palette_crc256(),
        };
        crc = tmem.crc(crc, &palette_crc.to_le_bytes());
    }

    let mut params = [0_u8; 16];
    params[0] = tile.format.to_bits();
    params[1] = tile.size as u8;
    params[2] = tlut.to_bits();
    params[3] = tile.palette & 0xF;
    params[4] = tile.s.to_bits();
    params[5] = tile.t.to_bits();
    params[6] = tile.levels;
    params[7] = (tile.s.shift & 0xF) | ((tile.t.shift & 0xF) << 4);
    params[8..10].copy_from_slice(&(size.width as u16).to_le_bytes());
    params[10..12].copy_from_slice(&(size.height as u16).to_le_bytes());
    params[12..14].copy_from_slice(&(size.clamp_width as u16).to_le_bytes());
    params[14..16].copy_from_slice(&(size.clamp_height as u16).to_le_bytes());

    let crc = tmem.crc(crc, &params);
    log::trace!("Texture CRC for tile at TMEM {:03X}: {crc:08X}", tile.tmem);

    crc
}

/// Distinguishes ordinary content-hashed textures from render target textures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameBufferKind {
    #[default]
    None,
    OneSample,
    MultiSample,
}

/// A texture owned by the cache along with the N64 state it was created from
#[derive(Debug, Clone)]
pub struct CachedTexture<H> {
    pub handle: H,
    pub crc: u32,
    pub frame_buffer: FrameBufferKind,
    pub address: u32,
    pub tmem: u32,
    pub line: u32,
    pub format: TexelFormat,
    pub size: TexelSize,
    pub palette: u8,
    pub s: TileAxis,
    pub t: TileAxis,
    pub width: u32,
    pub height: u32,
    pub clamp_width: u32,
    pub clamp_height: u32,
    /// Dimensions of the uploaded texture
    pub real_width: u32,
    pub real_height: u32,
    /// Normalizes N64 texel coordinates against the real dimensions
    pub scale_s: f32,
    pub scale_t: f32,
    pub shift_scale_s: f32,
    pub shift_scale_t: f32,
    pub levels: u8,
}

impl<H> CachedTexture<H> {
    fn from_tile(handle: H, crc: u32, tile: &TileDescriptor, size: &TextureSize) -> Self {
        // Non-power-of-two textures are uploaded as-is
        let real_width = size.width;
        let real_height = size.height;

        Self {
            handle,
            crc,
            frame_buffer: FrameBufferKind::None,
            address: tile.image_address,
            tmem: tile.tmem,
            line: tile.line,
            format: tile.format,
            size: tile.size,
            palette: tile.palette,
            s: tile.s,
            t: tile.t,
            width: size.width,
            height: size.height,
            clamp_width: size.clamp_width,
            clamp_height: size.clamp_height,
            real_width,
            real_height,
            scale_s: 1.0 / real_width as f32,
            scale_t: 1.0 / real_height as f32,
            shift_scale_s: tile.s.shift_scale(),
            shift_scale_t: tile.t.shift_scale(),
            levels: tile.levels.max(1),
        }
    }

    fn placeholder(handle: H, frame_buffer: FrameBufferKind) -> Self {
        Self {
            handle,
            crc: 0,
            frame_buffer,
            address: 0,
            tmem: 0,
            line: 0,
            format: TexelFormat::Rgba,
            size: TexelSize::ThirtyTwo,
            palette: 0,
            s: TileAxis::default(),
            t: TileAxis::default(),
            width: 1,
            height: 1,
            clamp_width: 1,
            clamp_height: 1,
            real_width: 1,
            real_height: 1,
            scale_s: 1.0,
            scale_t: 1.0,
            shift_scale_s: 1.0,
            shift_scale_t: 1.0,
            levels: 1,
        }
    }
}

/// Decoded texels handed to the graphics backend
#[derive(Debug, Clone, Copy)]
pub struct TextureUpload<'a> {
    pub crc: u32,
    /// RGBA8, row-major, `width * height * 4` bytes
    pub pixels: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub levels: u8,
    pub s: TileAxis,
    pub t: TileAxis,
}

/// The graphics layer that owns the actual texture objects
pub trait TextureBackend {
    type Handle;
    type Err;

    /// # Errors
    ///
    /// Should return an error if the texture cannot be allocated or uploaded.
    fn create_texture(&mut self, upload: &TextureUpload<'_>) -> Result<Self::Handle, Self::Err>;

    /// # Errors
    ///
    /// Should return an error if the texture cannot be allocated.
    fn create_frame_buffer_texture(&mut self, multisample: bool) -> Result<Self::Handle, Self::Err>;

    fn destroy_texture(&mut self, handle: Self::Handle);
}
