//! LoadBlock, LoadTile, and LoadTLUT: copying texture data from RDRAM into TMEM

use crate::rdram::RdramView;
use crate::registers::{TexelFormat, TexelSize};
use crate::tmem::cache::TmemCache;
use crate::tmem::{PALETTE_BASE, PALETTE_BASE_QWORD, TMEM_ADDRESS_MASK, TMEM_LEN, Tmem};
use bincode::{Decode, Encode};

/// SetTextureImage state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub struct TextureImage {
    pub address: u32,
    pub format: TexelFormat,
    pub size: TexelSize,
    /// Width in texels
    pub width: u32,
}

impl TextureImage {
    #[inline]
    #[must_use]
    pub fn bytes_per_line(&self) -> u32 {
        (self.width << self.size.shift()) >> 1
    }

    /// RDRAM address of texel `(s, t)`
    #[inline]
    #[must_use]
    pub fn texel_address(&self, s: u32, t: u32) -> u32 {
        self.address
            .wrapping_add(t.wrapping_mul(self.bytes_per_line()))
            .wrapping_add((s << self.size.shift()) >> 1)
    }
}

/// The subset of a tile descriptor that a load reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadTarget {
    /// Destination qword address in TMEM (0-511)
    pub tmem: u32,
    /// Qwords per TMEM row
    pub line: u32,
    pub format: TexelFormat,
    pub size: TexelSize,
}

/// LoadBlock coordinates; `lrs` is the index of the last texel to load and `dxt` is the
/// unsigned 1.11 reciprocal of the line width in qwords
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockLoad {
    pub uls: u32,
    pub ult: u32,
    pub lrs: u32,
    pub dxt: u32,
}

/// Inclusive texel rectangle for LoadTile and LoadTLUT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadRect {
    pub uls: u32,
    pub ult: u32,
    pub lrs: u32,
    pub lrt: u32,
}

/// Copy `len` bytes from RDRAM into TMEM, undoing the host word swap. The TMEM destination wraps.
fn unswap_copy_wrap(
    rdram: RdramView<'_>,
    address: u32,
    tmem: &mut Tmem,
    tmem_offset: u32,
    len: u32,
) {
    let bytes = tmem.bytes_mut();
    let mut src = address;
    let mut dest = tmem_offset;
    let mut remaining = len;

    while remaining != 0 && src & 3 != 0 {
        bytes[(dest & TMEM_ADDRESS_MASK) as usize] = rdram.read_u8(src);
        src = src.wrapping_add(1);
        dest += 1;
        remaining -= 1;
    }

    while remaining >= 4 {
        let word = rdram.word_bytes(src);
        let start = (dest & TMEM_ADDRESS_MASK) as usize;
        if start + 4 <= TMEM_LEN {
            bytes[start..start + 4].copy_from_slice(&word);
        } else {
            for (i, byte) in word.into_iter().enumerate() {
                bytes[(dest as usize + i) & (TMEM_LEN - 1)] = byte;
            }
        }
        src = src.wrapping_add(4);
        dest += 4;
        remaining -= 4;
    }

    while remaining != 0 {
        bytes[(dest & TMEM_ADDRESS_MASK) as usize] = rdram.read_u8(src);
        src = src.wrapping_add(1);
        dest += 1;
        remaining -= 1;
    }
}

/// Execute a LoadBlock command.
///
/// When a TMEM cache is supplied and the whole load fits inside TMEM, the cache is consulted
/// first and updated on a miss.
pub fn load_block(
    tmem: &mut Tmem,
    mut cache: Option<&mut TmemCache>,
    rdram: RdramView<'_>,
    image: &TextureImage,
    target: &LoadTarget,
    block: BlockLoad,
) {
    let width = block.lrs.wrapping_sub(block.uls).wrapping_add(1) & 0xFFF;
    let bytes = ((width << target.size.shift()) >> 1).next_multiple_of(8);
    let address = image.texel_address(block.uls, block.ult);

    if bytes == 0 || address.checked_add(bytes).is_none_or(|end| end > rdram.len()) {
        log::debug!(
            "Ignoring LoadBlock outside of RDRAM: address={address:08X}, bytes={bytes}, rdram_len={}",
            rdram.len()
        );
        return;
    }

    log::trace!(
        "LoadBlock: address={address:08X}, bytes={bytes}, tmem={:03X}, dxt={:03X}, size={:?}",
        target.tmem,
        block.dxt,
        target.size
    );

    tmem.invalidate_content_hash();

    if target.size == TexelSize::ThirtyTwo {
        load_block_32b(tmem, rdram, address, target, width, block.dxt);
        // The low halfwords always land in the upper bank
        tmem.note_write(0, TMEM_LEN as u32);
        return;
    }

    if target.format == TexelFormat::Yuv {
        // YUV block loads land at the start of TMEM with no line interleaving
        let len = bytes.min(TMEM_LEN as u32);
        unswap_copy_wrap(rdram, address, tmem, 0, len);
        tmem.note_write(0, len);
        return;
    }

    let tmem_offset = target.tmem << 3;
    let qwords = bytes >> 3;
    let fits_in_tmem = tmem_offset + bytes <= TMEM_LEN as u32;
    if !fits_in_tmem {
        cache = None;
    }

    let cache_hit = cache.as_deref_mut().is_some_and(|cache| {
        cache.try_load(tmem, address, target.tmem, qwords as u16, block.dxt as u16)
    });

    if !cache_hit {
        unswap_copy_wrap(rdram, address, tmem, tmem_offset, bytes);

        if block.dxt != 0 {
            interleave_block_lines(tmem, target, qwords, block.dxt);
        }

        if let Some(cache) = cache {
            cache.add_entry(tmem, address, target.tmem, qwords as u16, block.dxt as u16);
        }
    }

    tmem.note_write(tmem_offset, bytes);
}

// The dxt counter advances once per qword; bit 11 flips at each line boundary, and every odd line
// has its words swapped
fn interleave_block_lines(tmem: &mut Tmem, target: &LoadTarget, qwords: u32, dxt: u32) {
    let mut word_index = target.tmem << 1;
    let mut counter = 0_u32;
    let mut remaining = qwords;

    while remaining != 0 {
        let odd_line = counter & 0x800 != 0;
        let mut run = 0;
        while remaining != 0 && (counter & 0x800 != 0) == odd_line {
            counter = counter.wrapping_add(dxt);
            run += 1;
            remaining -= 1;
        }

        if odd_line {
            tmem.interleave_dwords(word_index, run);
        }
        word_index += run << 1;
    }
}

// 32-bit texels are split across the two TMEM banks: the high halfword goes to the low bank and
// the low halfword goes to the same position in the high bank
fn load_block_32b(
    tmem: &mut Tmem,
    rdram: RdramView<'_>,
    address: u32,
    target: &LoadTarget,
    texels: u32,
    dxt: u32,
) {
    let base = target.tmem << 2;
    let mut counter = 0_u32;

    // One source qword (two texels) per dxt step
    for i in (0..texels.next_multiple_of(2)).step_by(2) {
        let swizzle = if dxt != 0 && counter & 0x800 != 0 { 2 } else { 0 };
        for k in i..i + 2 {
            let texel = rdram.read_u32(address.wrapping_add(k << 2));
            let index = ((base + k) ^ swizzle) & 0x3FF;
            tmem.write_u16_index(index, (texel >> 16) as u16);
            tmem.write_u16_index(index | 0x400, texel as u16);
        }
        counter = counter.wrapping_add(dxt);
    }
}

/// Execute a LoadTile command.
pub fn load_tile(
    tmem: &mut Tmem,
    rdram: RdramView<'_>,
    image: &TextureImage,
    target: &LoadTarget,
    rect: LoadRect,
) {
    if rect.lrs < rect.uls || rect.lrt < rect.ult {
        return;
    }

    let width = (rect.lrs - rect.uls + 1) & 0x3FF;
    let height = (rect.lrt - rect.ult + 1) & 0x3FF;
    if target.line == 0 || width == 0 || height == 0 {
        log::debug!("Ignoring empty LoadTile: line={}, {width}x{height}", target.line);
        return;
    }

    let width_mask = match image.size {
        TexelSize::Four => 0,
        TexelSize::Eight => 7,
        TexelSize::Sixteen => 3,
        TexelSize::ThirtyTwo => 1,
    };
    let aligned_width = (width + width_mask) & !width_mask;
    let row_bytes = (aligned_width << target.size.shift()) >> 1;
    let address = image.texel_address(rect.uls, rect.ult);

    if address >= rdram.len() {
        log::debug!("Ignoring LoadTile outside of RDRAM: address={address:08X}");
        return;
    }

    log::trace!(
        "LoadTile: address={address:08X}, {width}x{height}, tmem={:03X}, line={}, size={:?}",
        target.tmem,
        target.line,
        target.size
    );

    tmem.invalidate_content_hash();

    if target.size == TexelSize::ThirtyTwo {
        load_tile_32b(tmem, rdram, image, target, rect, width, height);
        tmem.note_write(0, TMEM_LEN as u32);
        return;
    }

    let qwords_per_row = row_bytes >> 3;
    let mut row_address = address;
    let mut tmem_qword = target.tmem;
    for y in 0..height {
        let len = row_bytes.min(rdram.len() - row_address);
        unswap_copy_wrap(rdram, row_address, tmem, tmem_qword << 3, len);
        if y & 1 != 0 {
            tmem.interleave_dwords(tmem_qword << 1, qwords_per_row);
        }

        row_address = row_address.wrapping_add(image.bytes_per_line());
        if row_address >= rdram.len() {
            break;
        }
        tmem_qword += target.line;
    }

    tmem.note_write(target.tmem << 3, target.line * height * 8);
}

fn load_tile_32b(
    tmem: &mut Tmem,
    rdram: RdramView<'_>,
    image: &TextureImage,
    target: &LoadTarget,
    rect: LoadRect,
    width: u32,
    height: u32,
) {
    let line = target.line << 2;
    let base = target.tmem << 2;

    for y in 0..height {
        let row_start = base + line * y;
        let src_texel = (y + rect.ult) * image.width + rect.uls;
        let swizzle = if y & 1 != 0 { 2 } else { 0 };

        for x in 0..width {
            let texel = rdram.read_u32(image.address.wrapping_add((src_texel + x) << 2));
            let index = ((row_start + x) ^ swizzle) & 0x3FF;
            tmem.write_u16_index(index, (texel >> 16) as u16);
            tmem.write_u16_index(index | 0x400, texel as u16);
        }
    }
}

/// Execute a LoadTLUT command.
///
/// Each palette entry is written to the first halfword of consecutive qwords in the upper half of
/// TMEM, starting at `tile_tmem` (which must be at least 256). Palette CRCs are refreshed for
/// every palette touched, plus the combined 256-entry CRC.
pub fn load_tlut(
    tmem: &mut Tmem,
    rdram: RdramView<'_>,
    image: &TextureImage,
    tile_tmem: u32,
    rect: LoadRect,
) {
    if tile_tmem < PALETTE_BASE_QWORD {
        log::debug!("Ignoring LoadTLUT to lower TMEM: tmem={tile_tmem:03X}");
        return;
    }

    let count = rect.lrs.wrapping_sub(rect.uls).wrapping_add(1).wrapping_mul(
        rect.lrt.wrapping_sub(rect.ult).wrapping_add(1),
    ) & 0xFFFF;
    let mut address = image.texel_address(rect.uls, rect.ult);
    if address >= rdram.len() {
        log::debug!("Ignoring LoadTLUT outside of RDRAM: address={address:08X}");
        return;
    }

    log::trace!("LoadTLUT: address={address:08X}, count={count}, tmem={tile_tmem:03X}");

    tmem.invalidate_content_hash_overlapping(PALETTE_BASE as u32, PALETTE_BASE as u32);

    // Entries land in the first halfword of each qword in the upper bank
    let mut index = 0x400 | (tile_tmem << 2);
    let mut palette = ((tile_tmem - PALETTE_BASE_QWORD) >> 4) as u8 & 0xF;
    let mut written = 0;
    while written < count {
        for _ in 0..16 {
            if written == count {
                break;
            }

            tmem.write_u16_index(index, rdram.read_u16(address));
            address = address.wrapping_add(2);
            index = (index + 4) | 0x400;
            written += 1;
        }

        tmem.refresh_palette_crc(palette);
        palette = (palette + 1) & 0xF;
    }

    tmem.refresh_palette_crc256();
}
