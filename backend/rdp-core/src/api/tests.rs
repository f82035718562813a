use super::*;
use crate::combiner::FastPath;
use crate::rdram::swap_words;
use crate::registers::{CycleType, OtherMode, TexelFormat, TexelSize, TlutMode};
use crate::texture::{BoundTexture, TextureUpload, texture_content_crc};
use crate::tmem::TMEM_LEN;
use crate::tmem::cache::slot_index;
use rdp_config::ContentHashMode;
use test_log::test;

#[derive(Debug, Default)]
struct CountingBackend {
    next_handle: u32,
    uploads: usize,
    destroyed: Vec<u32>,
}

impl TextureBackend for CountingBackend {
    type Handle = u32;
    type Err = String;

    fn create_texture(&mut self, _upload: &TextureUpload<'_>) -> Result<u32, String> {
        self.uploads += 1;
        self.next_handle += 1;
        Ok(self.next_handle - 1)
    }

    fn create_frame_buffer_texture(&mut self, _multisample: bool) -> Result<u32, String> {
        self.next_handle += 1;
        Ok(self.next_handle - 1)
    }

    fn destroy_texture(&mut self, handle: u32) {
        self.destroyed.push(handle);
    }
}

const IMAGE_WIDTH: u32 = 64;

fn rdram_bytes() -> Vec<u8> {
    let n64: Vec<u8> =
        (0..0x4000_u32).map(|i| (i as u8).wrapping_mul(31) ^ (i >> 8) as u8).collect();
    swap_words(&n64)
}

// An address whose TMEM cache slot differs from 0x1000's
fn other_address() -> u32 {
    (0x2000..0x3000)
        .step_by(0x80)
        .find(|&address| slot_index(address) != slot_index(0x1000))
        .unwrap()
}

fn image(address: u32) -> TextureImage {
    TextureImage {
        address,
        format: TexelFormat::Rgba,
        size: TexelSize::Sixteen,
        width: IMAGE_WIDTH,
    }
}

fn target(tmem: u32) -> LoadTarget {
    LoadTarget {
        tmem,
        line: IMAGE_WIDTH * 2 / 8,
        format: TexelFormat::Rgba,
        size: TexelSize::Sixteen,
    }
}

// One 64-texel row of 16-bit texels
fn row_block() -> BlockLoad {
    BlockLoad { uls: 0, ult: 0, lrs: IMAGE_WIDTH - 1, dxt: 0 }
}

fn tile_4x4(format: TexelFormat, size: TexelSize) -> TileDescriptor {
    TileDescriptor {
        format,
        size,
        line: 1,
        lrs: 3 << 2,
        lrt: 3 << 2,
        levels: 1,
        ..TileDescriptor::default()
    }
}

fn new_session(config: RdpCacheConfig) -> (CountingBackend, RdpSession<u32>) {
    let mut backend = CountingBackend::default();
    let session = RdpSession::new(&mut backend, config).unwrap();
    (backend, session)
}

fn session() -> (CountingBackend, RdpSession<u32>) {
    new_session(RdpCacheConfig::default())
}

#[test]
fn repeated_block_load_hits_tmem_cache() {
    let host = rdram_bytes();
    let rdram = RdramView::new(&host);
    let (_, mut session) = session();

    session.load_block(rdram, &image(0x1000), &target(0), row_block());
    let first_load = *session.tmem().bytes();
    let first_hash = session.tmem().content_hash();
    assert!(first_hash.is_some());

    // Clobber the same TMEM range with a different block, then reload the first one
    session.load_block(rdram, &image(other_address()), &target(0), row_block());
    assert_ne!(first_load[..128], session.tmem().bytes()[..128]);
    session.load_block(rdram, &image(0x1000), &target(0), row_block());

    assert_eq!(first_load[..], session.tmem().bytes()[..]);
    assert_eq!(first_hash, session.tmem().content_hash());
    let stats = session.tmem_cache_stats().unwrap();
    assert_eq!(1, stats.hits);
    assert_eq!(2, stats.misses);
}

#[test]
fn disabled_tmem_cache_produces_same_tmem() {
    let host = rdram_bytes();
    let rdram = RdramView::new(&host);
    let (_, mut cached) = session();
    let (_, mut uncached) =
        new_session(RdpCacheConfig { tmem_cache_enabled: false, ..RdpCacheConfig::default() });
    assert_eq!(None, uncached.tmem_cache_stats());

    for session in [&mut cached, &mut uncached] {
        session.load_block(rdram, &image(0x1000), &target(0), row_block());
        session.load_block(rdram, &image(0x2000), &target(16), row_block());
        session.load_block(rdram, &image(0x1000), &target(0), row_block());
    }

    assert_eq!(cached.tmem().bytes()[..], uncached.tmem().bytes()[..]);

    let tile = tile_4x4(TexelFormat::Rgba, TexelSize::Sixteen);
    assert_eq!(
        texture_content_crc(cached.tmem(), &tile, TlutMode::None),
        texture_content_crc(uncached.tmem(), &tile, TlutMode::None),
    );
}

#[test]
fn invalidate_tmem_forces_reload() {
    let host = rdram_bytes();
    let rdram = RdramView::new(&host);
    let (_, mut session) = session();

    session.load_block(rdram, &image(0x1000), &target(0), row_block());
    session.invalidate_tmem();
    assert_eq!(None, session.tmem().content_hash());

    session.load_block(rdram, &image(0x1000), &target(0), row_block());
    let stats = session.tmem_cache_stats().unwrap();
    assert_eq!(0, stats.hits);
    assert_eq!(2, stats.misses);
}

#[test]
fn update_combiner_reports_changes() {
    let (_, mut session) = session();
    assert_eq!(CombinerKey::EMPTY, session.combiner_key());

    let state = RenderState::default();
    assert!(session.update_combiner(0x1234, &state));
    assert!(!session.update_combiner(0x1234, &state));
    assert_eq!(FastPath::Pass, session.combiner_key().fast_path());

    let rect = RenderState { rect_mode: true, ..state };
    assert!(session.update_combiner(0x1234, &rect));
    assert!(session.combiner_key().is_rect_key());
    assert!(session.update_combiner(0x5678, &rect));
    assert_eq!(0x5678, session.combiner_key().mux());
}

#[test]
fn bind_tile_reuses_cached_texture() {
    let host = rdram_bytes();
    let rdram = RdramView::new(&host);
    let (mut backend, mut session) = session();
    let placeholder_uploads = backend.uploads;

    let target = LoadTarget { line: 1, ..target(0) };
    session.load_tile(rdram, &image(0x1000), &target, LoadRect { uls: 0, ult: 0, lrs: 3, lrt: 3 });

    let tile = tile_4x4(TexelFormat::Rgba, TexelSize::Sixteen);
    let first = session.bind_tile(&mut backend, TextureUnit::Zero, &tile).unwrap();
    let second = session.bind_tile(&mut backend, TextureUnit::One, &tile).unwrap();

    assert_eq!(first, second);
    assert_eq!(placeholder_uploads + 1, backend.uploads);
    let active = session.texture_cache().active(TextureUnit::One);
    assert_eq!(Some(BoundTexture::Cached(first)), active);
    assert_eq!(1, session.texture_cache().stats().hits);
}

#[test]
fn bind_tile_uses_tlut_mode_from_render_state() {
    let (mut backend, mut session) = session();
    let tile = tile_4x4(TexelFormat::Intensity, TexelSize::Eight);

    let direct = session.bind_tile(&mut backend, TextureUnit::Zero, &tile).unwrap();

    // TLUT enabled: the same I8 texels are now palette indices
    let other_mode = OtherMode::new(2 << 14, 0);
    session.update_combiner(0, &RenderState { other_mode, rect_mode: false });
    let indexed = session.bind_tile(&mut backend, TextureUnit::Zero, &tile).unwrap();

    assert_ne!(direct, indexed);
    assert_eq!(2, session.texture_cache().len());
}

#[test]
fn reset_clears_everything() {
    let host = rdram_bytes();
    let rdram = RdramView::new(&host);
    let (mut backend, mut session) = session();

    session.load_block(rdram, &image(0x1000), &target(0), row_block());
    let tile = tile_4x4(TexelFormat::Rgba, TexelSize::Sixteen);
    session.bind_tile(&mut backend, TextureUnit::Zero, &tile).unwrap();
    session.update_combiner(0x1234, &RenderState::default());

    session.reset(&mut backend);

    assert!(session.tmem().bytes().iter().all(|&byte| byte == 0));
    assert_eq!(None, session.tmem().content_hash());
    assert_eq!(CombinerKey::EMPTY, session.combiner_key());
    assert!(session.texture_cache().is_empty());
    assert_eq!(None, session.texture_cache().active(TextureUnit::Zero));
    assert_eq!(1, backend.destroyed.len());

    // The cache was dropped along with TMEM
    session.load_block(rdram, &image(0x1000), &target(0), row_block());
    assert_eq!(0, session.tmem_cache_stats().unwrap().hits);
}

#[test]
fn save_state_round_trip() {
    let host = rdram_bytes();
    let rdram = RdramView::new(&host);
    let (_, mut saved) = session();

    saved.load_block(rdram, &image(0x1000), &target(0), row_block());
    let other_mode = OtherMode::new(0, 1 << 12).with_cycle_type(CycleType::TwoCycle);
    let state = RenderState { other_mode, rect_mode: true };
    saved.update_combiner(0x00AB_CDEF_0123_4567, &state);

    let mut bytes = Vec::new();
    saved.save_state(&mut bytes).unwrap();

    let (mut backend, mut restored) = session();
    let tile = tile_4x4(TexelFormat::Rgba, TexelSize::Sixteen);
    restored.bind_tile(&mut backend, TextureUnit::Zero, &tile).unwrap();

    restored.load_state(&mut backend, bytes.as_slice()).unwrap();

    assert_eq!(saved.tmem().bytes()[..], restored.tmem().bytes()[..]);
    assert_eq!(saved.combiner_key(), restored.combiner_key());
    assert_eq!(saved.render_state(), restored.render_state());
    assert_eq!(None, restored.tmem().content_hash());
    assert!(restored.texture_cache().is_empty());
    assert_eq!(1, backend.destroyed.len());
}

#[test]
fn failed_load_state_leaves_session_unchanged() {
    let (mut backend, mut session) = session();
    session.update_combiner(0x1234, &RenderState::default());
    let key = session.combiner_key();

    let mut bytes = Vec::new();
    session.save_state(&mut bytes).unwrap();
    bytes.truncate(bytes.len() - 4);

    session.update_combiner(0x5678, &RenderState::default());
    let key_before_load = session.combiner_key();
    assert_ne!(key, key_before_load);

    let result = session.load_state(&mut backend, bytes.as_slice());
    assert!(matches!(result, Err(SaveStateError::Deserialization { .. })));
    assert_eq!(key_before_load, session.combiner_key());
}

#[test]
fn load_state_rehashes_with_configured_hash_mode() {
    let (_, saved) = session();
    let mut bytes = Vec::new();
    saved.save_state(&mut bytes).unwrap();

    let strict = RdpCacheConfig { hash_mode: ContentHashMode::Strict, ..RdpCacheConfig::default() };
    let (mut backend, mut restored) = new_session(strict);
    restored.load_state(&mut backend, bytes.as_slice()).unwrap();

    let fresh = Tmem::new(ContentHashMode::Strict);
    assert_eq!(ContentHashMode::Strict, restored.tmem().hash_mode());
    assert_eq!(fresh.palette_crc(0), restored.tmem().palette_crc(0));
    assert_eq!(fresh.palette_crc256(), restored.tmem().palette_crc256());
}

#[test]
fn load_state_recomputes_palette_crcs() {
    let (_, saved) = session();
    let mut bytes = Vec::new();
    saved.save_state(&mut bytes).unwrap();

    // TMEM bytes, then a `None` content descriptor tag, then the first palette CRC
    let palette_crc_offset = TMEM_LEN + 1;
    assert_eq!(0, bytes[TMEM_LEN]);
    bytes[palette_crc_offset] ^= 0xFF;

    let (mut backend, mut restored) = session();
    restored.load_state(&mut backend, bytes.as_slice()).unwrap();

    assert_eq!(saved.tmem().palette_crc(0), restored.tmem().palette_crc(0));
    assert_eq!(saved.tmem().palette_crc256(), restored.tmem().palette_crc256());
}

struct FailingWriter;

impl io::Write for FailingWriter {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::other("disk full"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn save_state_reports_write_errors() {
    let (_, session) = session();

    let result = session.save_state(FailingWriter);
    assert!(matches!(result, Err(SaveStateError::Io { .. })));
}

#[test]
fn destroy_releases_placeholders() {
    let (mut backend, session) = session();
    session.destroy(&mut backend);

    backend.destroyed.sort_unstable();
    assert_eq!(vec![0, 1], backend.destroyed);
}
