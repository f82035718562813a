//! Content-hashed texture cache
//!
//! Textures are looked up by content CRC through a `FlatHashList` index into an insertion-ordered
//! list. When the cache grows past its configured size, textures are evicted starting from the
//! oldest, skipping any texture that is bound to a texture unit. Hits only reorder the list under
//! `TextureEvictionPolicy::LeastRecentlyUsed`.
//!
//! Frame buffer textures are kept in a separate map. They never count against the size limit and
//! are only removed explicitly.

use crate::flathash::FlatHashList;
use crate::registers::TlutMode;
use crate::texture::decode::decode_tile;
use crate::texture::list::{OrderedSlab, TextureId};
use crate::texture::{
    CachedTexture, FrameBufferKind, TextureBackend, TextureUpload, TileAxis, TileDescriptor,
    texture_content_crc,
};
use crate::tmem::Tmem;
use rdp_config::{RdpCacheConfig, TextureEvictionPolicy};
use rustc_hash::FxHashMap;
use std::fmt::Debug;
use thiserror::Error;

pub const TEXTURE_UNITS: usize = 2;

#[derive(Debug, Error)]
pub enum TextureCacheError<GErr> {
    #[error("Error creating texture: {0}")]
    Create(GErr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureUnit {
    Zero = 0,
    One = 1,
}

impl TextureUnit {
    pub const ALL: [Self; TEXTURE_UNITS] = [Self::Zero, Self::One];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameBufferTextureId(u32);

/// What is bound to a texture unit for the current draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundTexture {
    Cached(TextureId),
    FrameBuffer(FrameBufferTextureId),
    Dummy,
    MultisampleDummy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextureCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub cached_textures: usize,
    pub frame_buffer_textures: usize,
}

pub struct TextureCache<H> {
    textures: OrderedSlab<CachedTexture<H>>,
    index: FlatHashList<TextureId>,
    frame_buffer_textures: FxHashMap<FrameBufferTextureId, CachedTexture<H>>,
    next_frame_buffer_id: u32,
    active: [Option<BoundTexture>; TEXTURE_UNITS],
    dummy: CachedTexture<H>,
    multisample_dummy: CachedTexture<H>,
    max_textures: usize,
    eviction_policy: TextureEvictionPolicy,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<H: Debug> Debug for TextureCache<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureCache")
            .field("len", &self.textures.len())
            .field("frame_buffer_textures", &self.frame_buffer_textures.len())
            .field("active", &self.active)
            .field("max_textures", &self.max_textures)
            .field("eviction_policy", &self.eviction_policy)
            .finish_non_exhaustive()
    }
}

impl<H> TextureCache<H> {
    /// Create an empty cache along with its two placeholder textures.
    ///
    /// # Errors
    ///
    /// Propagates any error from the backend while creating the placeholders.
    pub fn new<B>(
        backend: &mut B,
        config: &RdpCacheConfig,
    ) -> Result<Self, TextureCacheError<B::Err>>
    where
        B: TextureBackend<Handle = H>,
    {
        let dummy_pixels = [0_u8; 4];
        let dummy_handle = backend
            .create_texture(&TextureUpload {
                crc: 0,
                pixels: &dummy_pixels,
                width: 1,
                height: 1,
                levels: 1,
                s: TileAxis::default(),
                t: TileAxis::default(),
            })
            .map_err(TextureCacheError::Create)?;
        let multisample_handle =
            backend.create_frame_buffer_texture(true).map_err(TextureCacheError::Create)?;

        Ok(Self {
            textures: OrderedSlab::new(),
            index: FlatHashList::new(),
            frame_buffer_textures: FxHashMap::default(),
            next_frame_buffer_id: 0,
            active: [None; TEXTURE_UNITS],
            dummy: CachedTexture::placeholder(dummy_handle, FrameBufferKind::None),
            multisample_dummy: CachedTexture::placeholder(
                multisample_handle,
                FrameBufferKind::MultiSample,
            ),
            max_textures: config.max_textures,
            eviction_policy: config.eviction_policy,
            hits: 0,
            misses: 0,
            evictions: 0,
        })
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.textures.len() == 0
    }

    #[inline]
    #[must_use]
    pub fn max_textures(&self) -> usize {
        self.max_textures
    }

    #[must_use]
    pub fn stats(&self) -> TextureCacheStats {
        TextureCacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            cached_textures: self.textures.len(),
            frame_buffer_textures: self.frame_buffer_textures.len(),
        }
    }

    #[must_use]
    pub fn get(&self, id: TextureId) -> Option<&CachedTexture<H>> {
        self.textures.get(id)
    }

    #[must_use]
    pub fn get_by_crc(&self, crc: u32) -> Option<TextureId> {
        self.index.get(crc).copied()
    }

    #[must_use]
    pub fn get_frame_buffer(&self, id: FrameBufferTextureId) -> Option<&CachedTexture<H>> {
        self.frame_buffer_textures.get(&id)
    }

    #[must_use]
    pub fn get_frame_buffer_mut(
        &mut self,
        id: FrameBufferTextureId,
    ) -> Option<&mut CachedTexture<H>> {
        self.frame_buffer_textures.get_mut(&id)
    }

    /// Texture ids in eviction order, oldest first
    pub fn ids(&self) -> impl Iterator<Item = TextureId> + '_ {
        self.textures.ids()
    }

    /// Return the texture with the given content CRC, decoding and uploading it on a miss.
    ///
    /// A miss may evict older textures to get back under the configured size. Textures bound to a
    /// texture unit and the new texture itself are never evicted, so if everything else is bound
    /// the cache stays over its limit until a later insert.
    ///
    /// # Errors
    ///
    /// Propagates any error from the backend while creating the texture.
    pub fn find_or_create<B>(
        &mut self,
        backend: &mut B,
        crc: u32,
        tile: &TileDescriptor,
        tmem: &Tmem,
        tlut: TlutMode,
    ) -> Result<TextureId, TextureCacheError<B::Err>>
    where
        B: TextureBackend<Handle = H>,
    {
        if let Some(&id) = self.index.get(crc) {
            self.hits += 1;
            if self.eviction_policy == TextureEvictionPolicy::LeastRecentlyUsed {
                self.textures.move_to_back(id);
            }

            log::trace!("Texture cache hit: crc={crc:08X}");
            return Ok(id);
        }

        self.misses += 1;

        let size = tile.texture_size(tlut);
        let decoded = decode_tile(tmem, tile, tlut);
        let handle = backend
            .create_texture(&TextureUpload {
                crc,
                pixels: &decoded.pixels,
                width: decoded.width,
                height: decoded.height,
                levels: tile.levels.max(1),
                s: tile.s,
                t: tile.t,
            })
            .map_err(TextureCacheError::Create)?;

        let id = self.textures.push_back(CachedTexture::from_tile(handle, crc, tile, &size));
        self.index.insert(crc, id);

        log::trace!(
            "Texture cache miss: crc={crc:08X}, {}x{}, format={:?}, size={:?}",
            decoded.width,
            decoded.height,
            tile.format,
            tile.size
        );

        self.evict_excess(backend, id);

        Ok(id)
    }

    /// Compute the tile's content CRC, look it up or create it, and bind it to a texture unit.
    ///
    /// # Errors
    ///
    /// Propagates any error from the backend while creating the texture.
    pub fn bind_tile<B>(
        &mut self,
        backend: &mut B,
        unit: TextureUnit,
        tile: &TileDescriptor,
        tmem: &Tmem,
        tlut: TlutMode,
    ) -> Result<TextureId, TextureCacheError<B::Err>>
    where
        B: TextureBackend<Handle = H>,
    {
        let crc = texture_content_crc(tmem, tile, tlut);
        let id = self.find_or_create(backend, crc, tile, tmem, tlut)?;
        self.activate(unit, BoundTexture::Cached(id));

        Ok(id)
    }

    fn is_active(&self, id: TextureId) -> bool {
        self.active.contains(&Some(BoundTexture::Cached(id)))
    }

    fn evict_excess<B>(&mut self, backend: &mut B, inserted: TextureId)
    where
        B: TextureBackend<Handle = H>,
    {
        while self.textures.len() > self.max_textures {
            let victim = self.textures.ids().find(|&id| id != inserted && !self.is_active(id));
            let Some(victim) = victim else {
                log::debug!(
                    "Texture cache over capacity with every texture in use: len={}, max={}",
                    self.textures.len(),
                    self.max_textures
                );
                return;
            };

            if let Some(texture) = self.textures.remove(victim) {
                self.index.remove(texture.crc);
                self.evictions += 1;

                log::debug!("Evicting texture crc={:08X}", texture.crc);
                backend.destroy_texture(texture.handle);
            }
        }
    }

    /// Destroy the texture with the given content CRC, if present.
    ///
    /// Unbinds it from any texture unit it is bound to.
    pub fn remove<B>(&mut self, backend: &mut B, crc: u32) -> bool
    where
        B: TextureBackend<Handle = H>,
    {
        let Some(id) = self.index.remove(crc) else { return false };

        self.unbind(BoundTexture::Cached(id));
        if let Some(texture) = self.textures.remove(id) {
            backend.destroy_texture(texture.handle);
        }

        true
    }

    /// Create a texture backed by a render target. It is not content-hashed and lives until
    /// removed with `remove_frame_buffer_texture`.
    ///
    /// # Errors
    ///
    /// Propagates any error from the backend while creating the texture.
    pub fn add_frame_buffer_texture<B>(
        &mut self,
        backend: &mut B,
        multisample: bool,
    ) -> Result<FrameBufferTextureId, TextureCacheError<B::Err>>
    where
        B: TextureBackend<Handle = H>,
    {
        let handle =
            backend.create_frame_buffer_texture(multisample).map_err(TextureCacheError::Create)?;
        let kind =
            if multisample { FrameBufferKind::MultiSample } else { FrameBufferKind::OneSample };

        let id = FrameBufferTextureId(self.next_frame_buffer_id);
        self.next_frame_buffer_id = self.next_frame_buffer_id.wrapping_add(1);
        self.frame_buffer_textures.insert(id, CachedTexture::placeholder(handle, kind));

        log::debug!("Added frame buffer texture {id:?}, multisample={multisample}");

        Ok(id)
    }

    pub fn remove_frame_buffer_texture<B>(
        &mut self,
        backend: &mut B,
        id: FrameBufferTextureId,
    ) -> bool
    where
        B: TextureBackend<Handle = H>,
    {
        let Some(texture) = self.frame_buffer_textures.remove(&id) else { return false };

        self.unbind(BoundTexture::FrameBuffer(id));
        backend.destroy_texture(texture.handle);

        log::debug!("Removed frame buffer texture {id:?}");

        true
    }

    /// Record what is bound to a texture unit. Bound content textures are protected from eviction.
    pub fn activate(&mut self, unit: TextureUnit, texture: BoundTexture) {
        self.active[unit as usize] = Some(texture);
    }

    pub fn activate_dummy(&mut self, unit: TextureUnit) {
        self.activate(unit, BoundTexture::Dummy);
    }

    pub fn activate_multisample_dummy(&mut self, unit: TextureUnit) {
        self.activate(unit, BoundTexture::MultisampleDummy);
    }

    pub fn deactivate(&mut self, unit: TextureUnit) {
        self.active[unit as usize] = None;
    }

    #[must_use]
    pub fn active(&self, unit: TextureUnit) -> Option<BoundTexture> {
        self.active[unit as usize]
    }

    /// The texture currently bound to a unit, resolving placeholders
    #[must_use]
    pub fn active_texture(&self, unit: TextureUnit) -> Option<&CachedTexture<H>> {
        match self.active[unit as usize]? {
            BoundTexture::Cached(id) => self.textures.get(id),
            BoundTexture::FrameBuffer(id) => self.frame_buffer_textures.get(&id),
            BoundTexture::Dummy => Some(&self.dummy),
            BoundTexture::MultisampleDummy => Some(&self.multisample_dummy),
        }
    }

    fn unbind(&mut self, texture: BoundTexture) {
        for active in &mut self.active {
            if *active == Some(texture) {
                *active = None;
            }
        }
    }

    /// Destroy every content-hashed and frame buffer texture and unbind all units. The placeholder
    /// textures survive.
    pub fn clear<B>(&mut self, backend: &mut B)
    where
        B: TextureBackend<Handle = H>,
    {
        for texture in self.textures.drain() {
            backend.destroy_texture(texture.handle);
        }
        self.index.clear();

        for (_, texture) in self.frame_buffer_textures.drain() {
            backend.destroy_texture(texture.handle);
        }

        self.active = [None; TEXTURE_UNITS];

        log::debug!("Texture cache cleared");
    }

    /// Destroy every texture including the placeholders.
    pub fn destroy<B>(mut self, backend: &mut B)
    where
        B: TextureBackend<Handle = H>,
    {
        self.clear(backend);
        backend.destroy_texture(self.dummy.handle);
        backend.destroy_texture(self.multisample_dummy.handle);
    }
}
