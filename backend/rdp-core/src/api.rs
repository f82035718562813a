//! Public session API tying TMEM, the TMEM cache, the texture cache, and the combiner key together

#[cfg(test)]
mod tests;

use crate::combiner::{CombinerKey, RenderState};
use crate::rdram::RdramView;
use crate::texture::{
    TextureBackend, TextureCache, TextureCacheError, TextureId, TextureUnit, TileDescriptor,
};
use crate::tmem::Tmem;
use crate::tmem::cache::{TmemCache, TmemCacheStats};
use crate::tmem::load::{self, BlockLoad, LoadRect, LoadTarget, TextureImage};
use bincode::config::{Fixint, LittleEndian};
use bincode::error::{DecodeError, EncodeError};
use rdp_config::RdpCacheConfig;
use std::io;
use std::io::{BufReader, BufWriter, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SaveStateError {
    #[error("error saving state: {source}")]
    Serialization {
        #[from]
        source: EncodeError,
    },
    #[error("error loading state: {source}")]
    Deserialization {
        #[from]
        source: DecodeError,
    },
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

const BINCODE_CONFIG: bincode::config::Configuration<LittleEndian, Fixint> =
    bincode::config::standard().with_little_endian().with_fixed_int_encoding();

/// All cache state for one emulated RDP.
///
/// `H` is the texture handle type of the graphics backend. The backend itself is passed to every
/// operation that may create or destroy textures.
#[derive(Debug)]
pub struct RdpSession<H> {
    config: RdpCacheConfig,
    tmem: Tmem,
    tmem_cache: Option<TmemCache>,
    texture_cache: TextureCache<H>,
    render_state: RenderState,
    combiner_key: CombinerKey,
}

impl<H> RdpSession<H> {
    /// # Errors
    ///
    /// Propagates any error from the backend while creating the placeholder textures.
    pub fn new<B>(
        backend: &mut B,
        config: RdpCacheConfig,
    ) -> Result<Self, TextureCacheError<B::Err>>
    where
        B: TextureBackend<Handle = H>,
    {
        log::debug!("Creating RDP cache session with config:\n{config}");

        Ok(Self {
            config,
            tmem: Tmem::new(config.hash_mode),
            tmem_cache: config.tmem_cache_enabled.then(TmemCache::new),
            texture_cache: TextureCache::new(backend, &config)?,
            render_state: RenderState::default(),
            combiner_key: CombinerKey::EMPTY,
        })
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &RdpCacheConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn tmem(&self) -> &Tmem {
        &self.tmem
    }

    /// `None` if the TMEM cache is disabled
    #[inline]
    #[must_use]
    pub fn tmem_cache_stats(&self) -> Option<TmemCacheStats> {
        self.tmem_cache.as_ref().map(TmemCache::stats)
    }

    #[inline]
    #[must_use]
    pub fn texture_cache(&self) -> &TextureCache<H> {
        &self.texture_cache
    }

    #[inline]
    pub fn texture_cache_mut(&mut self) -> &mut TextureCache<H> {
        &mut self.texture_cache
    }

    #[inline]
    #[must_use]
    pub fn render_state(&self) -> &RenderState {
        &self.render_state
    }

    #[inline]
    #[must_use]
    pub fn combiner_key(&self) -> CombinerKey {
        self.combiner_key
    }

    pub fn load_block(
        &mut self,
        rdram: RdramView<'_>,
        image: &TextureImage,
        target: &LoadTarget,
        block: BlockLoad,
    ) {
        load::load_block(&mut self.tmem, self.tmem_cache.as_mut(), rdram, image, target, block);
    }

    pub fn load_tile(
        &mut self,
        rdram: RdramView<'_>,
        image: &TextureImage,
        target: &LoadTarget,
        rect: LoadRect,
    ) {
        load::load_tile(&mut self.tmem, rdram, image, target, rect);
    }

    pub fn load_tlut(
        &mut self,
        rdram: RdramView<'_>,
        image: &TextureImage,
        tile_tmem: u32,
        rect: LoadRect,
    ) {
        load::load_tlut(&mut self.tmem, rdram, image, tile_tmem, rect);
    }

    /// Bind the texture for a tile to a texture unit, creating it if its content is not cached.
    ///
    /// The TLUT mode comes from the render state last passed to `update_combiner`.
    ///
    /// # Errors
    ///
    /// Propagates any error from the backend while creating the texture.
    pub fn bind_tile<B>(
        &mut self,
        backend: &mut B,
        unit: TextureUnit,
        tile: &TileDescriptor,
    ) -> Result<TextureId, TextureCacheError<B::Err>>
    where
        B: TextureBackend<Handle = H>,
    {
        let tlut = self.render_state.other_mode.tlut_mode();
        self.texture_cache.bind_tile(backend, unit, tile, &self.tmem, tlut)
    }

    /// Record new combiner inputs. Returns whether the combiner key changed.
    pub fn update_combiner(&mut self, mux: u64, state: &RenderState) -> bool {
        self.render_state = *state;

        let key = CombinerKey::with_render_state(mux, state);
        let changed = key != self.combiner_key;
        self.combiner_key = key;

        changed
    }

    /// Forget every cached TMEM load. Call whenever RDRAM may have been modified by something
    /// other than the RDP.
    pub fn invalidate_tmem(&mut self) {
        match &mut self.tmem_cache {
            Some(tmem_cache) => tmem_cache.drop_all(&mut self.tmem),
            None => self.tmem.invalidate_content_hash(),
        }
    }

    /// Return to the state of a freshly created session, destroying all cached textures except
    /// the placeholders.
    pub fn reset<B>(&mut self, backend: &mut B)
    where
        B: TextureBackend<Handle = H>,
    {
        self.texture_cache.clear(backend);
        self.tmem = Tmem::new(self.config.hash_mode);
        if let Some(tmem_cache) = &mut self.tmem_cache {
            tmem_cache.drop_all(&mut self.tmem);
        }
        self.render_state = RenderState::default();
        self.combiner_key = CombinerKey::EMPTY;

        log::debug!("RDP cache session reset");
    }

    /// Write TMEM, the render state, and the combiner key.
    ///
    /// # Errors
    ///
    /// Propagates any encoding or I/O error.
    pub fn save_state<W>(&self, writer: W) -> Result<(), SaveStateError>
    where
        W: io::Write,
    {
        let mut writer = BufWriter::new(writer);

        bincode::encode_into_std_write(&self.tmem, &mut writer, BINCODE_CONFIG)?;
        bincode::encode_into_std_write(self.render_state, &mut writer, BINCODE_CONFIG)?;
        bincode::encode_into_std_write(self.combiner_key, &mut writer, BINCODE_CONFIG)?;
        writer.flush()?;

        Ok(())
    }

    /// Restore state written by `save_state`. Derived caches are dropped since they may not match
    /// the restored TMEM or RDRAM.
    ///
    /// The session is left unchanged if decoding fails.
    ///
    /// # Errors
    ///
    /// Propagates any decoding or I/O error.
    pub fn load_state<B, R>(&mut self, backend: &mut B, reader: R) -> Result<(), SaveStateError>
    where
        B: TextureBackend<Handle = H>,
        R: io::Read,
    {
        let mut reader = BufReader::new(reader);

        let mut tmem: Tmem = bincode::decode_from_std_read(&mut reader, BINCODE_CONFIG)?;
        let render_state = bincode::decode_from_std_read(&mut reader, BINCODE_CONFIG)?;
        let combiner_key = bincode::decode_from_std_read(&mut reader, BINCODE_CONFIG)?;

        // Derived hashes are never trusted from the saved state
        tmem.set_hash_mode(self.config.hash_mode);
        tmem.refresh_all_palette_crcs();
        self.tmem = tmem;
        self.render_state = render_state;
        self.combiner_key = combiner_key;

        self.texture_cache.clear(backend);
        self.invalidate_tmem();

        Ok(())
    }

    /// Destroy every texture owned by the session, including the placeholders.
    pub fn destroy<B>(self, backend: &mut B)
    where
        B: TextureBackend<Handle = H>,
    {
        self.texture_cache.destroy(backend);
    }
}
