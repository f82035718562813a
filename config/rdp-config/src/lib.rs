//! Configuration types for the RDP texture and combiner caches

use bincode::{Decode, Encode};
use std::fmt::{self, Display};

/// Which texture is evicted first when the content-hashed texture cache is over capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum TextureEvictionPolicy {
    /// Evict in insertion order; cache hits never reorder textures
    #[default]
    InsertionOrder,
    /// Move textures to the most-recently-used position on every hit
    LeastRecentlyUsed,
}

impl Display for TextureEvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsertionOrder => write!(f, "InsertionOrder"),
            Self::LeastRecentlyUsed => write!(f, "LeastRecentlyUsed"),
        }
    }
}

/// Hash function used for TMEM and texture content CRCs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum ContentHashMode {
    /// Seeded XXH3, truncated to 32 bits
    #[default]
    Fast,
    /// Seeded CRC-32 (ISO-HDLC)
    Strict,
}

impl Display for ContentHashMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fast => write!(f, "Fast"),
            Self::Strict => write!(f, "Strict"),
        }
    }
}

pub const DEFAULT_MAX_TEXTURES: usize = 8000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RdpCacheConfig {
    /// Soft limit on the number of content-hashed textures; frame buffer textures and the
    /// placeholder textures do not count against it
    pub max_textures: usize,
    pub eviction_policy: TextureEvictionPolicy,
    pub hash_mode: ContentHashMode,
    pub tmem_cache_enabled: bool,
}

impl Default for RdpCacheConfig {
    fn default() -> Self {
        Self {
            max_textures: DEFAULT_MAX_TEXTURES,
            eviction_policy: TextureEvictionPolicy::default(),
            hash_mode: ContentHashMode::default(),
            tmem_cache_enabled: true,
        }
    }
}

impl Display for RdpCacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "max_textures: {}", self.max_textures)?;
        writeln!(f, "eviction_policy: {}", self.eviction_policy)?;
        writeln!(f, "hash_mode: {}", self.hash_mode)?;
        write!(f, "tmem_cache_enabled: {}", self.tmem_cache_enabled)
    }
}
