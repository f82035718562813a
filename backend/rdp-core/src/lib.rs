//! Caching layer for an N64 RDP emulator: TMEM load caching, content-hashed textures, and combiner
//! program keys

mod api;
pub mod combiner;
pub mod flathash;
pub mod hash;
mod num;
pub mod rdram;
pub mod registers;
pub mod texture;
pub mod tmem;

pub use api::{RdpSession, SaveStateError};
pub use combiner::{CombinerKey, FastPath, RenderState};
pub use rdram::RdramView;
pub use texture::{TextureBackend, TextureCache, TextureCacheError, TextureUpload, TileDescriptor};
pub use tmem::Tmem;
pub use tmem::cache::TmemCache;
