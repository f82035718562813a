//! Read-only view of emulated RDRAM
//!
//! RDRAM is handed to the video layer as host-order 32-bit words: the byte at N64 address `a` is
//! stored at host index `a ^ 3`. Every read here undoes that swizzle so callers work with N64
//! addresses and big-endian values.

#[derive(Debug, Clone, Copy)]
pub struct RdramView<'a> {
    words: &'a [u8],
}

impl<'a> RdramView<'a> {
    #[must_use]
    pub fn new(words: &'a [u8]) -> Self {
        Self { words }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> u32 {
        self.words.len() as u32
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn read_u8(&self, address: u32) -> u8 {
        self.words.get((address ^ 3) as usize).copied().unwrap_or(0)
    }

    #[inline]
    #[must_use]
    pub fn read_u16(&self, address: u32) -> u16 {
        u16::from_be_bytes([self.read_u8(address), self.read_u8(address.wrapping_add(1))])
    }

    /// Read the 32-bit word at a word-aligned address
    #[inline]
    #[must_use]
    pub fn read_u32(&self, address: u32) -> u32 {
        let address = (address & !3) as usize;
        match self.words.get(address..address + 4) {
            Some(word) => u32::from_le_bytes([word[0], word[1], word[2], word[3]]),
            None => 0,
        }
    }

    /// Host-order word at a word-aligned address, converted to N64 byte order
    #[inline]
    pub(crate) fn word_bytes(&self, address: u32) -> [u8; 4] {
        self.read_u32(address).to_be_bytes()
    }
}

/// Convert N64-order bytes into the host-order word layout that `RdramView` reads.
///
/// Used by frontends that keep RDRAM in N64 byte order and by tests.
#[must_use]
pub fn swap_words(n64_bytes: &[u8]) -> Vec<u8> {
    let mut words = n64_bytes.to_vec();
    words.resize(n64_bytes.len().next_multiple_of(4), 0);
    for word in words.chunks_exact_mut(4) {
        word.reverse();
    }
    words
}
