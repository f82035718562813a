use std::ops::RangeInclusive;

pub trait GetBit {
    #[must_use]
    fn bit(self, i: u8) -> bool;

    #[must_use]
    fn bits(self, range: RangeInclusive<u8>) -> Self;
}

macro_rules! impl_get_bit {
    ($t:ty) => {
        impl GetBit for $t {
            #[inline]
            fn bit(self, i: u8) -> bool {
                debug_assert!(i < (<$t>::BITS as u8));
                self & (1 << i) != 0
            }

            #[inline]
            fn bits(self, range: RangeInclusive<u8>) -> Self {
                let start = *range.start();
                let end = *range.end();
                debug_assert!(end < (<$t>::BITS as u8));

                (self >> start) & ((1 << (end - start + 1)) - 1)
            }
        }
    };
}

impl_get_bit!(u8);
impl_get_bit!(u16);
impl_get_bit!(u32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_fields() {
        let value: u32 = 0b1100_0000_0000_0000_0000_0000_0000_0110;
        assert!(value.bit(1));
        assert!(!value.bit(0));
        assert_eq!(0b11, value.bits(30..=31));
        assert_eq!(0b011, value.bits(1..=3));
    }
}
