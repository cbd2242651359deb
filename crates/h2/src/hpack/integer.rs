//! HPACK prefix-coded integers (RFC 7541 §5.1).

use super::HpackError;

/// Largest value we accept; anything above cannot be a real length or index.
const MAX_VALUE: u64 = u32::MAX as u64;

/// Writes `value` with an `prefix_bits`-bit prefix, OR-ing `first_byte_flags` into the
/// unused high bits of the first octet.
pub fn encode(value: usize, prefix_bits: u8, first_byte_flags: u8, dst: &mut Vec<u8>) {
    debug_assert!((1..=8).contains(&prefix_bits));
    let max_prefix = (1usize << prefix_bits) - 1;

    if value < max_prefix {
        dst.push(first_byte_flags | value as u8);
        return;
    }

    dst.push(first_byte_flags | max_prefix as u8);
    let mut rest = value - max_prefix;
    while rest >= 0x80 {
        dst.push((rest & 0x7f) as u8 | 0x80);
        rest >>= 7;
    }
    dst.push(rest as u8);
}

/// Reads an integer with an `prefix_bits`-bit prefix from the start of `src`.
///
/// Returns the value and the number of octets consumed.
pub fn decode(src: &[u8], prefix_bits: u8) -> Result<(usize, usize), HpackError> {
    debug_assert!((1..=8).contains(&prefix_bits));
    let max_prefix = (1u64 << prefix_bits) - 1;

    let first = *src.first().ok_or(HpackError::Truncated)?;
    let mut value = u64::from(first) & max_prefix;
    if value < max_prefix {
        return Ok((value as usize, 1));
    }

    let mut shift = 0u32;
    for (i, byte) in src[1..].iter().enumerate() {
        if shift > 28 {
            return Err(HpackError::IntegerOverflow);
        }
        value += u64::from(byte & 0x7f) << shift;
        if value > MAX_VALUE {
            return Err(HpackError::IntegerOverflow);
        }
        if byte & 0x80 == 0 {
            return Ok((value as usize, i + 2));
        }
        shift += 7;
    }

    Err(HpackError::Truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(value: usize, prefix_bits: u8) -> Vec<u8> {
        let mut dst = Vec::new();
        encode(value, prefix_bits, 0, &mut dst);
        dst
    }

    #[test]
    fn rfc_examples() {
        // C.1.1 - C.1.3
        assert_eq!(encoded(10, 5), [0b0000_1010]);
        assert_eq!(encoded(1337, 5), [0b0001_1111, 0b1001_1010, 0b0000_1010]);
        assert_eq!(encoded(42, 8), [42]);

        assert_eq!(decode(&[0b1110_1010], 5).unwrap(), (10, 1));
        assert_eq!(decode(&[0b0001_1111, 0b1001_1010, 0b0000_1010], 5).unwrap(), (1337, 3));
    }

    #[test]
    fn prefix_boundary() {
        // one below 2^N - 1 fits the prefix
        assert_eq!(encoded(30, 5), [30]);
        // exactly 2^N - 1 takes the continuation path with a zero octet
        assert_eq!(encoded(31, 5), [31, 0]);
        assert_eq!(decode(&[31, 0], 5).unwrap(), (31, 2));
        assert_eq!(encoded(126, 7), [126]);
        assert_eq!(encoded(127, 7), [127, 0]);
    }

    #[test]
    fn keeps_flag_bits() {
        let mut dst = Vec::new();
        encode(2, 7, 0x80, &mut dst);
        assert_eq!(dst, [0x82]);
    }

    #[test]
    fn truncated_input() {
        assert_eq!(decode(&[], 7), Err(HpackError::Truncated));
        assert_eq!(decode(&[0x7f, 0x80, 0x80], 7), Err(HpackError::Truncated));
    }

    #[test]
    fn overflow_is_rejected() {
        let src = [0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x7f];
        assert_eq!(decode(&src, 7), Err(HpackError::IntegerOverflow));

        // zero-valued continuation octets must not shift forever
        let mut padded = vec![0x7f];
        padded.extend(std::iter::repeat_n(0x80, 16));
        padded.push(0x01);
        assert_eq!(decode(&padded, 7), Err(HpackError::IntegerOverflow));
    }
}
