//! Canonical Huffman coding for HPACK string literals (RFC 7541 Appendix B).
//!
//! Encoding packs codes MSB-first and pads the last octet with the high-order
//! bits of EOS, which are all ones. Decoding walks a binary trie built once from
//! the same table, one bit at a time, restarting at the root after every symbol.

use once_cell::sync::Lazy;
use thiserror::Error;

/// Index of the end-of-string symbol in [`HUFFMAN_CODES`].
const EOS: u16 = 256;

const ROOT: usize = 0;
const NO_CHILD: u16 = 0;
const NO_SYMBOL: u16 = u16::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HuffmanError {
    #[error("bit sequence does not match any huffman code")]
    InvalidCode,
    #[error("EOS symbol found inside a huffman string")]
    UnexpectedEos,
    #[error("huffman padding is longer than 7 bits or is not an EOS prefix")]
    InvalidPadding,
}

/// `(code, bit length)` per symbol; symbols 0..=255 are octets, 256 is EOS.
#[rustfmt::skip]
static HUFFMAN_CODES: [(u32, u8); 257] = [
    (0x1ff8, 13),
    (0x7fffd8, 23),
    (0xfffffe2, 28),
    (0xfffffe3, 28),
    (0xfffffe4, 28),
    (0xfffffe5, 28),
    (0xfffffe6, 28),
    (0xfffffe7, 28),
    (0xfffffe8, 28),
    (0xffffea, 24),
    (0x3ffffffc, 30),
    (0xfffffe9, 28),
    (0xfffffea, 28),
    (0x3ffffffd, 30),
    (0xfffffeb, 28),
    (0xfffffec, 28),
    (0xfffffed, 28),
    (0xfffffee, 28),
    (0xfffffef, 28),
    (0xffffff0, 28),
    (0xffffff1, 28),
    (0xffffff2, 28),
    (0x3ffffffe, 30),
    (0xffffff3, 28),
    (0xffffff4, 28),
    (0xffffff5, 28),
    (0xffffff6, 28),
    (0xffffff7, 28),
    (0xffffff8, 28),
    (0xffffff9, 28),
    (0xffffffa, 28),
    (0xffffffb, 28),
    (0x14, 6),
    (0x3f8, 10),
    (0x3f9, 10),
    (0xffa, 12),
    (0x1ff9, 13),
    (0x15, 6),
    (0xf8, 8),
    (0x7fa, 11),
    (0x3fa, 10),
    (0x3fb, 10),
    (0xf9, 8),
    (0x7fb, 11),
    (0xfa, 8),
    (0x16, 6),
    (0x17, 6),
    (0x18, 6),
    (0x0, 5),
    (0x1, 5),
    (0x2, 5),
    (0x19, 6),
    (0x1a, 6),
    (0x1b, 6),
    (0x1c, 6),
    (0x1d, 6),
    (0x1e, 6),
    (0x1f, 6),
    (0x5c, 7),
    (0xfb, 8),
    (0x7ffc, 15),
    (0x20, 6),
    (0xffb, 12),
    (0x3fc, 10),
    (0x1ffa, 13),
    (0x21, 6),
    (0x5d, 7),
    (0x5e, 7),
    (0x5f, 7),
    (0x60, 7),
    (0x61, 7),
    (0x62, 7),
    (0x63, 7),
    (0x64, 7),
    (0x65, 7),
    (0x66, 7),
    (0x67, 7),
    (0x68, 7),
    (0x69, 7),
    (0x6a, 7),
    (0x6b, 7),
    (0x6c, 7),
    (0x6d, 7),
    (0x6e, 7),
    (0x6f, 7),
    (0x70, 7),
    (0x71, 7),
    (0x72, 7),
    (0xfc, 8),
    (0x73, 7),
    (0xfd, 8),
    (0x1ffb, 13),
    (0x7fff0, 19),
    (0x1ffc, 13),
    (0x3ffc, 14),
    (0x22, 6),
    (0x7ffd, 15),
    (0x3, 5),
    (0x23, 6),
    (0x4, 5),
    (0x24, 6),
    (0x5, 5),
    (0x25, 6),
    (0x26, 6),
    (0x27, 6),
    (0x6, 5),
    (0x74, 7),
    (0x75, 7),
    (0x28, 6),
    (0x29, 6),
    (0x2a, 6),
    (0x7, 5),
    (0x2b, 6),
    (0x76, 7),
    (0x2c, 6),
    (0x8, 5),
    (0x9, 5),
    (0x2d, 6),
    (0x77, 7),
    (0x78, 7),
    (0x79, 7),
    (0x7a, 7),
    (0x7b, 7),
    (0x7ffe, 15),
    (0x7fc, 11),
    (0x3ffd, 14),
    (0x1ffd, 13),
    (0xffffffc, 28),
    (0xfffe6, 20),
    (0x3fffd2, 22),
    (0xfffe7, 20),
    (0xfffe8, 20),
    (0x3fffd3, 22),
    (0x3fffd4, 22),
    (0x3fffd5, 22),
    (0x7fffd9, 23),
    (0x3fffd6, 22),
    (0x7fffda, 23),
    (0x7fffdb, 23),
    (0x7fffdc, 23),
    (0x7fffdd, 23),
    (0x7fffde, 23),
    (0xffffeb, 24),
    (0x7fffdf, 23),
    (0xffffec, 24),
    (0xffffed, 24),
    (0x3fffd7, 22),
    (0x7fffe0, 23),
    (0xffffee, 24),
    (0x7fffe1, 23),
    (0x7fffe2, 23),
    (0x7fffe3, 23),
    (0x7fffe4, 23),
    (0x1fffdc, 21),
    (0x3fffd8, 22),
    (0x7fffe5, 23),
    (0x3fffd9, 22),
    (0x7fffe6, 23),
    (0x7fffe7, 23),
    (0xffffef, 24),
    (0x3fffda, 22),
    (0x1fffdd, 21),
    (0xfffe9, 20),
    (0x3fffdb, 22),
    (0x3fffdc, 22),
    (0x7fffe8, 23),
    (0x7fffe9, 23),
    (0x1fffde, 21),
    (0x7fffea, 23),
    (0x3fffdd, 22),
    (0x3fffde, 22),
    (0xfffff0, 24),
    (0x1fffdf, 21),
    (0x3fffdf, 22),
    (0x7fffeb, 23),
    (0x7fffec, 23),
    (0x1fffe0, 21),
    (0x1fffe1, 21),
    (0x3fffe0, 22),
    (0x1fffe2, 21),
    (0x7fffed, 23),
    (0x3fffe1, 22),
    (0x7fffee, 23),
    (0x7fffef, 23),
    (0xfffea, 20),
    (0x3fffe2, 22),
    (0x3fffe3, 22),
    (0x3fffe4, 22),
    (0x7ffff0, 23),
    (0x3fffe5, 22),
    (0x3fffe6, 22),
    (0x7ffff1, 23),
    (0x3ffffe0, 26),
    (0x3ffffe1, 26),
    (0xfffeb, 20),
    (0x7fff1, 19),
    (0x3fffe7, 22),
    (0x7ffff2, 23),
    (0x3fffe8, 22),
    (0x1ffffec, 25),
    (0x3ffffe2, 26),
    (0x3ffffe3, 26),
    (0x3ffffe4, 26),
    (0x7ffffde, 27),
    (0x7ffffdf, 27),
    (0x3ffffe5, 26),
    (0xfffff1, 24),
    (0x1ffffed, 25),
    (0x7fff2, 19),
    (0x1fffe3, 21),
    (0x3ffffe6, 26),
    (0x7ffffe0, 27),
    (0x7ffffe1, 27),
    (0x3ffffe7, 26),
    (0x7ffffe2, 27),
    (0xfffff2, 24),
    (0x1fffe4, 21),
    (0x1fffe5, 21),
    (0x3ffffe8, 26),
    (0x3ffffe9, 26),
    (0xffffffd, 28),
    (0x7ffffe3, 27),
    (0x7ffffe4, 27),
    (0x7ffffe5, 27),
    (0xfffec, 20),
    (0xfffff3, 24),
    (0xfffed, 20),
    (0x1fffe6, 21),
    (0x3fffe9, 22),
    (0x1fffe7, 21),
    (0x1fffe8, 21),
    (0x7ffff3, 23),
    (0x3fffea, 22),
    (0x3fffeb, 22),
    (0x1ffffee, 25),
    (0x1ffffef, 25),
    (0xfffff4, 24),
    (0xfffff5, 24),
    (0x3ffffea, 26),
    (0x7ffff4, 23),
    (0x3ffffeb, 26),
    (0x7ffffe6, 27),
    (0x3ffffec, 26),
    (0x3ffffed, 26),
    (0x7ffffe7, 27),
    (0x7ffffe8, 27),
    (0x7ffffe9, 27),
    (0x7ffffea, 27),
    (0x7ffffeb, 27),
    (0xffffffe, 28),
    (0x7ffffec, 27),
    (0x7ffffed, 27),
    (0x7ffffee, 27),
    (0x7ffffef, 27),
    (0x7fffff0, 27),
    (0x3ffffee, 26),
    (0x3fffffff, 30),
];

#[derive(Clone, Copy)]
struct Node {
    children: [u16; 2],
    symbol: u16,
}

struct DecodeTree {
    nodes: Vec<Node>,
}

static DECODE_TREE: Lazy<DecodeTree> = Lazy::new(DecodeTree::build);

impl DecodeTree {
    fn build() -> Self {
        let mut nodes = vec![Node { children: [NO_CHILD; 2], symbol: NO_SYMBOL }];

        for (symbol, &(code, len)) in HUFFMAN_CODES.iter().enumerate() {
            let mut current = ROOT;
            for shift in (0..len).rev() {
                let bit = ((code >> shift) & 1) as usize;
                let next = nodes[current].children[bit];
                current = if next == NO_CHILD {
                    nodes.push(Node { children: [NO_CHILD; 2], symbol: NO_SYMBOL });
                    let created = nodes.len() - 1;
                    nodes[current].children[bit] = created as u16;
                    created
                } else {
                    next as usize
                };
            }
            nodes[current].symbol = symbol as u16;
        }

        Self { nodes }
    }
}

/// Number of octets `src` occupies once Huffman encoded.
pub fn encoded_len(src: &[u8]) -> usize {
    let bits: usize = src.iter().map(|b| HUFFMAN_CODES[*b as usize].1 as usize).sum();
    bits.div_ceil(8)
}

/// Appends the Huffman encoding of `src` to `dst`.
pub fn encode(src: &[u8], dst: &mut Vec<u8>) {
    dst.reserve(encoded_len(src));

    // at most 7 pending bits survive each iteration, so 7 + 30 bits fit easily
    let mut acc: u64 = 0;
    let mut pending: u32 = 0;

    for byte in src {
        let (code, len) = HUFFMAN_CODES[*byte as usize];
        acc = (acc << len) | u64::from(code);
        pending += u32::from(len);

        while pending >= 8 {
            pending -= 8;
            dst.push((acc >> pending) as u8);
        }
        acc &= (1 << pending) - 1;
    }

    if pending > 0 {
        let padding = 8 - pending;
        dst.push(((acc << padding) as u8) | ((1u8 << padding) - 1));
    }
}

/// Appends the decoded octets of the Huffman string `src` to `dst`.
pub fn decode(src: &[u8], dst: &mut Vec<u8>) -> Result<(), HuffmanError> {
    let tree = &*DECODE_TREE;
    let mut current = ROOT;
    // bits walked since the last emitted symbol, and whether they were all ones
    let mut depth = 0u32;
    let mut all_ones = true;

    for byte in src {
        for shift in (0..8).rev() {
            let bit = (byte >> shift) & 1;
            let next = tree.nodes[current].children[bit as usize];
            if next == NO_CHILD {
                return Err(HuffmanError::InvalidCode);
            }

            current = next as usize;
            depth += 1;
            all_ones &= bit == 1;

            let symbol = tree.nodes[current].symbol;
            if symbol != NO_SYMBOL {
                if symbol == EOS {
                    return Err(HuffmanError::UnexpectedEos);
                }
                dst.push(symbol as u8);
                current = ROOT;
                depth = 0;
                all_ones = true;
            }
        }
    }

    if depth > 7 || !all_ones {
        return Err(HuffmanError::InvalidPadding);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_to_vec(src: &[u8]) -> Vec<u8> {
        let mut dst = Vec::new();
        encode(src, &mut dst);
        dst
    }

    fn decode_to_vec(src: &[u8]) -> Result<Vec<u8>, HuffmanError> {
        let mut dst = Vec::new();
        decode(src, &mut dst).map(|_| dst)
    }

    #[test]
    fn encodes_rfc_examples() {
        // RFC 7541 C.4.1 - C.4.3
        assert_eq!(encode_to_vec(b"www.example.com"), [0xf1, 0xe3, 0xc2, 0xe5, 0xf2, 0x3a, 0x6b, 0xa0, 0xab, 0x90, 0xf4, 0xff]);
        assert_eq!(encode_to_vec(b"no-cache"), [0xa8, 0xeb, 0x10, 0x64, 0x9c, 0xbf]);
        assert_eq!(encode_to_vec(b"custom-key"), [0x25, 0xa8, 0x49, 0xe9, 0x5b, 0xa9, 0x7d, 0x7f]);
    }

    #[test]
    fn decodes_rfc_examples() {
        let decoded = decode_to_vec(&[0x25, 0xa8, 0x49, 0xe9, 0x5b, 0xb8, 0xe8, 0xb4, 0xbf]).unwrap();
        assert_eq!(decoded, b"custom-value");
    }

    #[test]
    fn empty_string() {
        assert!(encode_to_vec(b"").is_empty());
        assert_eq!(decode_to_vec(&[]).unwrap(), b"");
        assert_eq!(encoded_len(b""), 0);
    }

    #[test]
    fn every_octet_survives() {
        let all: Vec<u8> = (0..=255u8).collect();
        let encoded = encode_to_vec(&all);
        assert_eq!(encoded.len(), encoded_len(&all));
        assert_eq!(decode_to_vec(&encoded).unwrap(), all);

        let mixed = b"\x00\xffGET /index.html?q=\xe4\xbd\xa0\xe5\xa5\xbd";
        assert_eq!(decode_to_vec(&encode_to_vec(mixed)).unwrap(), mixed);
    }

    #[test]
    fn rejects_long_padding() {
        // a full octet of ones is an EOS prefix but longer than 7 bits
        assert_eq!(decode_to_vec(&[0xff]), Err(HuffmanError::InvalidPadding));
    }

    #[test]
    fn rejects_zero_padding() {
        // 'a' is 00011 (5 bits); padding with zeros instead of ones
        assert_eq!(decode_to_vec(&[0b0001_1000]), Err(HuffmanError::InvalidPadding));
    }

    #[test]
    fn rejects_eos_in_string() {
        // 30 one bits form EOS; the trailing 2 bits pad the last octet
        assert_eq!(decode_to_vec(&[0xff, 0xff, 0xff, 0xff]), Err(HuffmanError::UnexpectedEos));
    }
}
