//! XOR masking of frame payloads ([RFC 6455 Section 5.3](https://datatracker.ietf.org/doc/html/rfc6455#section-5.3)).
//!
//! Masking and unmasking are the same operation: byte `i` of the payload is
//! XORed with `key[i % 4]`. Applying a key twice restores the original bytes.

/// Masks or unmasks `buf` in place with the 4-byte `key`.
///
/// The bulk of the buffer is processed one 4-byte word at a time; the key is
/// reinterpreted with the same native byte order as each word, so the result
/// is independent of the host's endianness.
#[inline]
pub fn apply_mask(buf: &mut [u8], key: [u8; 4]) {
    let key_word = u32::from_ne_bytes(key);

    let mut words = buf.chunks_exact_mut(4);
    for word in &mut words {
        let masked = u32::from_ne_bytes([word[0], word[1], word[2], word[3]]) ^ key_word;
        word.copy_from_slice(&masked.to_ne_bytes());
    }

    // The remainder starts at a multiple of 4, so the key restarts at index 0.
    apply_mask_bytewise(words.into_remainder(), key);
}

/// Byte-at-a-time masking, used for the tail and as the reference behavior.
#[inline]
fn apply_mask_bytewise(buf: &mut [u8], key: [u8; 4]) {
    for (i, byte) in buf.iter_mut().enumerate() {
        *byte ^= key[i & 3];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmask_to_zero() {
        let key = [0x01, 0x02, 0x03, 0x04];
        let mut data = [0x01, 0x02, 0x03, 0x04];
        apply_mask(&mut data, key);
        assert_eq!(data, [0x00; 4]);
    }

    #[test]
    fn test_word_path_matches_bytewise() {
        let keys = [
            [0x00, 0x00, 0x00, 0x00],
            [0xFF, 0xFF, 0xFF, 0xFF],
            [0x6d, 0xb6, 0xb2, 0x80],
            [0x12, 0x34, 0x56, 0x78],
        ];

        for key in keys {
            for size in 0..=37 {
                let data: Vec<u8> = (0..size).map(|i| (i * 13 + 5) as u8).collect();

                let mut expected = data.clone();
                apply_mask_bytewise(&mut expected, key);

                let mut actual = data;
                apply_mask(&mut actual, key);

                assert_eq!(expected, actual, "key {:?}, size {}", key, size);
            }
        }
    }

    #[test]
    fn test_mask_twice_is_identity() {
        let key = [0xAA, 0xBB, 0xCC, 0xDD];
        let original = b"Hello, World! This payload has an odd length.";

        let mut data = original.to_vec();
        apply_mask(&mut data, key);
        assert_ne!(&data[..], &original[..]);

        apply_mask(&mut data, key);
        assert_eq!(&data[..], &original[..]);
    }

    #[test]
    fn test_short_buffers() {
        let key = [0x12, 0x34, 0x56, 0x78];

        let mut empty: Vec<u8> = vec![];
        apply_mask(&mut empty, key);
        assert!(empty.is_empty());

        let mut three = vec![0xAB, 0xCD, 0xEF];
        apply_mask(&mut three, key);
        assert_eq!(three, vec![0xAB ^ 0x12, 0xCD ^ 0x34, 0xEF ^ 0x56]);
    }

    #[test]
    fn test_unaligned_subslice() {
        let key = [0x11, 0x22, 0x33, 0x44];
        let mut buffer: Vec<u8> = (0..23).collect();

        for offset in 0..4 {
            let original = buffer[offset..].to_vec();
            apply_mask(&mut buffer[offset..], key);

            for (i, &byte) in buffer[offset..].iter().enumerate() {
                assert_eq!(byte, original[i] ^ key[i % 4], "offset {} index {}", offset, i);
            }

            apply_mask(&mut buffer[offset..], key);
            assert_eq!(&buffer[offset..], &original[..]);
        }
    }
}
