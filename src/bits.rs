//! Bit-level utilities for non-power-of-two word widths.
//!
//! Words in a monistode section are `byte_bits` wide, where `byte_bits` is
//! any width from 1 to 32 bits. Bit positions are counted MSB-first: bit 0
//! is the most significant bit of the first word of the stream.

use crate::error::{AssemblerError, Result};

/// Mask with the low `bits` bits set.
///
/// `bits` must be at most 64.
pub const fn mask(bits: u32) -> u128 {
    if bits == 0 {
        0
    } else {
        (1u128 << bits) - 1
    }
}

/// Extract `size` bits starting `offset` bits into a word stream.
///
/// The stream is treated as a contiguous bit string: each word contributes
/// its low `byte_bits` bits, most significant first. The extracted range may
/// straddle any number of word boundaries but must lie entirely inside the
/// stream; `size` must be at most 64.
pub fn extract_bits(words: &[u64], byte_bits: u32, offset: usize, size: u32) -> u64 {
    debug_assert!(size <= 64);
    debug_assert!(offset + size as usize <= words.len() * byte_bits as usize);

    let mut value: u128 = 0;
    let mut taken: u32 = 0;
    let mut position = offset;
    while taken < size {
        let word_index = position / byte_bits as usize;
        let bit_in_word = (position % byte_bits as usize) as u32;
        let available = byte_bits - bit_in_word;
        let take = available.min(size - taken);
        let chunk =
            (words[word_index] >> (available - take)) as u128 & mask(take);
        value = (value << take) | chunk;
        taken += take;
        position += take as usize;
    }
    value as u64
}

/// Pack a word stream into octets, MSB-first, for the on-disk container.
///
/// The final octet is zero-padded on the right when the total bit count is
/// not a multiple of eight.
pub fn pack_words(words: &[u64], byte_bits: u32) -> Vec<u8> {
    let total_bits = words.len() * byte_bits as usize;
    let mut packed = Vec::with_capacity((total_bits + 7) / 8);
    let mut accumulator: u32 = 0;
    let mut bits: u32 = 0;
    for &word in words {
        let mut remaining = byte_bits;
        while remaining > 0 {
            let take = remaining.min(8 - bits);
            let chunk = (word >> (remaining - take)) as u32 & mask(take) as u32;
            accumulator = (accumulator << take) | chunk;
            bits += take;
            remaining -= take;
            if bits == 8 {
                packed.push(accumulator as u8);
                accumulator = 0;
                bits = 0;
            }
        }
    }
    if bits > 0 {
        packed.push((accumulator << (8 - bits)) as u8);
    }
    packed
}

/// Unpack `count` words of `byte_bits` bits each from MSB-first octets.
pub fn unpack_words(bytes: &[u8], byte_bits: u32, count: usize) -> Result<Vec<u64>> {
    let needed_bits = count * byte_bits as usize;
    if bytes.len() * 8 < needed_bits {
        return Err(AssemblerError::TruncatedObject {
            message: format!(
                "expected {} packed words of {} bits, got {} octets",
                count,
                byte_bits,
                bytes.len()
            ),
        });
    }
    let mut words = Vec::with_capacity(count);
    let mut position = 0usize;
    for _ in 0..count {
        let mut word: u64 = 0;
        let mut taken: u32 = 0;
        while taken < byte_bits {
            let byte_index = position / 8;
            let bit_in_byte = (position % 8) as u32;
            let available = 8 - bit_in_byte;
            let take = available.min(byte_bits - taken);
            let chunk = (bytes[byte_index] >> (available - take)) as u64 & mask(take) as u64;
            word = (word << take) | chunk;
            taken += take;
            position += take as usize;
        }
        words.push(word);
    }
    Ok(words)
}

/// Render one word as text: hexadecimal when the word width divides into
/// nibbles, binary otherwise.
pub fn pretty_word(word: u64, byte_bits: u32) -> String {
    if byte_bits % 4 == 0 {
        format!("{:0width$x}", word, width = (byte_bits / 4) as usize)
    } else {
        format!("{:0width$b}", word, width = byte_bits as usize)
    }
}
