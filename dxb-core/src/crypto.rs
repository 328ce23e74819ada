//! Repeating-key XOR used by every cipher layer

/// Largest key a layer can describe with its 4-bit trailer
pub const MAX_KEY_SIZE: usize = 0xF;

/// XORs `data` in place with `key`, cycling the key from index 0.
///
/// XOR is its own inverse, so the same call applies and removes a layer.
/// An empty key leaves `data` untouched; callers reject empty keys first.
pub fn xor_cycle(data: &mut [u8], key: &[u8]) {
    for (byte, k) in data.iter_mut().zip(key.iter().cycle()) {
        *byte ^= k;
    }
}

/// Low nibble of a trailer byte
#[inline]
pub fn nibble(byte: u8) -> usize {
    (byte & 0x0F) as usize
}
