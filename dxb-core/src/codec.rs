//! Layered XOR container: size header, ciphertext and stacked key trailers
use crate::crypto::{MAX_KEY_SIZE, nibble, xor_cycle};
use crate::error::{BoardSetError, Result};

/// XOR mask applied to the size header of obfuscated board sets
pub const SIZE_MASK: u32 = 0xABBAFAD5;

/// Length of the masked size header
pub const HEADER_LEN: usize = 4;

/// The layer count lives in a 4-bit trailer
pub const MAX_LAYERS: usize = 0xF;

/// Layout: [size ^ SIZE_MASK (4 LE) | data | key_n | n | ... | key_1 | k1]
///
/// The last trailer byte doubles as the layer count, so the outermost key
/// length always equals the number of layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peeled {
    pub payload: Vec<u8>,
    /// Keys in removal order, outermost first
    pub keys: Vec<Vec<u8>>,
}

/// Read a little-endian u32 at `offset`, `None` if it runs past the end
pub fn read_u32_le(buf: &[u8], offset: usize) -> Option<u32> {
    let bytes = buf.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Write a little-endian u32 at `offset`, `None` if it runs past the end
pub fn write_u32_le(buf: &mut [u8], offset: usize, value: u32) -> Option<()> {
    buf.get_mut(offset..offset.checked_add(4)?)?
        .copy_from_slice(&value.to_le_bytes());
    Some(())
}

/// Check that the unmasked size header equals the buffer length
pub fn check_size_header(buffer: &[u8]) -> Result<()> {
    let declared = read_u32_le(buffer, 0).map(|masked| masked ^ SIZE_MASK);

    match declared {
        Some(size) if u64::from(size) == buffer.len() as u64 => Ok(()),
        _ => Err(BoardSetError::StructuralMismatch {
            declared,
            actual: buffer.len(),
        }),
    }
}

/// Strip every cipher layer and return the plaintext
pub fn decode(buffer: &[u8]) -> Result<Vec<u8>> {
    peel(buffer).map(|peeled| peeled.payload)
}

/// Same as [`decode`], but also hands back the keys that were removed
pub fn peel(buffer: &[u8]) -> Result<Peeled> {
    check_size_header(buffer)?;

    let mut work = buffer[HEADER_LEN..].to_vec();
    let mut remaining = work.len();

    // Layer 0 stands for the count trailer itself
    let layer_count = match work.last() {
        Some(&byte) => nibble(byte),
        None => {
            return Err(BoardSetError::TruncatedLayer {
                layer: 0,
                needed: 1,
                available: 0,
            });
        }
    };

    let mut keys = Vec::with_capacity(layer_count);
    for layer in 1..=layer_count {
        let key = read_layer_key(&work, &mut remaining, layer)?;
        xor_cycle(&mut work[..remaining], &key);
        keys.push(key);
    }

    work.truncate(remaining);
    Ok(Peeled {
        payload: work,
        keys,
    })
}

/// Pop one layer's trailer and key off the end of `work[..remaining]`
fn read_layer_key(work: &[u8], remaining: &mut usize, layer: usize) -> Result<Vec<u8>> {
    let available = *remaining;

    let trailer_pos = available
        .checked_sub(1)
        .ok_or(BoardSetError::TruncatedLayer {
            layer,
            needed: 1,
            available,
        })?;

    let key_size = nibble(work[trailer_pos]);
    if key_size == 0 {
        return Err(BoardSetError::InvalidKeySize { layer });
    }

    let key_start = trailer_pos
        .checked_sub(key_size)
        .ok_or(BoardSetError::TruncatedLayer {
            layer,
            needed: key_size + 1,
            available,
        })?;

    *remaining = key_start;
    Ok(work[key_start..trailer_pos].to_vec())
}

/// Apply cipher layers to `payload` and prefix the masked size header.
///
/// `keys[0]` is applied first and therefore removed last. Every key must be
/// 1..=15 bytes and the last key's length must equal `keys.len()`, since its
/// trailer is what [`decode`] reads as the layer count.
pub fn encode(payload: &[u8], keys: &[&[u8]]) -> Result<Vec<u8>> {
    let mut work = payload.to_vec();

    for (i, key) in keys.iter().enumerate() {
        let layer = keys.len() - i;
        if key.is_empty() || key.len() > MAX_KEY_SIZE {
            return Err(BoardSetError::InvalidKeySize { layer });
        }

        xor_cycle(&mut work, key);
        work.extend_from_slice(key);
        work.push(key.len() as u8);
    }

    let declared = match work.last() {
        Some(&byte) => nibble(byte),
        None => {
            return Err(BoardSetError::TruncatedLayer {
                layer: 0,
                needed: 1,
                available: 0,
            });
        }
    };
    if declared != keys.len() {
        return Err(BoardSetError::LayerCountMismatch {
            layers: keys.len(),
            declared,
        });
    }

    let total = work.len() + HEADER_LEN;
    let size = u32::try_from(total).map_err(|_| BoardSetError::TooLarge(total))?;

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&(size ^ SIZE_MASK).to_le_bytes());
    out.extend_from_slice(&work);
    Ok(out)
}
