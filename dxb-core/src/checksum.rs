//! Rolling checksum stamped at the end of version 6+ board sets

/// Seed mixed with the range length before the first byte
pub const SEED: u32 = 0x5E04A58C;

/// Calculate the checksum of a byte range.
///
/// Engine formula: start from `len ^ SEED`, then for every byte
/// `state = index ^ byte ^ state.rotate_left(1)`. Length and index wrap
/// at 32 bits like the engine's own counters.
pub fn checksum(range: &[u8]) -> u32 {
    let seed = (range.len() as u32) ^ SEED;

    range
        .iter()
        .enumerate()
        .fold(seed, |state, (index, &byte)| {
            (index as u32) ^ u32::from(byte) ^ state.rotate_left(1)
        })
}
