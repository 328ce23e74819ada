//! Error type shared by the decoder, the encoder and the board set model

use thiserror::Error;

/// Everything that can go wrong while unwrapping or inspecting a board set.
///
/// All variants are terminal for the call that produced them; nothing in
/// this crate retries or recovers on its own.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BoardSetError {
    /// The unmasked size header does not match the buffer length.
    ///
    /// `declared` is `None` when the buffer is too short to hold the header.
    #[error("decrypted file size does not match (declared {declared:?}, actual {actual})")]
    StructuralMismatch { declared: Option<u32>, actual: usize },

    /// A cipher layer with an empty (or, when encoding, oversized) key.
    #[error("layer {layer} has an invalid key size")]
    InvalidKeySize { layer: usize },

    /// A layer trailer or key reaches past the start of the buffer.
    #[error("layer {layer} needs {needed} bytes but only {available} remain")]
    TruncatedLayer {
        layer: usize,
        needed: usize,
        available: usize,
    },

    /// The outermost trailer nibble would not read back as the layer count.
    #[error("trailer declares {declared} layers but {layers} were applied")]
    LayerCountMismatch { layers: usize, declared: usize },

    /// Encoded output would not fit the 32-bit size header.
    #[error("buffer of {0} bytes is too large for the size header")]
    TooLarge(usize),

    #[error("not a valid board set (magic missing)")]
    BadMagic,

    #[error("unsupported board set version: {0}")]
    UnsupportedVersion(u32),

    /// A fixed-offset field lies past the end of the buffer.
    #[error("{field} needs {needed} bytes but the board set has only {actual}")]
    Truncated {
        field: &'static str,
        needed: usize,
        actual: usize,
    },
}

pub type Result<T> = std::result::Result<T, BoardSetError>;
