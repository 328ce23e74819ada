//! core functionality for unlocking DX-Ball 2 board sets
//!
//! # Modules
//!
//! - `codec`: Layered XOR container (decode/encode)
//! - `crypto`: Repeating-key XOR primitive
//! - `checksum`: Rolling checksum of the native layout
//! - `board`: Native board set layout, password removal and checksum restamp
//! - `error`: Error type shared by all of the above

pub mod board;
pub mod checksum;
pub mod codec;
pub mod crypto;
pub mod error;

// Re-export commonly used items
pub use board::{BoardSet, ChecksumUpdate, MAGIC, MAX_VERSION, is_native};
pub use checksum::checksum;
pub use codec::{Peeled, SIZE_MASK, decode, encode, peel};
pub use error::{BoardSetError, Result};
