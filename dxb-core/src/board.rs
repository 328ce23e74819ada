//! Native board set layout: magic, version, optional password and checksum
//!
//! Layout (all integers little endian):
//!
//! ```text
//! 0x00  magic "BDST"
//! 0x04  version (0..=7)
//! 0x14  password length          (version >= 6)
//! 0x18  password bytes           (version >= 6, length > 0)
//! ...
//! -4    checksum of everything before it (version >= 6)
//! ```
use crate::checksum::checksum;
use crate::codec::{self, read_u32_le, write_u32_le};
use crate::error::{BoardSetError, Result};

/// "BDST" loaded as a little-endian u32
pub const MAGIC: u32 = 0x54534442;

pub const VERSION_OFFSET: usize = 0x4;
pub const PASSWORD_SIZE_OFFSET: usize = 0x14;
pub const PASSWORD_OFFSET: usize = PASSWORD_SIZE_OFFSET + 4;
pub const CHECKSUM_LEN: usize = 4;

pub const MAX_VERSION: u32 = 7;

/// First version carrying a password field and a trailing checksum
pub const CHECKSUM_MIN_VERSION: u32 = 6;

/// True if the buffer starts with the native magic
pub fn is_native(buf: &[u8]) -> bool {
    read_u32_le(buf, 0) == Some(MAGIC)
}

/// Outcome of [`BoardSet::restamp_checksum`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumUpdate {
    /// Version below 6, there is no checksum field
    NotPresent,
    Unchanged(u32),
    Updated { old: u32, new: u32 },
}

/// A board set in native layout, validated on construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardSet {
    data: Vec<u8>,
    version: u32,
    keys: Vec<Vec<u8>>,
    obfuscated: bool,
}

impl BoardSet {
    /// Load a board set from raw file contents, stripping cipher layers if
    /// the magic is missing.
    pub fn load(raw: Vec<u8>) -> Result<Self> {
        if is_native(&raw) {
            return Self::from_native(raw, Vec::new(), false);
        }

        let peeled = codec::peel(&raw)?;
        Self::from_native(peeled.payload, peeled.keys, true)
    }

    fn from_native(data: Vec<u8>, keys: Vec<Vec<u8>>, obfuscated: bool) -> Result<Self> {
        if !is_native(&data) {
            return Err(BoardSetError::BadMagic);
        }

        let version = read_u32_le(&data, VERSION_OFFSET).ok_or(BoardSetError::Truncated {
            field: "version",
            needed: VERSION_OFFSET + 4,
            actual: data.len(),
        })?;
        if version > MAX_VERSION {
            return Err(BoardSetError::UnsupportedVersion(version));
        }

        let board = Self {
            data,
            version,
            keys,
            obfuscated,
        };
        board.check_protected_fields()?;
        Ok(board)
    }

    /// Version 6+ needs room for the password and the trailing checksum
    fn check_protected_fields(&self) -> Result<()> {
        if !self.has_checksum() {
            return Ok(());
        }

        let actual = self.data.len();
        let size = read_u32_le(&self.data, PASSWORD_SIZE_OFFSET).ok_or(
            BoardSetError::Truncated {
                field: "password length",
                needed: PASSWORD_OFFSET,
                actual,
            },
        )?;

        let password_end = PASSWORD_OFFSET.saturating_add(size as usize);
        if password_end > actual {
            return Err(BoardSetError::Truncated {
                field: "password",
                needed: password_end,
                actual,
            });
        }

        let needed = password_end + CHECKSUM_LEN;
        if needed > actual {
            return Err(BoardSetError::Truncated {
                field: "checksum",
                needed,
                actual,
            });
        }

        Ok(())
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Whether the input had to be decoded
    pub fn was_obfuscated(&self) -> bool {
        self.obfuscated
    }

    /// Keys removed while decoding, outermost first
    pub fn keys(&self) -> &[Vec<u8>] {
        &self.keys
    }

    pub fn has_checksum(&self) -> bool {
        self.version >= CHECKSUM_MIN_VERSION
    }

    fn password_len(&self) -> usize {
        if !self.has_checksum() {
            return 0;
        }
        read_u32_le(&self.data, PASSWORD_SIZE_OFFSET).map_or(0, |size| size as usize)
    }

    /// Raw password bytes, `None` if the board set is not protected
    pub fn password(&self) -> Option<&[u8]> {
        match self.password_len() {
            0 => None,
            len => self.data.get(PASSWORD_OFFSET..PASSWORD_OFFSET + len),
        }
    }

    fn checksum_offset(&self) -> usize {
        self.data.len() - CHECKSUM_LEN
    }

    /// Checksum currently stored at the end of the buffer
    pub fn stored_checksum(&self) -> Option<u32> {
        if !self.has_checksum() {
            return None;
        }
        read_u32_le(&self.data, self.checksum_offset())
    }

    /// Checksum over every byte before the checksum field
    pub fn computed_checksum(&self) -> Option<u32> {
        if !self.has_checksum() {
            return None;
        }
        Some(checksum(&self.data[..self.checksum_offset()]))
    }

    /// Copy of this board set with the password removed and its length
    /// field set to zero. The checksum is left stale.
    pub fn strip_password(&self) -> BoardSet {
        let len = self.password_len();
        if len == 0 {
            return self.clone();
        }

        let mut data = Vec::with_capacity(self.data.len() - len);
        data.extend_from_slice(&self.data[..PASSWORD_SIZE_OFFSET]);
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&self.data[PASSWORD_OFFSET + len..]);

        BoardSet {
            data,
            version: self.version,
            keys: self.keys.clone(),
            obfuscated: self.obfuscated,
        }
    }

    /// Recalculate the trailing checksum and overwrite it if it differs
    pub fn restamp_checksum(&mut self) -> ChecksumUpdate {
        let (Some(old), Some(new)) = (self.stored_checksum(), self.computed_checksum()) else {
            return ChecksumUpdate::NotPresent;
        };

        if old == new {
            return ChecksumUpdate::Unchanged(old);
        }

        let offset = self.checksum_offset();
        match write_u32_le(&mut self.data, offset, new) {
            Some(()) => ChecksumUpdate::Updated { old, new },
            None => ChecksumUpdate::NotPresent,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode;
    use std::path::Path;

    /// Build a native board set, stamping a valid checksum for version 6+
    fn native(version: u32, password: &[u8], body: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&MAGIC.to_le_bytes());
        buf.extend_from_slice(&version.to_le_bytes());
        buf.resize(PASSWORD_SIZE_OFFSET, 0xCC);

        if version >= CHECKSUM_MIN_VERSION {
            buf.extend_from_slice(&(password.len() as u32).to_le_bytes());
            buf.extend_from_slice(password);
            buf.extend_from_slice(body);
            let sum = checksum(&buf);
            buf.extend_from_slice(&sum.to_le_bytes());
        } else {
            buf.extend_from_slice(body);
        }
        buf
    }

    #[test]
    fn test_magic_is_bdst() {
        assert_eq!(&MAGIC.to_le_bytes(), b"BDST");
        assert!(is_native(b"BDST\x07\x00\x00\x00"));
        assert!(!is_native(b"BDS"));
        assert!(!is_native(b"TSDB\x07\x00\x00\x00"));
        // Byte-swapped magic is not accepted
        assert!(!is_native(b"DBST\x07\x00\x00\x00"));
    }

    #[test]
    fn test_load_native_protected() {
        let raw = native(7, b"secret", b"bricks");
        let board = BoardSet::load(raw.clone()).unwrap();

        assert_eq!(board.version(), 7);
        assert!(!board.was_obfuscated());
        assert!(board.keys().is_empty());
        assert_eq!(board.password(), Some(&b"secret"[..]));
        assert_eq!(board.stored_checksum(), board.computed_checksum());
        assert_eq!(board.as_bytes(), &raw[..]);
    }

    #[test]
    fn test_load_obfuscated() {
        let raw = native(6, b"", b"level data");
        let enc = encode(&raw, &[&[0x13, 0x37, 0x42][..], &[0x77, 0x88][..]]).unwrap();
        assert!(!is_native(&enc));

        let board = BoardSet::load(enc).unwrap();
        assert!(board.was_obfuscated());
        assert_eq!(board.keys(), &[vec![0x77u8, 0x88], vec![0x13, 0x37, 0x42]]);
        assert_eq!(board.password(), None);
        assert_eq!(board.into_bytes(), raw);
    }

    #[test]
    fn test_decoded_without_magic() {
        let enc = encode(b"XXXX\x07\x00\x00\x00", &[&[0x5A][..]]).unwrap();
        assert_eq!(BoardSet::load(enc), Err(BoardSetError::BadMagic));
    }

    #[test]
    fn test_undecodable_input() {
        assert!(matches!(
            BoardSet::load(b"garbage!".to_vec()),
            Err(BoardSetError::StructuralMismatch { .. })
        ));
        assert!(matches!(
            BoardSet::load(Vec::new()),
            Err(BoardSetError::StructuralMismatch { declared: None, .. })
        ));
    }

    #[test]
    fn test_unsupported_version() {
        let raw = native(8, b"", b"");
        assert_eq!(
            BoardSet::load(raw),
            Err(BoardSetError::UnsupportedVersion(8))
        );
    }

    #[test]
    fn test_truncated_fields() {
        assert_eq!(
            BoardSet::load(b"BDST\x07\x00".to_vec()),
            Err(BoardSetError::Truncated {
                field: "version",
                needed: 8,
                actual: 6
            })
        );

        let mut raw = native(6, b"", b"");
        raw.truncate(0x10);
        assert!(matches!(
            BoardSet::load(raw),
            Err(BoardSetError::Truncated {
                field: "password length",
                ..
            })
        ));

        let mut raw = native(6, b"pw", b"");
        raw[PASSWORD_SIZE_OFFSET] = 0xFF;
        assert!(matches!(
            BoardSet::load(raw),
            Err(BoardSetError::Truncated {
                field: "password",
                ..
            })
        ));

        let mut raw = native(7, b"pw", b"");
        raw.truncate(raw.len() - 1);
        assert!(matches!(
            BoardSet::load(raw),
            Err(BoardSetError::Truncated {
                field: "checksum",
                ..
            })
        ));
    }

    #[test]
    fn test_old_versions_pass_through() {
        for version in 0..CHECKSUM_MIN_VERSION {
            let raw = native(version, b"", b"\x01\x02");
            let mut board = BoardSet::load(raw.clone()).unwrap();

            assert!(!board.has_checksum());
            assert_eq!(board.password(), None);
            assert_eq!(board.stored_checksum(), None);
            assert_eq!(board.restamp_checksum(), ChecksumUpdate::NotPresent);
            assert_eq!(board.strip_password(), board);
            assert_eq!(board.into_bytes(), raw);
        }

        // Nothing past the version is required before version 6
        assert!(BoardSet::load(b"BDST\x05\x00\x00\x00".to_vec()).is_ok());
    }

    #[test]
    fn test_strip_password_and_restamp() {
        let raw = native(7, b"hunter2", b"bricks and balls");
        let board = BoardSet::load(raw.clone()).unwrap();

        let mut stripped = board.strip_password();
        assert_eq!(stripped.password(), None);
        assert_eq!(stripped.as_bytes().len(), raw.len() - 7);
        assert_eq!(
            read_u32_le(stripped.as_bytes(), PASSWORD_SIZE_OFFSET),
            Some(0)
        );
        assert_eq!(
            &stripped.as_bytes()[PASSWORD_OFFSET..PASSWORD_OFFSET + 16],
            b"bricks and balls"
        );

        // Source board set is untouched
        assert_eq!(board.as_bytes(), &raw[..]);

        let update = stripped.restamp_checksum();
        let expected = native(7, b"", b"bricks and balls");
        match update {
            ChecksumUpdate::Updated { old, new } => {
                assert_eq!(old, board.stored_checksum().unwrap());
                assert_eq!(Some(new), stripped.computed_checksum());
            }
            other => panic!("expected an update, got {:?}", other),
        }
        assert_eq!(stripped.as_bytes(), &expected[..]);

        let again = stripped.restamp_checksum();
        assert!(matches!(again, ChecksumUpdate::Unchanged(_)));
    }

    #[test]
    fn test_restamp_repairs_corrupt_checksum() {
        let mut raw = native(6, b"", b"data");
        let last = raw.len() - 1;
        raw[last] ^= 0xFF;

        let mut board = BoardSet::load(raw).unwrap();
        assert_ne!(board.stored_checksum(), board.computed_checksum());
        assert!(matches!(
            board.restamp_checksum(),
            ChecksumUpdate::Updated { .. }
        ));
        assert_eq!(board.into_bytes(), native(6, b"", b"data"));
    }

    #[test]
    fn test_strip_without_password_is_copy() {
        let raw = native(6, b"", b"data");
        let board = BoardSet::load(raw).unwrap();
        assert_eq!(board.strip_password(), board);
    }

    /// Helper to load a real board set and check it survives a full unlock
    fn test_board_file(path: &Path) -> std::result::Result<(), Box<dyn std::error::Error>> {
        let raw = std::fs::read(path)?;
        let board = BoardSet::load(raw)?;

        let mut unlocked = board.strip_password();
        unlocked.restamp_checksum();
        assert_eq!(unlocked.password(), None);
        assert_eq!(unlocked.stored_checksum(), unlocked.computed_checksum());

        let reloaded = BoardSet::load(unlocked.as_bytes().to_vec())?;
        assert_eq!(reloaded.version(), board.version());
        Ok(())
    }

    #[test]
    fn test_all_boards() {
        // Path to board sets directory relative to workspace root
        let boards_dir = Path::new(env!("CARGO_MANIFEST_DIR"))
            .parent()
            .unwrap()
            .join("data")
            .join("boards");

        if !boards_dir.exists() {
            println!("Warning: boards directory not found at {:?}", boards_dir);
            return;
        }

        let mut tested = 0;
        let mut failed = Vec::new();

        for entry in std::fs::read_dir(&boards_dir).expect("Failed to read boards directory") {
            let path = entry.expect("Failed to read directory entry").path();
            if !path.is_file() {
                continue;
            }

            let name = path.file_name().unwrap().to_string_lossy().to_string();
            match test_board_file(&path) {
                Ok(()) => {
                    println!("  ✓ {}: PASSED", name);
                    tested += 1;
                }
                Err(e) => {
                    println!("  ✗ {}: FAILED - {:?}", name, e);
                    failed.push(name);
                }
            }
        }

        if !failed.is_empty() {
            panic!("{} board set(s) failed: {:?}", failed.len(), failed);
        }
        assert!(tested > 0, "No board sets were tested!");
    }
}
