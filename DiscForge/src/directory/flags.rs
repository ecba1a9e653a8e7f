//! ISO-9660 file flags

use std::fmt;

/// The file flags byte of a directory record.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FileFlags(u8);

impl FileFlags {
    pub const HIDDEN: u8 = 0x01;
    pub const DIRECTORY: u8 = 0x02;
    pub const ASSOCIATED: u8 = 0x04;
    pub const RECORD: u8 = 0x08;
    pub const PROTECTION: u8 = 0x10;
    pub const MULTI_EXTENT: u8 = 0x80;

    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn hidden(self) -> bool {
        self.0 & Self::HIDDEN != 0
    }

    #[must_use]
    pub const fn directory(self) -> bool {
        self.0 & Self::DIRECTORY != 0
    }

    #[must_use]
    pub const fn associated(self) -> bool {
        self.0 & Self::ASSOCIATED != 0
    }

    #[must_use]
    pub const fn record(self) -> bool {
        self.0 & Self::RECORD != 0
    }

    #[must_use]
    pub const fn protection(self) -> bool {
        self.0 & Self::PROTECTION != 0
    }

    /// Set when further records for this file follow.
    #[must_use]
    pub const fn multi_extent(self) -> bool {
        self.0 & Self::MULTI_EXTENT != 0
    }

    /// Copy with `flag` set or cleared.
    #[must_use]
    pub const fn with(self, flag: u8, on: bool) -> Self {
        if on { Self(self.0 | flag) } else { Self(self.0 & !flag) }
    }
}

impl fmt::Debug for FileFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (self.hidden(), "hidden"),
            (self.directory(), "directory"),
            (self.associated(), "associated"),
            (self.record(), "record"),
            (self.protection(), "protection"),
            (self.multi_extent(), "multi_extent"),
        ]
        .iter()
        .filter(|(set, _)| *set)
        .map(|(_, name)| *name)
        .collect();
        write!(f, "FileFlags({:#04X} [{}])", self.0, names.join(" | "))
    }
}
