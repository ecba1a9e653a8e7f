//! Raw sector construction: MSF addresses and filler sectors

use std::fmt;

use super::layout::{CD_SYNC_PATTERN, RAW_SECTOR_SIZE};

/// Frames per second on a CD.
const FRAMES_PER_SECOND: u8 = 75;
/// Lead-in before logical sector 0 (2 seconds).
const LEAD_IN_FRAMES: u64 = 150;

/// Mode byte of a Mode 2 sector header.
const MODE_2: u8 = 0x02;

/// Subheader of an intermediate sector of a file (submode `0x08`, data).
const SUBHEADER_DATA: [u8; 8] = [0x00, 0x00, 0x08, 0x00, 0x00, 0x00, 0x08, 0x00];
/// Subheader of the last sector of a file (submode `0x89`, EOF + EOR + data).
const SUBHEADER_END_OF_FILE: [u8; 8] = [0x00, 0x00, 0x89, 0x00, 0x00, 0x00, 0x89, 0x00];

/// Minutes:seconds:frames disc address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Msf {
    pub minutes: u8,
    pub seconds: u8,
    pub frames: u8,
}

impl Msf {
    #[must_use]
    pub const fn new(minutes: u8, seconds: u8, frames: u8) -> Self {
        Self {
            minutes,
            seconds,
            frames,
        }
    }

    /// Address of logical sector `lba`, including the 150-frame lead-in.
    #[must_use]
    pub fn from_lba(lba: u64) -> Self {
        let total = lba + LEAD_IN_FRAMES;
        let fps = u64::from(FRAMES_PER_SECOND);
        Self {
            minutes: (total / (fps * 60)) as u8,
            seconds: ((total / fps) % 60) as u8,
            frames: (total % fps) as u8,
        }
    }

    /// The next frame; frames roll into seconds at 75, seconds into minutes at 60.
    #[must_use]
    pub fn add_frame(self) -> Self {
        let mut next = Self::new(self.minutes, self.seconds, self.frames + 1);
        if next.frames == FRAMES_PER_SECOND {
            next.frames = 0;
            next.seconds += 1;
            if next.seconds == 60 {
                next.seconds = 0;
                next.minutes += 1;
            }
        }
        next
    }

    /// Binary-coded decimal form as stored in a sector header.
    #[must_use]
    pub fn to_bcd(self) -> [u8; 3] {
        [to_bcd(self.minutes), to_bcd(self.seconds), to_bcd(self.frames)]
    }
}

impl fmt::Display for Msf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.minutes, self.seconds, self.frames)
    }
}

fn to_bcd(value: u8) -> u8 {
    (value / 10) * 16 + value % 10
}

/// Build an empty Mode 2 raw sector.
///
/// `last_of_file` selects the end-of-file subheader instead of the data one.
#[must_use]
pub fn filler_sector(address: Msf, last_of_file: bool) -> [u8; RAW_SECTOR_SIZE as usize] {
    let mut sector = [0u8; RAW_SECTOR_SIZE as usize];
    sector[..12].copy_from_slice(&CD_SYNC_PATTERN);
    sector[12..15].copy_from_slice(&address.to_bcd());
    sector[15] = MODE_2;
    let subheader = if last_of_file {
        &SUBHEADER_END_OF_FILE
    } else {
        &SUBHEADER_DATA
    };
    sector[16..24].copy_from_slice(subheader);
    sector
}
