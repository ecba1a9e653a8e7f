//! Directory table: the list of records making up one directory extent

use std::collections::HashSet;

use super::entry::DirectoryEntry;
use crate::error::{Error, Result};
use crate::iso::PAYLOAD_SIZE;

const SECTOR: usize = PAYLOAD_SIZE as usize;

/// The entries of one directory, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryTable {
    entries: Vec<DirectoryEntry>,
}

impl DirectoryTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a directory extent.
    ///
    /// A zero length byte ends the records of the current sector; parsing
    /// resumes at the next sector boundary and stops at the end of `raw`.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let mut table = Self::new();
        let mut pos = 0usize;

        while pos < raw.len() {
            let record_len = raw[pos] as usize;
            let sector_end = ((pos / SECTOR + 1) * SECTOR).min(raw.len());
            if record_len == 0 {
                pos = sector_end;
                continue;
            }
            if pos + record_len > sector_end {
                return Err(Error::InvalidDirectoryRecord {
                    offset: pos,
                    reason: format!("record of {record_len} bytes crosses a sector boundary"),
                });
            }

            let entry = DirectoryEntry::decode(&raw[pos..pos + record_len], pos)?;
            table.append(entry)?;
            pos += record_len;
        }

        tracing::debug!("Parsed {} directory entries from {} bytes", table.len(), raw.len());
        Ok(table)
    }

    #[must_use]
    pub fn entries(&self) -> &[DirectoryEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DirectoryEntry> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by its exact filename (including version suffix).
    #[must_use]
    pub fn get(&self, filename: &str) -> Option<&DirectoryEntry> {
        self.entries.iter().find(|e| e.filename == filename)
    }

    /// Keep only the entries matching `predicate`.
    pub fn retain<F: FnMut(&DirectoryEntry) -> bool>(&mut self, predicate: F) {
        self.entries.retain(predicate);
    }

    /// Add an entry at the end.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateEntry`] if the filename is already present.
    pub fn append(&mut self, entry: DirectoryEntry) -> Result<()> {
        if self.get(&entry.filename).is_some() {
            return Err(Error::DuplicateEntry { name: entry.filename });
        }
        self.entries.push(entry);
        Ok(())
    }

    /// The first entry that is not the self or parent record.
    ///
    /// Its attribute blocks are the ones every sibling must carry.
    #[must_use]
    pub fn attribute_template(&self) -> Option<&DirectoryEntry> {
        self.entries.iter().find(|e| !e.is_self_or_parent())
    }

    /// Check that every sibling carries the template's middle and extended blocks.
    pub fn validate_sibling_attributes(&self) -> Result<()> {
        let Some(template) = self.attribute_template() else {
            return Ok(());
        };
        for entry in self.entries.iter().filter(|e| !e.is_self_or_parent()) {
            if entry.middle_bytes != template.middle_bytes {
                return Err(Error::AttributeMismatch {
                    name: entry.filename.clone(),
                    block: "middle",
                });
            }
            if entry.extended_bytes != template.extended_bytes {
                return Err(Error::AttributeMismatch {
                    name: entry.filename.clone(),
                    block: "extended",
                });
            }
        }
        Ok(())
    }

    /// Entries in on-disk order: ascending by filename bytes.
    #[must_use]
    pub fn sorted(&self) -> Vec<&DirectoryEntry> {
        let mut sorted: Vec<&DirectoryEntry> = self.entries.iter().collect();
        sorted.sort_by(|a, b| a.filename.as_bytes().cmp(b.filename.as_bytes()));
        sorted
    }

    /// Filenames as a set, ignoring order.
    #[must_use]
    pub fn names(&self) -> HashSet<&str> {
        self.entries.iter().map(|e| e.filename.as_str()).collect()
    }

    /// Encode into exactly `capacity_sectors` zero-padded sectors.
    ///
    /// No record crosses a sector boundary: a record that does not fit in the
    /// rest of the current sector starts the next one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AttributeMismatch`] if siblings disagree on their
    /// attribute blocks and [`Error::DirectoryCapacityExceeded`] if the
    /// records need more sectors than the budget.
    pub fn serialize(&self, capacity_sectors: usize) -> Result<Vec<u8>> {
        self.validate_sibling_attributes()?;

        let mut out = Vec::with_capacity(capacity_sectors * SECTOR);
        let mut used = 0usize;
        for entry in self.sorted() {
            let record = entry.encode()?;
            if used + record.len() > SECTOR {
                out.resize(out.len() + (SECTOR - used), 0);
                used = 0;
            }
            out.extend_from_slice(&record);
            used += record.len();
        }

        let needed = out.len().div_ceil(SECTOR);
        if needed > capacity_sectors {
            return Err(Error::DirectoryCapacityExceeded {
                needed,
                capacity: capacity_sectors,
            });
        }
        out.resize(capacity_sectors * SECTOR, 0);
        Ok(out)
    }
}

impl<'a> IntoIterator for &'a DirectoryTable {
    type Item = &'a DirectoryEntry;
    type IntoIter = std::slice::Iter<'a, DirectoryEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
