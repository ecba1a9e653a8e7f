//! ISO-9660 directory records and tables
//!
//! Only the subset needed to rewrite one fixed-size directory in place and to
//! resolve paths is implemented; this is not a general ISO-9660 writer.

pub mod entry;
pub mod flags;
pub mod lookup;
pub mod table;

pub use entry::{DirectoryEntry, PARENT_NAME, RecordTimestamp, SELF_NAME};
pub use flags::FileFlags;
pub use lookup::{find_path, read_directory, root_entry};
pub use table::DirectoryTable;
