//! Pack archive codec
//!
//! `fftpack.bin` on the PSP disc is a plain concatenation of members. The
//! codec splits it into `fftpack.<index>` files and joins them back; placing
//! the result inside a disc image is the caller's job.

pub mod dump;
pub mod index;
pub mod merge;

pub use dump::{INDEX_FILE_NAME, dump_from_image, dump_to_directory, member_path, read_index};
pub use index::{PackIndex, PackMember};
pub use merge::merge_dumped_files;
