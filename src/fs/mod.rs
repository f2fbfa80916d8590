pub mod bitmap;
pub mod builder;
pub mod codec;
pub mod config;
pub mod directory;
pub mod error;
pub mod group_descriptor;
pub mod inode_table;
pub mod inspect;
pub mod layout;
pub mod super_block;

pub use builder::{build_image, mkfs, BuildProgress, ImageBuilder};
pub use config::MkfsConfig;
pub use error::{FsError, Result};
pub use group_descriptor::BlockGroupDescriptor;
pub use inode_table::{FileType, Inode};
pub use inspect::{CheckReport, ImageReader};
pub use layout::{compute_layout, InodeLocation, LayoutParams};
pub use super_block::{FsState, SuperBlock};
