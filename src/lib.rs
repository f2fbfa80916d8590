//! rufs：一个极简的、仿 ext2 的文件系统镜像格式化工具
//!
//! 根据镜像大小、块大小和 inode 比例计算布局，然后把超级块、块组描述符表
//! 和每个块组的 inode 表写进一个普通文件。

pub mod disk;
pub mod fs;

pub use fs::{build_image, compute_layout, mkfs, FsError, ImageBuilder, ImageReader, LayoutParams};
