use serde::{Deserialize, Serialize};

use crate::{
    disk::KIB,
    fs::error::{FsError, Result},
};

/// 最小块大小，同时也是 `log_block_size` 的基数：block_size = 1024 << log_block_size
pub const MIN_BLOCK_SIZE: u64 = 1024;

/// 最大块大小（与 ext2 一致，64KB）
pub const MAX_BLOCK_SIZE: u64 = 64 * 1024;

/// 超级块记录占用的字节数（固定步长，剩余部分填 0）
pub const SUPERBLOCK_SIZE: usize = 1024;

/// 超级块所在的块号
pub const SUPERBLOCK_BLOCK_ID: u64 = 0;

/// 块组描述符表的起始块号，紧跟在超级块之后
pub const DESCRIPTOR_TABLE_BLOCK_ID: u64 = 1;

/// 每个块组描述符的固定步长，一个 1KB 块可以放 32 个
pub const DESCRIPTOR_SIZE: usize = 32;

/// 每个 inode 记录的固定步长
pub const INODE_SIZE: usize = 128;

/// 每个 inode 最多可以指向的数据块数量
pub const NUM_BLOCK_PTR: usize = 15;

/// 目录项的固定步长
pub const DIR_ENTRY_SIZE: usize = 20;

/// 目录项文件名的最大长度（字节）
pub const DIR_NAME_LEN: usize = 11;

/// 0 号 inode 保留不用
pub const RESERVED_INODE: u32 = 0;

/// 根目录的 inode 编号
pub const ROOT_INODE: u32 = 1;

// 每个块组占用两个位图块：数据块位图 + inode 位图
pub const BITMAP_BLOCKS_PER_GROUP: u64 = 2;

pub const DEFAULT_IMAGE_SIZE_KIB: u64 = 1024;
pub const DEFAULT_BLOCK_SIZE: u64 = 1024;

/// 默认每 1KB 容量一个 inode，大部分文件都比较小
pub const DEFAULT_INODE_RATIO: u64 = 1024;

/// mkfs 的参数集合，可以从 JSON 配置文件加载，命令行参数优先
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MkfsConfig {
    pub image_size_kib: u64, // 镜像大小（KiB）
    pub block_size: u64,     // 每块大小（字节）
    pub inode_ratio: u64,    // 每多少字节容量分配一个 inode
    pub root_dir: bool,      // 是否创建根目录
}

impl Default for MkfsConfig {
    fn default() -> Self {
        Self {
            image_size_kib: DEFAULT_IMAGE_SIZE_KIB,
            block_size: DEFAULT_BLOCK_SIZE,
            inode_ratio: DEFAULT_INODE_RATIO,
            root_dir: false,
        }
    }
}

impl MkfsConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| FsError::Config(e.to_string()))
    }

    pub fn image_size_bytes(&self) -> Result<u64> {
        kib_to_bytes(self.image_size_kib)
    }
}

/// KiB 换算成字节，超出 u64 时报 ImageTooLarge
pub fn kib_to_bytes(kib: u64) -> Result<u64> {
    kib.checked_mul(KIB).ok_or(FsError::ImageTooLarge(kib))
}
