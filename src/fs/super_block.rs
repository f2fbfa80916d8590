use serde::{Deserialize, Serialize};

use crate::fs::{
    codec::{decode_padded, encode_padded},
    config::SUPERBLOCK_SIZE,
    error::Result,
    layout::LayoutParams,
};

/// 文件系统状态，磁盘上占 16 位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum FsState {
    #[default]
    Ok,
    Err,
}

impl From<FsState> for u16 {
    fn from(state: FsState) -> Self {
        match state {
            FsState::Ok => 0,
            FsState::Err => 1,
        }
    }
}

impl TryFrom<u16> for FsState {
    type Error = String;

    fn try_from(raw: u16) -> std::result::Result<Self, Self::Error> {
        match raw {
            0 => Ok(FsState::Ok),
            1 => Ok(FsState::Err),
            other => Err(format!("unknown filesystem state {other:#x}")),
        }
    }
}

/// 超级块，位于 0 号块的开头
///
/// 这里不像 ext2 那样留出前 1024 字节给引导程序，超级块就是文件系统的第一个块。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperBlock {
    /** inode 信息 */
    pub num_inodes: u32, // inode 槽位总数
    /** 数据块信息 */
    pub num_blocks: u32, // 文件系统总块数
    pub num_free_blocks: u32, // 当前空闲块数
    pub num_free_inodes: u32, // 当前空闲 inode 数
    /** 块组信息 */
    pub log_block_size: u32, // 1024 << log_block_size 即块大小
    pub blocks_per_group: u32,
    pub inodes_per_group: u32,
    pub blocks_reserved: u32, // 超级块 + 块组描述符表占用的块数
    /** 文件系统状态 */
    pub state: FsState,
}

impl SuperBlock {
    /// 按布局参数创建超级块，空闲数先等于总数，写完各块组后再更新
    pub fn new(layout: &LayoutParams) -> Self {
        let num_inodes = layout.inode_slots() as u32;
        let num_blocks = layout.num_blocks as u32;

        Self {
            num_inodes,
            num_blocks,
            num_free_blocks: num_blocks,
            num_free_inodes: num_inodes,
            log_block_size: layout.log_block_size,
            blocks_per_group: layout.blocks_per_group as u32,
            inodes_per_group: layout.inodes_per_group as u32,
            blocks_reserved: layout.reserved_blocks as u32,
            state: FsState::Ok,
        }
    }

    /// 块大小；`log_block_size` 损坏时返回 0，由调用方按非法块大小处理
    pub fn block_size(&self) -> u64 {
        1024u64.checked_shl(self.log_block_size).unwrap_or(0)
    }

    pub fn num_groups(&self) -> u64 {
        if self.blocks_per_group == 0 {
            return 0;
        }
        (self.num_blocks as u64).div_ceil(self.blocks_per_group as u64)
    }
}

pub fn encode(sb: &SuperBlock) -> Result<Vec<u8>> {
    encode_padded(sb, SUPERBLOCK_SIZE, "superblock")
}

pub fn decode(bytes: &[u8]) -> Result<SuperBlock> {
    decode_padded(bytes, SUPERBLOCK_SIZE, "superblock")
}
