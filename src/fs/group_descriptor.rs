use serde::{Deserialize, Serialize};

use crate::fs::{
    codec::{decode_padded, encode_padded},
    config::DESCRIPTOR_SIZE,
    error::Result,
    layout::LayoutParams,
};

/// 块组描述符，紧跟在超级块后面组成描述符表
///
/// 每条记录补齐到 32 字节，这样一个块里可以放整数个描述符。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockGroupDescriptor {
    pub block_bitmap: u32, // 数据块位图所在块号
    pub inode_bitmap: u32, // inode 位图所在块号
    pub inode_table: u32,  // inode 表起始块号
    pub free_blocks: u32,
    pub free_inodes: u32,
    pub num_dirs: u16,
}

impl BlockGroupDescriptor {
    /// 新格式化块组的描述符：元数据以外的块全部空闲
    pub fn new(layout: &LayoutParams, group: u64) -> Self {
        Self {
            block_bitmap: layout.block_bitmap_block(group) as u32,
            inode_bitmap: layout.inode_bitmap_block(group) as u32,
            inode_table: layout.inode_table_block(group) as u32,
            free_blocks: layout.free_blocks_in_group(group) as u32,
            free_inodes: layout.inodes_per_group as u32,
            num_dirs: 0,
        }
    }
}

pub fn encode(desc: &BlockGroupDescriptor) -> Result<Vec<u8>> {
    encode_padded(desc, DESCRIPTOR_SIZE, "block group descriptor")
}

pub fn decode(bytes: &[u8]) -> Result<BlockGroupDescriptor> {
    decode_padded(bytes, DESCRIPTOR_SIZE, "block group descriptor")
}

/// 把整张描述符表编码成连续的字节，第 g 条在 `g * DESCRIPTOR_SIZE` 处
pub fn encode_table(descs: &[BlockGroupDescriptor]) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(descs.len() * DESCRIPTOR_SIZE);
    for desc in descs {
        bytes.extend(encode(desc)?);
    }
    Ok(bytes)
}

pub fn decode_table(bytes: &[u8], count: usize) -> Result<Vec<BlockGroupDescriptor>> {
    (0..count)
        .map(|g| decode(bytes.get(g * DESCRIPTOR_SIZE..).unwrap_or(&[])))
        .collect()
}
