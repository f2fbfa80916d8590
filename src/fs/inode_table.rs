use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    disk::{zeroed_block, BlockDevice},
    fs::{
        codec::{decode_padded, encode_padded},
        config::{INODE_SIZE, NUM_BLOCK_PTR},
        error::Result,
        layout::LayoutParams,
    },
};

/// 文件类型，磁盘上占 16 位；0 表示这个 inode 还没有被使用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum FileType {
    #[default]
    Unused,
    Directory,
    Program,
    Text,
}

impl From<FileType> for u16 {
    fn from(file_type: FileType) -> Self {
        match file_type {
            FileType::Unused => 0,
            FileType::Directory => 0x4000,
            FileType::Program => 0x4001,
            FileType::Text => 0x4002,
        }
    }
}

impl TryFrom<u16> for FileType {
    type Error = String;

    fn try_from(raw: u16) -> std::result::Result<Self, Self::Error> {
        match raw {
            0 => Ok(FileType::Unused),
            0x4000 => Ok(FileType::Directory),
            0x4001 => Ok(FileType::Program),
            0x4002 => Ok(FileType::Text),
            other => Err(format!("unknown file type {other:#06x}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Inode {
    pub file_type: FileType, // 文件类型
    pub size: u64,           // 文件大小（字节）
    pub link_count: u16,     // 硬链接数

    // 块索引区，只有直接块指针
    pub block_ptrs: [u32; NUM_BLOCK_PTR],
}

impl Inode {
    /// 未使用的 inode，编码后全是 0
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn directory(size: u64, first_block: u32) -> Self {
        let mut block_ptrs = [0; NUM_BLOCK_PTR];
        block_ptrs[0] = first_block;
        Self {
            file_type: FileType::Directory,
            size,
            link_count: 2, // "." 和父目录中的目录项
            block_ptrs,
        }
    }

    pub fn is_used(&self) -> bool {
        self.file_type != FileType::Unused
    }

    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }

    pub fn block_count(&self) -> u64 {
        self.block_ptrs.iter().filter(|&&b| b != 0).count() as u64
    }
}

pub fn encode(inode: &Inode) -> Result<Vec<u8>> {
    encode_padded(inode, INODE_SIZE, "inode")
}

pub fn decode(bytes: &[u8]) -> Result<Inode> {
    decode_padded(bytes, INODE_SIZE, "inode")
}

/// 把一个块组的 inode 表全部写成未使用的 inode
///
/// 第 i 个 inode 位于 `inode_table * block_size + i * INODE_SIZE`，
/// 这里按块攒满一整块再写，减少 seek 次数。
pub fn write_empty_table<D: BlockDevice>(
    disk: &D,
    layout: &LayoutParams,
    group: u64,
) -> Result<()> {
    let start_block = layout.inode_table_block(group);
    let per_block = layout.inodes_per_block();
    let record = encode(&Inode::empty())?;

    let mut remaining = layout.inodes_per_group;
    for i in 0..layout.inode_table_blocks {
        let count = remaining.min(per_block);
        let mut block_buf = zeroed_block(layout.block_size);
        for slot in 0..count as usize {
            block_buf[slot * INODE_SIZE..(slot + 1) * INODE_SIZE].copy_from_slice(&record);
        }
        disk.write_block(start_block + i, &block_buf)?;
        remaining -= count;
    }

    debug!(
        "group {}: wrote {} empty inodes at block {}",
        group, layout.inodes_per_group, start_block
    );
    Ok(())
}

/// 按 inode 编号直接定位并读写，不经过目录
pub fn read_inode<D: BlockDevice>(disk: &D, layout: &LayoutParams, index: u64) -> Result<Option<Inode>> {
    let Some(location) = layout.inode_location(index) else {
        return Ok(None);
    };
    let mut buf = [0u8; INODE_SIZE];
    disk.read_at(location.byte_offset(layout.block_size), &mut buf)?;
    decode(&buf).map(Some)
}

pub fn write_inode<D: BlockDevice>(
    disk: &D,
    layout: &LayoutParams,
    index: u64,
    inode: &Inode,
) -> Result<bool> {
    let Some(location) = layout.inode_location(index) else {
        return Ok(false);
    };
    disk.write_at(location.byte_offset(layout.block_size), &encode(inode)?)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{codec::packed_len, error::FsError};

    #[test]
    fn unused_inode_is_all_zero() {
        let bytes = encode(&Inode::empty()).unwrap();
        assert_eq!(bytes.len(), INODE_SIZE);
        assert!(bytes.iter().all(|&b| b == 0));

        let inode = decode(&[0u8; INODE_SIZE]).unwrap();
        assert_eq!(inode, Inode::empty());
        assert!(!inode.is_used());
    }

    #[test]
    fn field_layout() {
        let mut inode = Inode {
            file_type: FileType::Text,
            size: 5000,
            link_count: 1,
            block_ptrs: [0; NUM_BLOCK_PTR],
        };
        inode.block_ptrs[0] = 300;
        inode.block_ptrs[NUM_BLOCK_PTR - 1] = 314;
        assert_eq!(packed_len(&inode), 2 + 8 + 2 + 4 * NUM_BLOCK_PTR as u64);

        let bytes = encode(&inode).unwrap();
        assert_eq!(&bytes[0..2], &0x4002u16.to_ne_bytes());
        assert_eq!(&bytes[2..10], &5000u64.to_ne_bytes());
        assert_eq!(&bytes[10..12], &1u16.to_ne_bytes());
        assert_eq!(&bytes[12..16], &300u32.to_ne_bytes());
        assert_eq!(&bytes[68..72], &314u32.to_ne_bytes());
        assert!(bytes[72..].iter().all(|&b| b == 0));
    }

    #[test]
    fn round_trip_every_type() {
        for file_type in [
            FileType::Unused,
            FileType::Directory,
            FileType::Program,
            FileType::Text,
        ] {
            let inode = Inode {
                file_type,
                size: 42,
                link_count: 3,
                block_ptrs: [7; NUM_BLOCK_PTR],
            };
            assert_eq!(decode(&encode(&inode).unwrap()).unwrap(), inode);
        }

        let dir = Inode::directory(40, 260);
        assert!(dir.is_dir());
        assert_eq!(dir.block_count(), 1);
        assert_eq!(decode(&encode(&dir).unwrap()).unwrap(), dir);
    }

    #[test]
    fn decode_errors() {
        let bytes = encode(&Inode::directory(40, 9)).unwrap();
        assert!(matches!(
            decode(&bytes[..INODE_SIZE - 1]),
            Err(FsError::TruncatedRecord { .. })
        ));

        let mut bad = bytes.clone();
        bad[0..2].copy_from_slice(&0x1234u16.to_ne_bytes());
        assert!(matches!(decode(&bad), Err(FsError::InvalidRecord { .. })));
    }
}
