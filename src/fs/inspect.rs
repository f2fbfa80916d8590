//! 读取已经格式化的镜像
//!
//! 只靠超级块和描述符表里的地址做算术就能找到任意 inode，不需要遍历目录。

use std::path::Path;

use serde::Serialize;

use crate::{
    disk::{BlockDevice, FileDisk},
    fs::{
        bitmap::Bitmap,
        config::{DESCRIPTOR_SIZE, DESCRIPTOR_TABLE_BLOCK_ID, DIR_ENTRY_SIZE, INODE_SIZE, SUPERBLOCK_SIZE},
        directory::{self, DirEntry},
        error::{FsError, Result},
        group_descriptor::{self, BlockGroupDescriptor},
        inode_table::{self, Inode},
        layout::validate_block_size,
        super_block::{self, FsState, SuperBlock},
    },
};

/// 一致性检查的结果，`problems` 为空表示镜像是一致的
#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckReport {
    pub problems: Vec<String>,
}

impl CheckReport {
    pub fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }

    fn problem(&mut self, msg: String) {
        self.problems.push(msg);
    }
}

pub struct ImageReader {
    disk: FileDisk,
    superblock: SuperBlock,
}

impl ImageReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let disk = FileDisk::open(path)?;

        // 文件比超级块还短时按短缓冲区解码，得到 TruncatedRecord
        let len = disk.len()?.min(SUPERBLOCK_SIZE as u64) as usize;
        let mut buf = vec![0u8; len];
        disk.read_at(0, &mut buf)?;
        let superblock = super_block::decode(&buf)?;
        let block_size = superblock.block_size();
        validate_block_size(block_size)?;

        Ok(Self {
            disk: disk.with_block_size(block_size),
            superblock,
        })
    }

    pub fn superblock(&self) -> &SuperBlock {
        &self.superblock
    }

    pub fn block_size(&self) -> u64 {
        self.disk.block_size()
    }

    pub fn num_groups(&self) -> u64 {
        self.superblock.num_groups()
    }

    pub fn descriptor(&self, group: u64) -> Result<BlockGroupDescriptor> {
        let offset = DESCRIPTOR_TABLE_BLOCK_ID * self.block_size() + group * DESCRIPTOR_SIZE as u64;
        let mut buf = [0u8; DESCRIPTOR_SIZE];
        self.disk.read_at(offset, &mut buf)?;
        group_descriptor::decode(&buf)
    }

    pub fn descriptors(&self) -> Result<Vec<BlockGroupDescriptor>> {
        (0..self.num_groups()).map(|g| self.descriptor(g)).collect()
    }

    /// 按编号读 inode：组号 = index / inodes_per_group，组内序号 = index % inodes_per_group
    pub fn inode(&self, index: u64) -> Result<Inode> {
        let per_group = self.superblock.inodes_per_group as u64;
        if index >= self.superblock.num_inodes as u64 || per_group == 0 {
            return Err(FsError::InvalidRecord {
                record: "inode",
                reason: format!(
                    "index {} is out of range (image has {} inodes)",
                    index, self.superblock.num_inodes
                ),
            });
        }

        let desc = self.descriptor(index / per_group)?;
        let offset = desc.inode_table as u64 * self.block_size()
            + (index % per_group) * INODE_SIZE as u64;
        let mut buf = [0u8; INODE_SIZE];
        self.disk.read_at(offset, &mut buf)?;
        inode_table::decode(&buf)
    }

    /// 目录的目录项都放在它的第一个数据块里
    pub fn dir_entries(&self, inode: &Inode) -> Result<Vec<DirEntry>> {
        if !inode.is_dir() || inode.block_ptrs[0] == 0 {
            return Ok(Vec::new());
        }
        let mut block = vec![0u8; self.block_size() as usize];
        self.disk.read_block(inode.block_ptrs[0] as u64, &mut block)?;
        directory::decode_block(&block, inode.size as usize / DIR_ENTRY_SIZE)
    }

    /// 检查超级块、描述符表和位图之间是否一致
    pub fn check(&self) -> Result<CheckReport> {
        let sb = &self.superblock;
        let block_size = self.block_size();
        let num_blocks = sb.num_blocks as u64;
        let per_group = sb.blocks_per_group as u64;
        let mut report = CheckReport::default();

        if sb.state != FsState::Ok {
            report.problem("filesystem state is ERR".to_string());
        }

        let expected_len = num_blocks * block_size;
        let actual_len = self.disk.len()?;
        if actual_len != expected_len {
            report.problem(format!(
                "image is {} bytes, superblock describes {}",
                actual_len, expected_len
            ));
        }

        if per_group != block_size * 8 {
            report.problem(format!(
                "blocks per group is {}, expected {}",
                per_group,
                block_size * 8
            ));
            return Ok(report);
        }

        let groups = self.num_groups();
        if sb.inodes_per_group as u64 * groups != sb.num_inodes as u64 {
            report.problem(format!(
                "{} groups of {} inodes do not add up to {}",
                groups, sb.inodes_per_group, sb.num_inodes
            ));
        }

        let table_blocks = (sb.inodes_per_group as u64 * INODE_SIZE as u64).div_ceil(block_size);
        let descs = self.descriptors()?;
        let mut prev_end = sb.blocks_reserved as u64;
        let (mut free_blocks, mut free_inodes) = (0u64, 0u64);

        for (g, desc) in descs.iter().enumerate() {
            let g = g as u64;
            let group_end = ((g + 1) * per_group).min(num_blocks);
            let bb = desc.block_bitmap as u64;
            let data_start = desc.inode_table as u64 + table_blocks;

            if bb < prev_end || bb < g * per_group {
                report.problem(format!("group {}: block bitmap {} overlaps an earlier region", g, bb));
            }
            if !(bb < desc.inode_bitmap as u64 && (desc.inode_bitmap as u64) < desc.inode_table as u64) {
                report.problem(format!("group {}: metadata blocks are out of order", g));
            }
            if data_start > group_end {
                report.problem(format!(
                    "group {}: inode table ends at {}, past the group end {}",
                    g, data_start, group_end
                ));
                prev_end = group_end;
                continue;
            }
            prev_end = group_end;

            let block_bitmap = Bitmap::load(&self.disk, bb, group_end - data_start)?;
            if block_bitmap.count_free() != desc.free_blocks as u64 {
                report.problem(format!(
                    "group {}: descriptor says {} free blocks, bitmap has {}",
                    g,
                    desc.free_blocks,
                    block_bitmap.count_free()
                ));
            }
            let inode_bitmap =
                Bitmap::load(&self.disk, desc.inode_bitmap as u64, sb.inodes_per_group as u64)?;
            if inode_bitmap.count_free() != desc.free_inodes as u64 {
                report.problem(format!(
                    "group {}: descriptor says {} free inodes, bitmap has {}",
                    g,
                    desc.free_inodes,
                    inode_bitmap.count_free()
                ));
            }

            free_blocks += desc.free_blocks as u64;
            free_inodes += desc.free_inodes as u64;
        }

        if free_blocks != sb.num_free_blocks as u64 {
            report.problem(format!(
                "groups have {} free blocks, superblock says {}",
                free_blocks, sb.num_free_blocks
            ));
        }
        if free_inodes != sb.num_free_inodes as u64 {
            report.problem(format!(
                "groups have {} free inodes, superblock says {}",
                free_inodes, sb.num_free_inodes
            ));
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{
        builder::{build_image, ImageBuilder},
        config::ROOT_INODE,
        inode_table::FileType,
        layout::compute_layout,
    };
    use std::path::PathBuf;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("rufs-inspect-{}.img", uuid::Uuid::new_v4()))
    }

    #[test]
    fn fresh_image_is_consistent() {
        let path = temp_path();
        build_image(&path, 32 * 1024 * 1024, 1024, 4096).unwrap();

        let reader = ImageReader::open(&path).unwrap();
        assert_eq!(reader.block_size(), 1024);
        assert_eq!(reader.num_groups(), 4);
        let report = reader.check().unwrap();
        assert!(report.is_clean(), "{:?}", report.problems);

        let inode = reader.inode(3 * 2048 + 5).unwrap();
        assert_eq!(inode.file_type, FileType::Unused);
        assert!(reader.inode(4 * 2048).is_err());

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn reads_root_directory() {
        let path = temp_path();
        let layout = compute_layout(2 * 1024 * 1024, 2048, 2048).unwrap();
        ImageBuilder::new(layout)
            .with_root_dir(true)
            .build(&path, |_| {})
            .unwrap();

        let reader = ImageReader::open(&path).unwrap();
        assert!(reader.check().unwrap().is_clean());

        let root = reader.inode(ROOT_INODE as u64).unwrap();
        assert!(root.is_dir());
        let names: Vec<_> = reader
            .dir_entries(&root)
            .unwrap()
            .iter()
            .map(|e| e.name())
            .collect();
        assert_eq!(names, vec![".", ".."]);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn detects_tampered_counts() {
        let path = temp_path();
        build_image(&path, 1024 * 1024, 1024, 1024).unwrap();

        // 改掉描述符里的空闲块数
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[1024 + 12..1024 + 16].copy_from_slice(&5u32.to_ne_bytes());
        std::fs::write(&path, &bytes).unwrap();

        let report = ImageReader::open(&path).unwrap().check().unwrap();
        assert!(!report.is_clean());
        assert!(report.problems.iter().any(|p| p.contains("free blocks")));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn truncated_image_is_reported() {
        let path = temp_path();
        std::fs::write(&path, vec![0u8; 100]).unwrap();
        assert!(matches!(
            ImageReader::open(&path),
            Err(FsError::TruncatedRecord { actual: 100, .. })
        ));
        std::fs::remove_file(&path).unwrap();
    }
}
