//! 布局计算
//!
//! ```text
//! -------------------------------------------------------------
//! | Superblock | Block Group Descriptor Table | Block Group 0 | ...
//! -------------------------------------------------------------
//! |   1 Block  |          N Blocks            |               |
//! -------------------------------------------------------------
//!
//! ----------------------------------------------------------------
//! | Data Block Bitmap | Inode Bitmap | Inode Table | Data Blocks |
//! ----------------------------------------------------------------
//! |      1 Block      |    1 Block   |   N Blocks  |   N Blocks  |
//! ----------------------------------------------------------------
//! ```
//!
//! 块组 g 覆盖 `[g * blocks_per_group, (g + 1) * blocks_per_group)`，最后一个块组可能不满。
//! 0 号块组的开头是保留区（超级块 + 描述符表），它的位图从保留区之后开始。
//! 这里只有纯计算，没有任何 I/O。

use log::{debug, warn};
use serde::Serialize;

use crate::fs::{
    config::{
        BITMAP_BLOCKS_PER_GROUP, DESCRIPTOR_SIZE, DESCRIPTOR_TABLE_BLOCK_ID, INODE_SIZE,
        MAX_BLOCK_SIZE, MIN_BLOCK_SIZE,
    },
    error::{FsError, Result},
};

/// 由镜像大小、块大小和 inode 比例推导出来的全部参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayoutParams {
    pub image_size: u64, // 镜像大小（字节）
    pub block_size: u64,
    pub log_block_size: u32,
    pub inode_ratio: u64,
    pub num_blocks: u64,
    pub num_inodes: u64, // 按 image_size / inode_ratio 计算的 inode 数
    pub blocks_per_group: u64,
    pub num_groups: u64,
    pub inodes_per_group: u64,
    pub inode_table_blocks: u64, // 每个块组的 inode 表块数
    pub descriptor_table_blocks: u64,
    pub reserved_blocks: u64, // 超级块 + 描述符表
}

/// inode 在磁盘上的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InodeLocation {
    pub group: u64,
    pub slot: u64,   // 块组内的序号
    pub block: u64,  // 所在块号
    pub offset: u64, // 块内偏移
}

impl InodeLocation {
    pub fn byte_offset(&self, block_size: u64) -> u64 {
        self.block * block_size + self.offset
    }
}

/// 检查块大小：2 的幂，并且在 [1024, 65536] 之间（因此一定是 1024 的倍数）
pub fn validate_block_size(block_size: u64) -> Result<u32> {
    if !block_size.is_power_of_two() || !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&block_size)
    {
        return Err(FsError::InvalidBlockSize(block_size));
    }
    Ok((block_size / MIN_BLOCK_SIZE).trailing_zeros())
}

/// 计算镜像布局
///
/// `num_inodes` 按镜像字节数除以 `inode_ratio` 得到，块数不足一块的余量直接浪费掉。
/// 如果最后一个块组连自己的位图、inode 表和一个数据块都放不下，就把它丢掉，
/// 镜像截到上一个块组的边界（mke2fs 也是这样处理的）。
pub fn compute_layout(image_size: u64, block_size: u64, inode_ratio: u64) -> Result<LayoutParams> {
    let log_block_size = validate_block_size(block_size)?;
    if inode_ratio == 0 {
        return Err(FsError::InvalidInodeRatio);
    }

    let mut num_blocks = image_size / block_size;
    loop {
        let layout = LayoutParams::derive(
            image_size,
            block_size,
            log_block_size,
            inode_ratio,
            num_blocks,
        );

        let last = layout.num_groups - 1;
        if layout.num_groups > 1 && layout.group_len(last) <= layout.group_overhead(last) {
            warn!(
                "dropping block group {} ({} blocks cannot hold its {} metadata blocks)",
                last,
                layout.group_len(last),
                layout.group_overhead(last)
            );
            num_blocks = last * layout.blocks_per_group;
            continue;
        }

        layout.validate()?;
        debug!("computed layout: {:?}", layout);
        return Ok(layout);
    }
}

impl LayoutParams {
    fn derive(
        image_size: u64,
        block_size: u64,
        log_block_size: u32,
        inode_ratio: u64,
        num_blocks: u64,
    ) -> Self {
        let num_inodes = image_size / inode_ratio;
        // 一个位图块有 block_size * 8 个位，正好覆盖这么多块
        let blocks_per_group = block_size * 8;
        let num_groups = num_blocks.div_ceil(blocks_per_group).max(1);
        let inodes_per_group = num_inodes.div_ceil(num_groups);
        let inode_table_blocks = (inodes_per_group * INODE_SIZE as u64).div_ceil(block_size);
        let descriptor_table_blocks = (num_groups * DESCRIPTOR_SIZE as u64).div_ceil(block_size);

        Self {
            image_size,
            block_size,
            log_block_size,
            inode_ratio,
            num_blocks,
            num_inodes,
            blocks_per_group,
            num_groups,
            inodes_per_group,
            inode_table_blocks,
            descriptor_table_blocks,
            reserved_blocks: DESCRIPTOR_TABLE_BLOCK_ID + descriptor_table_blocks,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.num_blocks > u32::MAX as u64 {
            return Err(FsError::ImageTooLarge(self.num_blocks));
        }
        if self.inode_slots() > u32::MAX as u64 {
            return Err(FsError::ImageTooLarge(self.inode_slots()));
        }

        let required =
            self.reserved_blocks + self.num_groups * (BITMAP_BLOCKS_PER_GROUP + self.inode_table_blocks);
        if required >= self.num_blocks {
            return Err(FsError::ImageTooSmall {
                required: required + 1,
                available: self.num_blocks,
            });
        }

        // inode 位图只有一个块
        if self.inodes_per_group > self.block_size * 8 {
            return Err(FsError::TooManyInodes {
                per_group: self.inodes_per_group,
                max: self.block_size * 8,
            });
        }

        // 每个块组都要放得下自己的元数据和至少一个数据块
        for group in 0..self.num_groups {
            let overhead = self.group_overhead(group);
            if overhead >= self.group_len(group) {
                return Err(FsError::ImageTooSmall {
                    required: overhead + 1,
                    available: self.group_len(group),
                });
            }
        }
        Ok(())
    }

    /// 镜像文件的实际长度，多余的字节不可寻址
    pub fn image_len(&self) -> u64 {
        self.num_blocks * self.block_size
    }

    pub fn block_offset(&self, block: u64) -> u64 {
        block * self.block_size
    }

    pub fn inodes_per_block(&self) -> u64 {
        self.block_size / INODE_SIZE as u64
    }

    /// 实际分配的 inode 槽位数，向上取整后可能比 `num_inodes` 多
    pub fn inode_slots(&self) -> u64 {
        self.inodes_per_group * self.num_groups
    }

    pub fn group_start(&self, group: u64) -> u64 {
        group * self.blocks_per_group
    }

    pub fn group_len(&self, group: u64) -> u64 {
        let end = (self.group_start(group) + self.blocks_per_group).min(self.num_blocks);
        end.saturating_sub(self.group_start(group))
    }

    pub fn block_bitmap_block(&self, group: u64) -> u64 {
        if group == 0 {
            self.reserved_blocks
        } else {
            self.group_start(group)
        }
    }

    pub fn inode_bitmap_block(&self, group: u64) -> u64 {
        self.block_bitmap_block(group) + 1
    }

    pub fn inode_table_block(&self, group: u64) -> u64 {
        self.block_bitmap_block(group) + BITMAP_BLOCKS_PER_GROUP
    }

    /// 块组内第一个数据块
    pub fn data_start(&self, group: u64) -> u64 {
        self.inode_table_block(group) + self.inode_table_blocks
    }

    /// 块组内非数据块的数量，0 号块组包含保留区
    pub fn group_overhead(&self, group: u64) -> u64 {
        self.data_start(group) - self.group_start(group)
    }

    pub fn free_blocks_in_group(&self, group: u64) -> u64 {
        self.group_len(group).saturating_sub(self.group_overhead(group))
    }

    pub fn total_free_blocks(&self) -> u64 {
        (0..self.num_groups)
            .map(|g| self.free_blocks_in_group(g))
            .sum()
    }

    /// 第 g 个描述符在镜像中的字节偏移
    pub fn descriptor_offset(&self, group: u64) -> u64 {
        self.block_offset(DESCRIPTOR_TABLE_BLOCK_ID) + group * DESCRIPTOR_SIZE as u64
    }

    /// 由 inode 编号算出它所在的块和块内偏移，不需要遍历目录
    pub fn inode_location(&self, index: u64) -> Option<InodeLocation> {
        if index >= self.inode_slots() {
            return None;
        }
        let group = index / self.inodes_per_group;
        let slot = index % self.inodes_per_group;
        let byte = self.block_offset(self.inode_table_block(group)) + slot * INODE_SIZE as u64;

        Some(InodeLocation {
            group,
            slot,
            block: byte / self.block_size,
            offset: byte % self.block_size,
        })
    }
}
