use crate::{
    disk::{zeroed_block, BlockDevice},
    fs::error::Result,
};

/// 占一个块的位图，每个 bit 表示一个 inode 槽位或一个数据块是否被占用
///
/// 块组的数据块位图第 i 位对应 `data_start + i` 号块，inode 位图第 i 位对应组内第 i 个 inode。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub bits: Vec<u8>, // 位图数据，长度等于块大小
    pub len: u64,      // 有效位数
    pub block: u64,    // 位图在磁盘中的块号
}

impl Bitmap {
    /// 全部清零（全部空闲）的位图，有效位数最多是一个块的位数
    pub fn new(block_size: u64, len: u64, block: u64) -> Self {
        Self {
            bits: zeroed_block(block_size),
            len: len.min(block_size * 8),
            block,
        }
    }

    pub fn set(&mut self, index: u64) {
        if index >= self.len {
            return; // 防止越界
        }
        self.bits[(index / 8) as usize] |= 1 << (index % 8);
    }

    pub fn is_set(&self, index: u64) -> bool {
        index < self.len && self.bits[(index / 8) as usize] & (1 << (index % 8)) != 0
    }

    /// 已占用的位数，有效范围之外的位不计
    pub fn count_set(&self) -> u64 {
        (0..self.len).filter(|&i| self.is_set(i)).count() as u64
    }

    pub fn count_free(&self) -> u64 {
        self.len - self.count_set()
    }

    pub fn load<D: BlockDevice>(disk: &D, block: u64, len: u64) -> Result<Self> {
        let mut bitmap = Self::new(disk.block_size(), len, block);
        disk.read_block(block, &mut bitmap.bits)?;
        Ok(bitmap)
    }

    // 将位图写回磁盘
    pub fn sync<D: BlockDevice>(&self, disk: &D) -> Result<()> {
        disk.write_block(self.block, &self.bits)?;
        Ok(())
    }
}
