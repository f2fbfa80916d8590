use std::io::Result;

use crate::disk::types::BlockId;

/// 以块为单位读写的设备，镜像构建器和读取器都只依赖这个接口
pub trait BlockDevice: Send + Sync {
    fn block_size(&self) -> u64;

    /// 按字节偏移读写，用于步长小于一块的定长记录
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()>;
    fn write_at(&self, offset: u64, buf: &[u8]) -> Result<()>;

    fn read_block(&self, block_id: BlockId, buf: &mut [u8]) -> Result<()> {
        self.read_at(block_id * self.block_size(), buf)
    }

    fn write_block(&self, block_id: BlockId, buf: &[u8]) -> Result<()> {
        self.write_at(block_id * self.block_size(), buf)
    }
}
