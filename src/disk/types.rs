/// 块号，磁盘上以 u32 存储，内存中统一用 u64 计算地址
pub type BlockId = u64;

/// 每 KiB 的字节数，命令行里的镜像大小以 KiB 为单位
pub const KIB: u64 = 1024;

/// 一次 I/O 使用的块缓冲区，长度等于块大小
pub type Block = Vec<u8>;

pub fn zeroed_block(block_size: u64) -> Block {
    vec![0; block_size as usize]
}
