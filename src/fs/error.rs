/// 文件系统错误类型
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    /// 块大小不是 2 的幂，或不是 1024 的倍数
    #[error("Invalid block size: {0} (must be a power of two between 1024 and 65536)")]
    InvalidBlockSize(u64),

    #[error("Inode ratio must be greater than zero")]
    InvalidInodeRatio,

    /// 镜像容纳不下保留区和各块组的元数据
    #[error("Image too small: layout needs {required} blocks, image has {available}")]
    ImageTooSmall { required: u64, available: u64 },

    /// 块数或 inode 数超出 32 位字段的表示范围
    #[error("Image too large: {0} does not fit in a 32-bit on-disk field")]
    ImageTooLarge(u64),

    /// 一个 inode 位图块最多只能表示 block_size * 8 个 inode
    #[error("Too many inodes per group: {per_group} (inode bitmap holds {max}), raise the inode ratio")]
    TooManyInodes { per_group: u64, max: u64 },

    // 底层 I/O 错误，保留原始原因
    #[error("Disk I/O error: {0}")]
    IoFailure(#[from] std::io::Error),

    #[error("Truncated {record} record: expected {expected} bytes, got {actual}")]
    TruncatedRecord {
        record: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid {record} record: {reason}")]
    InvalidRecord {
        record: &'static str,
        reason: String,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// 文件系统统一结果类型
pub type Result<T> = std::result::Result<T, FsError>;
