use std::{
    fs::{File, OpenOptions},
    io::{Error, ErrorKind, Read, Result, Seek, SeekFrom, Write},
    path::Path,
    sync::{Mutex, MutexGuard},
};

use log::debug;

use crate::{disk::block_device::BlockDevice, fs::config::MIN_BLOCK_SIZE};

/// 用普通文件模拟的磁盘
#[derive(Debug)]
pub struct FileDisk {
    file: Mutex<File>,
    block_size: u64,
}

impl FileDisk {
    /// 创建（或截断）镜像文件，并把它扩展到 `len` 字节
    ///
    /// 先截断再扩展，扩展出来的部分全是 0，所以同样的参数总是得到同样的文件。
    pub fn create<P: AsRef<Path>>(path: P, len: u64, block_size: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.as_ref())?;

        debug!("allocating {} bytes for {}", len, path.as_ref().display());
        file.set_len(len)?;

        Ok(Self {
            file: Mutex::new(file),
            block_size,
        })
    }

    /// 以只读方式打开已有镜像，块大小在读出超级块之前先按 1KB 处理
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
            block_size: MIN_BLOCK_SIZE,
        })
    }

    pub fn with_block_size(mut self, block_size: u64) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn len(&self) -> Result<u64> {
        Ok(self.lock()?.metadata()?.len())
    }

    pub fn sync(&self) -> Result<()> {
        self.lock()?.sync_all()
    }

    fn lock(&self) -> Result<MutexGuard<'_, File>> {
        self.file
            .lock()
            .map_err(|_| Error::new(ErrorKind::Other, "disk file lock poisoned"))
    }
}

impl BlockDevice for FileDisk {
    fn block_size(&self) -> u64 {
        self.block_size
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let mut file = self.lock()?;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn write_at(&self, offset: u64, buf: &[u8]) -> Result<()> {
        let mut file = self.lock()?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(buf)?;
        Ok(())
    }
}
