use serde::{Deserialize, Serialize};

use crate::fs::{
    codec::{decode_padded, encode_padded},
    config::{DIR_ENTRY_SIZE, DIR_NAME_LEN},
    error::{FsError, Result},
    inode_table::FileType,
};

// 一个目录项，名字最长 11 字节，不足的部分补 0
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub inode: u32,
    pub entry_size: u16, // 目录项占用的字节数，也就是到下一个目录项的距离
    pub file_type: FileType,
    pub name: [u8; DIR_NAME_LEN],
}

impl DirEntry {
    pub fn new(inode: u32, name: &str, file_type: FileType) -> Result<Self> {
        let bytes = name.as_bytes();
        if bytes.is_empty() || bytes.len() > DIR_NAME_LEN {
            return Err(FsError::InvalidRecord {
                record: "directory entry",
                reason: format!("name '{}' must be 1 to {} bytes", name, DIR_NAME_LEN),
            });
        }
        let mut buf = [0u8; DIR_NAME_LEN];
        buf[..bytes.len()].copy_from_slice(bytes);

        Ok(Self {
            inode,
            entry_size: DIR_ENTRY_SIZE as u16,
            file_type,
            name: buf,
        })
    }

    pub fn name(&self) -> String {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(DIR_NAME_LEN);
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }
}

pub fn encode(entry: &DirEntry) -> Result<Vec<u8>> {
    encode_padded(entry, DIR_ENTRY_SIZE, "directory entry")
}

pub fn decode(bytes: &[u8]) -> Result<DirEntry> {
    decode_padded(bytes, DIR_ENTRY_SIZE, "directory entry")
}

/// 目录数据块的内容：依次排列的目录项
pub fn encode_block(entries: &[DirEntry], block_size: u64) -> Result<Vec<u8>> {
    let mut block = Vec::with_capacity(block_size as usize);
    for entry in entries {
        block.extend(encode(entry)?);
    }
    block.resize(block_size as usize, 0);
    Ok(block)
}

/// 读出目录块里的前 `count` 个目录项
pub fn decode_block(bytes: &[u8], count: usize) -> Result<Vec<DirEntry>> {
    (0..count)
        .map(|i| decode(bytes.get(i * DIR_ENTRY_SIZE..).unwrap_or(&[])))
        .collect()
}

/// 根目录初始只有 "." 和 ".."，两者都指向自己
pub fn root_entries(root_inode: u32) -> Result<Vec<DirEntry>> {
    Ok(vec![
        DirEntry::new(root_inode, ".", FileType::Directory)?,
        DirEntry::new(root_inode, "..", FileType::Directory)?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::codec::packed_len;

    #[test]
    fn entry_layout() {
        let entry = DirEntry::new(1, "..", FileType::Directory).unwrap();
        assert_eq!(packed_len(&entry), 4 + 2 + 2 + DIR_NAME_LEN as u64);

        let bytes = encode(&entry).unwrap();
        assert_eq!(bytes.len(), DIR_ENTRY_SIZE);
        assert_eq!(&bytes[0..4], &1u32.to_ne_bytes());
        assert_eq!(&bytes[4..6], &(DIR_ENTRY_SIZE as u16).to_ne_bytes());
        assert_eq!(&bytes[8..10], b"..");
        assert_eq!(decode(&bytes).unwrap().name(), "..");
    }

    #[test]
    fn name_length_is_checked() {
        assert!(DirEntry::new(2, "", FileType::Text).is_err());
        assert!(DirEntry::new(2, "twelve_chars", FileType::Text).is_err());
        assert_eq!(
            DirEntry::new(2, "eleven_char", FileType::Text).unwrap().name(),
            "eleven_char"
        );
    }

    #[test]
    fn root_block_round_trip() {
        let entries = root_entries(1).unwrap();
        let block = encode_block(&entries, 1024).unwrap();
        assert_eq!(block.len(), 1024);
        assert_eq!(decode_block(&block, 2).unwrap(), entries);
        assert!(block[2 * DIR_ENTRY_SIZE..].iter().all(|&b| b == 0));
    }
}
