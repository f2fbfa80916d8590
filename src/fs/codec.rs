//! 定长记录的编解码
//!
//! 所有磁盘记录都用 bincode 按字段顺序紧凑序列化（定长整数、本机字节序），
//! 然后用 0 补齐到固定步长。这样第 i 条记录总在 `base + i * stride` 处。

use bincode::Options;
use serde::{de::DeserializeOwned, Serialize};

use crate::fs::error::{FsError, Result};

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_native_endian()
        .allow_trailing_bytes()
}

/// 序列化记录并补齐到 `stride` 字节，超出步长的记录返回 InvalidRecord
pub fn encode_padded<T: Serialize>(record: &T, stride: usize, name: &'static str) -> Result<Vec<u8>> {
    let mut bytes = options()
        .serialize(record)
        .map_err(|e| FsError::InvalidRecord {
            record: name,
            reason: e.to_string(),
        })?;
    if bytes.len() > stride {
        return Err(FsError::InvalidRecord {
            record: name,
            reason: format!("{} bytes do not fit in a {}-byte slot", bytes.len(), stride),
        });
    }
    bytes.resize(stride, 0);
    Ok(bytes)
}

/// 从至少 `stride` 字节的缓冲区解出一条记录，填充字节被忽略
pub fn decode_padded<T: DeserializeOwned>(
    bytes: &[u8],
    stride: usize,
    name: &'static str,
) -> Result<T> {
    if bytes.len() < stride {
        return Err(FsError::TruncatedRecord {
            record: name,
            expected: stride,
            actual: bytes.len(),
        });
    }
    options()
        .deserialize(&bytes[..stride])
        .map_err(|e| FsError::InvalidRecord {
            record: name,
            reason: e.to_string(),
        })
}

/// 序列化后的有效字节数（不含填充），只用于检查字段布局
pub fn packed_len<T: Serialize>(record: &T) -> u64 {
    options().serialized_size(record).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Pair {
        a: u32,
        b: u16,
    }

    #[test]
    fn pads_with_zeros_to_stride() {
        let bytes = encode_padded(&Pair { a: 7, b: 9 }, 16, "pair").unwrap();
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[..4], &7u32.to_ne_bytes());
        assert_eq!(&bytes[4..6], &9u16.to_ne_bytes());
        assert!(bytes[6..].iter().all(|&b| b == 0));
    }

    #[test]
    fn short_buffer_is_truncated_record() {
        let err = decode_padded::<Pair>(&[0u8; 15], 16, "pair").unwrap_err();
        match err {
            FsError::TruncatedRecord {
                record,
                expected,
                actual,
            } => {
                assert_eq!(record, "pair");
                assert_eq!(expected, 16);
                assert_eq!(actual, 15);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn ignores_padding_on_decode() {
        let mut bytes = encode_padded(&Pair { a: 1, b: 2 }, 16, "pair").unwrap();
        bytes[12] = 0xAA;
        let pair: Pair = decode_padded(&bytes, 16, "pair").unwrap();
        assert_eq!(pair, Pair { a: 1, b: 2 });
        assert_eq!(packed_len(&pair), 6);
    }

    #[test]
    fn oversized_record_is_rejected() {
        let err = encode_padded(&Pair { a: 1, b: 2 }, 4, "pair").unwrap_err();
        assert!(matches!(err, FsError::InvalidRecord { record: "pair", .. }));
    }
}
