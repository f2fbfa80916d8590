use std::path::Path;

use log::{debug, info};

use crate::{
    disk::{BlockDevice, FileDisk},
    fs::{
        bitmap::Bitmap,
        config::{kib_to_bytes, DIR_ENTRY_SIZE, RESERVED_INODE, ROOT_INODE, SUPERBLOCK_BLOCK_ID},
        directory,
        error::{FsError, Result},
        group_descriptor::{self, BlockGroupDescriptor},
        inode_table::{self, Inode},
        layout::{compute_layout, LayoutParams},
        super_block::{self, SuperBlock},
    },
};

/// 构建过程中的进度事件，由调用方决定怎么展示
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildProgress {
    Step(&'static str),
    Group { index: u64, total: u64 },
}

/// 按计算好的布局把一个全新的文件系统写进镜像文件
#[derive(Debug, Clone)]
pub struct ImageBuilder {
    layout: LayoutParams,
    root_dir: bool,
}

impl ImageBuilder {
    pub fn new(layout: LayoutParams) -> Self {
        Self {
            layout,
            root_dir: false,
        }
    }

    /// 是否在 1 号 inode 上创建根目录（包含 "." 和 ".."）
    pub fn with_root_dir(mut self, root_dir: bool) -> Self {
        self.root_dir = root_dir;
        self
    }

    pub fn layout(&self) -> &LayoutParams {
        &self.layout
    }

    /// 写出整个镜像，返回最终写入的超级块
    ///
    /// 所有参数检查都在创建文件之前完成；中途的 I/O 错误会直接返回，留下的半成品文件由调用方删除。
    pub fn build<P, F>(&self, path: P, mut progress: F) -> Result<SuperBlock>
    where
        P: AsRef<Path>,
        F: FnMut(BuildProgress),
    {
        let layout = &self.layout;
        if self.root_dir && layout.inodes_per_group <= ROOT_INODE as u64 {
            return Err(FsError::ImageTooSmall {
                required: ROOT_INODE as u64 + 1,
                available: layout.inodes_per_group,
            });
        }

        info!(
            "building {}: {} blocks of {} bytes, {} groups, {} inodes per group",
            path.as_ref().display(),
            layout.num_blocks,
            layout.block_size,
            layout.num_groups,
            layout.inodes_per_group
        );

        progress(BuildProgress::Step("Allocating image file"));
        let disk = FileDisk::create(path.as_ref(), layout.image_len(), layout.block_size)?;

        progress(BuildProgress::Step("Writing superblock"));
        let mut sb = SuperBlock::new(layout);
        write_superblock(&disk, &sb)?;

        progress(BuildProgress::Step("Writing block groups"));
        let mut descs = Vec::with_capacity(layout.num_groups as usize);
        for group in 0..layout.num_groups {
            let desc = write_group(&disk, layout, group)?;
            descs.push(desc);
            progress(BuildProgress::Group {
                index: group,
                total: layout.num_groups,
            });
        }

        if self.root_dir {
            progress(BuildProgress::Step("Creating root directory"));
            create_root_dir(&disk, layout, &mut descs[0])?;
        }

        progress(BuildProgress::Step("Writing descriptor table"));
        disk.write_at(layout.descriptor_offset(0), &group_descriptor::encode_table(&descs)?)?;

        // 空闲数要等所有块组写完才知道
        sb.num_free_blocks = descs.iter().map(|d| d.free_blocks).sum();
        sb.num_free_inodes = descs.iter().map(|d| d.free_inodes).sum();
        progress(BuildProgress::Step("Finalizing superblock"));
        write_superblock(&disk, &sb)?;
        disk.sync()?;

        info!(
            "image ready: {} free blocks, {} free inodes",
            sb.num_free_blocks, sb.num_free_inodes
        );
        Ok(sb)
    }
}

fn write_superblock<D: BlockDevice>(disk: &D, sb: &SuperBlock) -> Result<()> {
    disk.write_block(SUPERBLOCK_BLOCK_ID, &super_block::encode(sb)?)?;
    Ok(())
}

/// 写一个块组的两个清零位图和清零的 inode 表，返回它的描述符
///
/// 描述符先留在内存里，全部块组写完后整张表一次写出。
fn write_group<D: BlockDevice>(
    disk: &D,
    layout: &LayoutParams,
    group: u64,
) -> Result<BlockGroupDescriptor> {
    let desc = BlockGroupDescriptor::new(layout, group);

    Bitmap::new(
        layout.block_size,
        layout.free_blocks_in_group(group),
        layout.block_bitmap_block(group),
    )
    .sync(disk)?;
    Bitmap::new(
        layout.block_size,
        layout.inodes_per_group,
        layout.inode_bitmap_block(group),
    )
    .sync(disk)?;
    inode_table::write_empty_table(disk, layout, group)?;

    debug!(
        "group {}: bitmaps at {}/{}, inode table at {}, {} free blocks",
        group, desc.block_bitmap, desc.inode_bitmap, desc.inode_table, desc.free_blocks
    );
    Ok(desc)
}

/// 根目录占用 0 号块组的第一个数据块；0 号 inode 保留，1 号 inode 是根目录
fn create_root_dir<D: BlockDevice>(
    disk: &D,
    layout: &LayoutParams,
    desc: &mut BlockGroupDescriptor,
) -> Result<()> {
    let root_block = layout.data_start(0);

    let mut inode_bitmap = Bitmap::load(disk, layout.inode_bitmap_block(0), layout.inodes_per_group)?;
    inode_bitmap.set(RESERVED_INODE as u64);
    inode_bitmap.set(ROOT_INODE as u64);
    inode_bitmap.sync(disk)?;

    let mut block_bitmap =
        Bitmap::load(disk, layout.block_bitmap_block(0), layout.free_blocks_in_group(0))?;
    block_bitmap.set(0);
    block_bitmap.sync(disk)?;

    let entries = directory::root_entries(ROOT_INODE)?;
    disk.write_block(root_block, &directory::encode_block(&entries, layout.block_size)?)?;

    let root = Inode::directory((entries.len() * DIR_ENTRY_SIZE) as u64, root_block as u32);
    inode_table::write_inode(disk, layout, ROOT_INODE as u64, &root)?;

    desc.free_blocks -= 1;
    desc.free_inodes -= 2;
    desc.num_dirs = 1;

    debug!("root directory at inode {} block {}", ROOT_INODE, root_block);
    Ok(())
}

/// 计算布局并把镜像写到 `path`，镜像大小以字节为单位
pub fn build_image<P: AsRef<Path>>(
    path: P,
    image_size_bytes: u64,
    block_size: u64,
    inode_ratio: u64,
) -> Result<()> {
    let layout = compute_layout(image_size_bytes, block_size, inode_ratio)?;
    ImageBuilder::new(layout).build(path, |_| {})?;
    Ok(())
}

/// 对外的入口：镜像大小以 KiB 为单位
pub fn mkfs<P: AsRef<Path>>(
    image_size_kib: u64,
    block_size: u64,
    path: P,
    inode_ratio: u64,
) -> Result<()> {
    build_image(path, kib_to_bytes(image_size_kib)?, block_size, inode_ratio)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{
        config::{DESCRIPTOR_SIZE, INODE_SIZE, SUPERBLOCK_SIZE},
        inode_table::FileType,
        super_block::FsState,
    };
    use std::path::PathBuf;

    struct TempImage(PathBuf);

    impl TempImage {
        fn new() -> Self {
            Self(std::env::temp_dir().join(format!("rufs-build-{}.img", uuid::Uuid::new_v4())))
        }
    }

    impl Drop for TempImage {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    fn read_image(path: &Path) -> Vec<u8> {
        std::fs::read(path).unwrap()
    }

    #[test]
    fn default_image() {
        let img = TempImage::new();
        mkfs(1024, 1024, &img.0, 1024).unwrap();

        let bytes = read_image(&img.0);
        assert_eq!(bytes.len(), 1024 * 1024);

        let sb = super_block::decode(&bytes[..SUPERBLOCK_SIZE]).unwrap();
        assert_eq!(sb.num_blocks, 1024);
        assert_eq!(sb.num_inodes, 1024);
        assert_eq!(sb.blocks_per_group, 8192);
        assert_eq!(sb.inodes_per_group, 1024);
        assert_eq!(sb.blocks_reserved, 2);
        assert_eq!(sb.num_free_blocks, 1024 - 2 - 2 - 128);
        assert_eq!(sb.num_free_inodes, 1024);
        assert_eq!(sb.state, FsState::Ok);

        let desc = group_descriptor::decode(&bytes[1024..1024 + DESCRIPTOR_SIZE]).unwrap();
        assert_eq!(desc.block_bitmap, 2);
        assert_eq!(desc.inode_bitmap, 3);
        assert_eq!(desc.inode_table, 4);
        assert_eq!(desc.free_blocks, sb.num_free_blocks);
        assert_eq!(desc.free_inodes, 1024);
        assert_eq!(desc.num_dirs, 0);

        // 位图和 inode 表全是 0，也就是全部未使用
        assert!(bytes[2 * 1024..(4 + 128) * 1024].iter().all(|&b| b == 0));
        let last = inode_table::decode(&bytes[4 * 1024 + 1023 * INODE_SIZE..]).unwrap();
        assert_eq!(last.file_type, FileType::Unused);
    }

    #[test]
    fn every_group_is_described() {
        let img = TempImage::new();
        let layout = compute_layout(32 * 1024 * 1024, 1024, 4096).unwrap();
        let mut groups_seen = Vec::new();
        let sb = ImageBuilder::new(layout.clone())
            .build(&img.0, |event| {
                if let BuildProgress::Group { index, total } = event {
                    assert_eq!(total, 4);
                    groups_seen.push(index);
                }
            })
            .unwrap();
        assert_eq!(groups_seen, vec![0, 1, 2, 3]);
        assert_eq!(sb.num_free_blocks as u64, layout.total_free_blocks());
        assert_eq!(sb.num_free_inodes as u64, layout.inode_slots());

        let bytes = read_image(&img.0);
        let table = group_descriptor::decode_table(&bytes[1024..2048], 4).unwrap();
        let mut prev = layout.reserved_blocks as u32;
        for (g, desc) in table.iter().enumerate() {
            assert!(desc.block_bitmap >= prev);
            assert!(desc.inode_bitmap > desc.block_bitmap);
            assert!(desc.inode_table > desc.inode_bitmap);
            assert_eq!(*desc, BlockGroupDescriptor::new(&layout, g as u64));
            prev = desc.inode_table + layout.inode_table_blocks as u32;
        }
    }

    #[test]
    fn rebuilding_is_byte_identical() {
        let img = TempImage::new();
        build_image(&img.0, 4 * 1024 * 1024, 2048, 2048).unwrap();
        let first = read_image(&img.0);

        std::fs::write(&img.0, vec![0xEEu8; 5 * 1024 * 1024]).unwrap();
        build_image(&img.0, 4 * 1024 * 1024, 2048, 2048).unwrap();
        assert_eq!(read_image(&img.0), first);
    }

    #[test]
    fn validation_errors_leave_no_file() {
        let img = TempImage::new();
        assert!(matches!(
            mkfs(1024, 1000, &img.0, 1024),
            Err(FsError::InvalidBlockSize(1000))
        ));
        assert!(matches!(
            mkfs(2, 1024, &img.0, 1024),
            Err(FsError::ImageTooSmall { .. })
        ));
        assert!(!img.0.exists());
    }

    #[test]
    fn oversized_kib_count_leaves_no_file() {
        let img = TempImage::new();
        let kib = (1u64 << 54) + 1024;
        assert!(matches!(
            mkfs(kib, 1024, &img.0, 1024),
            Err(FsError::ImageTooLarge(k)) if k == kib
        ));
        assert!(!img.0.exists());
    }

    #[test]
    fn unwritable_path_is_io_failure() {
        let dir = std::env::temp_dir().join(format!("rufs-missing-{}", uuid::Uuid::new_v4()));
        let err = mkfs(1024, 1024, dir.join("image.img"), 1024).unwrap_err();
        assert!(matches!(err, FsError::IoFailure(_)));
    }

    #[test]
    fn root_directory_bootstrap() {
        let img = TempImage::new();
        let layout = compute_layout(1024 * 1024, 1024, 1024).unwrap();
        let root_block = layout.data_start(0);
        let sb = ImageBuilder::new(layout.clone())
            .with_root_dir(true)
            .build(&img.0, |_| {})
            .unwrap();
        assert_eq!(sb.num_free_blocks as u64, layout.total_free_blocks() - 1);
        assert_eq!(sb.num_free_inodes, 1024 - 2);

        let bytes = read_image(&img.0);
        let desc = group_descriptor::decode(&bytes[1024..]).unwrap();
        assert_eq!(desc.num_dirs, 1);
        assert_eq!(desc.free_inodes, 1022);

        let inode_bitmap = &bytes[(desc.inode_bitmap as usize) * 1024..];
        assert_eq!(inode_bitmap[0], 0b11);
        let block_bitmap = &bytes[(desc.block_bitmap as usize) * 1024..];
        assert_eq!(block_bitmap[0], 0b1);

        let root_at = (desc.inode_table as usize) * 1024 + INODE_SIZE;
        let root = inode_table::decode(&bytes[root_at..]).unwrap();
        assert!(root.is_dir());
        assert_eq!(root.link_count, 2);
        assert_eq!(root.block_ptrs[0] as u64, root_block);

        // 按编号直接读出来的应该是同一个 inode
        let disk = FileDisk::open(&img.0).unwrap();
        assert_eq!(
            inode_table::read_inode(&disk, &layout, ROOT_INODE as u64).unwrap(),
            Some(root.clone())
        );
        assert_eq!(
            inode_table::read_inode(&disk, &layout, layout.inode_slots()).unwrap(),
            None
        );

        let entries =
            directory::decode_block(&bytes[(root_block as usize) * 1024..], 2).unwrap();
        assert_eq!(entries[0].name(), ".");
        assert_eq!(entries[1].name(), "..");
        assert!(entries.iter().all(|e| e.inode == ROOT_INODE));
    }
}
