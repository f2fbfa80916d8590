pub mod command;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use rufs::fs::{FsError, MkfsConfig};

#[derive(Debug, Parser)]
#[command(
    name = "rufs",
    version,
    about = "Create and inspect minimal ext2-style filesystem images"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Format a new image file
    Mkfs(MkfsArgs),
    /// Print the layout of an image and check its consistency
    Inspect(InspectArgs),
}

#[derive(Debug, Args)]
pub struct MkfsArgs {
    /// Image file to create (truncated if it exists)
    pub path: PathBuf,

    /// Image size in KiB [default: 1024]
    #[arg(short, long)]
    pub size: Option<u64>,

    /// Block size in bytes, a power of two from 1024 to 65536 [default: 1024]
    #[arg(short, long)]
    pub block_size: Option<u64>,

    /// Bytes of capacity per inode [default: 1024]
    #[arg(short, long)]
    pub inode_ratio: Option<u64>,

    /// Create the root directory on inode 1
    #[arg(long)]
    pub root_dir: bool,

    /// Overwrite an existing file without asking
    #[arg(short, long)]
    pub force: bool,

    /// JSON file with default parameters; flags take precedence
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl MkfsArgs {
    /// 合并配置文件和命令行参数
    pub fn resolve(&self) -> Result<MkfsConfig, FsError> {
        let mut cfg = match &self.config {
            Some(path) => MkfsConfig::from_json(&std::fs::read_to_string(path)?)?,
            None => MkfsConfig::default(),
        };

        if let Some(size) = self.size {
            cfg.image_size_kib = size;
        }
        if let Some(block_size) = self.block_size {
            cfg.block_size = block_size;
        }
        if let Some(ratio) = self.inode_ratio {
            cfg.inode_ratio = ratio;
        }
        cfg.root_dir |= self.root_dir;
        Ok(cfg)
    }
}

#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Image file to read
    pub path: PathBuf,

    /// Also print the inode with this index
    #[arg(long)]
    pub inode: Option<u64>,

    /// Print machine-readable JSON instead of text
    #[arg(long)]
    pub json: bool,
}
