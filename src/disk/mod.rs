pub mod block_device;
pub mod file_disk;
pub mod types;

pub use block_device::BlockDevice;
pub use file_disk::FileDisk;
pub use types::{zeroed_block, Block, BlockId, KIB};
