pub mod chunk;
pub mod item;

pub use chunk::ChunkDescriptor;
pub use item::{DriveItem, ItemKind, Listing};
