pub mod directory;
pub mod memory;

pub use boxr_core::resource::{
    BoxFile, FileCallback, FileInfo, FilePredicate, IterableBox, ResourceBox, accept_all,
};
pub use directory::DirectoryBox;
pub use memory::MemoryBox;
