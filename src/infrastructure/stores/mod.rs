pub mod file;
pub mod memory;

use std::path;

use crate::domain::models::StoreBox;

pub struct StoreManager {}

impl StoreManager {
    /// A file backed store when a path is given, otherwise one that only lives
    /// for the current process.
    pub fn get(file_path: &str) -> StoreBox {
        if file_path.is_empty() {
            return Box::<memory::MemoryStore>::default();
        }

        return Box::new(file::FileStore::new(path::PathBuf::from(file_path)));
    }
}
