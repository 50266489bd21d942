//! Storage Adapters

mod file_unit_store;

pub use file_unit_store::{FileUnitStore, CHAPTER_SUFFIX, MANIFEST_FILE, SUMMARY_SUFFIX};
