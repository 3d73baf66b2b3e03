pub mod container;
pub mod crypto;
pub mod error;
pub mod extract;
pub mod model;
pub mod orchestrator;
pub mod restore;
pub mod tokenizer;
pub mod transform;

pub use container::parse as parse_container;
pub use crypto::decrypt;
pub use error::{Result, WxapkgError};
pub use extract::{extract, ExtractOptions};
pub use model::{
    ArchiveEntry, AttrValue, Container, ExtractStats, PageConfig, RestoredConfig, StyleRecord,
    TabBar, TabBarItem, TemplateChild, TemplateNode,
};
pub use orchestrator::{
    infer_identifier, resolve_identifier, scan_wxapkg_files, unpack_archive,
    unpack_directory_root, ArchiveOutcome,
};
