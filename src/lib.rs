pub mod document;
pub mod error;
pub mod model;
pub mod options;
pub mod xml;
pub mod zip_handler;

pub use document::Document;
pub use error::{ImaerError, Result};
pub use model::FeatureMember;
pub use options::{ImaerVersion, ParseOptions, WriteOptions};
pub use xml::{ParseMode, ParseReport};
pub use zip_handler::{ArchiveEntry, ZipHandler};
