use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use zip::ZipArchive;

use crate::document::Document;
use crate::error::Result;
use crate::options::ParseOptions;
use crate::xml::{ParseMode, ParseReport};

/// One parsed `.gml` entry of an archive.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub name: String,
    pub document: Document,
    pub report: ParseReport,
}

/// Reads the IMAER documents packed in a ZIP archive, as delivered by the
/// calculation service.
pub struct ZipHandler {
    path: PathBuf,
    options: ParseOptions,
}

impl ZipHandler {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            options: ParseOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    /// Names of the `.gml` entries, in archive order.
    pub fn list_gml_entries(&self) -> Result<Vec<String>> {
        let archive = ZipArchive::new(BufReader::new(File::open(&self.path)?))?;
        Ok(archive
            .file_names()
            .filter(|name| is_gml(name))
            .map(str::to_string)
            .collect())
    }

    /// Parses every `.gml` entry. In lenient mode an entry that cannot be
    /// parsed at all is logged and left out; in strict mode it fails the
    /// archive.
    pub fn process_all_documents(&self) -> Result<Vec<ArchiveEntry>> {
        let mut archive = ZipArchive::new(BufReader::new(File::open(&self.path)?))?;
        let mut entries = Vec::new();

        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            if file.is_dir() || !is_gml(file.name()) {
                continue;
            }
            let name = file.name().to_string();
            let mut contents = Vec::new();
            file.read_to_end(&mut contents)?;

            match Document::from_reader_with(contents.as_slice(), &self.options) {
                Ok((document, report)) => {
                    info!("{}: {} feature members", name, document.feature_members.len());
                    entries.push(ArchiveEntry {
                        name,
                        document,
                        report,
                    });
                }
                Err(err) if self.options.mode == ParseMode::Lenient => {
                    warn!("Skipping {} in {:?}: {}", name, self.path, err);
                }
                Err(err) => return Err(err),
            }
        }

        info!("Read {} documents from {:?}", entries.len(), self.path);
        Ok(entries)
    }
}

fn is_gml(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gml"))
}
