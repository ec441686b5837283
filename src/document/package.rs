use std::fs::File;
use std::io::{BufReader, Read, Seek, Write};
use std::path::Path;

use log::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::errors::DocumentError;

/// Upper bound on the buffer reserved up front for one entry. The declared
/// size comes from the archive header and is not trusted beyond this.
const MAX_PREALLOCATED_BYTES: u64 = 64 * 1024 * 1024;

/// One entry of the zip container, kept with its original metadata
#[derive(Debug, Clone)]
pub struct PackageEntry {
    pub name: String,
    pub data: Vec<u8>,
    pub compression: CompressionMethod,
    pub last_modified: zip::DateTime,
    pub unix_mode: Option<u32>,
    pub is_dir: bool,
}

/// In-memory OOXML package. Entries keep their original order; parts that
/// are never replaced are written back with the exact bytes they were read with.
#[derive(Debug, Clone, Default)]
pub struct Package {
    entries: Vec<PackageEntry>,
}

impl Package {
    /// Read every entry of the package at `path`
    pub fn open(path: &Path) -> Result<Self, DocumentError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self, DocumentError> {
        let mut zip = ZipArchive::new(reader)?;
        let mut entries = Vec::with_capacity(zip.len());
        for i in 0..zip.len() {
            let mut file = zip.by_index(i)?;
            let mut data = Vec::with_capacity(capacity_hint(file.size()));
            file.read_to_end(&mut data)?;
            entries.push(PackageEntry {
                name: file.name().to_string(),
                data,
                compression: file.compression(),
                last_modified: file.last_modified().unwrap_or_default(),
                unix_mode: file.unix_mode(),
                is_dir: file.is_dir(),
            });
        }
        debug!("Read package with {} entries", entries.len());
        Ok(Self { entries })
    }

    /// Raw bytes of a part, if present
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.data.as_slice())
    }

    /// Raw bytes of a part, or a `MissingPart` error
    pub fn require_part(&self, name: &str) -> Result<&[u8], DocumentError> {
        self.part(name)
            .ok_or_else(|| DocumentError::MissingPart(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Replace an existing part's bytes, or append a new deflated part
    pub fn set_part(&mut self, name: &str, data: Vec<u8>) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.name == name) {
            entry.data = data;
            return;
        }
        let template = self.entries.iter().find(|e| !e.is_dir);
        self.entries.push(PackageEntry {
            name: name.to_string(),
            data,
            compression: CompressionMethod::Deflated,
            last_modified: template.map(|e| e.last_modified).unwrap_or_default(),
            unix_mode: template.and_then(|e| e.unix_mode),
            is_dir: false,
        });
    }

    /// Write the package to `path`, entry by entry in the original order
    pub fn write_to(&self, path: &Path) -> Result<(), DocumentError> {
        let file = File::create(path)?;
        let mut zout = ZipWriter::new(file);
        for ent in &self.entries {
            // Only stored and deflated are available for writing
            let compression = match ent.compression {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            };
            let mut opts = SimpleFileOptions::default()
                .compression_method(compression)
                .last_modified_time(ent.last_modified);
            if let Some(mode) = ent.unix_mode {
                opts = opts.unix_permissions(mode);
            }
            if ent.is_dir || ent.name.ends_with('/') {
                zout.add_directory(ent.name.as_str(), opts)?;
            } else {
                zout.start_file(ent.name.as_str(), opts)?;
                zout.write_all(&ent.data)?;
            }
        }
        let mut inner = zout.finish()?;
        inner.flush()?;
        Ok(())
    }
}

fn capacity_hint(declared_size: u64) -> usize {
    usize::try_from(declared_size.min(MAX_PREALLOCATED_BYTES)).unwrap_or(0)
}
