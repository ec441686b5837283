use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// @module: File and directory utilities

/// Characters that are unsafe in file names on common filesystems
static UNSAFE_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1F]"#).unwrap());

/// Marker inserted into generated output names
pub const TRANSLATED_MARKER: &str = "_translated";

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_file()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path).with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(())
    }

    // @generates: Output path for a translated workbook
    // @params: input_file, output_dir
    pub fn generate_output_path<P1: AsRef<Path>, P2: AsRef<Path>>(input_file: P1, output_dir: P2) -> PathBuf {
        let input_file = input_file.as_ref();
        let stem = input_file.file_stem().unwrap_or_default().to_string_lossy();
        let extension = input_file
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_else(|| "xlsx".to_string());
        output_dir
            .as_ref()
            .join(format!("{}{}.{}", stem, TRANSLATED_MARKER, extension))
    }

    /// Find workbooks under a directory.
    ///
    /// Office lock files (`~$name.xlsx`) and earlier translated outputs are skipped.
    pub fn find_workbooks<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
        let mut result = Vec::new();

        for entry in WalkDir::new(dir.as_ref()).follow_links(true) {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();
            if path.is_file() && Self::detect_file_type(path) == FileType::Workbook {
                result.push(path.to_path_buf());
            }
        }

        result.sort();
        Ok(result)
    }

    /// Read a file to a string
    pub fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String> {
        fs::read_to_string(&path).with_context(|| format!("Failed to read file: {:?}", path.as_ref()))
    }

    /// Write a string to a file
    pub fn write_to_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        // Ensure the parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            Self::ensure_dir(parent)?;
        }

        fs::write(&path, content).with_context(|| format!("Failed to write to file: {:?}", path.as_ref()))?;
        Ok(())
    }

    /// Copy a file from one location to another, ensuring the target directory exists
    pub fn copy_file<P1: AsRef<Path>, P2: AsRef<Path>>(from: P1, to: P2) -> Result<()> {
        let from = from.as_ref();
        let to = to.as_ref();

        if !from.exists() {
            return Err(anyhow::anyhow!("Source file does not exist: {:?}", from));
        }

        // Ensure the target directory exists
        if let Some(parent) = to.parent() {
            Self::ensure_dir(parent)?;
        }

        fs::copy(from, to).with_context(|| format!("Failed to copy {:?} to {:?}", from, to))?;
        Ok(())
    }

    /// Replace characters that are unsafe in file names and trim the result.
    /// Falls back to `workbook.xlsx` for names that end up empty.
    pub fn sanitize_filename(name: &str) -> String {
        let base = Path::new(name)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let cleaned = UNSAFE_FILENAME_CHARS.replace_all(&base, "_");
        let cleaned = cleaned.trim().trim_start_matches('.');
        if cleaned.is_empty() {
            "workbook.xlsx".to_string()
        } else {
            cleaned.to_string()
        }
    }

    /// Hex SHA-256 of a file's contents
    pub fn sha256_file<P: AsRef<Path>>(path: P) -> Result<String> {
        let mut file = fs::File::open(&path).with_context(|| format!("Failed to open file: {:?}", path.as_ref()))?;
        let mut hasher = Sha256::new();
        let mut buffer = [0u8; 64 * 1024];
        loop {
            let read = file
                .read(&mut buffer)
                .with_context(|| format!("Failed to read file: {:?}", path.as_ref()))?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Classify a path by name: workbook, Office lock file, or anything else
    pub fn detect_file_type<P: AsRef<Path>>(path: P) -> FileType {
        let path = path.as_ref();
        let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        let is_xlsx = path
            .extension()
            .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case("xlsx"));

        if !is_xlsx {
            FileType::Unknown
        } else if name.starts_with("~$") {
            FileType::LockFile
        } else if path
            .file_stem()
            .is_some_and(|stem| stem.to_string_lossy().ends_with(TRANSLATED_MARKER))
        {
            FileType::TranslatedOutput
        } else {
            FileType::Workbook
        }
    }
}

/// Enum representing the file kinds the CLI distinguishes
#[derive(Debug, PartialEq, Eq)]
pub enum FileType {
    /// An `.xlsx` workbook to translate
    Workbook,
    /// Office owner/lock file next to an open workbook
    LockFile,
    /// Output of an earlier run
    TranslatedOutput,
    /// Unknown file type
    Unknown,
}
