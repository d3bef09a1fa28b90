use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Destination for exported books: one folder per group, one file per book
pub trait ArchiveWriter {
    fn add_file(&mut self, folder: &str, filename: &str, contents: &str) -> Result<()>;
}

/// Writes the archive as a directory tree, optionally gzipping each file
pub struct DirectoryArchive {
    root: PathBuf,
    gzip: bool,
    written: Vec<PathBuf>,
}

impl DirectoryArchive {
    pub fn new(root: &Path, gzip: bool) -> Result<Self> {
        fs::create_dir_all(root)
            .with_context(|| format!("Failed to create export directory: {:?}", root))?;
        Ok(DirectoryArchive {
            root: root.to_path_buf(),
            gzip,
            written: Vec::new(),
        })
    }

    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn write_gzip(path: &Path, contents: &str) -> Result<()> {
        let mut encoder = GzEncoder::new(
            fs::File::create(path).context("Failed to create compressed file")?,
            Compression::default(),
        );
        encoder
            .write_all(contents.as_bytes())
            .context("Failed to write compressed data")?;
        encoder.finish().context("Failed to finalize compression")?;
        Ok(())
    }
}

impl ArchiveWriter for DirectoryArchive {
    fn add_file(&mut self, folder: &str, filename: &str, contents: &str) -> Result<()> {
        let dir = self.root.join(folder);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create group folder: {:?}", dir))?;

        let path = if self.gzip {
            let path = dir.join(format!("{}.gz", filename));
            Self::write_gzip(&path, contents)?;
            path
        } else {
            let path = dir.join(filename);
            fs::write(&path, contents).with_context(|| format!("Failed to write {:?}", path))?;
            path
        };

        self.written.push(path);
        Ok(())
    }
}

/// Keeps the archive in memory, keyed by `folder/filename`
#[derive(Debug, Default)]
pub struct MemoryArchive {
    files: BTreeMap<String, String>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        MemoryArchive::default()
    }

    pub fn files(&self) -> &BTreeMap<String, String> {
        &self.files
    }

    pub fn get(&self, folder: &str, filename: &str) -> Option<&str> {
        self.files
            .get(&format!("{}/{}", folder, filename))
            .map(String::as_str)
    }
}

impl ArchiveWriter for MemoryArchive {
    fn add_file(&mut self, folder: &str, filename: &str, contents: &str) -> Result<()> {
        self.files
            .insert(format!("{}/{}", folder, filename), contents.to_string());
        Ok(())
    }
}
