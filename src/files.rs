use crate::constants::SUPPORTED_IMAGE_EXTENSIONS;
use crate::error::{Result, TinyImgError};
use glob::glob;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// An image picked for one batch. The bytes are shared so that restarting the
/// batch under new formats does not re-read the file.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    data: Arc<Vec<u8>>,
}

impl SelectedFile {
    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>) -> Self {
        let name = name.into();
        let mime_type = mime_type_for(Path::new(&name)).to_string();
        Self {
            name,
            mime_type,
            size_bytes: data.len() as u64,
            data: Arc::new(data),
        }
    }

    /// Reads a file from disk. Oversized files are still loaded here; the
    /// orchestrator is the one that refuses to send them.
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(TinyImgError::FileNotFound(path.to_path_buf()));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| TinyImgError::FileNotFound(path.to_path_buf()))?;
        let data = fs::read(path)?;
        Ok(Self::from_bytes(name, data))
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Short type label shown next to the name, e.g. `png` for `image/png`
    pub fn type_label(&self) -> &str {
        self.mime_type
            .split('/')
            .nth(1)
            .unwrap_or(self.mime_type.as_str())
    }
}

pub fn mime_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| SUPPORTED_IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Resolve one CLI input (file, directory or glob pattern) to image paths
pub fn collect_image_files(input: &str, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut image_files = Vec::new();
    let input_path = Path::new(input);

    if input_path.is_file() {
        image_files.push(input_path.to_path_buf());
    } else if input_path.is_dir() {
        let walker = if recursive {
            WalkDir::new(input_path).into_iter()
        } else {
            WalkDir::new(input_path).max_depth(1).into_iter()
        };

        for entry in walker.filter_entry(|e| e.depth() == 0 || !is_hidden(e.path())) {
            let entry = entry?;
            let path = entry.path();
            if path.is_file() && is_image_file(path) {
                image_files.push(path.to_path_buf());
            }
        }
        image_files.sort();
    } else if let Ok(pattern) = glob(input) {
        for entry in pattern.flatten() {
            if entry.is_file() && is_image_file(&entry) {
                image_files.push(entry);
            }
        }
    } else {
        return Err(TinyImgError::NoImageFilesFound(input.to_string()));
    }

    Ok(image_files)
}

/// Collect every input and load the files, preserving the order given
pub fn load_selection(inputs: &[String], recursive: bool) -> Result<Vec<SelectedFile>> {
    let mut selection = Vec::new();
    for input in inputs {
        for path in collect_image_files(input, recursive)? {
            selection.push(SelectedFile::from_path(&path)?);
        }
    }
    Ok(selection)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}
