//! Image uploads and deletion in the portfolio bucket

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::backend::{Backend, PUBLIC_OBJECT_SEGMENT};
use crate::config::StorageConfig;
use crate::error::{Error, Result};

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Length of the random part of generated object names
const TOKEN_LEN: usize = 11;

const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];
const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
];

/// An image selected for upload
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, inferring the content type from its extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::InvalidInput(format!("'{}' is not a file", path.display())))?;
        let content_type = content_type_for(&name).to_string();
        Ok(Self::new(name, content_type, bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Lowercased extension, if the name has one
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
    }
}

/// Content type for a file name, `application/octet-stream` when unknown
pub fn content_type_for(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Reject anything that is not a JPG/PNG/GIF/WEBP image of at most `max_bytes`
pub fn validate_image_file(file: &ImageFile, max_bytes: u64) -> Result<()> {
    let type_ok = ALLOWED_CONTENT_TYPES.contains(&file.content_type.to_lowercase().as_str())
        || file
            .extension()
            .is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()));
    if !type_ok {
        return Err(Error::InvalidFileType(file.name.clone()));
    }
    if file.size() > max_bytes {
        return Err(Error::FileTooLarge {
            name: file.name.clone(),
            size: file.size(),
            max: max_bytes,
        });
    }
    Ok(())
}

/// `<random base-36 token>-<unix millis>.<original extension>`
pub fn generate_file_name(original: &str) -> String {
    let mut rng = rand::thread_rng();
    let token: String = (0..TOKEN_LEN)
        .map(|_| char::from(BASE36[rng.gen_range(0..BASE36.len())]))
        .collect();
    let ext = Path::new(original)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_else(|| "bin".to_string());
    format!("{}-{}.{}", token, Utc::now().timestamp_millis(), ext)
}

/// Object path inside `bucket` referenced by a public URL
pub fn storage_path_from_url(url: &str, bucket: &str) -> Result<String> {
    let marker = format!("{}{}/", PUBLIC_OBJECT_SEGMENT, bucket);
    match url.split_once(&marker) {
        Some((_, path)) if !path.is_empty() => Ok(path.to_string()),
        _ => Err(Error::InvalidImageUrl(url.to_string())),
    }
}

/// Upload and delete images in the configured bucket
#[derive(Clone)]
pub struct ImageStorage {
    backend: Arc<dyn Backend>,
    bucket: String,
    max_bytes: u64,
}

impl ImageStorage {
    pub fn new(backend: Arc<dyn Backend>, config: &StorageConfig) -> Self {
        Self {
            backend,
            bucket: config.bucket.clone(),
            max_bytes: config.max_image_bytes(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Upload `file` under `folder` and return its public URL
    pub async fn upload_image(&self, file: &ImageFile, folder: &str) -> Result<String> {
        validate_image_file(file, self.max_bytes)?;

        let path = format!("{}/{}", folder, generate_file_name(&file.name));
        self.backend
            .upload(&self.bucket, &path, file.bytes.clone(), &file.content_type)
            .await?;

        let url = self.backend.public_url(&self.bucket, &path);
        info!(path = %path, size = file.size(), "Image uploaded");
        Ok(url)
    }

    /// Upload several files concurrently; one result per input, in order
    pub async fn upload_images(&self, files: &[ImageFile], folder: &str) -> Vec<Result<String>> {
        join_all(files.iter().map(|file| self.upload_image(file, folder))).await
    }

    pub async fn delete_image(&self, url: &str) -> Result<()> {
        let path = storage_path_from_url(url, &self.bucket)?;
        self.backend
            .remove(&self.bucket, std::slice::from_ref(&path))
            .await?;
        debug!(path = %path, "Image removed");
        Ok(())
    }

    /// Best-effort removal; failures are logged and reported per URL
    pub async fn delete_images(&self, urls: &[String]) -> Vec<(String, Result<()>)> {
        let outcomes = join_all(urls.iter().map(|url| self.delete_image(url))).await;
        urls.iter()
            .cloned()
            .zip(outcomes)
            .inspect(|(url, outcome)| {
                if let Err(e) = outcome {
                    warn!(url = %url, error = %e, "Image cleanup failed");
                }
            })
            .collect()
    }
}
