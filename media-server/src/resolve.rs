//! Request path resolution and root confinement.

use std::path::{Component, Path, PathBuf};

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::{Result, ServerError};

/// Characters left unescaped in a URL path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// The directory a [`MediaServer`](crate::MediaServer) serves from.
///
/// The directory is stored canonicalized; every resolved path is
/// canonicalized too and must start with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRoot {
    dir: PathBuf,
}

impl MediaRoot {
    /// Create a root from an existing directory.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().canonicalize()?;
        if !dir.is_dir() {
            return Err(ServerError::NotADirectory(dir));
        }
        Ok(Self { dir })
    }

    /// Canonical directory path.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Resolve a raw (percent-encoded) URL path to a file inside the root.
    ///
    /// # Errors
    ///
    /// - `ServerError::OutsideRoot` when the resolved file escapes the root
    /// - `ServerError::NotFound` when the path is empty, malformed or missing
    pub fn resolve(&self, url_path: &str) -> Result<PathBuf> {
        let path = url_path.split(['?', '#']).next().unwrap_or_default();
        let decoded = percent_decode_str(path)
            .decode_utf8()
            .map_err(|_| ServerError::NotFound(url_path.to_string()))?;

        let relative = decoded.trim_start_matches('/');
        if relative.is_empty() || relative.contains('\0') {
            return Err(ServerError::NotFound(url_path.to_string()));
        }

        // Absolute components (drive prefixes on Windows) would replace the root on join
        let relative = Path::new(relative);
        if relative
            .components()
            .any(|c| matches!(c, Component::Prefix(_) | Component::RootDir))
        {
            return Err(ServerError::OutsideRoot(relative.to_path_buf()));
        }

        let canonical = self
            .dir
            .join(relative)
            .canonicalize()
            .map_err(|_| ServerError::NotFound(url_path.to_string()))?;

        if !canonical.starts_with(&self.dir) {
            return Err(ServerError::OutsideRoot(canonical));
        }

        Ok(canonical)
    }

    /// Build the encoded URL path (with leading `/`) for a file inside the root.
    pub fn url_path_for(&self, file: impl AsRef<Path>) -> Result<String> {
        let file = file.as_ref();
        let canonical = file
            .canonicalize()
            .map_err(|_| ServerError::NotFound(file.display().to_string()))?;

        let relative = canonical
            .strip_prefix(&self.dir)
            .map_err(|_| ServerError::OutsideRoot(canonical.clone()))?;

        let mut url_path = String::new();
        for component in relative.components() {
            let segment = component
                .as_os_str()
                .to_str()
                .ok_or_else(|| ServerError::UnsupportedPath(canonical.clone()))?;
            url_path.push('/');
            url_path.extend(utf8_percent_encode(segment, PATH_SEGMENT));
        }

        if url_path.is_empty() {
            return Err(ServerError::NotFound(file.display().to_string()));
        }
        Ok(url_path)
    }
}

/// MIME type for an audio file, from its extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "mp3" => "audio/mpeg",
        "m4a" | "mp4" => "audio/mp4",
        "aac" => "audio/aac",
        "ogg" | "oga" => "audio/ogg",
        "opus" => "audio/opus",
        "flac" => "audio/flac",
        "wav" => "audio/wav",
        _ => "application/octet-stream",
    }
}
