use std::fmt;
use std::path::{Path, PathBuf};

use image::GenericImageView;
use kinema_engine::event_loop::EventLoop;

/// Metadata of a successfully loaded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub src:    String,
    pub width:  u32,
    pub height: u32,
}

/// Why a single image failed to load.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadError {
    pub src:    String,
    pub reason: String,
}

impl LoadError {
    pub fn new(src: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { src: src.into(), reason: reason.into() }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to load image '{}': {}", self.src, self.reason)
    }
}

impl std::error::Error for LoadError {}

/// Completion callback for one fetch.
pub type FetchDone = Box<dyn FnOnce(Result<ImageInfo, LoadError>)>;

/// Loads a single image and reports the outcome exactly once.
///
/// Implementations may call `done` synchronously or later on the loop thread.
pub trait ImageFetcher {
    fn fetch(&self, src: &str, done: FetchDone);
}

/// Fetcher that reads and decodes files with the `image` crate.
///
/// Decoding runs as a background job on the event loop, so the loop keeps
/// ticking while large sheets decode. Relative sources resolve against `root`
/// when one is set.
#[derive(Clone)]
pub struct DecodeFetcher {
    event_loop: EventLoop,
    root:       Option<PathBuf>,
}

impl DecodeFetcher {
    pub fn new(event_loop: EventLoop) -> Self {
        Self { event_loop, root: None }
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    fn resolve(&self, src: &str) -> PathBuf {
        let path = Path::new(src);
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl ImageFetcher for DecodeFetcher {
    fn fetch(&self, src: &str, done: FetchDone) {
        let path = self.resolve(src);
        let src = src.to_string();
        log::trace!("decoding {}", path.display());
        self.event_loop.spawn_blocking(move || decode(&path, src), done);
    }
}

fn decode(path: &Path, src: String) -> Result<ImageInfo, LoadError> {
    let img = image::open(path).map_err(|e| LoadError::new(src.as_str(), e.to_string()))?;
    let (width, height) = img.dimensions();
    Ok(ImageInfo { src, width, height })
}
