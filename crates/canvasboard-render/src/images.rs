//! Image resources referenced by elements.
//!
//! Loading happens on background threads. [`ImageCache::request`] answers
//! immediately with the current state; [`ImageCache::poll`] collects finished
//! loads so the caller can render again.

use canvasboard_core::elements::ImageState;
use peniko::{Blob, ImageAlphaType, ImageData, ImageFormat};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;
use std::time::Duration;
use thiserror::Error;

const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Image loading errors.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("decode failed: {0}")]
    Decode(String),
}

/// Where image bytes come from.
pub trait ImageSource: Send + Sync {
    fn fetch(&self, src: &str) -> Result<Vec<u8>, ImageError>;
}

/// Fetches `http(s)` URLs with a blocking client and reads anything else
/// (`file://` URLs or plain paths) from disk.
pub struct HttpImageSource {
    client: reqwest::blocking::Client,
}

impl HttpImageSource {
    pub fn new() -> Result<Self, ImageError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| ImageError::Fetch(e.to_string()))?;
        Ok(Self { client })
    }
}

impl ImageSource for HttpImageSource {
    fn fetch(&self, src: &str) -> Result<Vec<u8>, ImageError> {
        if src.starts_with("http://") || src.starts_with("https://") {
            let response = self
                .client
                .get(src)
                .send()
                .and_then(|r| r.error_for_status())
                .map_err(|e| ImageError::Fetch(e.to_string()))?;
            let bytes = response.bytes().map_err(|e| ImageError::Fetch(e.to_string()))?;
            return Ok(bytes.to_vec());
        }
        let path = src.strip_prefix("file://").unwrap_or(src);
        std::fs::read(path).map_err(|e| ImageError::Fetch(format!("{path}: {e}")))
    }
}

/// Decode encoded image bytes into RGBA8 pixels.
pub fn decode(bytes: &[u8]) -> Result<ImageData, ImageError> {
    let decoded = image::load_from_memory(bytes).map_err(|e| ImageError::Decode(e.to_string()))?;
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(ImageData {
        data: Blob::new(Arc::new(rgba.into_vec())),
        format: ImageFormat::Rgba8,
        width,
        height,
        alpha_type: ImageAlphaType::Alpha,
    })
}

enum Entry {
    Loading,
    Ready(ImageData),
    Failed,
}

type LoadResult = (String, Result<ImageData, ImageError>);

pub struct ImageCache {
    source: Arc<dyn ImageSource>,
    entries: HashMap<String, Entry>,
    tx: Sender<LoadResult>,
    rx: Receiver<LoadResult>,
}

impl ImageCache {
    pub fn new(source: impl ImageSource + 'static) -> Self {
        let (tx, rx) = channel();
        Self {
            source: Arc::new(source),
            entries: HashMap::new(),
            tx,
            rx,
        }
    }

    /// State of `src`, starting a load the first time it is asked for.
    pub fn request(&mut self, src: &str) -> ImageState {
        match self.entries.get(src) {
            Some(Entry::Ready(_)) => return ImageState::Ready,
            Some(Entry::Loading) => return ImageState::Pending,
            Some(Entry::Failed) => return ImageState::Failed,
            None => {}
        }

        log::debug!("loading image {}", src);
        self.entries.insert(src.to_string(), Entry::Loading);
        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        let src = src.to_string();
        thread::spawn(move || {
            let result = source.fetch(&src).and_then(|bytes| decode(&bytes));
            let _ = tx.send((src, result));
        });
        ImageState::Pending
    }

    /// Collect finished loads. Returns how many resolved (either way) since
    /// the last poll.
    pub fn poll(&mut self) -> usize {
        let mut resolved = 0;
        while let Ok((src, result)) = self.rx.try_recv() {
            let entry = match result {
                Ok(image) => {
                    log::debug!("image {} ready ({}x{})", src, image.width, image.height);
                    Entry::Ready(image)
                }
                Err(e) => {
                    log::warn!("image {} failed: {}", src, e);
                    Entry::Failed
                }
            };
            self.entries.insert(src, entry);
            resolved += 1;
        }
        resolved
    }

    pub fn state(&self, src: &str) -> Option<ImageState> {
        self.entries.get(src).map(|entry| match entry {
            Entry::Loading => ImageState::Pending,
            Entry::Ready(_) => ImageState::Ready,
            Entry::Failed => ImageState::Failed,
        })
    }

    /// Decoded pixels of a ready image.
    pub fn get(&self, src: &str) -> Option<&ImageData> {
        match self.entries.get(src) {
            Some(Entry::Ready(image)) => Some(image),
            _ => None,
        }
    }

    /// Every known resource with its state.
    pub fn states(&self) -> impl Iterator<Item = (&str, ImageState)> {
        self.entries.keys().filter_map(|src| Some((src.as_str(), self.state(src)?)))
    }

    /// Forget a resource so the next request loads it again.
    pub fn evict(&mut self, src: &str) -> bool {
        self.entries.remove(src).is_some()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::time::Instant;

    /// Serves a fixed set of images from memory.
    pub(crate) struct MemorySource(pub HashMap<String, Vec<u8>>);

    impl ImageSource for MemorySource {
        fn fetch(&self, src: &str) -> Result<Vec<u8>, ImageError> {
            self.0
                .get(src)
                .cloned()
                .ok_or_else(|| ImageError::Fetch(format!("{src}: not found")))
        }
    }

    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = image::RgbaImage::from_pixel(width, height, image::Rgba([255, 0, 0, 255]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(image)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    pub(crate) fn poll_until(cache: &mut ImageCache, expected: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut resolved = 0;
        while resolved < expected && Instant::now() < deadline {
            resolved += cache.poll();
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(resolved, expected);
    }

    #[test]
    fn test_request_loads_in_background() {
        let source = MemorySource(HashMap::from([("a.png".to_string(), png_bytes(3, 2))]));
        let mut cache = ImageCache::new(source);
        assert_eq!(cache.request("a.png"), ImageState::Pending);
        assert_eq!(cache.request("a.png"), ImageState::Pending);
        poll_until(&mut cache, 1);
        assert_eq!(cache.request("a.png"), ImageState::Ready);
        let image = cache.get("a.png").unwrap();
        assert_eq!((image.width, image.height), (3, 2));
        assert_eq!(image.data.data().len(), 3 * 2 * 4);
    }

    #[test]
    fn test_missing_and_corrupt_images_fail() {
        let files = HashMap::from([("bad.png".to_string(), b"not an image".to_vec())]);
        let source = MemorySource(files);
        let mut cache = ImageCache::new(source);
        cache.request("bad.png");
        cache.request("gone.png");
        poll_until(&mut cache, 2);
        assert_eq!(cache.state("bad.png"), Some(ImageState::Failed));
        assert_eq!(cache.request("gone.png"), ImageState::Failed);
        assert!(cache.get("bad.png").is_none());
        assert!(cache.evict("gone.png"));
        assert_eq!(cache.state("gone.png"), None);
    }

    #[test]
    fn test_file_source_reads_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pic.png");
        std::fs::write(&path, png_bytes(1, 1)).unwrap();
        let source = HttpImageSource::new().unwrap();
        let url = format!("file://{}", path.display());
        assert!(decode(&source.fetch(&url).unwrap()).is_ok());
        assert!(source.fetch("/definitely/not/here.png").is_err());
    }
}
