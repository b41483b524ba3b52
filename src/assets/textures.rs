//! Texture library for catalog images and glTF-embedded images.
//!
//! Catalog images are fetched and decoded on a background thread so the UI
//! never blocks on disk or network. Results are drained once per frame with
//! [`TextureLibrary::poll`]. A failed load leaves the slot marked failed; the
//! renderer then binds its neutral white texture.

use crate::customize::TextureLoader;
use crate::resource::{ResourceError, ResourceFetcher};
use crate::scene::TextureHandle;
use crossbeam_channel::{unbounded, Receiver, Sender};
use image::RgbaImage;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

/// Prefix for images that came out of the model file rather than the catalog.
pub const EMBEDDED_PREFIX: &str = "gltf-image:";

pub fn embedded_key(index: usize) -> String {
    format!("{}{}", EMBEDDED_PREFIX, index)
}

#[derive(Debug, thiserror::Error)]
pub enum TextureError {
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("embedded image {0} was not provided by the model")]
    MissingEmbedded(String),
    #[error("texture loader thread is not running")]
    LoaderUnavailable,
}

#[derive(Debug, Clone)]
pub enum TextureState {
    Pending,
    Ready(Arc<RgbaImage>),
    Failed,
}

#[derive(Debug)]
struct Slot {
    source: String,
    state: TextureState,
    /// Bumped on every state change so GPU copies know when to refresh.
    revision: u64,
}

struct LoadRequest {
    handle: TextureHandle,
    source: String,
}

struct LoadResult {
    handle: TextureHandle,
    source: String,
    result: Result<RgbaImage, TextureError>,
}

pub struct TextureLibrary {
    slots: Vec<Slot>,
    by_source: HashMap<String, TextureHandle>,
    request_tx: Option<Sender<LoadRequest>>,
    result_rx: Receiver<LoadResult>,
    in_flight: usize,
}

impl TextureLibrary {
    pub fn new(fetcher: ResourceFetcher) -> Self {
        let (request_tx, request_rx) = unbounded::<LoadRequest>();
        let (result_tx, result_rx) = unbounded::<LoadResult>();

        let spawned = thread::Builder::new()
            .name("texture-loader".into())
            .spawn(move || loader_thread(fetcher, request_rx, result_tx));
        let request_tx = match spawned {
            Ok(_) => Some(request_tx),
            Err(err) => {
                log::error!("Failed to spawn texture loader thread: {}", err);
                None
            }
        };

        Self {
            slots: Vec::new(),
            by_source: HashMap::new(),
            request_tx,
            result_rx,
            in_flight: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn state(&self, handle: TextureHandle) -> Option<&TextureState> {
        self.slot(handle).map(|slot| &slot.state)
    }

    pub fn revision(&self, handle: TextureHandle) -> u64 {
        self.slot(handle).map_or(0, |slot| slot.revision)
    }

    pub fn image(&self, handle: TextureHandle) -> Option<&Arc<RgbaImage>> {
        match &self.slot(handle)?.state {
            TextureState::Ready(image) => Some(image),
            _ => None,
        }
    }

    pub fn source(&self, handle: TextureHandle) -> Option<&str> {
        self.slot(handle).map(|slot| slot.source.as_str())
    }

    fn slot(&self, handle: TextureHandle) -> Option<&Slot> {
        self.slots.get(handle.0 as usize)
    }

    fn allocate(&mut self, source: &str, state: TextureState) -> TextureHandle {
        let handle = TextureHandle(self.slots.len() as u32);
        self.slots.push(Slot {
            source: source.to_string(),
            state,
            revision: 1,
        });
        self.by_source.insert(source.to_string(), handle);
        handle
    }

    fn set_state(&mut self, handle: TextureHandle, state: TextureState) {
        if let Some(slot) = self.slots.get_mut(handle.0 as usize) {
            slot.state = state;
            slot.revision += 1;
        }
    }

    /// Registers already-decoded pixels (glTF-embedded images). Replaces the
    /// pixels if the source is already known.
    pub fn insert_decoded(&mut self, source: &str, image: RgbaImage) -> TextureHandle {
        let state = TextureState::Ready(Arc::new(image));
        match self.by_source.get(source).copied() {
            Some(handle) => {
                self.set_state(handle, state);
                handle
            }
            None => self.allocate(source, state),
        }
    }

    /// Drains finished background loads. Returns the handles that changed state.
    pub fn poll(&mut self) -> Vec<TextureHandle> {
        let mut changed = Vec::new();
        while let Ok(done) = self.result_rx.try_recv() {
            changed.push(self.finish(done));
        }
        changed
    }

    fn finish(&mut self, done: LoadResult) -> TextureHandle {
        self.in_flight = self.in_flight.saturating_sub(1);
        let state = match done.result {
            Ok(image) => {
                log::debug!(
                    "Loaded texture {} ({}x{})",
                    done.source,
                    image.width(),
                    image.height()
                );
                TextureState::Ready(Arc::new(image))
            }
            Err(err) => {
                log::warn!("Texture {} unavailable: {}", done.source, err);
                TextureState::Failed
            }
        };
        self.set_state(done.handle, state);
        done.handle
    }

    /// Blocks until every in-flight load has reported back.
    #[cfg(test)]
    pub fn wait_idle(&mut self, timeout: std::time::Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        while self.in_flight > 0 {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            match self.result_rx.recv_timeout(remaining) {
                Ok(done) => {
                    self.finish(done);
                }
                Err(_) => return false,
            }
        }
        true
    }
}

impl TextureLoader for TextureLibrary {
    fn load(&mut self, source: &str) -> TextureHandle {
        if let Some(handle) = self.by_source.get(source) {
            return *handle;
        }

        if source.starts_with(EMBEDDED_PREFIX) {
            log::warn!("{}", TextureError::MissingEmbedded(source.to_string()));
            return self.allocate(source, TextureState::Failed);
        }

        let handle = self.allocate(source, TextureState::Pending);
        let request = LoadRequest {
            handle,
            source: source.to_string(),
        };
        let sent = self
            .request_tx
            .as_ref()
            .is_some_and(|tx| tx.send(request).is_ok());
        if sent {
            self.in_flight += 1;
        } else {
            log::warn!("Texture {} unavailable: {}", source, TextureError::LoaderUnavailable);
            self.set_state(handle, TextureState::Failed);
        }
        handle
    }
}

fn loader_thread(
    fetcher: ResourceFetcher,
    request_rx: Receiver<LoadRequest>,
    result_tx: Sender<LoadResult>,
) {
    while let Ok(request) = request_rx.recv() {
        let result = fetch_and_decode(&fetcher, &request.source);
        let done = LoadResult {
            handle: request.handle,
            source: request.source,
            result,
        };
        if result_tx.send(done).is_err() {
            break;
        }
    }
}

fn fetch_and_decode(fetcher: &ResourceFetcher, source: &str) -> Result<RgbaImage, TextureError> {
    let bytes = fetcher.fetch_str(source)?;
    Ok(image::load_from_memory(&bytes)?.to_rgba8())
}

#[cfg(test)]
mod tests {
    use super::{embedded_key, TextureLibrary, TextureState};
    use crate::catalog::{Catalog, CatalogDomain};
    use crate::customize::TextureLoader;
    use crate::resource::ResourceFetcher;
    use image::{Rgba, RgbaImage};
    use std::path::PathBuf;
    use std::time::Duration;

    fn temp_dir(tag: &str) -> PathBuf {
        let mut dir = std::env::temp_dir();
        let nonce = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        dir.push(format!("house_customizer_{}_{}_{}", tag, std::process::id(), nonce));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn same_source_maps_to_same_handle() {
        let dir = temp_dir("tex_same");
        let mut library = TextureLibrary::new(ResourceFetcher::new(dir.clone(), None));
        let a = library.load("missing.png");
        let b = library.load("missing.png");
        let c = library.load("other.png");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(library.len(), 2);
        assert!(library.wait_idle(Duration::from_secs(10)));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn decodes_local_png_in_background() {
        let dir = temp_dir("tex_png");
        let mut image = RgbaImage::new(4, 2);
        image.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        image.save(dir.join("swatch.png")).unwrap();

        let mut library = TextureLibrary::new(ResourceFetcher::new(dir.clone(), None));
        let handle = library.load("swatch.png");
        assert!(matches!(library.state(handle), Some(TextureState::Pending)));
        assert!(library.wait_idle(Duration::from_secs(10)));

        let loaded = library.image(handle).unwrap();
        assert_eq!(loaded.dimensions(), (4, 2));
        assert_eq!(loaded.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn broken_references_fail_quietly() {
        let dir = temp_dir("tex_broken");
        std::fs::write(dir.join("garbage.png"), b"not an image").unwrap();
        let mut library = TextureLibrary::new(ResourceFetcher::new(dir.clone(), None));
        let missing = library.load("nope.jpg");
        let garbage = library.load("garbage.png");
        let revision = library.revision(garbage);
        assert!(library.wait_idle(Duration::from_secs(10)));

        assert!(matches!(library.state(missing), Some(TextureState::Failed)));
        assert!(matches!(library.state(garbage), Some(TextureState::Failed)));
        assert!(library.revision(garbage) > revision);
        assert!(library.image(garbage).is_none());
        assert_eq!(library.in_flight(), 0);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn embedded_images_are_ready_immediately() {
        let mut library = TextureLibrary::new(ResourceFetcher::new(PathBuf::from("."), None));
        let key = embedded_key(0);
        let handle = library.insert_decoded(&key, RgbaImage::new(1, 1));
        assert_eq!(library.load(&key), handle);
        assert!(library.image(handle).is_some());
        assert_eq!(library.in_flight(), 0);

        let unknown = library.load(&embedded_key(5));
        assert!(matches!(library.state(unknown), Some(TextureState::Failed)));
    }

    #[test]
    fn builtin_catalog_images_ship_with_the_crate() {
        let catalog = Catalog::builtin().unwrap();
        let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        let mut library = TextureLibrary::new(ResourceFetcher::new(root, None));

        let mut handles = Vec::new();
        for domain in CatalogDomain::ALL {
            for category in catalog.categories(domain) {
                for item in &category.items {
                    handles.push((item.image.clone(), library.load(&item.image)));
                }
            }
        }
        assert_eq!(handles.len(), 20);
        assert!(library.wait_idle(Duration::from_secs(30)));

        let failed: Vec<&str> = handles
            .iter()
            .filter(|(_, handle)| library.image(*handle).is_none())
            .map(|(image, _)| image.as_str())
            .collect();
        assert!(failed.is_empty(), "unloadable catalog images: {:?}", failed);
    }
}
