use crate::error::LoadError;
use async_trait::async_trait;
use image::DynamicImage;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

/// Resolves an opaque locator to raw image bytes.
#[async_trait]
pub trait ImageStore: Send + Sync + 'static {
    /// Fetch the full object. A missing object must surface as
    /// `io::ErrorKind::NotFound`.
    async fn fetch(&self, path: &str) -> io::Result<Vec<u8>>;
}

/// Local filesystem storage. Relative locators resolve against `root` when
/// one is set.
#[derive(Debug, Clone, Default)]
pub struct FsImageStore {
    root: Option<PathBuf>,
}

impl FsImageStore {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(path),
            None => PathBuf::from(path),
        }
    }
}

#[async_trait]
impl ImageStore for FsImageStore {
    async fn fetch(&self, path: &str) -> io::Result<Vec<u8>> {
        // Reads to memory; the file is closed before this returns.
        tokio::fs::read(self.resolve(path)).await
    }
}

/// Called once with the locator when an `ImageHandle` is released.
pub type ReleaseHook = Arc<dyn Fn(&str) + Send + Sync>;

/// A decoded, self-contained image for one request.
///
/// Dropping the handle releases it; the release hook, if any, runs exactly
/// once.
pub struct ImageHandle {
    image: Arc<DynamicImage>,
    path: String,
    on_release: Option<ReleaseHook>,
}

impl ImageHandle {
    pub fn new(image: DynamicImage, path: impl Into<String>) -> Self {
        Self {
            image: Arc::new(image),
            path: path.into(),
            on_release: None,
        }
    }

    pub fn with_release_hook(mut self, hook: ReleaseHook) -> Self {
        self.on_release = Some(hook);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    /// Shared pixel data for a worker. Outlives the handle only as long as
    /// the worker holds it.
    pub(crate) fn share(&self) -> Arc<DynamicImage> {
        Arc::clone(&self.image)
    }

    /// Release explicitly. Equivalent to dropping the handle.
    pub fn close(self) {}
}

impl Drop for ImageHandle {
    fn drop(&mut self) {
        tracing::trace!(path = %self.path, "Releasing image handle");
        if let Some(hook) = self.on_release.take() {
            hook(&self.path);
        }
    }
}

impl std::fmt::Debug for ImageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageHandle")
            .field("path", &self.path)
            .field("dimensions", &self.dimensions())
            .finish()
    }
}

pub struct ImageLoader<S: ImageStore = FsImageStore> {
    store: S,
    on_release: Option<ReleaseHook>,
}

impl<S: ImageStore> ImageLoader<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            on_release: None,
        }
    }

    /// Attach `hook` to every handle this loader produces.
    pub fn with_release_hook(mut self, hook: ReleaseHook) -> Self {
        self.on_release = Some(hook);
        self
    }

    #[tracing::instrument(skip(self))]
    pub async fn load(&self, path: &str) -> Result<ImageHandle, LoadError> {
        let bytes = self.store.fetch(path).await.map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => LoadError::NotFound,
            _ => LoadError::Io(e),
        })?;

        let size = bytes.len();
        // Decoding a large JPEG takes milliseconds of CPU; keep it off the scheduler
        let image = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
            .await
            .map_err(|e| LoadError::Io(io::Error::other(e)))??;
        tracing::debug!(
            bytes = size,
            width = image.width(),
            height = image.height(),
            "Image decoded"
        );

        let handle = ImageHandle::new(image, path);
        Ok(match &self.on_release {
            Some(hook) => handle.with_release_hook(Arc::clone(hook)),
            None => handle,
        })
    }
}
