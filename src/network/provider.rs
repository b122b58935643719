use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::NetworkError;
use super::graph::{GraphSnapshot, StreetGraph};

/// Source of a routable street graph for a named place.
///
/// Both the route stage and the animation background ask a provider, so
/// wrapping one in [`CachedGraphProvider`] or [`FileGraphProvider`] avoids
/// building the network twice.
#[async_trait]
pub trait GraphProvider: Send + Sync {
    async fn graph(&self, place: &str) -> Result<Arc<StreetGraph>, NetworkError>;
}

/// Hands out one pre-built graph whatever the place.
pub struct StaticGraphProvider(Arc<StreetGraph>);

impl StaticGraphProvider {
    pub fn new(graph: StreetGraph) -> Self {
        Self(Arc::new(graph))
    }
}

#[async_trait]
impl GraphProvider for StaticGraphProvider {
    async fn graph(&self, _place: &str) -> Result<Arc<StreetGraph>, NetworkError> {
        Ok(self.0.clone())
    }
}

/// Memoizes the inner provider per place for the life of the process.
pub struct CachedGraphProvider<P> {
    inner: P,
    cache: Mutex<HashMap<String, Arc<StreetGraph>>>,
}

impl<P: GraphProvider> CachedGraphProvider<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl<P: GraphProvider> GraphProvider for CachedGraphProvider<P> {
    async fn graph(&self, place: &str) -> Result<Arc<StreetGraph>, NetworkError> {
        let mut cache = self.cache.lock().await;
        if let Some(graph) = cache.get(place) {
            debug!(place, "Street graph served from memory");
            return Ok(graph.clone());
        }
        let graph = self.inner.graph(place).await?;
        cache.insert(place.to_string(), graph.clone());
        Ok(graph)
    }
}

/// Reads a JSON snapshot from `path`, or builds through the inner provider
/// and writes the snapshot when the file is absent or for another place.
pub struct FileGraphProvider<P> {
    path: PathBuf,
    inner: P,
}

impl<P: GraphProvider> FileGraphProvider<P> {
    pub fn new(path: impl Into<PathBuf>, inner: P) -> Self {
        Self {
            path: path.into(),
            inner,
        }
    }
}

#[async_trait]
impl<P: GraphProvider> GraphProvider for FileGraphProvider<P> {
    async fn graph(&self, place: &str) -> Result<Arc<StreetGraph>, NetworkError> {
        if self.path.exists() {
            let snapshot = load_snapshot(&self.path)?;
            if snapshot.place == place {
                info!(path = %self.path.display(), place, "Street graph loaded from snapshot");
                return Ok(Arc::new(StreetGraph::from_snapshot(snapshot)?));
            }
            warn!(
                path = %self.path.display(),
                cached = %snapshot.place,
                requested = place,
                "Snapshot is for another place, rebuilding"
            );
        }

        let graph = self.inner.graph(place).await?;
        save_snapshot(&self.path, &graph.snapshot(place))?;
        info!(path = %self.path.display(), place, "Street graph snapshot written");
        Ok(graph)
    }
}

pub fn load_snapshot(path: &Path) -> Result<GraphSnapshot, NetworkError> {
    let content = std::fs::read(path).map_err(|source| NetworkError::SnapshotIo {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_slice(&content).map_err(|source| NetworkError::SnapshotFormat {
        path: path.display().to_string(),
        source,
    })
}

pub fn save_snapshot(path: &Path, snapshot: &GraphSnapshot) -> Result<(), NetworkError> {
    let io_err = |source| NetworkError::SnapshotIo {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let body = serde_json::to_vec(snapshot).map_err(|source| NetworkError::SnapshotFormat {
        path: path.display().to_string(),
        source,
    })?;
    std::fs::write(path, body).map_err(io_err)
}
