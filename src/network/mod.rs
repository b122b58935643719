//! Street network: the routable graph and where it comes from.

mod graph;
pub mod osm;
mod provider;

pub use graph::{GraphSnapshot, NetworkEdge, NetworkNode, StreetGraph};
pub use provider::{
    CachedGraphProvider, FileGraphProvider, GraphProvider, StaticGraphProvider, load_snapshot,
    save_snapshot,
};
pub use petgraph::graph::NodeIndex;

#[cfg(test)]
pub(crate) use graph::fixtures;

use crate::fetch::FetchError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("no OpenStreetMap area found for '{0}'")]
    PlaceNotFound(String),
    #[error("street network download failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("edge references unknown node {0}")]
    UnknownNode(i64),
    #[error("graph snapshot '{path}': {source}")]
    SnapshotIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("graph snapshot '{path}' is not valid JSON: {source}")]
    SnapshotFormat {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
