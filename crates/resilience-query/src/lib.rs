//! Query engine over the canonical Community Resilience Index table
//!
//! Every operation is a pure function over an immutable [`ReferenceStore`]
//! snapshot. The store is built once at startup and shared behind an `Arc`;
//! nothing in this crate mutates it.
//!
//! | Operation | Module |
//! |-----------|--------|
//! | Range filter `filter(lo, hi)` | [`filter`] |
//! | Range phrase parsing | [`phrase`] |
//! | Radius filter (haversine, miles) | [`geo`] |
//! | Resilience clustering (k-means) | [`cluster`] |

use thiserror::Error;

pub mod cluster;
pub mod filter;
pub mod geo;
pub mod phrase;
pub mod store;

pub use cluster::{cluster, ClusterResult};
pub use filter::filter;
pub use geo::{haversine_miles, within_radius, Centroid, CentroidIndex};
pub use phrase::parse;
pub use store::ReferenceStore;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Unrecognized range query: {0:?}")]
    UnparsableQuery(String),
    #[error("Unknown region: {0}")]
    UnknownRegion(String),
    #[error("Insufficient data: {requested} clusters requested, {available} distinct regions available")]
    InsufficientData { requested: usize, available: usize },
    #[error("Invalid range [{lo}, {hi}]")]
    InvalidRange { lo: f64, hi: f64 },
    #[error("Invalid boundary source: {0}")]
    Boundaries(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Pipeline(#[from] resilience_pipeline::PipelineError),
}

pub type Result<T> = std::result::Result<T, QueryError>;
