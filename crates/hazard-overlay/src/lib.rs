//! Hazard Alert Overlay
//!
//! Joins the National Weather Service active-alert feed onto CRI regions.
//! The upstream feed is behind the [`AlertFeed`] trait; [`AlertOverlay`]
//! wraps any feed in a time-windowed, single-flight cache.
//!
//! A failed fetch is always [`AlertError::FeedUnavailable`], never an empty
//! alert set.

use thiserror::Error;

pub mod config;
pub mod feed;
pub mod overlay;

pub use config::AlertFeedConfig;
pub use feed::{extract_region_codes, ActiveAlert, AlertFeed, NwsAlertFeed};
pub use overlay::{flag_regions, AlertOverlay, AlertSnapshot, FlaggedRegion};

#[derive(Error, Debug, Clone)]
pub enum AlertError {
    #[error("Alert feed unavailable: {0}")]
    FeedUnavailable(String),
    #[error("Alert client setup failed: {0}")]
    Client(String),
}

pub type Result<T> = std::result::Result<T, AlertError>;
