//! Recording of detected streams.
//!
//! - [`DedupRegistry`]: stream URLs already claimed for download
//! - [`DownloadCoordinator`]: naming, directory management and status
//!   bookkeeping around a [`ByteTransport`](crate::transport::ByteTransport)

mod coordinator;
mod dedup;

pub use coordinator::{DownloadCoordinator, RecordingOutcome};
pub use dedup::DedupRegistry;
