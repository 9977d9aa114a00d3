//! Domain error types.

mod disk_error;
mod fetch_error;

pub use disk_error::DiskError;
pub use fetch_error::{FetchError, FetchResult};
