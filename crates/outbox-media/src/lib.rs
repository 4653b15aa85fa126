//! Durable staging for uploaded media attachments.
//!
//! Uploaded image buffers are written to local storage under fresh,
//! collision-free names so a deferred publish can read them back at
//! fire time. Release is best-effort and idempotent: staged files are
//! deleted exactly once on a job's terminal transition, and a missing
//! file on release is logged rather than raised.

mod error;
mod stager;

pub use error::MediaError;
pub use stager::{LoadReport, LoadedMedia, MediaRef, MediaStager, UploadedFile};
