// src/services/mod.rs

//! Network-facing services.
//!
//! Every upstream collaborator sits behind a trait so the pipeline can
//! be driven against mock implementations in tests.

pub mod archive;
pub mod session;
pub mod store;

pub use archive::{ArchiveSource, HttpArchiveSource};
pub use session::{DaySession, HttpDaySession, ImageFetch};
pub use store::{HttpRemoteStore, RemoteStore, UploadFile};
