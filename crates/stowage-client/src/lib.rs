//! Client facade over a blob storage backend.
//!
//! [`BlobClient`] provisions containers, drains paginated listings into a
//! complete result and moves whole files to and from blobs.

pub mod client;
pub mod naming;

pub use client::{AccountHandle, BlobClient, ClientOptions};
pub use naming::downloaded_path;
