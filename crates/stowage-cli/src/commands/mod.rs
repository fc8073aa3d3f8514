pub mod config;
pub mod download;
pub mod ensure;
pub mod list;
pub mod upload;
