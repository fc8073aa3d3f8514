use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Inserted between the file stem and its extension for derived download paths.
pub const DOWNLOAD_MARKER: &str = "_DOWNLOADED";

/// Sibling of `source` with [`DOWNLOAD_MARKER`] before the last extension.
///
/// `report.txt` becomes `report_DOWNLOADED.txt`; `notes` becomes
/// `notes_DOWNLOADED`. Dotfiles like `.env` have no extension in this sense.
pub fn downloaded_path(source: &Path) -> PathBuf {
    let mut name = source
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(OsString::new);
    name.push(DOWNLOAD_MARKER);
    if let Some(ext) = source.extension() {
        name.push(".");
        name.push(ext);
    }
    source.with_file_name(name)
}
