//! Where the downloaded files go.
use std::path::{Path, PathBuf};

use tracing::info;

use crate::errors::FetchErr;

/// Make sure `root/timestamp` exists and return it. Fine to call when it already does.
pub fn prepare_output_dir(root: &Path, timestamp: &str) -> Result<PathBuf, FetchErr> {
    let directory = root.join(timestamp);

    std::fs::create_dir_all(&directory).map_err(|source| FetchErr::Storage {
        path: directory.clone(),
        source,
    })?;

    info!(directory = %directory.display(), "output directory ready");

    Ok(directory)
}
