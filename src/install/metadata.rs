//! Release metadata sidecar (`{dest}/{id}.json`)

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use serde_json::ser::{CompactFormatter, PrettyFormatter, Serializer};

use crate::config::check_identifier;
use crate::error::FetchError;

/// Sidecar path for `identifier` under `destination`
pub fn sidecar_path(destination: &Path, identifier: &str) -> Result<PathBuf, FetchError> {
    check_identifier(identifier)?;
    Ok(destination.join(format!("{identifier}.json")))
}

/// Serialize metadata: tab-indented when `pretty`, compact otherwise
pub fn render(metadata: &Value, pretty: bool) -> serde_json::Result<Vec<u8>> {
    let mut out = Vec::new();
    if pretty {
        let mut ser = Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"\t"));
        metadata.serialize(&mut ser)?;
    } else {
        let mut ser = Serializer::with_formatter(&mut out, CompactFormatter);
        metadata.serialize(&mut ser)?;
    }
    Ok(out)
}

/// Write the sidecar to `path`
pub async fn write_sidecar(path: &Path, metadata: &Value, pretty: bool) -> std::io::Result<()> {
    let bytes = render(metadata, pretty).map_err(std::io::Error::other)?;
    tokio::fs::write(path, bytes).await
}
