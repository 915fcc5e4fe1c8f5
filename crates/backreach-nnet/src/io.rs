use crate::NnetError;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Read a network file, transparently decompressing `.gz`.
pub(crate) fn read_text_maybe_gzip(path: &Path) -> Result<String, NnetError> {
    if !path.exists() {
        return Err(NnetError::NotFound(path.to_path_buf()));
    }

    let is_gzip = path.extension().and_then(|e| e.to_str()) == Some("gz");
    let bytes = if is_gzip {
        let mut decoder = GzDecoder::new(File::open(path)?);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).map_err(NnetError::Gzip)?;
        out
    } else {
        std::fs::read(path)?
    };
    Ok(String::from_utf8(bytes)?)
}

/// Pick `name` or `name.gz` inside `dir`, preferring the plain file.
pub(crate) fn find_maybe_gzip(dir: &Path, name: &str) -> Result<std::path::PathBuf, NnetError> {
    let plain = dir.join(name);
    if plain.exists() {
        return Ok(plain);
    }
    let gz = dir.join(format!("{name}.gz"));
    if gz.exists() {
        return Ok(gz);
    }
    Err(NnetError::NotFound(plain))
}
