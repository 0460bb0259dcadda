//! Replace-on-success file writes

use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::Path;

/// Write `dest` through a sibling temp file that is renamed into place
///
/// `write` fills a buffered writer; the destination is only replaced once the
/// writer has been flushed and synced. On failure the temp file is removed and
/// `dest` is left as it was. Returns the number of bytes published.
pub(crate) fn publish_file<F>(dest: &Path, write: F) -> io::Result<u64>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    let parent = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let file_name = dest
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("output");
    let tmp_path = parent.join(format!(".{file_name}.tmp"));

    let result = write_temp(&tmp_path, write).and_then(|len| {
        fs::rename(&tmp_path, dest)?;
        Ok(len)
    });

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

fn write_temp<F>(tmp_path: &Path, write: F) -> io::Result<u64>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    let mut out = BufWriter::new(File::create(tmp_path)?);
    write(&mut out)?;
    let file = out.into_inner().map_err(|err| err.into_error())?;
    file.sync_all()?;
    Ok(file.metadata()?.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn publishes_and_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested").join("out.json");

        let len = publish_file(&dest, |out| out.write_all(b"first")).unwrap();
        assert_eq!(len, 5);
        publish_file(&dest, |out| out.write_all(b"2")).unwrap();
        assert_eq!(fs::read_to_string(&dest).unwrap(), "2");
        assert!(!dir.path().join("nested").join(".out.json.tmp").exists());
    }

    #[test]
    fn failed_write_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.json");
        fs::write(&dest, "keep").unwrap();

        let err = publish_file(&dest, |_| Err(io::Error::new(io::ErrorKind::Other, "boom")));
        assert!(err.is_err());
        assert_eq!(fs::read_to_string(&dest).unwrap(), "keep");
        assert!(!dir.path().join(".out.json.tmp").exists());
    }
}
