//! Unpacking archives into directories and packing them back.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use super::{
    check_asset_size, open_zip, write_atomic, Archive, ArchiveWriter, MAX_ASSET_SIZE, REQUIRED_ENTRIES,
};
use crate::error::{Error, Result};

/// Resolve an archive entry name to a relative path that stays inside the
/// destination.
///
/// Returns `None` for absolute names, drive-prefixed names and names whose
/// `..` components climb above the root. Both `/` and `\` separate
/// components.
pub fn sanitize_entry_name(name: &str) -> Option<PathBuf> {
    if name.starts_with('/') || name.starts_with('\\') {
        return None;
    }

    let mut parts: Vec<&str> = Vec::new();
    for part in name.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            p if p.contains(':') || p.contains('\0') => return None,
            p => parts.push(p),
        }
    }

    if parts.is_empty() {
        return None;
    }
    Some(parts.iter().collect())
}

/// Extract every entry of `archive` into `dest`.
///
/// All entry names and sizes are checked before anything is written, so an
/// archive with one unsafe entry leaves `dest` untouched. Returns the written
/// paths in archive order.
pub fn unpack<P: AsRef<Path>, Q: AsRef<Path>>(archive: P, dest: Q) -> Result<Vec<PathBuf>> {
    let archive = archive.as_ref();
    let dest = dest.as_ref();
    if !archive.exists() {
        return Err(Error::NotFound(archive.to_path_buf()));
    }

    let mut zip = open_zip(File::open(archive)?)?;

    let mut plan = Vec::with_capacity(zip.len());
    for index in 0..zip.len() {
        let file = zip.by_index(index)?;
        let relative = sanitize_entry_name(file.name()).ok_or_else(|| Error::UnsafePath {
            entry: file.name().to_string(),
        })?;
        check_asset_size(file.name(), file.size())?;
        plan.push((index, relative, file.is_dir()));
    }

    fs::create_dir_all(dest)?;
    let mut written = Vec::new();
    for (index, relative, is_dir) in plan {
        let target = dest.join(&relative);
        if is_dir {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = zip.by_index(index)?;
        let name = file.name().to_string();
        let mut out = File::create(&target)?;
        if let Err(e) = copy_limited(&mut file, &mut out, &name, MAX_ASSET_SIZE) {
            drop(out);
            let _ = fs::remove_file(&target);
            return Err(e);
        }
        log::debug!("unpacked {}", target.display());
        written.push(target);
    }

    Ok(written)
}

/// Copy at most `limit` bytes, failing if the reader holds more.
///
/// Declared entry sizes are not trusted; the limit applies to the bytes that
/// actually decompress.
fn copy_limited<R: Read, W: Write>(reader: R, writer: &mut W, name: &str, limit: u64) -> Result<u64> {
    let copied = io::copy(&mut reader.take(limit + 1), writer)?;
    if copied > limit {
        return Err(Error::ValidationFailed(format!(
            "{} exceeds the maximum of {} bytes",
            name, limit
        )));
    }
    Ok(copied)
}

/// Zip the directory tree at `dir` into an archive at `output`.
///
/// The result is read back and validated before it replaces `output`.
/// Returns the number of files packed.
pub fn pack<P: AsRef<Path>, Q: AsRef<Path>>(dir: P, output: Q) -> Result<usize> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(Error::NotFound(dir.to_path_buf()));
    }

    let mut files = Vec::new();
    collect_files(dir, dir, &mut files)?;
    files.sort();

    for required in REQUIRED_ENTRIES {
        if !files.iter().any(|(name, _)| name == required) {
            return Err(Error::MissingEntry(required.to_string()));
        }
    }

    let mut writer = ArchiveWriter::new();
    for (name, path) in &files {
        let size = fs::metadata(path)?.len();
        check_asset_size(name, size)?;
        let data = fs::read(path)?;
        writer.add_bytes(name, &data)?;
    }
    let bytes = writer.finish()?;

    Archive::from_bytes(&bytes)?;
    write_atomic(output, &bytes)?;
    Ok(files.len())
}

/// Collect `(entry name, path)` for every file under `dir`.
fn collect_files(root: &Path, dir: &Path, files: &mut Vec<(String, PathBuf)>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_files(root, &path, files)?;
        } else if file_type.is_file() {
            let relative = path
                .strip_prefix(root)
                .map_err(|e| Error::Other(e.to_string()))?;
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.push((name, path));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::tests::{raw_zip, sample_archive};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sanitize_entry_name() {
        assert_eq!(sanitize_entry_name("content.md"), Some(PathBuf::from("content.md")));
        assert_eq!(
            sanitize_entry_name("assets/./image1.png"),
            Some(PathBuf::from("assets/image1.png"))
        );
        assert_eq!(sanitize_entry_name("a/../b.md"), Some(PathBuf::from("b.md")));
        assert_eq!(sanitize_entry_name("../../etc/passwd"), None);
        assert_eq!(sanitize_entry_name("assets/../../x"), None);
        assert_eq!(sanitize_entry_name("/etc/passwd"), None);
        assert_eq!(sanitize_entry_name("\\windows\\system32"), None);
        assert_eq!(sanitize_entry_name("C:/evil.txt"), None);
        assert_eq!(sanitize_entry_name(".."), None);
        assert_eq!(sanitize_entry_name(""), None);
    }

    #[test]
    fn test_unpack_then_pack() {
        let dir = tempfile::tempdir().unwrap();
        let archive_path = dir.path().join("doc.sidedoc");
        sample_archive().save(&archive_path).unwrap();

        let out = dir.path().join("unpacked");
        let written = unpack(&archive_path, &out).unwrap();
        assert!(written.contains(&out.join("content.md")));
        assert!(out.join("assets").join("image1.png").exists());

        fs::write(out.join("content.md"), "# Title\nFirst paragraph, edited.").unwrap();
        let repacked = dir.path().join("repacked.sidedoc");
        let count = pack(&out, &repacked).unwrap();
        assert_eq!(count, written.len());

        let archive = Archive::open(&repacked).unwrap();
        assert_eq!(archive.content, "# Title\nFirst paragraph, edited.");
        assert_eq!(archive.assets.len(), 1);
    }

    #[test]
    fn test_unpack_rejects_traversal_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let archive_path = dir.path().join("evil.sidedoc");
        let bytes = raw_zip(&[("content.md", b"# A"), ("../../etc/passwd", b"pwned")]);
        fs::write(&archive_path, bytes).unwrap();

        let out = dir.path().join("out");
        let err = unpack(&archive_path, &out).unwrap_err();
        assert!(matches!(err, Error::UnsafePath { ref entry } if entry == "../../etc/passwd"));
        assert!(!out.exists());
        assert!(!dir.path().join("etc").exists());
    }

    #[test]
    fn test_copy_limited_rejects_overflow() {
        let mut out = Vec::new();
        assert_eq!(copy_limited(&b"12345678"[..], &mut out, "a.png", 8).unwrap(), 8);
        assert_eq!(out, b"12345678");

        let mut out = Vec::new();
        let err = copy_limited(io::repeat(0).take(100), &mut out, "assets/big.png", 16).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ValidationFailed);
        assert!(err.to_string().contains("assets/big.png"));
        assert_eq!(out.len(), 17);
    }

    #[test]
    fn test_pack_requires_metadata() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("content.md"), "# A").unwrap();
        let err = pack(dir.path(), dir.path().join("out.sidedoc")).unwrap_err();
        assert!(matches!(err, Error::MissingEntry(_)));
        assert!(!dir.path().join("out.sidedoc").exists());
    }
}
