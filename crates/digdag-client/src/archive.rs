//! Project archive packing and extraction.
//!
//! Project archives are gzip-compressed tar streams. Extraction is blocking
//! filesystem work; async callers run it on a blocking thread.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tar::EntryType;

use crate::error::{Error, Result};

const COPY_BUF_SIZE: usize = 64 * 1024;

/// Counts from one extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Unpacked {
    /// Directory entries created or already present.
    pub directories: usize,
    /// Regular files written.
    pub files: usize,
    /// Total bytes written.
    pub bytes: u64,
}

/// Unpack a gzip-compressed tar stream into `dest`.
///
/// `dest` and any missing parent directories are created. Every entry is
/// processed until the end of the stream:
///
/// - directories are created, including intermediate segments; a regular
///   file already sitting at the target path is an error, not overwritten;
/// - regular files are created or truncated, and each is closed as soon as
///   its contents are copied;
/// - links and other special entries are skipped.
///
/// Extraction stops at the first failure. A bad gzip or tar stream is
/// reported as [`Error::Archive`], local I/O failures as
/// [`Error::Filesystem`].
pub fn unarchive<R: Read>(dest: &Path, reader: R) -> Result<Unpacked> {
    fs::create_dir_all(dest).map_err(|e| Error::filesystem(dest, e))?;

    let mut archive = tar::Archive::new(GzDecoder::new(reader));
    let mut unpacked = Unpacked::default();

    for entry in archive.entries().map_err(stream_error)? {
        let mut entry = entry.map_err(stream_error)?;
        let entry_path = entry.path().map_err(Error::Archive)?.into_owned();
        let Some(relative) = sanitize(&entry_path)? else {
            continue;
        };
        let target = dest.join(&relative);

        match entry.header().entry_type() {
            EntryType::Directory => {
                ensure_dir(&target)?;
                unpacked.directories += 1;
            }
            EntryType::Regular | EntryType::Continuous => {
                if let Some(parent) = target.parent() {
                    ensure_dir(parent)?;
                }
                let written = write_file(&target, &mut entry)?;
                tracing::debug!(path = %relative.display(), bytes = written, "extracted file");
                unpacked.files += 1;
                unpacked.bytes += written;
            }
            other => {
                tracing::debug!(path = %relative.display(), kind = ?other, "skipping entry");
            }
        }
    }

    tracing::info!(
        dest = %dest.display(),
        files = unpacked.files,
        directories = unpacked.directories,
        "archive extracted"
    );
    Ok(unpacked)
}

/// Pack the contents of `dir` into a gzip-compressed tar archive.
///
/// Entry names are relative to `dir` and sorted, so packing the same tree
/// twice yields the same entry order.
pub fn pack_dir(dir: &Path) -> Result<Vec<u8>> {
    let meta = fs::metadata(dir).map_err(|e| Error::filesystem(dir, e))?;
    if !meta.is_dir() {
        return Err(Error::Validation(format!(
            "{} is not a directory",
            dir.display()
        )));
    }

    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    builder.mode(tar::HeaderMode::Deterministic);
    append_tree(&mut builder, dir, Path::new(""))?;

    let encoder = builder.into_inner().map_err(|e| Error::filesystem(dir, e))?;
    encoder.finish().map_err(|e| Error::filesystem(dir, e))
}

fn append_tree<W: Write>(builder: &mut tar::Builder<W>, root: &Path, relative: &Path) -> Result<()> {
    let current = root.join(relative);
    let mut children = fs::read_dir(&current)
        .map_err(|e| Error::filesystem(&current, e))?
        .collect::<io::Result<Vec<_>>>()
        .map_err(|e| Error::filesystem(&current, e))?;
    children.sort_by_key(|c| c.file_name());

    for child in children {
        let name = relative.join(child.file_name());
        let path = child.path();
        let file_type = child.file_type().map_err(|e| Error::filesystem(&path, e))?;
        if file_type.is_dir() {
            builder
                .append_dir(&name, &path)
                .map_err(|e| Error::filesystem(&path, e))?;
            append_tree(builder, root, &name)?;
        } else if file_type.is_file() {
            builder
                .append_path_with_name(&path, &name)
                .map_err(|e| Error::filesystem(&path, e))?;
        }
    }
    Ok(())
}

/// Reduce an entry path to plain relative components.
///
/// Returns `None` for entries that name the archive root itself.
fn sanitize(path: &Path) -> Result<Option<PathBuf>> {
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::Archive(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("entry escapes destination: {}", path.display()),
                )));
            }
        }
    }
    Ok((!clean.as_os_str().is_empty()).then_some(clean))
}

fn ensure_dir(path: &Path) -> Result<()> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(Error::filesystem(
            path,
            io::Error::new(io::ErrorKind::AlreadyExists, "a non-directory is in the way"),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(path).map_err(|e| Error::filesystem(path, e))
        }
        Err(e) => Err(Error::filesystem(path, e)),
    }
}

/// Copy one entry into `target`, closing the file before returning.
fn write_file<R: Read>(target: &Path, entry: &mut R) -> Result<u64> {
    let mut file = File::create(target).map_err(|e| Error::filesystem(target, e))?;
    let mut buf = vec![0u8; COPY_BUF_SIZE];
    let mut written = 0u64;
    loop {
        let n = match entry.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(stream_error(e)),
        };
        file.write_all(&buf[..n])
            .map_err(|e| Error::filesystem(target, e))?;
        written += n as u64;
    }
    file.flush().map_err(|e| Error::filesystem(target, e))?;
    drop(file);
    Ok(written)
}

/// Classify a read failure on the archive stream.
///
/// Network failures surfaced through the reader keep their transport
/// identity; everything else means the archive itself is bad.
fn stream_error(err: io::Error) -> Error {
    if err
        .get_ref()
        .is_some_and(|inner| inner.is::<reqwest::Error>())
    {
        if let Some(inner) = err.into_inner() {
            if let Ok(transport) = inner.downcast::<reqwest::Error>() {
                return Error::Transport(*transport);
            }
        }
        return Error::Archive(io::Error::other("transport failure while reading archive"));
    }
    Error::Archive(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tar_gz(build: impl FnOnce(&mut tar::Builder<GzEncoder<Vec<u8>>>)) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::fast()));
        build(&mut builder);
        builder.into_inner().unwrap().finish().unwrap()
    }

    fn append_file(builder: &mut tar::Builder<GzEncoder<Vec<u8>>>, path: &str, data: &[u8]) {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        builder.append_data(&mut header, path, data).unwrap();
    }

    fn append_dir(builder: &mut tar::Builder<GzEncoder<Vec<u8>>>, path: &str) {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(EntryType::Directory);
        header.set_size(0);
        header.set_mode(0o755);
        builder.append_data(&mut header, path, io::empty()).unwrap();
    }

    #[test]
    fn test_unarchive_extracts_every_entry() {
        let archive = tar_gz(|b| {
            append_dir(b, "queries/");
            append_file(b, "main.dig", b"+step:\n  echo>: hi\n");
            append_file(b, "queries/a.sql", b"select 1");
            append_file(b, "deep/nested/b.sql", b"select 2");
        });
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out");

        let unpacked = unarchive(&dest, &archive[..]).unwrap();

        assert_eq!(unpacked.files, 3);
        assert_eq!(unpacked.directories, 1);
        assert_eq!(
            fs::read_to_string(dest.join("main.dig")).unwrap(),
            "+step:\n  echo>: hi\n"
        );
        assert_eq!(fs::read(dest.join("queries/a.sql")).unwrap(), b"select 1");
        assert_eq!(fs::read(dest.join("deep/nested/b.sql")).unwrap(), b"select 2");
    }

    #[test]
    fn test_unarchive_truncates_existing_file() {
        let archive = tar_gz(|b| append_file(b, "main.dig", b"new"));
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("main.dig"), b"much longer old content").unwrap();

        unarchive(dir.path(), &archive[..]).unwrap();

        assert_eq!(fs::read(dir.path().join("main.dig")).unwrap(), b"new");
    }

    #[test]
    fn test_directory_entry_over_regular_file_fails() {
        let archive = tar_gz(|b| {
            append_dir(b, "queries/");
            append_file(b, "queries/a.sql", b"select 1");
        });
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("queries"), b"i am a file").unwrap();

        let err = unarchive(dir.path(), &archive[..]).unwrap_err();

        match err {
            Error::Filesystem { path, .. } => assert_eq!(path, dir.path().join("queries")),
            other => panic!("expected filesystem error, got {other:?}"),
        }
        assert_eq!(fs::read(dir.path().join("queries")).unwrap(), b"i am a file");
    }

    #[test]
    fn test_malformed_gzip_is_archive_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = unarchive(dir.path(), &b"definitely not gzip"[..]).unwrap_err();
        assert!(matches!(err, Error::Archive(_)), "got {err:?}");
    }

    #[test]
    fn test_path_traversal_rejected() {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(3);
        header.set_mode(0o644);
        // set_path refuses `..`, so write the name bytes directly.
        {
            let name = &mut header.as_old_mut().name;
            let raw = b"../escape.txt";
            name[..raw.len()].copy_from_slice(raw);
        }
        header.set_cksum();
        let archive = tar_gz(|b| b.append(&header, &b"bad"[..]).unwrap());

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out");
        let err = unarchive(&dest, &archive[..]).unwrap_err();

        assert!(matches!(err, Error::Archive(_)), "got {err:?}");
        assert!(!dir.path().join("escape.txt").exists());
    }

    #[test]
    fn test_pack_dir_then_unarchive() {
        let src = tempfile::tempdir().unwrap();
        fs::write(src.path().join("main.dig"), b"timezone: UTC\n").unwrap();
        fs::create_dir_all(src.path().join("scripts")).unwrap();
        fs::write(src.path().join("scripts/run.py"), b"print('hi')\n").unwrap();

        let packed = pack_dir(src.path()).unwrap();

        let dest = tempfile::tempdir().unwrap();
        let unpacked = unarchive(dest.path(), &packed[..]).unwrap();
        assert_eq!(unpacked.files, 2);
        assert_eq!(
            fs::read(dest.path().join("scripts/run.py")).unwrap(),
            b"print('hi')\n"
        );
    }

    #[test]
    fn test_pack_dir_rejects_file() {
        let src = tempfile::tempdir().unwrap();
        let file = src.path().join("main.dig");
        fs::write(&file, b"x").unwrap();
        assert!(matches!(pack_dir(&file), Err(Error::Validation(_))));
    }
}
