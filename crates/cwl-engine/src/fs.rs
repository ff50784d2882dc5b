//! Filesystem access used during process construction.
//!
//! File resolution never touches the filesystem directly; it goes
//! through the [`Filesystem`] trait so tests and alternate storage
//! backends can stand in for the local disk.

use std::fs;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use path_clean::PathClean;
use rand::Rng;
use sha2::Digest;
use sha2::Sha256;

/// The maximum number of bytes loaded by a `loadContents` request.
pub const MAX_CONTENTS_SIZE: u64 = 64 * 1024;

/// Metadata about a resolved file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// The location of the file.
    pub location: String,
    /// The local path of the file.
    pub path: String,
    /// The SHA-256 checksum of the file in `sha256$<hex>` form.
    pub checksum: String,
    /// The size of the file in bytes.
    pub size: i64,
}

/// A source of file metadata and contents.
pub trait Filesystem {
    /// Retrieves metadata for the file at the given location.
    fn info(&self, location: &str) -> anyhow::Result<FileInfo>;

    /// Reads up to [`MAX_CONTENTS_SIZE`] bytes from the file at the
    /// given location.
    fn contents(&self, location: &str) -> anyhow::Result<String>;

    /// Creates a file at the given location with the given contents and
    /// returns its metadata.
    fn create(&self, location: &str, contents: &str) -> anyhow::Result<FileInfo>;
}

/// A filesystem rooted at a local directory.
///
/// Relative locations resolve against the base directory; absolute
/// locations are used as-is. Paths are lexically cleaned before use.
#[derive(Debug, Clone)]
pub struct LocalFilesystem {
    /// The directory relative locations resolve against.
    base: PathBuf,
}

impl LocalFilesystem {
    /// Constructs a new local filesystem rooted at the given directory.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Resolves a location to a cleaned absolute path.
    fn resolve(&self, location: &str) -> PathBuf {
        let path = Path::new(location);
        if path.is_absolute() {
            path.clean()
        } else {
            self.base.join(path).clean()
        }
    }

    /// Builds metadata for the file at the given path.
    fn file_info(&self, location: &str, path: &Path) -> anyhow::Result<FileInfo> {
        let metadata = fs::metadata(path)
            .with_context(|| format!("failed to read metadata of `{path}`", path = path.display()))?;
        let checksum = checksum(path)?;
        Ok(FileInfo {
            location: location.to_string(),
            path: path.to_string_lossy().into_owned(),
            checksum,
            size: i64::try_from(metadata.len()).unwrap_or(i64::MAX),
        })
    }
}

impl Filesystem for LocalFilesystem {
    fn info(&self, location: &str) -> anyhow::Result<FileInfo> {
        let path = self.resolve(location);
        self.file_info(location, &path)
    }

    fn contents(&self, location: &str) -> anyhow::Result<String> {
        let path = self.resolve(location);
        let file = fs::File::open(&path)
            .with_context(|| format!("failed to open `{path}`", path = path.display()))?;
        let mut buf = String::new();
        file.take(MAX_CONTENTS_SIZE)
            .read_to_string(&mut buf)
            .with_context(|| format!("failed to read `{path}`", path = path.display()))?;
        Ok(buf)
    }

    fn create(&self, location: &str, contents: &str) -> anyhow::Result<FileInfo> {
        let path = self.resolve(location);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create directory `{path}`", path = parent.display())
            })?;
        }
        fs::write(&path, contents)
            .with_context(|| format!("failed to write `{path}`", path = path.display()))?;
        self.file_info(location, &path)
    }
}

/// Computes the SHA-256 checksum of a file in `sha256$<hex>` form.
fn checksum(path: &Path) -> anyhow::Result<String> {
    let mut file = fs::File::open(path)
        .with_context(|| format!("failed to open `{path}`", path = path.display()))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)
        .with_context(|| format!("failed to read `{path}`", path = path.display()))?;
    Ok(format!("sha256${hash:x}", hash = hasher.finalize()))
}

/// Generates a short random token suitable for synthesized file names.
pub fn unique_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 8] = rng.random();
    let mut token = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        token.push_str(&format!("{byte:02x}"));
    }
    token
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn resolves_and_checksums_local_files() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        fs::write(dir.path().join("hello.txt"), "hello").expect("should write");

        let fs = LocalFilesystem::new(dir.path());
        let info = fs.info("hello.txt").expect("should resolve");
        assert_eq!(info.location, "hello.txt");
        assert_eq!(info.size, 5);
        assert_eq!(
            info.checksum,
            "sha256$2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );

        assert_eq!(fs.contents("hello.txt").expect("should read"), "hello");
    }

    #[test]
    fn creates_files_with_contents() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let fs = LocalFilesystem::new(dir.path());

        let info = fs
            .create("sub/made.txt", "made up")
            .expect("should create");
        assert_eq!(info.size, 7);
        assert_eq!(fs.contents("sub/made.txt").expect("should read"), "made up");
    }

    #[test]
    fn tokens_are_unique_enough() {
        let a = unique_token();
        let b = unique_token();
        assert_eq!(a.len(), 16);
        assert_ne!(a, b);
    }
}
