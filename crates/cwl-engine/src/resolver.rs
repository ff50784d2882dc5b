//! Resolution of file and directory descriptors.
//!
//! Resolution turns a sparse descriptor supplied by the caller into a
//! fully populated one: the location is verified against the
//! filesystem, literal contents are staged to disk, and the derived
//! name fields (`basename`, `nameroot`, `nameext`, `dirname`) are
//! filled in. Secondary files are located from suffix patterns relative
//! to the primary file.

use cwl_schema::Directory;
use cwl_schema::File;
use cwl_schema::FileOrDirectory;

use crate::FileResolutionError;
use crate::fs::Filesystem;
use crate::fs::unique_token;

/// Resolves file and directory descriptors against a filesystem.
pub struct FileResolver<'a> {
    /// The filesystem descriptors resolve against.
    fs: &'a dyn Filesystem,
}

impl<'a> FileResolver<'a> {
    /// Constructs a new resolver over the given filesystem.
    pub fn new(fs: &'a dyn Filesystem) -> Self {
        Self { fs }
    }

    /// Resolves a file descriptor in place.
    ///
    /// Exactly one of `location` and `contents` must be set; a bare
    /// `path` is promoted to `location` first. Literal contents are
    /// staged to the filesystem; otherwise the location is verified and
    /// its metadata recorded. When `load_contents` is set, up to the
    /// contents limit is read into the descriptor.
    pub fn resolve(&self, file: &mut File, load_contents: bool) -> Result<(), FileResolutionError> {
        if file.location.is_empty() && !file.path.is_empty() && file.contents.is_empty() {
            file.location = std::mem::take(&mut file.path);
        }

        if file.location.is_empty() && file.contents.is_empty() {
            return Err(FileResolutionError::Unlocated);
        }
        if !file.location.is_empty() && !file.contents.is_empty() {
            return Err(FileResolutionError::Ambiguous);
        }

        let info = if file.location.is_empty() {
            // Stage literal contents under the best name available.
            let mut name = file.path.clone();
            if name.is_empty() {
                name = file.basename.clone();
            }
            if name.is_empty() {
                name = unique_token();
            }
            self.fs
                .create(&name, &file.contents)
                .map_err(|source| FileResolutionError::Create { path: name, source })?
        } else {
            let info = self.fs.info(&file.location).map_err(|source| {
                FileResolutionError::Info {
                    location: file.location.clone(),
                    source,
                }
            })?;
            if load_contents {
                file.contents = self.fs.contents(&file.location).map_err(|source| {
                    FileResolutionError::Contents {
                        location: file.location.clone(),
                        source,
                    }
                })?;
            }
            info
        };

        file.location = info.location;
        file.path = info.path;
        file.checksum = info.checksum;
        file.size = info.size;

        if file.basename.is_empty() {
            file.basename = basename_of(&file.path).to_string();
        }
        let (nameroot, nameext) = split_name(&file.basename);
        file.nameroot = nameroot.to_string();
        file.nameext = nameext.to_string();
        file.dirname = dirname_of(&file.path).to_string();

        Ok(())
    }

    /// Resolves a directory descriptor in place.
    ///
    /// Directories carry no checksum or size and their listings are not
    /// expanded; only the location and basename are established.
    pub fn resolve_directory(&self, dir: &mut Directory) -> Result<(), FileResolutionError> {
        if dir.location.is_empty() && !dir.path.is_empty() {
            dir.location = std::mem::take(&mut dir.path);
        }
        if dir.location.is_empty() {
            return Err(FileResolutionError::Unlocated);
        }
        if dir.basename.is_empty() {
            dir.basename = basename_of(&dir.location).to_string();
        }
        Ok(())
    }

    /// Resolves the secondary file named by a suffix pattern and appends
    /// it to the primary file.
    ///
    /// Each leading `^` strips one extension from the primary location
    /// before the remainder of the pattern is appended.
    pub fn resolve_pattern(
        &self,
        primary: &mut File,
        pattern: &str,
    ) -> Result<(), FileResolutionError> {
        let mut base = primary.location.as_str();
        let mut suffix = pattern;
        while let Some(rest) = suffix.strip_prefix('^') {
            suffix = rest;
            base = strip_extension(base);
        }

        let location = format!("{base}{suffix}");
        self.push_secondary(primary, location)
    }

    /// Resolves the secondary file at the given location and appends it
    /// to the primary file.
    ///
    /// Relative locations resolve against the primary file's directory.
    pub fn resolve_secondary(
        &self,
        primary: &mut File,
        location: String,
    ) -> Result<(), FileResolutionError> {
        let location = sibling(&primary.location, location);
        self.push_secondary(primary, location)
    }

    /// Resolves a secondary file location and appends it to the primary
    /// file.
    fn push_secondary(
        &self,
        primary: &mut File,
        location: String,
    ) -> Result<(), FileResolutionError> {
        let mut secondary = File {
            location,
            ..Default::default()
        };
        self.resolve(&mut secondary, false)?;
        primary.secondary_files.push(FileOrDirectory::File(secondary));
        Ok(())
    }
}

/// Gets the final path segment of a location.
fn basename_of(location: &str) -> &str {
    location.rsplit('/').next().unwrap_or(location)
}

/// Gets the directory portion of a path, without the trailing slash.
///
/// A path with no separator is in the current directory, `.`.
fn dirname_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(i) => &path[..i],
        None => ".",
    }
}

/// Splits a basename into its root and extension.
///
/// The extension includes the leading `.`; a name with no dot, or only
/// a leading dot, has an empty extension.
fn split_name(basename: &str) -> (&str, &str) {
    match basename.rfind('.') {
        Some(i) if i > 0 => (&basename[..i], &basename[i..]),
        _ => (basename, ""),
    }
}

/// Strips the last extension from a location, if it has one.
fn strip_extension(location: &str) -> &str {
    let (root, _) = split_name(location);
    root
}

/// Resolves a possibly relative secondary location against the primary
/// file's directory.
fn sibling(primary: &str, location: String) -> String {
    if location.starts_with('/') || location.contains("://") {
        return location;
    }
    match dirname_of(primary) {
        "." => location,
        "/" => format!("/{location}"),
        dir => format!("{dir}/{location}"),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::fs::LocalFilesystem;

    #[test]
    fn splits_basenames() {
        assert_eq!(split_name("reads.fastq.gz"), ("reads.fastq", ".gz"));
        assert_eq!(split_name("README"), ("README", ""));
        assert_eq!(split_name(".hidden"), (".hidden", ""));
    }

    #[test]
    fn derives_dirnames() {
        assert_eq!(dirname_of("reads.fastq.gz"), ".");
        assert_eq!(dirname_of("/reads.fastq.gz"), "/");
        assert_eq!(dirname_of("data/reads.fastq.gz"), "data");
    }

    #[test]
    fn resolves_descriptors_and_derives_names() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        fs::write(dir.path().join("reads.fastq.gz"), "acgt").expect("should write");
        let fs = LocalFilesystem::new(dir.path());
        let resolver = FileResolver::new(&fs);

        let mut file = File {
            path: "reads.fastq.gz".to_string(),
            ..Default::default()
        };
        resolver.resolve(&mut file, true).expect("should resolve");

        assert_eq!(file.location, "reads.fastq.gz");
        assert_eq!(file.basename, "reads.fastq.gz");
        assert_eq!(file.nameroot, "reads.fastq");
        assert_eq!(file.nameext, ".gz");
        assert_eq!(file.size, 4);
        assert_eq!(file.contents, "acgt");
        assert!(file.checksum.starts_with("sha256$"));
    }

    #[test]
    fn resolution_is_idempotent() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        fs::write(dir.path().join("stable.txt"), "x").expect("should write");
        let fs = LocalFilesystem::new(dir.path());
        let resolver = FileResolver::new(&fs);

        let mut file = File {
            location: "stable.txt".to_string(),
            ..Default::default()
        };
        resolver.resolve(&mut file, false).expect("should resolve");
        let once = file.clone();
        resolver.resolve(&mut file, false).expect("should resolve again");
        assert_eq!(file, once);
    }

    #[test]
    fn stages_literal_contents() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let fs = LocalFilesystem::new(dir.path());
        let resolver = FileResolver::new(&fs);

        let mut file = File {
            contents: "hello".to_string(),
            basename: "note.txt".to_string(),
            ..Default::default()
        };
        resolver.resolve(&mut file, false).expect("should resolve");

        assert_eq!(file.location, "note.txt");
        assert_eq!(file.size, 5);
        assert!(dir.path().join("note.txt").exists());
    }

    #[test]
    fn rejects_ambiguous_and_unlocated_descriptors() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let fs = LocalFilesystem::new(dir.path());
        let resolver = FileResolver::new(&fs);

        let mut empty = File::default();
        assert!(matches!(
            resolver.resolve(&mut empty, false),
            Err(FileResolutionError::Unlocated)
        ));

        let mut both = File {
            location: "a.txt".to_string(),
            contents: "x".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            resolver.resolve(&mut both, false),
            Err(FileResolutionError::Ambiguous)
        ));
    }

    #[test]
    fn caret_patterns_strip_extensions() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        fs::write(dir.path().join("a.b.c.txt"), "primary").expect("should write");
        fs::write(dir.path().join("a.b.ext"), "secondary").expect("should write");
        let fs = LocalFilesystem::new(dir.path());
        let resolver = FileResolver::new(&fs);

        let mut file = File {
            location: "a.b.c.txt".to_string(),
            ..Default::default()
        };
        resolver.resolve(&mut file, false).expect("should resolve");
        resolver
            .resolve_pattern(&mut file, "^^.ext")
            .expect("should resolve pattern");

        match &file.secondary_files[0] {
            FileOrDirectory::File(secondary) => {
                assert_eq!(secondary.location, "a.b.ext");
                assert_eq!(secondary.size, 9);
            }
            other => panic!("expected a file, got {other:?}"),
        }
    }
}
