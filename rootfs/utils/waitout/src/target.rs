use std::{
    ffi::{OsStr, OsString},
    os::unix::ffi::OsStrExt,
    path::{Path, PathBuf},
};

use crate::error::{WaitError, WaitResult};

// NAME_MAX from <limits.h>: longest name the kernel will put in an inotify record
pub const NAME_MAX: usize = 255;

/// The file being waited for, split once into the directory that gets watched
/// and the name that has to show up in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
    path: PathBuf,
    directory: PathBuf,
    leaf_name: OsString,
}

impl WatchTarget {
    /// Splits at the last '/'. "noslash" and "dir/" are rejected; "/name" watches "/".
    pub fn parse(raw: impl AsRef<OsStr>) -> WaitResult<Self> {
        let raw = raw.as_ref();
        let bytes = raw.as_bytes();

        let invalid = || WaitError::InvalidTarget(raw.to_string_lossy().into_owned());
        let slash = bytes.iter().rposition(|&b| b == b'/').ok_or_else(invalid)?;

        let leaf = &bytes[slash + 1..];
        if leaf.is_empty() || leaf.len() > NAME_MAX {
            return Err(invalid());
        }

        let directory = match &bytes[..slash] {
            b"" => PathBuf::from("/"),
            dir => PathBuf::from(OsStr::from_bytes(dir)),
        };

        Ok(Self {
            path: PathBuf::from(raw),
            directory,
            leaf_name: OsStr::from_bytes(leaf).to_owned(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn leaf_name(&self) -> &OsStr {
        &self.leaf_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_at_last_slash() {
        let target = WatchTarget::parse("/tmp/x/ready").unwrap();
        assert_eq!(target.directory(), Path::new("/tmp/x"));
        assert_eq!(target.leaf_name(), OsStr::new("ready"));
        assert_eq!(target.path(), Path::new("/tmp/x/ready"));
    }

    #[test]
    fn relative_paths_keep_their_prefix() {
        let target = WatchTarget::parse("./out/done.flag").unwrap();
        assert_eq!(target.directory(), Path::new("./out"));
        assert_eq!(target.leaf_name(), OsStr::new("done.flag"));
    }

    #[test]
    fn root_level_target_watches_root() {
        let target = WatchTarget::parse("/ready").unwrap();
        assert_eq!(target.directory(), Path::new("/"));
        assert_eq!(target.leaf_name(), OsStr::new("ready"));
    }

    #[test]
    fn rejects_missing_separator() {
        let err = WatchTarget::parse("noslash").unwrap_err();
        assert!(matches!(err, WaitError::InvalidTarget(ref p) if p == "noslash"));
    }

    #[test]
    fn rejects_empty_leaf() {
        assert!(WatchTarget::parse("/tmp/x/").is_err());
        assert!(WatchTarget::parse("/").is_err());
        assert!(WatchTarget::parse("").is_err());
    }

    #[test]
    fn rejects_leaf_longer_than_name_max() {
        let long = format!("/tmp/{}", "a".repeat(NAME_MAX + 1));
        assert!(WatchTarget::parse(long).is_err());

        let max = format!("/tmp/{}", "a".repeat(NAME_MAX));
        assert!(WatchTarget::parse(max).is_ok());
    }

    #[test]
    fn non_utf8_names_are_kept_as_bytes() {
        let raw = OsStr::from_bytes(b"/tmp/\xff\xfe");
        let target = WatchTarget::parse(raw).unwrap();
        assert_eq!(target.leaf_name().as_bytes(), b"\xff\xfe");
    }
}
