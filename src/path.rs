//! Parses an absolute FUSE-style path into a reference into the two-level
//! namespace, without mutating the caller's string (unlike the `strtok`
//! based walk this spec was distilled from).

use crate::error::FsError;
use crate::layout::{MAX_EXT_LEN, MAX_NAME_LEN};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathRef<'a> {
    Root,
    Directory { name: &'a str },
    File {
        dir: &'a str,
        name: &'a str,
        ext: &'a str,
    },
}

/// Splits `path` on `/` and classifies it as the root, a directory, or a
/// file. Rejects paths with more than two path components and any
/// component exceeding its field width, before classifying further —
/// `NameTooLong` is reported in preference to `NotPermitted` whenever both
/// conditions hold.
pub fn parse_path(path: &str) -> Result<PathRef<'_>, FsError> {
    if path == "/" {
        return Ok(PathRef::Root);
    }
    let rest = path.strip_prefix('/').ok_or_else(|| {
        log::warn!("rejecting path {path:?}: not absolute");
        FsError::NotPermitted
    })?;
    let mut components = rest.split('/');
    let first = components.next().unwrap_or("");
    let second = components.next();
    if components.next().is_some() {
        log::warn!("rejecting path {path:?}: more than two components");
        return Err(FsError::NotPermitted);
    }
    if first.is_empty() {
        log::warn!("rejecting path {path:?}: empty leading component");
        return Err(FsError::NotPermitted);
    }

    match second {
        None => {
            if first.len() > MAX_NAME_LEN {
                log::warn!("rejecting path {path:?}: directory name too long");
                return Err(FsError::NameTooLong);
            }
            Ok(PathRef::Directory { name: first })
        }
        Some(file_part) => {
            let (name, ext) = match file_part.split_once('.') {
                Some((n, e)) => (n, e),
                None => (file_part, ""),
            };
            if first.len() > MAX_NAME_LEN || name.len() > MAX_NAME_LEN || ext.len() > MAX_EXT_LEN
            {
                log::warn!("rejecting path {path:?}: name or extension too long");
                return Err(FsError::NameTooLong);
            }
            Ok(PathRef::File {
                dir: first,
                name,
                ext,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_path() {
        assert_eq!(parse_path("/").unwrap(), PathRef::Root);
    }

    #[test]
    fn directory_path() {
        assert_eq!(
            parse_path("/photos").unwrap(),
            PathRef::Directory { name: "photos" }
        );
    }

    #[test]
    fn file_path_with_extension() {
        assert_eq!(
            parse_path("/photos/cat.jpg").unwrap(),
            PathRef::File {
                dir: "photos",
                name: "cat",
                ext: "jpg"
            }
        );
    }

    #[test]
    fn file_path_without_extension() {
        assert_eq!(
            parse_path("/photos/cat").unwrap(),
            PathRef::File {
                dir: "photos",
                name: "cat",
                ext: ""
            }
        );
    }

    #[test]
    fn too_many_components_is_not_permitted() {
        assert!(matches!(
            parse_path("/a/b/c"),
            Err(FsError::NotPermitted)
        ));
    }

    #[test]
    fn overlong_directory_name() {
        assert!(matches!(
            parse_path("/waytoolongdirname"),
            Err(FsError::NameTooLong)
        ));
    }

    #[test]
    fn overlong_extension() {
        assert!(matches!(
            parse_path("/dir/name.toolong"),
            Err(FsError::NameTooLong)
        ));
    }
}
