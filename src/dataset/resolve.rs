//! Resolve a dataset location (file, directory or glob) to data files.

use std::{
    fs::{self, DirEntry},
    io,
    path::{Path, PathBuf},
};

use regex::Regex;

use crate::error::DatasetOpenError;

const GLOB_META: &[char] = &['*', '?', '['];

pub(crate) fn is_glob_pattern(location: &str) -> bool {
    location.contains(GLOB_META)
}

/// Resolve `location` to a sorted list of data files.
pub(crate) fn resolve_files(location: &str) -> Result<Vec<PathBuf>, DatasetOpenError> {
    let files = if is_glob_pattern(location) {
        expand_glob(location)?
    } else {
        let path = Path::new(location);
        let metadata = fs::metadata(path).map_err(|source| DatasetOpenError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if metadata.is_dir() {
            let mut files = Vec::new();
            walk(path, &mut files).map_err(|source| DatasetOpenError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            files
        } else {
            vec![path.to_path_buf()]
        }
    };

    if files.is_empty() {
        return Err(DatasetOpenError::NoFiles(location.to_string()));
    }
    Ok(files)
}

/// Writers drop bookkeeping files such as `_SUCCESS`, `_metadata` or `.crc`
/// next to the data.
fn is_data_entry(name: &str) -> bool {
    !(name.starts_with('.') || name.starts_with('_'))
}

/// Collect regular data files below `dir`, depth first, sorted by name.
fn walk(dir: &Path, files: &mut Vec<PathBuf>) -> io::Result<()> {
    let mut entries: Vec<DirEntry> = fs::read_dir(dir)?.collect::<Result<Vec<_>, io::Error>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let name = entry.file_name();
        if !is_data_entry(&name.to_string_lossy()) {
            continue;
        }
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            walk(&path, files)?;
        } else if path.is_file() {
            files.push(path);
        }
    }
    Ok(())
}

/// Split a glob into the longest literal directory prefix and the remaining
/// pattern, using `/` separators.
fn split_glob(location: &str) -> (PathBuf, String) {
    let segments = location.split('/').collect::<Vec<_>>();
    let literal = segments
        .iter()
        .position(|segment| is_glob_pattern(segment))
        .unwrap_or(segments.len());

    let base = segments[..literal].join("/");
    let base = match base.as_str() {
        "" if location.starts_with('/') => PathBuf::from("/"),
        "" => PathBuf::from("."),
        _ => PathBuf::from(base),
    };
    (base, segments[literal..].join("/"))
}

/// Translate glob syntax to an anchored regex: `**` crosses directories,
/// `*` and `?` stay within one path segment, `[...]` is a character class.
pub(crate) fn glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut regex = String::with_capacity(pattern.len() * 2 + 2);
    regex.push('^');

    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    chars.next();
                    regex.push_str("(?:.*/)?");
                } else {
                    regex.push_str(".*");
                }
            }
            '*' => regex.push_str("[^/]*"),
            '?' => regex.push_str("[^/]"),
            '[' => {
                regex.push('[');
                if chars.peek() == Some(&'!') {
                    chars.next();
                    regex.push('^');
                }
                for c in chars.by_ref() {
                    if c == ']' {
                        break;
                    }
                    if c == '\\' || c == '[' {
                        regex.push('\\');
                    }
                    regex.push(c);
                }
                regex.push(']');
            }
            other => regex.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }

    regex.push('$');
    Regex::new(&regex)
}

fn expand_glob(location: &str) -> Result<Vec<PathBuf>, DatasetOpenError> {
    let (base, pattern) = split_glob(location);
    let matcher = glob_to_regex(&pattern).map_err(|source| DatasetOpenError::Pattern {
        pattern: location.to_string(),
        source,
    })?;

    if !base.is_dir() {
        return Ok(Vec::new());
    }
    let mut candidates = Vec::new();
    walk(&base, &mut candidates).map_err(|source| DatasetOpenError::Io {
        path: base.clone(),
        source,
    })?;

    Ok(candidates
        .into_iter()
        .filter(|path| {
            path.strip_prefix(&base)
                .ok()
                .and_then(|relative| relative.to_str())
                .map(|relative| matcher.is_match(&relative.replace('\\', "/")))
                .unwrap_or(false)
        })
        .collect())
}
