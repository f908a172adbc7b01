//! Path utilities for the VFS layer.
//!
//! Purely lexical: nothing here touches a filesystem.

use alloc::string::String;
use alloc::vec::Vec;

use crate::mount::MountPoint;

/// Normalize a path by collapsing `.`, empty segments and `..`.
///
/// `..` pops the previous segment unless that segment is itself `..`.
/// Relative paths keep any leading `..` they cannot resolve; absolute paths
/// drop them. Empty input is `/`; a relative path that collapses to nothing
/// is `.`.
pub fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return String::from("/");
    }

    let absolute = path.starts_with('/');
    let mut stack: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                if matches!(stack.last(), Some(last) if *last != "..") {
                    stack.pop();
                } else if !absolute {
                    stack.push("..");
                }
            }
            s => stack.push(s),
        }
    }

    let mut out = String::new();
    if absolute {
        out.push('/');
    }
    out.push_str(&stack.join("/"));

    if out.is_empty() {
        String::from(".")
    } else {
        out
    }
}

/// Index of the mount point serving `path` (already normalized).
///
/// A mount matches when `path` equals its path or continues it with `/`;
/// a `/` mount matches every absolute path. The longest mount path wins,
/// the first registered on a tie.
pub fn find_mount(path: &str, mounts: &[MountPoint]) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;

    for (index, mount) in mounts.iter().enumerate() {
        let prefix = if mount.path == "/" { "" } else { mount.path.as_str() };
        let hit = path == prefix
            || (path.starts_with(prefix) && path.as_bytes().get(prefix.len()) == Some(&b'/'));
        if hit && best.map_or(true, |(_, len)| prefix.len() > len) {
            best = Some((index, prefix.len()));
        }
    }

    best.map(|(index, _)| index)
}

/// `full` relative to `mount_path`, with no leading `/`.
///
/// `full` must be served by `mount_path` (see [`find_mount`]).
pub fn make_relative<'a>(full: &'a str, mount_path: &str) -> &'a str {
    if mount_path == "/" {
        return full.strip_prefix('/').unwrap_or(full);
    }
    if full == mount_path {
        return "";
    }
    full.get(mount_path.len() + 1..).unwrap_or("")
}

/// Get the parent path of an absolute path.
pub fn parent_path(path: &str) -> String {
    match path.rfind('/') {
        Some(0) | None => String::from("/"),
        Some(pos) => String::from(&path[..pos]),
    }
}

/// Get the filename (last component) of a path.
pub fn filename(path: &str) -> &str {
    if path == "/" {
        return "";
    }
    match path.rfind('/') {
        Some(pos) => &path[pos + 1..],
        None => path,
    }
}

/// Join a directory path and a child name.
pub fn join_path(base: &str, name: &str) -> String {
    if base == "/" {
        alloc::format!("/{}", name)
    } else {
        alloc::format!("{}/{}", base, name)
    }
}
