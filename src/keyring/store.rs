//! The filesystem capability the resolver needs, narrowed to exactly two
//! operations so the resolver's tests never have to touch a real
//! filesystem.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

/// Read access to a `keys_root` directory tree.
///
/// `rel_path` is always a `/`-joined path relative to the store's root
/// (`""` means the root itself). Implementations need not support absolute
/// paths or `..` components; the resolver never constructs them.
pub trait KeyStore {
    /// List the immediate entries of the directory at `rel_path`, as bare
    /// names (no path separators). Order is unspecified; the resolver
    /// sorts before use.
    fn list_dir(&self, rel_path: &str) -> io::Result<Vec<String>>;

    /// Read the entire contents of the file at `rel_path`.
    ///
    /// Returns `Err` with [`io::ErrorKind::NotFound`] if no such file
    /// exists (the resolver treats that kind specially: move on to the
    /// next candidate) and any other error kind as a candidate failure to
    /// log and skip.
    fn open_read(&self, rel_path: &str) -> io::Result<Vec<u8>>;
}

/// A [`KeyStore`] backed by the real filesystem, rooted at a directory
/// (typically `<repo>/.git-crypt/keys`).
pub struct RealKeyStore {
    root: PathBuf,
}

impl RealKeyStore {
    /// Root the store at `root`. Does not check that `root` exists; a
    /// missing root simply produces `NotFound`/other I/O errors on use.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        RealKeyStore { root: root.into() }
    }

    fn resolve(&self, rel_path: &str) -> PathBuf {
        if rel_path.is_empty() {
            self.root.clone()
        } else {
            self.root.join(rel_path)
        }
    }
}

impl KeyStore for RealKeyStore {
    fn list_dir(&self, rel_path: &str) -> io::Result<Vec<String>> {
        let dir = self.resolve(rel_path);
        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    fn open_read(&self, rel_path: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.resolve(rel_path))
    }
}

/// An in-memory [`KeyStore`] test double: a flat map from `/`-joined path
/// to file contents, with directory listings derived from path prefixes.
#[derive(Debug, Default, Clone)]
pub struct MemoryKeyStore {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemoryKeyStore {
    /// An empty store.
    pub fn new() -> Self {
        MemoryKeyStore::default()
    }

    /// Insert (or overwrite) the file at `rel_path`.
    pub fn insert(&mut self, rel_path: impl Into<String>, contents: Vec<u8>) -> &mut Self {
        self.files.insert(normalize(&rel_path.into()), contents);
        self
    }
}

fn normalize(path: &str) -> String {
    Path::new(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

impl KeyStore for MemoryKeyStore {
    fn list_dir(&self, rel_path: &str) -> io::Result<Vec<String>> {
        let prefix = normalize(rel_path);
        let prefix_with_slash = if prefix.is_empty() {
            String::new()
        } else {
            format!("{prefix}/")
        };

        let mut seen = std::collections::BTreeSet::new();
        for path in self.files.keys() {
            let Some(rest) = path.strip_prefix(&prefix_with_slash) else {
                continue;
            };
            if rest.is_empty() {
                continue;
            }
            let child = rest.split('/').next().unwrap_or(rest);
            seen.insert(child.to_string());
        }

        if seen.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such directory: {rel_path}"),
            ));
        }
        Ok(seen.into_iter().collect())
    }

    fn open_read(&self, rel_path: &str) -> io::Result<Vec<u8>> {
        self.files
            .get(&normalize(rel_path))
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no such file: {rel_path}")))
    }
}
