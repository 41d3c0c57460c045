//! Narrow key-value persistence contract and the backends behind it.
//!
//! A namespace holds one index. `get` after a successful `put` of the same key
//! returns byte-identical data; nothing else about the layout is promised.

use crate::config::DataStore;
use crate::error::Result;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub trait Datastore: Send + Sync {
    fn put(&self, namespace: &str, key: &str, value: &[u8]) -> Result<()>;

    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>>;

    /// Deleting a missing key is not an error.
    fn delete(&self, namespace: &str, key: &str) -> Result<()>;

    /// Keys of one namespace in ascending order.
    fn list_keys(&self, namespace: &str) -> Result<Vec<String>>;

    fn drop_namespace(&self, namespace: &str) -> Result<()>;

    fn namespaces(&self) -> Result<Vec<String>>;

    fn exists(&self, namespace: &str, key: &str) -> Result<bool> {
        Ok(self.get(namespace, key)?.is_some())
    }

    fn scan_prefix(&self, namespace: &str, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .list_keys(namespace)?
            .into_iter()
            .filter(|k| k.starts_with(prefix))
            .collect())
    }

    /// Make every completed `put` durable. Backends that write through need
    /// not override this.
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

impl<S: Datastore + ?Sized> Datastore for Box<S> {
    fn put(&self, namespace: &str, key: &str, value: &[u8]) -> Result<()> {
        (**self).put(namespace, key, value)
    }
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(namespace, key)
    }
    fn delete(&self, namespace: &str, key: &str) -> Result<()> {
        (**self).delete(namespace, key)
    }
    fn list_keys(&self, namespace: &str) -> Result<Vec<String>> {
        (**self).list_keys(namespace)
    }
    fn drop_namespace(&self, namespace: &str) -> Result<()> {
        (**self).drop_namespace(namespace)
    }
    fn namespaces(&self) -> Result<Vec<String>> {
        (**self).namespaces()
    }
    fn scan_prefix(&self, namespace: &str, prefix: &str) -> Result<Vec<String>> {
        (**self).scan_prefix(namespace, prefix)
    }
    fn flush(&self) -> Result<()> {
        (**self).flush()
    }
}

impl<S: Datastore + ?Sized> Datastore for Arc<S> {
    fn put(&self, namespace: &str, key: &str, value: &[u8]) -> Result<()> {
        (**self).put(namespace, key, value)
    }
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(namespace, key)
    }
    fn delete(&self, namespace: &str, key: &str) -> Result<()> {
        (**self).delete(namespace, key)
    }
    fn list_keys(&self, namespace: &str) -> Result<Vec<String>> {
        (**self).list_keys(namespace)
    }
    fn drop_namespace(&self, namespace: &str) -> Result<()> {
        (**self).drop_namespace(namespace)
    }
    fn namespaces(&self) -> Result<Vec<String>> {
        (**self).namespaces()
    }
    fn scan_prefix(&self, namespace: &str, prefix: &str) -> Result<Vec<String>> {
        (**self).scan_prefix(namespace, prefix)
    }
    fn flush(&self) -> Result<()> {
        (**self).flush()
    }
}

/// Open the backend named by the configuration, rooted at `root` for the
/// on-disk kinds.
pub fn open_store<P: AsRef<Path>>(kind: DataStore, root: P) -> Result<Box<dyn Datastore>> {
    match kind {
        DataStore::Memory => Ok(Box::new(MemoryStore::new())),
        DataStore::Custom => Ok(Box::new(FileStore::new(root)?)),
        #[cfg(feature = "sled")]
        DataStore::Db => Ok(Box::new(SledStore::open(root)?)),
        #[cfg(not(feature = "sled"))]
        DataStore::Db => Err(crate::error::IndexError::InvalidConfig(
            "embedded kv backend not compiled in (feature `sled`)".into(),
        )),
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<BTreeMap<String, BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Datastore for MemoryStore {
    fn put(&self, namespace: &str, key: &str, value: &[u8]) -> Result<()> {
        self.inner
            .write()
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.inner.read().get(namespace).and_then(|ns| ns.get(key).cloned()))
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<()> {
        let mut inner = self.inner.write();
        if let Some(ns) = inner.get_mut(namespace) {
            ns.remove(key);
            if ns.is_empty() {
                inner.remove(namespace);
            }
        }
        Ok(())
    }

    fn list_keys(&self, namespace: &str) -> Result<Vec<String>> {
        Ok(self
            .inner
            .read()
            .get(namespace)
            .map(|ns| ns.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn drop_namespace(&self, namespace: &str) -> Result<()> {
        self.inner.write().remove(namespace);
        Ok(())
    }

    fn namespaces(&self) -> Result<Vec<String>> {
        Ok(self.inner.read().keys().cloned().collect())
    }
}

/// One directory per namespace, one file per key. File names are the
/// hex-encoded key so arbitrary terms are safe on any filesystem. Encoded
/// keys longer than [`SEGMENT_LEN`] are split into nested directories of
/// exactly that length, keeping every path component under the usual
/// 255-byte name limit.
const SEGMENT_LEN: usize = 200;

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        fs::create_dir_all(root.as_ref())?;
        Ok(Self { root: root.as_ref().to_path_buf() })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_dir(&self, namespace: &str) -> PathBuf {
        self.root.join(hex_encode(namespace))
    }

    fn key_path(&self, namespace: &str, key: &str) -> PathBuf {
        let hex = hex_encode(key);
        let mut path = self.namespace_dir(namespace);
        let mut rest = hex.as_str();
        while rest.len() > SEGMENT_LEN {
            let (segment, tail) = rest.split_at(SEGMENT_LEN);
            path.push(segment);
            rest = tail;
        }
        path.push(format!("{rest}.bin"));
        path
    }
}

/// Collect keys under `dir`, where `prefix` holds the hex segments of the
/// directories already descended.
fn collect_keys(dir: &Path, prefix: &mut String, keys: &mut Vec<String>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if entry.file_type()?.is_dir() {
            if name.len() != SEGMENT_LEN {
                continue;
            }
            let depth = prefix.len();
            prefix.push_str(name);
            collect_keys(&entry.path(), prefix, keys)?;
            prefix.truncate(depth);
        } else if let Some(stem) = name.strip_suffix(".bin") {
            if let Some(key) = hex_decode(&format!("{prefix}{stem}")) {
                keys.push(key);
            }
        }
    }
    Ok(())
}

impl Datastore for FileStore {
    fn put(&self, namespace: &str, key: &str, value: &[u8]) -> Result<()> {
        let path = self.key_path(namespace, key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, value)?;
        Ok(())
    }

    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.key_path(namespace, key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<()> {
        match fs::remove_file(self.key_path(namespace, key)) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn list_keys(&self, namespace: &str) -> Result<Vec<String>> {
        let dir = self.namespace_dir(namespace);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        collect_keys(&dir, &mut String::new(), &mut keys)?;
        keys.sort();
        Ok(keys)
    }

    fn drop_namespace(&self, namespace: &str) -> Result<()> {
        match fs::remove_dir_all(self.namespace_dir(namespace)) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn namespaces(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str().and_then(hex_decode) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}

fn hex_encode(s: &str) -> String {
    s.bytes().map(|b| format!("{b:02x}")).collect()
}

fn hex_decode(s: &str) -> Option<String> {
    if s.len() % 2 != 0 {
        return None;
    }
    let bytes = (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect::<Option<Vec<u8>>>()?;
    String::from_utf8(bytes).ok()
}

/// Embedded key-value backend, one tree per namespace.
#[cfg(feature = "sled")]
#[derive(Clone)]
pub struct SledStore {
    db: sled::Db,
}

#[cfg(feature = "sled")]
impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self { db: sled::open(path)? })
    }

    pub fn from_db(db: sled::Db) -> Self {
        Self { db }
    }

    fn tree(&self, namespace: &str) -> Result<sled::Tree> {
        Ok(self.db.open_tree(namespace.as_bytes())?)
    }

    fn has_tree(&self, namespace: &str) -> bool {
        self.db.tree_names().iter().any(|n| n.as_ref() == namespace.as_bytes())
    }
}

#[cfg(feature = "sled")]
impl Datastore for SledStore {
    fn put(&self, namespace: &str, key: &str, value: &[u8]) -> Result<()> {
        self.tree(namespace)?.insert(key.as_bytes(), value)?;
        Ok(())
    }

    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>> {
        if !self.has_tree(namespace) {
            return Ok(None);
        }
        Ok(self.tree(namespace)?.get(key.as_bytes())?.map(|v| v.to_vec()))
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<()> {
        if self.has_tree(namespace) {
            self.tree(namespace)?.remove(key.as_bytes())?;
        }
        Ok(())
    }

    fn list_keys(&self, namespace: &str) -> Result<Vec<String>> {
        if !self.has_tree(namespace) {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        for item in self.tree(namespace)?.iter() {
            let (key, _) = item?;
            keys.push(String::from_utf8_lossy(&key).into_owned());
        }
        Ok(keys)
    }

    fn drop_namespace(&self, namespace: &str) -> Result<()> {
        if self.has_tree(namespace) {
            self.db.drop_tree(namespace.as_bytes())?;
        }
        Ok(())
    }

    fn namespaces(&self) -> Result<Vec<String>> {
        // sled always carries its own default tree.
        let default = self.db.name();
        Ok(self
            .db
            .tree_names()
            .into_iter()
            .filter(|n| *n != default)
            .map(|n| String::from_utf8_lossy(&n).into_owned())
            .collect())
    }

    fn scan_prefix(&self, namespace: &str, prefix: &str) -> Result<Vec<String>> {
        if !self.has_tree(namespace) {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        for item in self.tree(namespace)?.scan_prefix(prefix.as_bytes()) {
            let (key, _) = item?;
            keys.push(String::from_utf8_lossy(&key).into_owned());
        }
        Ok(keys)
    }

    fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}
