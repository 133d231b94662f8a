use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard};

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::TankobonError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

pub trait Filesystem: Send + Sync {
    fn exists(&self, path: &Utf8Path) -> Result<bool, TankobonError>;
    fn is_dir(&self, path: &Utf8Path) -> Result<bool, TankobonError>;
    fn create_dir_all(&self, path: &Utf8Path) -> Result<(), TankobonError>;
    fn write(&self, path: &Utf8Path, content: &[u8]) -> Result<(), TankobonError>;
    fn read(&self, path: &Utf8Path) -> Result<Vec<u8>, TankobonError>;
    fn read_dir(&self, path: &Utf8Path) -> Result<Vec<DirEntry>, TankobonError>;
    fn remove_dir_all(&self, path: &Utf8Path) -> Result<(), TankobonError>;
}

fn fs_err(path: &Utf8Path, err: impl std::fmt::Display) -> TankobonError {
    TankobonError::Filesystem(format!("{path}: {err}"))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OsFilesystem;

impl Filesystem for OsFilesystem {
    fn exists(&self, path: &Utf8Path) -> Result<bool, TankobonError> {
        path.as_std_path()
            .try_exists()
            .map_err(|err| fs_err(path, err))
    }

    fn is_dir(&self, path: &Utf8Path) -> Result<bool, TankobonError> {
        match fs::metadata(path.as_std_path()) {
            Ok(meta) => Ok(meta.is_dir()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(fs_err(path, err)),
        }
    }

    fn create_dir_all(&self, path: &Utf8Path) -> Result<(), TankobonError> {
        fs::create_dir_all(path.as_std_path()).map_err(|err| fs_err(path, err))
    }

    fn write(&self, path: &Utf8Path, content: &[u8]) -> Result<(), TankobonError> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent,
            _ => Utf8Path::new("."),
        };
        fs::create_dir_all(parent.as_std_path()).map_err(|err| fs_err(parent, err))?;
        let mut temp = tempfile::Builder::new()
            .prefix(".tankobon")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| fs_err(parent, err))?;
        temp.write_all(content).map_err(|err| fs_err(path, err))?;
        temp.persist(path.as_std_path())
            .map_err(|err| fs_err(path, err))?;
        Ok(())
    }

    fn read(&self, path: &Utf8Path) -> Result<Vec<u8>, TankobonError> {
        fs::read(path.as_std_path()).map_err(|err| fs_err(path, err))
    }

    fn read_dir(&self, path: &Utf8Path) -> Result<Vec<DirEntry>, TankobonError> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path.as_std_path()).map_err(|err| fs_err(path, err))? {
            let entry = entry.map_err(|err| fs_err(path, err))?;
            let is_dir = entry
                .file_type()
                .map_err(|err| fs_err(path, err))?
                .is_dir();
            let name = entry
                .file_name()
                .into_string()
                .map_err(|_| fs_err(path, "non UTF-8 entry name"))?;
            entries.push(DirEntry { name, is_dir });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn remove_dir_all(&self, path: &Utf8Path) -> Result<(), TankobonError> {
        fs::remove_dir_all(path.as_std_path()).map_err(|err| fs_err(path, err))
    }
}

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File(Vec<u8>),
}

#[derive(Debug, Default)]
pub struct MemoryFilesystem {
    nodes: Mutex<BTreeMap<Utf8PathBuf, Node>>,
}

impl MemoryFilesystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<Utf8PathBuf, Node>> {
        self.nodes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_root(path: &Utf8Path) -> bool {
        path.as_str().is_empty() || path.as_str() == "/"
    }

    fn insert_dirs(
        nodes: &mut BTreeMap<Utf8PathBuf, Node>,
        path: &Utf8Path,
    ) -> Result<(), TankobonError> {
        for ancestor in path.ancestors() {
            if Self::is_root(ancestor) {
                continue;
            }
            match nodes.get(ancestor) {
                Some(Node::Dir) => {}
                Some(Node::File(_)) => return Err(fs_err(ancestor, "not a directory")),
                None => {
                    nodes.insert(ancestor.to_path_buf(), Node::Dir);
                }
            }
        }
        Ok(())
    }
}

impl Filesystem for MemoryFilesystem {
    fn exists(&self, path: &Utf8Path) -> Result<bool, TankobonError> {
        Ok(Self::is_root(path) || self.lock().contains_key(path))
    }

    fn is_dir(&self, path: &Utf8Path) -> Result<bool, TankobonError> {
        Ok(Self::is_root(path) || matches!(self.lock().get(path), Some(Node::Dir)))
    }

    fn create_dir_all(&self, path: &Utf8Path) -> Result<(), TankobonError> {
        Self::insert_dirs(&mut self.lock(), path)
    }

    fn write(&self, path: &Utf8Path, content: &[u8]) -> Result<(), TankobonError> {
        let mut nodes = self.lock();
        if let Some(parent) = path.parent() {
            Self::insert_dirs(&mut nodes, parent)?;
        }
        if matches!(nodes.get(path), Some(Node::Dir)) {
            return Err(fs_err(path, "is a directory"));
        }
        nodes.insert(path.to_path_buf(), Node::File(content.to_vec()));
        Ok(())
    }

    fn read(&self, path: &Utf8Path) -> Result<Vec<u8>, TankobonError> {
        match self.lock().get(path) {
            Some(Node::File(content)) => Ok(content.clone()),
            Some(Node::Dir) => Err(fs_err(path, "is a directory")),
            None => Err(fs_err(path, "not found")),
        }
    }

    fn read_dir(&self, path: &Utf8Path) -> Result<Vec<DirEntry>, TankobonError> {
        let nodes = self.lock();
        match nodes.get(path) {
            Some(Node::Dir) => {}
            Some(Node::File(_)) => return Err(fs_err(path, "not a directory")),
            None if Self::is_root(path) => {}
            None => return Err(fs_err(path, "not found")),
        }
        Ok(nodes
            .iter()
            .filter(|(candidate, _)| candidate.parent() == Some(path))
            .filter_map(|(candidate, node)| {
                candidate.file_name().map(|name| DirEntry {
                    name: name.to_string(),
                    is_dir: matches!(node, Node::Dir),
                })
            })
            .collect())
    }

    fn remove_dir_all(&self, path: &Utf8Path) -> Result<(), TankobonError> {
        let mut nodes = self.lock();
        if !nodes.contains_key(path) {
            return Err(fs_err(path, "not found"));
        }
        nodes.retain(|candidate, _| !candidate.starts_with(path));
        Ok(())
    }
}

pub fn merge_dirs(
    dst: &dyn Filesystem,
    dst_dir: &Utf8Path,
    src: &dyn Filesystem,
    src_dir: &Utf8Path,
) -> Result<(), TankobonError> {
    dst.create_dir_all(dst_dir)?;
    for entry in src.read_dir(src_dir)? {
        let src_path = src_dir.join(&entry.name);
        let dst_path = dst_dir.join(&entry.name);
        if entry.is_dir {
            merge_dirs(dst, &dst_path, src, &src_path)?;
        } else {
            let content = src.read(&src_path)?;
            dst.write(&dst_path, &content)?;
        }
    }
    Ok(())
}
