//! Class providers: exploded directories and zip/jar archives

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::ZipArchive;

use crate::error::{Error, GeneralError, Result};

const CLASS_SUFFIX: &str = ".class";

pub enum Provider {
    Directory(PathBuf),
    Archive {
        path: PathBuf,
        archive: ZipArchive<BufReader<File>>,
    },
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Provider({})", self.path().display())
    }
}

impl Provider {
    /// Open a directory of `.class` files or a zip archive, whichever `path` is
    pub fn open(path: &Path) -> Result<Self> {
        if path.is_dir() {
            Ok(Provider::Directory(path.to_path_buf()))
        } else {
            Self::open_archive(path)
        }
    }

    pub fn open_archive(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let archive = ZipArchive::new(BufReader::new(file)).map_err(|source| {
            Error::General(GeneralError::Archive { path: path.to_path_buf(), source })
        })?;
        Ok(Provider::Archive { path: path.to_path_buf(), archive })
    }

    pub fn path(&self) -> &Path {
        match self {
            Provider::Directory(path) => path,
            Provider::Archive { path, .. } => path,
        }
    }

    /// Binary names of every class this provider holds, in a stable order
    pub fn list_classes(&mut self) -> Result<Vec<String>> {
        match self {
            Provider::Directory(root) => {
                let mut names = Vec::new();
                for entry in WalkDir::new(&*root).sort_by_file_name() {
                    let entry = entry.map_err(|e| {
                        let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone());
                        Error::io(path, e.into())
                    })?;
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    let Ok(relative) = entry.path().strip_prefix(&*root) else {
                        continue;
                    };
                    let relative = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    if let Some(name) = class_entry_name(&relative) {
                        names.push(name);
                    }
                }
                Ok(names)
            }
            Provider::Archive { archive, .. } => {
                let mut names: Vec<String> = archive.file_names().filter_map(class_entry_name).collect();
                names.sort();
                Ok(names)
            }
        }
    }

    /// Raw bytes of one class
    pub fn read_class(&mut self, binary_name: &str) -> Result<Vec<u8>> {
        let entry = format!("{}{}", binary_name, CLASS_SUFFIX);
        match self {
            Provider::Directory(root) => {
                let path = root.join(&entry);
                std::fs::read(&path).map_err(|e| Error::io(path, e))
            }
            Provider::Archive { path, archive } => {
                let mut file = archive.by_name(&entry).map_err(|source| {
                    Error::General(GeneralError::Archive { path: path.clone(), source })
                })?;
                let mut bytes = Vec::with_capacity(file.size() as usize);
                file.read_to_end(&mut bytes).map_err(|e| Error::io(path.clone(), e))?;
                Ok(bytes)
            }
        }
    }
}

/// Binary name for an archive entry, skipping non-class files, module and
/// package descriptors, and versioned overrides
fn class_entry_name(entry: &str) -> Option<String> {
    let name = entry.strip_suffix(CLASS_SUFFIX)?;
    if name.starts_with("META-INF/") {
        return None;
    }
    let simple = name.rsplit('/').next().unwrap_or(name);
    if simple == "module-info" || simple == "package-info" {
        return None;
    }
    Some(name.to_string())
}

/// Archives under a third-party directory in lexicographic path order
pub fn scan_archive_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut archives = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf());
            Error::io(path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_archive = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("jar") || ext.eq_ignore_ascii_case("zip"))
            .unwrap_or(false);
        if is_archive {
            archives.push(entry.into_path());
        }
    }
    Ok(archives)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_names_map_to_binary_names() {
        assert_eq!(class_entry_name("java/util/Map$Entry.class").as_deref(), Some("java/util/Map$Entry"));
        assert_eq!(class_entry_name("module-info.class"), None);
        assert_eq!(class_entry_name("a/package-info.class"), None);
        assert_eq!(class_entry_name("META-INF/versions/9/a/B.class"), None);
        assert_eq!(class_entry_name("a/B.txt"), None);
    }

    #[test]
    fn scans_archives_in_lexicographic_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        for name in ["b.jar", "a.zip", "nested/c.jar", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let found: Vec<String> = scan_archive_dir(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(found, vec!["a.zip", "b.jar", "nested/c.jar"]);
    }
}
