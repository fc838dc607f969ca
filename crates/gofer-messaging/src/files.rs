// Archivo: files.rs
// Propósito: helpers de disco compartidos por los journals (peticiones
// pendientes y watchdog): escritura atómica, borrado tolerante y listado.
use crate::errors::Result;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const TMP_SUFFIX: &str = "tmp";

/// Escribe `body` en `path` vía archivo temporal + rename, de modo que un
/// lector nunca vea un archivo a medio escribir.
pub fn write_atomic(path: &Path, body: &[u8]) -> Result<()> {
    let tmp = tmp_path(path);
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(body)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Borra `path`; un archivo ya inexistente no es un error.
pub fn unlink(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Archivos de `dir` con la extensión dada, en orden lexicográfico.
pub fn list_sorted(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|e| e == extension) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Elimina temporales huérfanos de escrituras interrumpidas.
pub fn purge_tmp(dir: &Path) -> Result<usize> {
    let stale = list_sorted(dir, TMP_SUFFIX)?;
    for path in &stale {
        log::debug!("eliminando temporal huérfano {}", path.display());
        unlink(path)?;
    }
    Ok(stale.len())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(TMP_SUFFIX);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_leaves_no_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.json");
        write_atomic(&path, b"{}").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
        assert_eq!(list_sorted(dir.path(), TMP_SUFFIX).unwrap().len(), 0);
        assert_eq!(list_sorted(dir.path(), "json").unwrap(), vec![path.clone()]);
        unlink(&path).unwrap();
        unlink(&path).unwrap();
    }
}
