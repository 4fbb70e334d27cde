//! Adaptador de persistência em arquivos.
//!
//! Cada blob vira um arquivo no diretório de dados. A escrita vai para um
//! arquivo temporário e depois `rename`, então uma queda de energia deixa o
//! blob antigo ou o novo, nunca um pela metade.

use crate::ports::{BlobKey, BlobStore, StoreError};
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Cria o diretório se necessário.
    pub fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path(&self, key: BlobKey) -> PathBuf {
        self.dir.join(key.file_name())
    }
}

impl BlobStore for FileStore {
    fn read(&self, key: BlobKey) -> Result<Vec<u8>, StoreError> {
        std::fs::read(self.path(key)).map_err(|source| match source.kind() {
            ErrorKind::NotFound => StoreError::NotFound(key),
            _ => StoreError::Io { key, source },
        })
    }

    fn write(&mut self, key: BlobKey, bytes: &[u8]) -> Result<(), StoreError> {
        let target = self.path(key);
        let tmp = target.with_extension("toml.tmp");
        std::fs::write(&tmp, bytes)
            .and_then(|()| std::fs::rename(&tmp, &target))
            .map_err(|source| StoreError::Io { key, source })?;
        debug!("{} bytes gravados em {}", bytes.len(), target.display());
        Ok(())
    }
}
