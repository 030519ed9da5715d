//! Arquivo de PID, removido quando o agente encerra de forma ordenada.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn create(path: &Path) -> std::io::Result<Self> {
        std::fs::write(path, format!("{}\n", std::process::id()))?;
        info!("PID {} gravado em {}", std::process::id(), path.display());
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!("Não foi possível remover {}: {e}", self.path.display());
        }
    }
}
