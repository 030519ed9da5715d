//! Estado persistido: ids remotos dos sensores registrados.
//!
//! Arquivo JSON único:
//!
//! ```json
//! {"registrations":{"temp1":"abc123"}}
//! ```
//!
//! A gravação é sempre do mapa inteiro, via arquivo temporário no mesmo
//! diretório + rename, então um `load()` nunca enxerga escrita parcial.

use crate::error::StateError;
use crate::types::RemoteId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Caminho padrão do arquivo de estado.
pub const DEFAULT_STATE_PATH: &str = "/var/lib/mot/state.json";

/// Forma durável do mapa `sensor → id remoto`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PersistedState {
    #[serde(default)]
    pub registrations: BTreeMap<String, RemoteId>,
}

/// Mapa de registros e o arquivo onde ele vive.
///
/// Só é mutado no passo de registro, antes de qualquer worker iniciar.
#[derive(Debug, Clone)]
pub struct RegistrationStore {
    path: PathBuf,
    state: PersistedState,
}

impl RegistrationStore {
    /// Store vazio, para o primeiro passo de registro.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: PersistedState::default(),
        }
    }

    /// Lê o arquivo de estado. Ausência vira [`StateError::NotFound`].
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StateError> {
        let path = path.into();
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StateError::NotFound(path));
            }
            Err(source) => return Err(StateError::Read { path, source }),
        };
        let state: PersistedState =
            serde_json::from_str(&content).map_err(|source| StateError::Parse {
                path: path.clone(),
                source,
            })?;
        info!(
            "Estado carregado de {} ({} sensores registrados)",
            path.display(),
            state.registrations.len()
        );
        Ok(Self { path, state })
    }

    /// Carrega o estado, aceitando ausência do arquivo (store vazio).
    pub fn load_or_empty(path: impl Into<PathBuf>) -> Result<Self, StateError> {
        match Self::load(path) {
            Err(StateError::NotFound(path)) => {
                info!("Sem estado anterior em {}", path.display());
                Ok(Self::empty(path))
            }
            other => other,
        }
    }

    /// Grava o mapa inteiro de forma atômica.
    pub fn save(&self) -> Result<(), StateError> {
        let write_err = |source| StateError::Write {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(write_err)?;

        let content = serde_json::to_vec(&self.state)
            .map_err(|e| write_err(std::io::Error::other(e)))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(&content).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;

        debug!(
            "Estado salvo em {} ({} sensores)",
            self.path.display(),
            self.state.registrations.len()
        );
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &PersistedState {
        &self.state
    }

    /// Id remoto de um sensor, se registrado.
    pub fn remote_id(&self, sensor: &str) -> Option<&RemoteId> {
        self.state.registrations.get(sensor)
    }

    pub fn is_registered(&self, sensor: &str) -> bool {
        self.state.registrations.contains_key(sensor)
    }

    /// Guarda o id de um registro bem-sucedido (não grava em disco).
    pub fn record(&mut self, sensor: impl Into<String>, id: RemoteId) {
        self.state.registrations.insert(sensor.into(), id);
    }
}
