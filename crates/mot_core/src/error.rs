//! Taxonomia de erros do agente.
//!
//! Cada fase tem seu próprio enum; [`AgentError`] agrega todos para o
//! binário decidir o código de saída.

use std::path::PathBuf;

/// Configuração ausente, ilegível ou inconsistente. Fatal na inicialização.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Erro ao ler {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Erro ao parsear TOML em {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Erro ao parsear JSON em {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Configuração inválida: {}", .0.join("; "))]
    Invalid(Vec<String>),

    #[error("Sensor '{sensor}': tipo de handler desconhecido '{tag}'")]
    UnknownHandler { sensor: String, tag: String },

    #[error("Sensor '{sensor}': parâmetros inválidos: {reason}")]
    InvalidParams { sensor: String, reason: String },
}

/// Falha de leitura/escrita do arquivo de estado.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Arquivo de estado {0} não encontrado")]
    NotFound(PathBuf),

    #[error("Erro ao ler estado {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Estado corrompido em {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Erro ao gravar estado {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Sensor '{0}' não registrado (execute com -r)")]
    NotRegistered(String),
}

/// Falha de uma chamada HTTP ao serviço remoto.
#[derive(Debug, thiserror::Error)]
pub enum UplinkError {
    #[error("HTTP {code}: {body}")]
    Status { code: u16, body: String },

    #[error("Erro de transporte: {0}")]
    Transport(String),

    #[error("Resposta inválida: {0}")]
    InvalidBody(String),

    #[error("Erro de serialização: {0}")]
    Serialize(String),
}

impl UplinkError {
    /// Corpo bruto da resposta, quando o servidor respondeu.
    pub fn raw_body(&self) -> Option<&str> {
        match self {
            UplinkError::Status { body, .. } => Some(body),
            UplinkError::InvalidBody(body) => Some(body),
            _ => None,
        }
    }
}

/// Falha no passo de registro. Registros anteriores do mesmo passo
/// permanecem gravados.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("Não foi possível registrar o sensor '{sensor}': {source}")]
    Rejected {
        sensor: String,
        #[source]
        source: UplinkError,
    },

    #[error(transparent)]
    State(#[from] StateError),
}

/// Falha ao entregar uma leitura. Fatal para o processo.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Falha ao enviar leitura de '{sensor}': {source}")]
    Uplink {
        sensor: String,
        #[source]
        source: UplinkError,
    },

    #[error("Leitura de sensor desconhecido '{0}'")]
    UnknownSensor(String),

    #[error("Sensor '{sensor}': leitura com {got} valores, esperados {expected}")]
    ShapeMismatch {
        sensor: String,
        expected: usize,
        got: usize,
    },
}

/// Falha interna de um worker. Isolada ao próprio worker.
#[derive(Debug, thiserror::Error)]
pub enum HandlerFault {
    #[error("Canal de entrega fechado")]
    SinkClosed,

    #[error("{0}")]
    Internal(String),
}

/// Erro de topo do agente; qualquer variante encerra o processo com status 1.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error("Erro de E/S: {0}")]
    Io(#[from] std::io::Error),
}
