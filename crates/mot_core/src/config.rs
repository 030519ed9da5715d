//! Configuração do agente (TOML ou JSON).
//!
//! Formato:
//!
//! ```toml
//! [service]
//! base_url = "https://telemetry.example.com/api"
//! id = "dm-01"
//! password = "@/etc/mot/password"
//!
//! [device.location]
//! Latitude = 60.17
//! Longitude = 24.94
//!
//! [sensors.temp1]
//! type = "file-poll"
//! files = ["/sys/class/thermal/thermal_zone0/temp"]
//! poll_interval = 5
//! report_unchanged = false
//!
//! [sensors.temp1.registration_package.SensorDetails]
//! Name = "CPU temperature"
//!
//! [[sensors.temp1.registration_package.SensorFields]]
//! ReadingName = "Temperature"
//! ```
//!
//! Strings `@caminho` em `service`, `device` e nos `registration_package`
//! são trocadas pelo conteúdo do arquivo na carga, então `RegisterSensor` e
//! `PostSensorData` usam os mesmos valores.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Caminho padrão do arquivo de configuração.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/mot/config.toml";

/// Maior timeout HTTP aceito (1 dia).
pub const MAX_TIMEOUT_SECS: f64 = 86_400.0;
/// Maior espera inicial entre tentativas de entrega (1 hora).
pub const MAX_RETRY_BACKOFF_SECS: f64 = 3_600.0;

/// Serviço remoto de telemetria.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// URL base; as funções são anexadas como último segmento do path
    pub base_url: String,
    /// Identificador do driver manager (vai no bloco `Auth`)
    pub id: String,
    /// Senha do driver manager
    pub password: String,
    /// Timeout por chamada HTTP em segundos (ausente = sem timeout)
    pub timeout_secs: Option<f64>,
}

/// Dados estáticos do dispositivo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Campos de localização mesclados em `SensorDetails` no registro
    pub location: Option<Map<String, Value>>,
}

/// Política da fila e do loop de entrega.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Tentativas por leitura (1 = falha na primeira tentativa é fatal)
    pub max_attempts: u32,
    /// Espera antes da segunda tentativa; dobra a cada nova tentativa
    pub retry_backoff_secs: f64,
    /// Capacidade da fila (0 = ilimitada)
    pub channel_capacity: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            retry_backoff_secs: 1.0,
            channel_capacity: 0,
        }
    }
}

/// Um campo declarado no pacote de registro.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SensorField {
    #[serde(rename = "ReadingName")]
    pub reading_name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Pacote enviado em `RegisterSensor`, tal como declarado na config.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RegistrationPackage {
    #[serde(rename = "SensorDetails", default)]
    pub sensor_details: Map<String, Value>,
    #[serde(rename = "SensorFields", default)]
    pub sensor_fields: Vec<SensorField>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Configuração de um sensor. O nome é a chave em `[sensors]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    #[serde(skip)]
    pub name: String,
    /// Tag do handler (ex: "file-poll")
    #[serde(rename = "type")]
    pub kind: String,
    pub registration_package: RegistrationPackage,
    /// Parâmetros específicos do handler
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl SensorConfig {
    /// Nomes dos campos na ordem em que as leituras os preenchem.
    pub fn field_names(&self) -> Vec<String> {
        self.registration_package
            .sensor_fields
            .iter()
            .map(|f| f.reading_name.clone())
            .collect()
    }
}

/// Configuração raiz.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub service: ServiceConfig,
    pub device: DeviceConfig,
    pub delivery: DeliveryConfig,
    pub sensors: BTreeMap<String, SensorConfig>,
}

/// Formato do arquivo, decidido pela extensão.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") | Some("conf") => ConfigFormat::Json,
            _ => ConfigFormat::Toml,
        }
    }
}

impl AgentConfig {
    /// Carrega e valida a configuração. Qualquer falha é fatal para o chamador.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&content, ConfigFormat::from_path(path), path)?;
        info!(
            "Configuração carregada de {} ({} sensores)",
            path.display(),
            config.sensors.len()
        );
        Ok(config)
    }

    /// Parseia o conteúdo já lido; `origin` só aparece nas mensagens de erro.
    pub fn parse(content: &str, format: ConfigFormat, origin: &Path) -> Result<Self, ConfigError> {
        let mut config: AgentConfig = match format {
            ConfigFormat::Toml => toml::from_str(content).map_err(|source| ConfigError::Toml {
                path: origin.to_path_buf(),
                source,
            })?,
            ConfigFormat::Json => {
                serde_json::from_str(content).map_err(|source| ConfigError::Json {
                    path: origin.to_path_buf(),
                    source,
                })?
            }
        };
        config.expand_macros();

        for (name, sensor) in config.sensors.iter_mut() {
            sensor.name = name.clone();
        }

        let errors = config.validate();
        if !errors.is_empty() {
            return Err(ConfigError::Invalid(errors));
        }
        Ok(config)
    }

    /// Retorna o caminho padrão do arquivo de configuração.
    pub fn default_path() -> PathBuf {
        PathBuf::from(DEFAULT_CONFIG_PATH)
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.service.base_url.is_empty() {
            errors.push("service.base_url não pode ser vazio".into());
        } else if !self.service.base_url.starts_with("http://")
            && !self.service.base_url.starts_with("https://")
        {
            errors.push(format!(
                "service.base_url deve ser http(s): {}",
                self.service.base_url
            ));
        }
        if self.service.id.is_empty() {
            errors.push("service.id não pode ser vazio".into());
        }
        if let Some(t) = self.service.timeout_secs {
            if !(t > 0.0 && t <= MAX_TIMEOUT_SECS) {
                errors.push(format!(
                    "service.timeout_secs deve estar em (0, {MAX_TIMEOUT_SECS}]: {t}"
                ));
            }
        }

        if self.delivery.max_attempts == 0 {
            errors.push("delivery.max_attempts deve ser >= 1".into());
        }
        let backoff = self.delivery.retry_backoff_secs;
        if !(0.0..=MAX_RETRY_BACKOFF_SECS).contains(&backoff) {
            errors.push(format!(
                "delivery.retry_backoff_secs deve estar em [0, {MAX_RETRY_BACKOFF_SECS}]: {backoff}"
            ));
        }

        if self.sensors.is_empty() {
            errors.push("Nenhum sensor configurado".into());
        }
        for (name, sensor) in &self.sensors {
            if sensor.kind.is_empty() {
                errors.push(format!("Sensor '{name}': campo 'type' vazio"));
            }
            let fields = &sensor.registration_package.sensor_fields;
            if fields.is_empty() {
                errors.push(format!("Sensor '{name}': SensorFields vazio"));
            }
            let mut seen = HashSet::new();
            for f in fields {
                if f.reading_name.is_empty() {
                    errors.push(format!("Sensor '{name}': ReadingName vazio"));
                } else if !seen.insert(f.reading_name.as_str()) {
                    errors.push(format!(
                        "Sensor '{name}': ReadingName duplicado '{}'",
                        f.reading_name
                    ));
                }
            }
        }

        errors
    }
}

// ──────────────────────────────────────────────
// Expansão de macros
// ──────────────────────────────────────────────

impl AgentConfig {
    fn expand_macros(&mut self) {
        let service = &mut self.service;
        for s in [&mut service.base_url, &mut service.id, &mut service.password] {
            *s = expand_string(std::mem::take(s));
        }
        if let Some(location) = &mut self.device.location {
            expand_map(location);
        }
        for sensor in self.sensors.values_mut() {
            let package = &mut sensor.registration_package;
            expand_map(&mut package.sensor_details);
            expand_map(&mut package.extra);
            for field in &mut package.sensor_fields {
                field.reading_name = expand_string(std::mem::take(&mut field.reading_name));
                expand_map(&mut field.extra);
            }
        }
    }
}

fn expand_map(map: &mut Map<String, Value>) {
    for v in map.values_mut() {
        *v = expand_macros(v.take());
    }
}

/// Substitui toda string `@caminho` pelo conteúdo (sem espaços nas pontas)
/// do arquivo, se ele existir. Strings sem arquivo correspondente ficam
/// como estão.
pub fn expand_macros(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, expand_macros(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(expand_macros).collect()),
        Value::String(s) => Value::String(expand_string(s)),
        other => other,
    }
}

fn expand_string(s: String) -> String {
    let Some(file) = s.strip_prefix('@') else {
        return s;
    };
    let path = Path::new(file);
    if !path.exists() {
        return s;
    }
    match std::fs::read_to_string(path) {
        Ok(content) => content.trim().to_string(),
        Err(e) => {
            warn!("Não foi possível expandir {s}: {e}");
            s
        }
    }
}
