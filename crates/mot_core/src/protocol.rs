//! Envelopes JSON do serviço remoto.
//!
//! Toda chamada leva o mesmo formato:
//!
//! ```text
//! { "Auth":    { "DriverManagerId": ..., "DriverManagerPassword": ... },
//!   "Package": { ...específico da função... } }
//! ```
//!
//! - `RegisterSensor`: `Package = { SensorDetails, SensorFields }`
//! - `PostSensorData`: `Package = { SensorInfo: { SensorId }, SensorData: { <ReadingName>: valor } }`

use crate::config::{DeviceConfig, SensorConfig, ServiceConfig};
use crate::error::{DeliveryError, UplinkError};
use crate::types::{Reading, RemoteId};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

/// Nome da função de registro no serviço.
pub const REGISTER_SENSOR: &str = "RegisterSensor";
/// Nome da função de envio de leituras.
pub const POST_SENSOR_DATA: &str = "PostSensorData";

/// Bloco de autenticação presente em toda chamada.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Auth {
    pub driver_manager_id: String,
    pub driver_manager_password: String,
}

impl Auth {
    pub fn from_service(service: &ServiceConfig) -> Self {
        Self {
            driver_manager_id: service.id.clone(),
            driver_manager_password: service.password.clone(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct Envelope<'a, P: Serialize> {
    auth: &'a Auth,
    package: P,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SensorInfo<'a> {
    sensor_id: &'a RemoteId,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct PostPackage<'a> {
    sensor_info: SensorInfo<'a>,
    sensor_data: Map<String, Value>,
}

fn to_value<T: Serialize>(v: &T) -> Result<Value, UplinkError> {
    serde_json::to_value(v).map_err(|e| UplinkError::Serialize(e.to_string()))
}

// ──────────────────────────────────────────────
// RegisterSensor
// ──────────────────────────────────────────────

/// Monta a requisição de registro de um sensor.
///
/// `SensorDetails` recebe o `DriverManagerId`, o id anterior como
/// `SensorId` (dica de atualização) e os campos de localização do
/// dispositivo.
pub fn build_register_request(
    auth: &Auth,
    device: &DeviceConfig,
    sensor: &SensorConfig,
    previous_id: Option<&RemoteId>,
) -> Result<Value, UplinkError> {
    let mut package = sensor.registration_package.clone();
    let details = &mut package.sensor_details;

    details.insert(
        "DriverManagerId".into(),
        Value::String(auth.driver_manager_id.clone()),
    );
    if let Some(id) = previous_id {
        details.insert("SensorId".into(), id.clone());
    }
    if let Some(location) = &device.location {
        for (k, v) in location {
            details.insert(k.clone(), v.clone());
        }
    }

    to_value(&Envelope {
        auth,
        package: &package,
    })
}

// ──────────────────────────────────────────────
// PostSensorData
// ──────────────────────────────────────────────

/// Monta a requisição de envio de uma leitura.
///
/// Os valores são associados aos nomes de campo por posição. Leitura mais
/// curta que a lista de campos é violação de contrato; valores excedentes
/// são descartados.
pub fn build_post_request(
    auth: &Auth,
    sensor: &str,
    sensor_id: &RemoteId,
    fields: &[String],
    reading: &Reading,
) -> Result<Value, DeliveryError> {
    if reading.len() < fields.len() {
        return Err(DeliveryError::ShapeMismatch {
            sensor: sensor.to_string(),
            expected: fields.len(),
            got: reading.len(),
        });
    }
    if reading.len() > fields.len() {
        warn!(
            "Sensor '{sensor}': {} valores excedentes ignorados",
            reading.len() - fields.len()
        );
    }

    let sensor_data: Map<String, Value> = fields
        .iter()
        .cloned()
        .zip(reading.values().iter().cloned())
        .collect();

    to_value(&Envelope {
        auth,
        package: PostPackage {
            sensor_info: SensorInfo { sensor_id },
            sensor_data,
        },
    })
    .map_err(|source| DeliveryError::Uplink {
        sensor: sensor.to_string(),
        source,
    })
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
