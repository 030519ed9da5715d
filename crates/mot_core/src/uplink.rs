//! Cliente do serviço remoto de telemetria.
//!
//! Duas operações, ambas `POST {base_url}/<Função>` com corpo JSON UTF-8.
//! Só HTTP 200 é sucesso; qualquer outro status vira [`UplinkError::Status`]
//! com o corpo bruto da resposta.

use crate::config::ServiceConfig;
use crate::error::UplinkError;
use crate::protocol::{POST_SENSOR_DATA, REGISTER_SENSOR};
use crate::types::RemoteId;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Content-Type enviado em toda chamada.
pub const CONTENT_TYPE: &str = "application/json;charset=utf-8";

/// Operações remotas usadas pelo agente.
pub trait Uplink: Send + Sync {
    /// Registra (ou atualiza) um sensor e devolve o id atribuído.
    fn register_sensor(&self, request: &Value) -> Result<RemoteId, UplinkError>;

    /// Envia uma leitura. O corpo da resposta de sucesso é ignorado.
    fn post_sensor_data(&self, request: &Value) -> Result<(), UplinkError>;
}

/// [`Uplink`] sobre HTTP bloqueante (`ureq`).
pub struct HttpUplink {
    agent: ureq::Agent,
    base_url: String,
}

impl HttpUplink {
    pub fn new(service: &ServiceConfig) -> Self {
        let mut builder = ureq::AgentBuilder::new();
        // Fora de faixa já é barrado por `AgentConfig::validate`
        if let Some(timeout) = service
            .timeout_secs
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        {
            builder = builder.timeout(timeout);
        }
        Self {
            agent: builder.build(),
            base_url: service.base_url.clone(),
        }
    }

    /// URL completa de uma função do serviço.
    pub fn function_url(&self, function: &str) -> String {
        join_url(&self.base_url, function)
    }

    /// Faz o POST e devolve o corpo de uma resposta 200.
    fn call(&self, function: &str, request: &Value) -> Result<String, UplinkError> {
        let url = self.function_url(function);
        let body =
            serde_json::to_string(request).map_err(|e| UplinkError::Serialize(e.to_string()))?;
        debug!("POST {url} ({} bytes)", body.len());

        let response = match self
            .agent
            .post(&url)
            .set("Content-Type", CONTENT_TYPE)
            .send_string(&body)
        {
            Ok(response) => response,
            Err(ureq::Error::Status(code, response)) => {
                return Err(UplinkError::Status {
                    code,
                    body: response.into_string().unwrap_or_default(),
                });
            }
            Err(ureq::Error::Transport(t)) => return Err(UplinkError::Transport(t.to_string())),
        };

        let code = response.status();
        let text = response
            .into_string()
            .map_err(|e| UplinkError::Transport(e.to_string()))?;
        if code != 200 {
            return Err(UplinkError::Status { code, body: text });
        }
        Ok(text)
    }
}

impl Uplink for HttpUplink {
    fn register_sensor(&self, request: &Value) -> Result<RemoteId, UplinkError> {
        let body = self.call(REGISTER_SENSOR, request)?;
        serde_json::from_str(&body).map_err(|_| UplinkError::InvalidBody(body))
    }

    fn post_sensor_data(&self, request: &Value) -> Result<(), UplinkError> {
        self.call(POST_SENSOR_DATA, request).map(|_| ())
    }
}

/// Anexa `function` como último segmento do path de `base`.
pub fn join_url(base: &str, function: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), function)
}
