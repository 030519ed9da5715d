//! Passo de registro dos sensores no serviço remoto.
//!
//! Registrar um sensor que já tem id envia esse id como `SensorId`, então o
//! servidor atualiza o registro existente em vez de criar outro. O estado é
//! gravado após cada sucesso; uma falha no meio do passo deixa no disco
//! exatamente os sensores que já tinham sido registrados.

use crate::config::{AgentConfig, SensorConfig};
use crate::error::{RegistrationError, StateError};
use crate::protocol::{Auth, build_register_request};
use crate::state::RegistrationStore;
use crate::types::RemoteId;
use crate::uplink::Uplink;
use tracing::{error, info};

/// Executa os registros usando a config e o uplink informados.
pub struct Registrar<'a> {
    config: &'a AgentConfig,
    auth: Auth,
    uplink: &'a dyn Uplink,
}

impl<'a> Registrar<'a> {
    pub fn new(config: &'a AgentConfig, uplink: &'a dyn Uplink) -> Self {
        Self {
            config,
            auth: Auth::from_service(&config.service),
            uplink,
        }
    }

    /// Registra um sensor e guarda o id no store (somente em memória).
    pub fn register(
        &self,
        store: &mut RegistrationStore,
        sensor: &SensorConfig,
    ) -> Result<RemoteId, RegistrationError> {
        let previous = store.remote_id(&sensor.name);
        if let Some(id) = previous {
            info!("Atualizando registro de '{}' (id {id})", sensor.name);
        }
        let id = build_register_request(&self.auth, &self.config.device, sensor, previous)
            .and_then(|request| self.uplink.register_sensor(&request))
            .map_err(|source| {
                if let Some(body) = source.raw_body() {
                    error!("Registro de '{}' recusado: {body}", sensor.name);
                }
                RegistrationError::Rejected {
                    sensor: sensor.name.clone(),
                    source,
                }
            })?;

        info!("Sensor '{}' registrado → id {id}", sensor.name);
        store.record(sensor.name.clone(), id.clone());
        Ok(id)
    }

    /// Registra todos os sensores da config, gravando o estado após cada um.
    ///
    /// Para no primeiro erro; registros anteriores não são desfeitos.
    pub fn register_all(&self, store: &mut RegistrationStore) -> Result<(), RegistrationError> {
        for sensor in self.config.sensors.values() {
            self.register(store, sensor)?;
            store.save()?;
        }
        info!(
            "Passo de registro concluído: {} sensores",
            self.config.sensors.len()
        );
        Ok(())
    }
}

/// Confere que todo sensor configurado tem id no store.
pub fn ensure_registered(
    config: &AgentConfig,
    store: &RegistrationStore,
) -> Result<(), StateError> {
    match config.sensors.keys().find(|name| !store.is_registered(name)) {
        Some(name) => Err(StateError::NotRegistered(name.clone())),
        None => Ok(()),
    }
}
