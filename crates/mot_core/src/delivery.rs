//! Loop de entrega: consumidor único da fila de leituras.
//!
//! Os eventos são enviados na ordem de chegada (FIFO entre todos os
//! produtores), um por vez, com chamada HTTP síncrona. Leituras do mesmo
//! sensor chegam ao servidor na ordem em que o worker as produziu.
//!
//! Por padrão qualquer falha de envio é fatal: não há spool nem descarte.
//! [`RetryPolicy`] permite tentar de novo antes de desistir.

use crate::config::{AgentConfig, DeliveryConfig};
use crate::error::{DeliveryError, StateError};
use crate::protocol::{Auth, build_post_request};
use crate::state::RegistrationStore;
use crate::types::{DeliveryEvent, RemoteId};
use crate::uplink::Uplink;
use crossbeam_channel::{Receiver, Sender};
use std::collections::HashMap;
use std::time::{Duration, SystemTime};
use tracing::{debug, error, info, warn};

/// Cria a fila de entrega. Capacidade 0 = ilimitada.
pub fn delivery_channel(capacity: usize) -> (Sender<DeliveryEvent>, Receiver<DeliveryEvent>) {
    if capacity == 0 {
        crossbeam_channel::unbounded()
    } else {
        crossbeam_channel::bounded(capacity)
    }
}

/// Tentativas por leitura antes de desistir.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Espera antes da 2ª tentativa; dobra a cada nova tentativa
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Uma única tentativa: a primeira falha é fatal.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    pub fn from_config(config: &DeliveryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: Duration::try_from_secs_f64(config.retry_backoff_secs).unwrap_or_default(),
        }
    }

    /// Espera após a tentativa `attempt` (1 = primeira) ter falhado.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.backoff.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Destino de um sensor: id remoto e nomes dos campos.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub sensor_id: RemoteId,
    pub fields: Vec<String>,
}

pub struct DeliveryLoop<'a> {
    auth: Auth,
    routes: HashMap<String, Route>,
    uplink: &'a dyn Uplink,
    retry: RetryPolicy,
}

impl<'a> DeliveryLoop<'a> {
    pub fn new(auth: Auth, routes: HashMap<String, Route>, uplink: &'a dyn Uplink) -> Self {
        Self {
            auth,
            routes,
            uplink,
            retry: RetryPolicy::none(),
        }
    }

    /// Monta as rotas de todos os sensores configurados.
    ///
    /// Sensor sem id no store é erro: não dá para enviar dados sem ele.
    pub fn for_config(
        config: &AgentConfig,
        store: &RegistrationStore,
        uplink: &'a dyn Uplink,
    ) -> Result<Self, StateError> {
        let mut routes = HashMap::with_capacity(config.sensors.len());
        for (name, sensor) in &config.sensors {
            let sensor_id = store
                .remote_id(name)
                .cloned()
                .ok_or_else(|| StateError::NotRegistered(name.clone()))?;
            routes.insert(
                name.clone(),
                Route {
                    sensor_id,
                    fields: sensor.field_names(),
                },
            );
        }
        Ok(Self::new(Auth::from_service(&config.service), routes, uplink)
            .with_retry(RetryPolicy::from_config(&config.delivery)))
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Envia uma leitura, com as tentativas da política configurada.
    pub fn deliver(&self, event: &DeliveryEvent) -> Result<(), DeliveryError> {
        let route = self
            .routes
            .get(&event.sensor)
            .ok_or_else(|| DeliveryError::UnknownSensor(event.sensor.clone()))?;
        let request = build_post_request(
            &self.auth,
            &event.sensor,
            &route.sensor_id,
            &route.fields,
            &event.reading,
        )?;

        let queued = SystemTime::now()
            .duration_since(event.timestamp)
            .unwrap_or_default();
        info!(
            "→ {} {:?} (na fila há {:.1}s)",
            event.sensor,
            event.reading.values(),
            queued.as_secs_f64()
        );

        let mut attempt = 1;
        loop {
            match self.uplink.post_sensor_data(&request) {
                Ok(()) => {
                    debug!("Leitura de '{}' aceita", event.sensor);
                    return Ok(());
                }
                Err(e) if attempt < self.retry.max_attempts => {
                    let wait = self.retry.delay(attempt);
                    warn!(
                        "Envio de '{}' falhou (tentativa {attempt}/{}): {e}. Nova tentativa em {:.1}s",
                        event.sensor,
                        self.retry.max_attempts,
                        wait.as_secs_f64()
                    );
                    std::thread::sleep(wait);
                    attempt += 1;
                }
                Err(source) => {
                    if let Some(body) = source.raw_body() {
                        error!("Resposta do servidor para '{}': {body}", event.sensor);
                    }
                    return Err(DeliveryError::Uplink {
                        sensor: event.sensor.clone(),
                        source,
                    });
                }
            }
        }
    }

    /// Consome a fila até ela fechar (Ok) ou uma entrega falhar (Err).
    pub fn run(&self, rx: &Receiver<DeliveryEvent>) -> Result<(), DeliveryError> {
        info!("Loop de entrega iniciado ({} sensores)", self.routes.len());
        for event in rx.iter() {
            self.deliver(&event)?;
        }
        warn!("Fila de entrega fechada");
        Ok(())
    }
}
