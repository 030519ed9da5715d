//! Supervisor dos workers de sensor.
//!
//! Todos os handlers são resolvidos e construídos antes de qualquer thread
//! subir: uma tag desconhecida derruba a inicialização sem deixar workers
//! órfãos. Depois de iniciados, os workers são independentes; um worker que
//! termina é registrado como anomalia, não é reiniciado e não afeta os
//! demais. O estado de cada um fica visível em [`Supervisor::alive_count`] e
//! [`Supervisor::dead_workers`].

use crate::config::SensorConfig;
use crate::error::ConfigError;
use crate::handlers::{ReadingSink, SensorHandler, build_handler};
use crate::types::DeliveryEvent;
use crossbeam_channel::Sender;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info};

/// Handle de um worker em execução.
struct WorkerHandle {
    name: String,
    alive: Arc<AtomicBool>,
}

impl WorkerHandle {
    fn name(&self) -> &str {
        &self.name
    }

    /// `false` depois que o handler retornou ou entrou em pânico.
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

/// Marca o worker como morto ao sair da thread, inclusive por pânico.
struct LivenessGuard {
    name: String,
    alive: Arc<AtomicBool>,
}

impl Drop for LivenessGuard {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
        if std::thread::panicking() {
            error!("Worker '{}' entrou em pânico; sensor não reporta mais", self.name);
        }
    }
}

/// Dono dos handlers e das threads de sensor.
pub struct Supervisor {
    pending: Vec<(String, Box<dyn SensorHandler>)>,
    workers: Vec<WorkerHandle>,
    /// Mantém o canal aberto enquanto o supervisor existir
    _sink: Option<Sender<DeliveryEvent>>,
}

impl Supervisor {
    /// Resolve e constrói o handler de cada sensor, sem iniciar nada.
    pub fn new<'a>(
        sensors: impl IntoIterator<Item = &'a SensorConfig>,
    ) -> Result<Self, ConfigError> {
        let pending = sensors
            .into_iter()
            .map(|s| build_handler(s).map(|h| (s.name.clone(), h)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_handlers(pending))
    }

    /// Supervisor sobre handlers já construídos.
    pub fn from_handlers(handlers: Vec<(String, Box<dyn SensorHandler>)>) -> Self {
        Self {
            pending: handlers,
            workers: Vec::new(),
            _sink: None,
        }
    }

    /// Sobe uma thread por handler, todas escrevendo em `tx`.
    pub fn start(&mut self, tx: Sender<DeliveryEvent>) -> std::io::Result<()> {
        for (name, mut handler) in std::mem::take(&mut self.pending) {
            let alive = Arc::new(AtomicBool::new(true));
            let guard = LivenessGuard {
                name: name.clone(),
                alive: Arc::clone(&alive),
            };
            let sink = ReadingSink::new(name.clone(), tx.clone());

            std::thread::Builder::new()
                .name(format!("sensor-{name}"))
                .spawn(move || {
                    let _guard = guard;
                    info!("Worker '{}' iniciado", sink.sensor());
                    match handler.run(&sink) {
                        Ok(()) => error!("Worker '{}' encerrou inesperadamente", sink.sensor()),
                        Err(e) => error!("Worker '{}' encerrou: {e}", sink.sensor()),
                    }
                })?;

            self.workers.push(WorkerHandle { name, alive });
        }
        self._sink = Some(tx);
        info!("{} workers iniciados", self.workers.len());
        Ok(())
    }

    pub fn alive_count(&self) -> usize {
        self.workers.iter().filter(|w| w.is_alive()).count()
    }

    /// Nomes dos sensores cujo worker já terminou.
    pub fn dead_workers(&self) -> Vec<&str> {
        self.workers
            .iter()
            .filter(|w| !w.is_alive())
            .map(|w| w.name())
            .collect()
    }
}
