//! # mot agent
//!
//! Registra os sensores configurados no serviço de telemetria, roda um
//! worker por sensor e envia as leituras via HTTP.
//!
//! ## Uso
//! ```bash
//! mot_agent -c /etc/mot/config.toml -s /var/lib/mot/state.json
//! mot_agent -r                      # só registra/atualiza os sensores e sai
//! mot_agent -p /run/mot.pid         # grava arquivo de PID
//! ```
//!
//! Sai com status 1 em qualquer erro de configuração, registro, estado ou
//! entrega.

mod cli;
mod pidfile;

use cli::Options;
use mot_core::error::{AgentError, StateError};
use mot_core::registration::{Registrar, ensure_registered};
use mot_core::{
    AgentConfig, DeliveryLoop, HttpUplink, RegistrationStore, Supervisor, delivery_channel,
};
use pidfile::PidFile;
use std::error::Error;
use tracing::{error, info};

fn main() {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ── Argumentos ──
    let options = match cli::parse(std::env::args_os()) {
        Ok(o) => o,
        Err(e) => {
            let _ = e.print();
            std::process::exit(cli::exit_code(&e));
        }
    };

    let code = match run(&options) {
        Ok(()) => 0,
        Err(e) => {
            error!("{e}");
            let mut source = e.source();
            while let Some(cause) = source {
                error!("  causa: {cause}");
                source = cause.source();
            }
            1
        }
    };
    std::process::exit(code);
}

fn run(options: &Options) -> Result<(), AgentError> {
    let _pid = options
        .pid_file
        .as_deref()
        .map(PidFile::create)
        .transpose()?;

    // ── Config + handlers (falha antes de qualquer chamada remota) ──
    let config = AgentConfig::load(&options.config)?;
    let mut supervisor = Supervisor::new(config.sensors.values())?;

    let uplink = HttpUplink::new(&config.service);
    let registrar = Registrar::new(&config, &uplink);

    // ── Registro ──
    if options.register_only {
        let mut store = RegistrationStore::load_or_empty(&options.state)?;
        registrar.register_all(&mut store)?;
        return Ok(());
    }

    let store = match RegistrationStore::load(&options.state) {
        Ok(store) => {
            ensure_registered(&config, &store)?;
            store
        }
        Err(StateError::NotFound(path)) => {
            info!("Primeira execução: registrando sensores");
            let mut store = RegistrationStore::empty(path);
            registrar.register_all(&mut store)?;
            store
        }
        Err(e) => return Err(e.into()),
    };

    // ── Workers + entrega ──
    let delivery = DeliveryLoop::for_config(&config, &store, &uplink)?;
    let (tx, rx) = delivery_channel(config.delivery.channel_capacity);
    supervisor.start(tx)?;

    println!();
    println!("══════════════════════════════════════════════");
    println!("   ⚡ MOT AGENT – ATIVO");
    println!("══════════════════════════════════════════════");
    println!("  Serviço:  {}", config.service.base_url);
    println!("  Sensores: {}", config.sensors.len());
    println!("  Estado:   {}", store.path().display());
    println!("══════════════════════════════════════════════");
    println!();

    delivery.run(&rx)?;
    Ok(())
}
