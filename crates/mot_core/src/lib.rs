//! # mot core
//!
//! Pipeline do agente: registra os sensores configurados no serviço remoto,
//! roda um worker por sensor e entrega as leituras via HTTP, uma por vez,
//! por um único consumidor.
//!
//! ```text
//! config ─► registro ─► estado salvo ─► supervisor ─► workers ─┐
//!                                                              ▼
//!                                  uplink ◄── loop de entrega ◄─ fila
//! ```
//!
//! ## Módulos
//! - [`config`] – Configuração TOML/JSON e expansão de `@arquivo`
//! - [`types`] – Leituras e eventos de entrega
//! - [`protocol`] – Envelopes JSON do serviço
//! - [`uplink`] – Cliente HTTP do serviço remoto
//! - [`state`] – Ids remotos persistidos
//! - [`registration`] – Passo de registro
//! - [`handlers`] – Handlers de sensor (`file-poll`, `system-stats`)
//! - [`supervisor`] – Threads dos workers
//! - [`delivery`] – Loop de entrega
//! - [`error`] – Tipos de erro

pub mod config;
pub mod delivery;
pub mod error;
pub mod handlers;
pub mod protocol;
pub mod registration;
pub mod state;
pub mod supervisor;
pub mod types;
pub mod uplink;

// Re-exports convenientes
pub use config::AgentConfig;
pub use delivery::{DeliveryLoop, RetryPolicy, delivery_channel};
pub use error::AgentError;
pub use registration::Registrar;
pub use state::RegistrationStore;
pub use supervisor::Supervisor;
pub use types::{DeliveryEvent, Reading, RemoteId};
pub use uplink::{HttpUplink, Uplink};
