//! Handlers de sensor.
//!
//! Cada sensor roda um [`SensorHandler`] em sua própria thread. O handler
//! roda para sempre e empurra no [`ReadingSink`] toda leitura que decidir
//! reportar; o push é a fronteira entre "observado" e "em trânsito".
//!
//! Os tipos disponíveis formam um conjunto fechado ([`HandlerKind`]),
//! resolvido a partir do campo `type` da config:
//!
//! | tag | handler |
//! |---|---|
//! | `file-poll` | [`file_poll::FilePollSampler`] |
//! | `system-stats` | [`system::SystemStatsSampler`] |

pub mod file_poll;
pub mod system;

use crate::config::SensorConfig;
use crate::error::{ConfigError, HandlerFault};
use crate::types::{DeliveryEvent, Reading};
use crossbeam_channel::Sender;
use serde::{Deserialize, Deserializer, de::DeserializeOwned};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Unidade de trabalho de um sensor.
pub trait SensorHandler: Send {
    /// Roda indefinidamente. Retornar (com ou sem erro) é uma anomalia.
    fn run(&mut self, sink: &ReadingSink) -> Result<(), HandlerFault>;
}

/// Saída de um worker: associa o nome do sensor a cada leitura.
#[derive(Debug, Clone)]
pub struct ReadingSink {
    sensor: String,
    tx: Sender<DeliveryEvent>,
}

impl ReadingSink {
    pub fn new(sensor: impl Into<String>, tx: Sender<DeliveryEvent>) -> Self {
        Self {
            sensor: sensor.into(),
            tx,
        }
    }

    pub fn sensor(&self) -> &str {
        &self.sensor
    }

    /// Enfileira uma leitura. Bloqueia se a fila for limitada e estiver cheia.
    pub fn push(&self, reading: Reading) -> Result<(), HandlerFault> {
        self.tx
            .send(DeliveryEvent::new(self.sensor.clone(), reading))
            .map_err(|_| HandlerFault::SinkClosed)
    }
}

// ──────────────────────────────────────────────
// Loop de polling compartilhado
// ──────────────────────────────────────────────

/// Fonte de leituras amostrada periodicamente.
pub trait Sampler: Send {
    /// Número de valores de cada leitura.
    fn width(&self) -> usize;

    /// Faz uma leitura. Erros são registrados e a rodada é pulada.
    fn sample(&mut self) -> Result<Reading, String>;
}

/// Suprime leituras iguais à última reportada, se configurado.
#[derive(Debug, Clone, Default)]
pub struct ChangeFilter {
    report_unchanged: bool,
    last: Option<Reading>,
}

impl ChangeFilter {
    pub fn new(report_unchanged: bool) -> Self {
        Self {
            report_unchanged,
            last: None,
        }
    }

    /// Devolve a leitura se ela deve ser reportada.
    pub fn admit(&mut self, reading: Reading) -> Option<Reading> {
        if !self.report_unchanged && self.last.as_ref() == Some(&reading) {
            return None;
        }
        self.last = Some(reading.clone());
        Some(reading)
    }
}

/// Maior `poll_interval` aceito (1 dia).
pub const MAX_POLL_INTERVAL_SECS: f64 = 86_400.0;

/// Parâmetros comuns a todo handler de polling.
#[derive(Debug, Clone, Deserialize)]
pub struct PollSettings {
    /// Espera entre leituras (segundos)
    #[serde(deserialize_with = "de_seconds")]
    pub poll_interval: f64,
    /// Reporta toda leitura, mesmo repetida
    #[serde(default, deserialize_with = "de_flag")]
    pub report_unchanged: bool,
}

impl PollSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.poll_interval)
    }
}

/// Handler genérico: amostra, filtra, empurra, dorme.
pub struct PollingHandler<S: Sampler> {
    name: String,
    sampler: S,
    settings: PollSettings,
    filter: ChangeFilter,
}

impl<S: Sampler> PollingHandler<S> {
    pub fn new(name: impl Into<String>, sampler: S, settings: PollSettings) -> Self {
        let filter = ChangeFilter::new(settings.report_unchanged);
        Self {
            name: name.into(),
            sampler,
            settings,
            filter,
        }
    }

    /// Uma rodada: devolve a leitura a reportar, se houver.
    pub fn poll_once(&mut self) -> Option<Reading> {
        match self.sampler.sample() {
            Ok(reading) => {
                debug!("[{}] leitura {:?}", self.name, reading.values());
                self.filter.admit(reading)
            }
            Err(e) => {
                warn!("[{}] Falha na leitura: {e}", self.name);
                None
            }
        }
    }
}

impl<S: Sampler> SensorHandler for PollingHandler<S> {
    fn run(&mut self, sink: &ReadingSink) -> Result<(), HandlerFault> {
        let interval = self.settings.interval();
        loop {
            let cycle_start = Instant::now();

            if let Some(reading) = self.poll_once() {
                sink.push(reading)?;
            }

            // Dormir pelo tempo restante do intervalo
            let elapsed = cycle_start.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
    }
}

// ──────────────────────────────────────────────
// Resolução por tag
// ──────────────────────────────────────────────

/// Tipos de handler conhecidos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    FilePoll,
    SystemStats,
}

impl HandlerKind {
    pub const ALL: [HandlerKind; 2] = [HandlerKind::FilePoll, HandlerKind::SystemStats];

    pub fn tag(self) -> &'static str {
        match self {
            HandlerKind::FilePoll => "file-poll",
            HandlerKind::SystemStats => "system-stats",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.tag() == tag)
    }

    /// Resolve a tag de um sensor; tag desconhecida é erro de configuração.
    pub fn resolve(sensor: &SensorConfig) -> Result<Self, ConfigError> {
        Self::from_tag(&sensor.kind).ok_or_else(|| ConfigError::UnknownHandler {
            sensor: sensor.name.clone(),
            tag: sensor.kind.clone(),
        })
    }

    /// Constrói o handler com os parâmetros do sensor.
    pub fn build(self, sensor: &SensorConfig) -> Result<Box<dyn SensorHandler>, ConfigError> {
        match self {
            HandlerKind::FilePoll => {
                let params: file_poll::FilePollParams = parse_params(sensor)?;
                let settings = params.poll.clone();
                let sampler = file_poll::FilePollSampler::new(params.files);
                finish(sensor, sampler, settings)
            }
            HandlerKind::SystemStats => {
                let params: system::SystemStatsParams = parse_params(sensor)?;
                let sampler = system::SystemStatsSampler::new(&params.metrics)
                    .map_err(|reason| invalid(sensor, reason))?;
                finish(sensor, sampler, params.poll)
            }
        }
    }
}

/// Resolve e constrói o handler de um sensor.
pub fn build_handler(sensor: &SensorConfig) -> Result<Box<dyn SensorHandler>, ConfigError> {
    HandlerKind::resolve(sensor)?.build(sensor)
}

fn finish<S: Sampler + 'static>(
    sensor: &SensorConfig,
    sampler: S,
    settings: PollSettings,
) -> Result<Box<dyn SensorHandler>, ConfigError> {
    if !(0.0..=MAX_POLL_INTERVAL_SECS).contains(&settings.poll_interval) {
        return Err(invalid(
            sensor,
            format!(
                "poll_interval inválido: {} (0–{MAX_POLL_INTERVAL_SECS})",
                settings.poll_interval
            ),
        ));
    }
    let fields = sensor.registration_package.sensor_fields.len();
    if sampler.width() < fields {
        return Err(invalid(
            sensor,
            format!(
                "handler produz {} valores, mas há {fields} campos",
                sampler.width()
            ),
        ));
    }
    Ok(Box::new(PollingHandler::new(
        sensor.name.clone(),
        sampler,
        settings,
    )))
}

fn parse_params<T: DeserializeOwned>(sensor: &SensorConfig) -> Result<T, ConfigError> {
    serde_json::from_value(Value::Object(sensor.params.clone()))
        .map_err(|e| invalid(sensor, e.to_string()))
}

fn invalid(sensor: &SensorConfig, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidParams {
        sensor: sensor.name.clone(),
        reason: reason.into(),
    }
}

// ──────────────────────────────────────────────
// Parâmetros tolerantes (número, string ou bool)
// ──────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

fn de_seconds<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    match Loose::deserialize(d)? {
        Loose::Int(i) => Ok(i as f64),
        Loose::Float(f) => Ok(f),
        Loose::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("intervalo inválido: {s:?}"))),
        Loose::Bool(b) => Err(serde::de::Error::custom(format!(
            "intervalo inválido: {b}"
        ))),
    }
}

fn de_flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    match Loose::deserialize(d)? {
        Loose::Bool(b) => Ok(b),
        Loose::Int(i) => Ok(i != 0),
        Loose::Float(f) => Ok(f != 0.0),
        Loose::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            other => Err(serde::de::Error::custom(format!("flag inválida: {other:?}"))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RegistrationPackage, SensorField};
    use serde_json::{Map, json};

    struct Scripted {
        script: Vec<Result<Reading, String>>,
    }

    impl Sampler for Scripted {
        fn width(&self) -> usize {
            1
        }

        // Repete o último item quando o roteiro acaba
        fn sample(&mut self) -> Result<Reading, String> {
            if self.script.len() > 1 {
                self.script.remove(0)
            } else {
                self.script[0].clone()
            }
        }
    }

    fn settings(report_unchanged: bool) -> PollSettings {
        PollSettings {
            poll_interval: 0.0,
            report_unchanged,
        }
    }

    fn reading(v: &str) -> Reading {
        Reading::new(vec![json!(v)])
    }

    fn sensor(kind: &str, params: Value) -> SensorConfig {
        let Value::Object(params) = params else {
            panic!("params devem ser objeto");
        };
        SensorConfig {
            name: "s".into(),
            kind: kind.into(),
            registration_package: RegistrationPackage {
                sensor_fields: vec![SensorField {
                    reading_name: "V".into(),
                    extra: Map::new(),
                }],
                ..Default::default()
            },
            params,
        }
    }

    #[test]
    fn unchanged_readings_are_suppressed() {
        let mut h = PollingHandler::new(
            "s",
            Scripted {
                script: vec![Ok(reading("20")), Ok(reading("20")), Ok(reading("21")), Ok(reading("20"))],
            },
            settings(false),
        );
        assert_eq!(h.poll_once(), Some(reading("20")));
        assert_eq!(h.poll_once(), None);
        assert_eq!(h.poll_once(), Some(reading("21")));
        assert_eq!(h.poll_once(), Some(reading("20")));
    }

    #[test]
    fn report_unchanged_emits_every_poll() {
        let mut h = PollingHandler::new(
            "s",
            Scripted {
                script: vec![Ok(reading("20")), Ok(reading("20"))],
            },
            settings(true),
        );
        assert_eq!(h.poll_once(), Some(reading("20")));
        assert_eq!(h.poll_once(), Some(reading("20")));
    }

    #[test]
    fn failed_read_is_skipped_without_resetting_filter() {
        let mut h = PollingHandler::new(
            "s",
            Scripted {
                script: vec![Ok(reading("20")), Err("EIO".into()), Ok(reading("20"))],
            },
            settings(false),
        );
        assert_eq!(h.poll_once(), Some(reading("20")));
        assert_eq!(h.poll_once(), None);
        assert_eq!(h.poll_once(), None);
    }

    #[test]
    fn run_pushes_into_sink_until_closed() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let sink = ReadingSink::new("s", tx);
        let mut h = PollingHandler::new(
            "s",
            Scripted {
                script: vec![Ok(reading("1")), Ok(reading("2")), Ok(reading("3"))],
            },
            settings(true),
        );

        let first = std::thread::spawn(move || {
            let ev = rx.recv().unwrap();
            (ev.sensor, ev.reading)
        });
        // O receptor some após a primeira leitura; o push seguinte falha
        let result = h.run(&sink);
        assert!(matches!(result, Err(HandlerFault::SinkClosed)));
        assert_eq!(first.join().unwrap(), ("s".to_string(), reading("1")));
    }

    #[test]
    fn loose_params_are_accepted() {
        let s: PollSettings =
            serde_json::from_value(json!({ "poll_interval": "2", "report_unchanged": "1" }))
                .unwrap();
        assert_eq!(s.poll_interval, 2.0);
        assert!(s.report_unchanged);

        let s: PollSettings =
            serde_json::from_value(json!({ "poll_interval": 0.5, "report_unchanged": 0 }))
                .unwrap();
        assert_eq!(s.interval(), Duration::from_millis(500));
        assert!(!s.report_unchanged);

        let s: PollSettings = serde_json::from_value(json!({ "poll_interval": 1 })).unwrap();
        assert!(!s.report_unchanged);

        assert!(serde_json::from_value::<PollSettings>(json!({ "poll_interval": "x" })).is_err());
        assert!(serde_json::from_value::<PollSettings>(json!({})).is_err());
    }

    #[test]
    fn unknown_tag_is_config_error() {
        let s = sensor("gps-serial", json!({}));
        assert!(matches!(
            build_handler(&s),
            Err(ConfigError::UnknownHandler { tag, .. }) if tag == "gps-serial"
        ));
    }

    #[test]
    fn tags_roundtrip() {
        for kind in HandlerKind::ALL {
            assert_eq!(HandlerKind::from_tag(kind.tag()), Some(kind));
        }
    }

    #[test]
    fn file_poll_builds_from_params() {
        let s = sensor(
            "file-poll",
            json!({ "files": ["/tmp/x"], "poll_interval": 1, "report_unchanged": false }),
        );
        assert!(build_handler(&s).is_ok());
    }

    #[test]
    fn too_few_values_for_fields_is_rejected() {
        let mut s = sensor("file-poll", json!({ "files": ["/tmp/x"], "poll_interval": 1 }));
        s.registration_package.sensor_fields.push(SensorField {
            reading_name: "W".into(),
            extra: Map::new(),
        });
        assert!(matches!(
            build_handler(&s),
            Err(ConfigError::InvalidParams { .. })
        ));
    }

    #[test]
    fn negative_interval_is_rejected() {
        let s = sensor("file-poll", json!({ "files": ["/tmp/x"], "poll_interval": -1 }));
        assert!(matches!(
            build_handler(&s),
            Err(ConfigError::InvalidParams { .. })
        ));
    }

    #[test]
    fn huge_or_non_finite_interval_is_rejected() {
        let too_long = MAX_POLL_INTERVAL_SECS + 1.0;
        for interval in [json!(1e30), json!("inf"), json!("NaN"), json!(too_long)] {
            let s = sensor(
                "file-poll",
                json!({ "files": ["/tmp/x"], "poll_interval": interval }),
            );
            assert!(
                matches!(build_handler(&s), Err(ConfigError::InvalidParams { .. })),
                "poll_interval {interval} aceito"
            );
        }
        let s = sensor(
            "file-poll",
            json!({ "files": ["/tmp/x"], "poll_interval": MAX_POLL_INTERVAL_SECS }),
        );
        assert!(build_handler(&s).is_ok());
    }
}
