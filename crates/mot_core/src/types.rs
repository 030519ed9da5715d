//! Tipos que trafegam entre workers, fila de entrega e estado.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::SystemTime;

/// Identificador atribuído pelo serviço remoto a um sensor.
///
/// Opaco: pode ser string, número ou objeto, conforme o servidor responder.
pub type RemoteId = Value;

// ──────────────────────────────────────────────
// Reading
// ──────────────────────────────────────────────

/// Uma leitura: valores escalares na mesma ordem dos campos do sensor.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Reading(Vec<Value>);

impl Reading {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T: Into<Value>> FromIterator<T> for Reading {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

// ──────────────────────────────────────────────
// DeliveryEvent
// ──────────────────────────────────────────────

/// Leitura em trânsito entre um worker e o loop de entrega.
#[derive(Debug, Clone)]
pub struct DeliveryEvent {
    pub sensor: String,
    pub reading: Reading,
    pub timestamp: SystemTime,
}

impl DeliveryEvent {
    pub fn new(sensor: impl Into<String>, reading: Reading) -> Self {
        Self {
            sensor: sensor.into(),
            reading,
            timestamp: SystemTime::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reading_collects_mixed_scalars() {
        let r: Reading = ["20", "21"].into_iter().collect();
        assert_eq!(r.values(), &[json!("20"), json!("21")]);

        let r: Reading = [1.5_f64, 2.0].into_iter().collect();
        assert_eq!(r.len(), 2);
    }

    #[test]
    fn reading_serializes_as_plain_array() {
        let r = Reading::new(vec![json!("20"), json!(3)]);
        assert_eq!(serde_json::to_string(&r).unwrap(), r#"["20",3]"#);
    }
}
