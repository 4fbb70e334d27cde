//! Protocolo de publicação.
//!
//! Payload JSON compacto, limitado a um buffer fixo:
//!
//! ```text
//! {"token":"..","device_id":"..","ip":"..","readings":[{"sensor_id":"..","value":1.5,"unit":".."}]}
//! ```
//!
//! - Leituras NaN/infinitas são omitidas (nunca `null`)
//! - Se o JSON não cabe em [`MAX_PAYLOAD_SIZE`], a lista de leituras é cortada
//!   na primeira que estouraria, mantendo a ordem do registro
//! - Tópico: [`TOPIC_PREFIX`] + token

use crate::types::{Reading, TelemetryPayload};

/// Prefixo fixo do tópico de dados.
pub const TOPIC_PREFIX: &str = "sentinel/v1/data/";

/// Capacidade do buffer de serialização.
pub const MAX_PAYLOAD_SIZE: usize = 1024;

/// Erros do protocolo.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Payload sem leituras já ocupa {0} bytes (máximo {MAX_PAYLOAD_SIZE})")]
    PayloadTooLarge(usize),

    #[error("Erro de serialização: {0}")]
    Serialize(String),
}

/// Payload serializado e quantas leituras ficaram de fora por tamanho.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload {
    pub bytes: Vec<u8>,
    pub included: usize,
    pub dropped: usize,
}

/// Tópico de publicação para o token.
pub fn topic_for(token: &str) -> String {
    format!("{TOPIC_PREFIX}{token}")
}

/// Monta o payload descartando valores não finitos.
pub fn build_payload(
    token: &str,
    device_id: &str,
    ip: &str,
    readings: impl IntoIterator<Item = Reading>,
) -> TelemetryPayload {
    TelemetryPayload {
        token: token.to_string(),
        device_id: device_id.to_string(),
        ip: ip.to_string(),
        readings: readings.into_iter().filter(|r| r.value.is_finite()).collect(),
    }
}

/// Serializa respeitando o limite de [`MAX_PAYLOAD_SIZE`] bytes.
pub fn encode_payload(payload: &TelemetryPayload) -> Result<EncodedPayload, ProtocolError> {
    let header = TelemetryPayload {
        readings: Vec::new(),
        ..payload.clone()
    };
    // `[]` vazio já está contado na base
    let mut size = serde_json::to_vec(&header)
        .map_err(|e| ProtocolError::Serialize(e.to_string()))?
        .len();
    if size > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::PayloadTooLarge(size));
    }

    let mut included = 0;
    for (i, reading) in payload.readings.iter().enumerate() {
        let entry = serde_json::to_vec(reading)
            .map_err(|e| ProtocolError::Serialize(e.to_string()))?
            .len();
        let separator = usize::from(i > 0);
        if size + entry + separator > MAX_PAYLOAD_SIZE {
            break;
        }
        size += entry + separator;
        included += 1;
    }

    let bounded = TelemetryPayload {
        readings: payload.readings[..included].to_vec(),
        ..header
    };
    let bytes = serde_json::to_vec(&bounded).map_err(|e| ProtocolError::Serialize(e.to_string()))?;
    debug_assert_eq!(bytes.len(), size);

    Ok(EncodedPayload {
        bytes,
        included,
        dropped: payload.readings.len() - included,
    })
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(id: &str, value: f32, unit: &str) -> Reading {
        Reading {
            sensor_id: id.into(),
            value,
            unit: unit.into(),
        }
    }

    #[test]
    fn topic_is_prefix_plus_token() {
        assert_eq!(topic_for("abc123"), "sentinel/v1/data/abc123");
    }

    #[test]
    fn wire_shape_is_exact() {
        let payload = build_payload(
            "abc123",
            "node-1",
            "192.168.0.7",
            [reading("T1", 21.5, "C"), reading("H1", f32::NAN, "%")],
        );
        let encoded = encode_payload(&payload).unwrap();
        assert_eq!(
            String::from_utf8(encoded.bytes).unwrap(),
            r#"{"token":"abc123","device_id":"node-1","ip":"192.168.0.7","readings":[{"sensor_id":"T1","value":21.5,"unit":"C"}]}"#
        );
    }

    #[test]
    fn non_finite_values_never_reach_the_wire() {
        let payload = build_payload(
            "abc123",
            "n",
            "",
            [
                reading("a", f32::NAN, ""),
                reading("b", f32::INFINITY, ""),
                reading("c", 1.0, ""),
            ],
        );
        assert_eq!(payload.readings.len(), 1);
        let text = String::from_utf8(encode_payload(&payload).unwrap().bytes).unwrap();
        assert!(!text.contains("null"));
        assert!(!text.contains("NaN"));
    }

    #[test]
    fn empty_readings_serialize_as_empty_array() {
        let payload = build_payload("abc123", "n", "0.0.0.0", []);
        let text = String::from_utf8(encode_payload(&payload).unwrap().bytes).unwrap();
        assert!(text.ends_with(r#""readings":[]}"#));
    }

    #[test]
    fn overflow_cuts_readings_in_order() {
        let readings = (0..40).map(|i| reading(&format!("sensor_{i:02}"), i as f32, "unit"));
        let payload = build_payload("abc123", "node", "10.0.0.1", readings);
        let encoded = encode_payload(&payload).unwrap();

        assert!(encoded.bytes.len() <= MAX_PAYLOAD_SIZE);
        assert!(encoded.dropped > 0);
        assert_eq!(encoded.included + encoded.dropped, 40);

        let parsed: TelemetryPayload = serde_json::from_slice(&encoded.bytes).unwrap();
        assert_eq!(parsed.readings.len(), encoded.included);
        assert_eq!(parsed.readings[0].sensor_id, "sensor_00");
        assert_eq!(
            parsed.readings.last().unwrap().sensor_id,
            format!("sensor_{:02}", encoded.included - 1)
        );
    }

    #[test]
    fn oversized_header_is_rejected() {
        let payload = build_payload(&"x".repeat(2000), "n", "", []);
        assert!(matches!(
            encode_payload(&payload),
            Err(ProtocolError::PayloadTooLarge(_))
        ));
    }
}
