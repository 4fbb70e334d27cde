//! Configuração do dispositivo: identidade, token de telemetria e broker.
//!
//! Persistida como `device.toml`. Campos ausentes assumem o padrão e strings
//! longas demais são truncadas na fronteira de caractere.

use crate::ports::Credentials;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Tamanho mínimo do token para habilitar a publicação.
pub const MIN_TOKEN_LEN: usize = 5;

pub const MAX_DEVICE_NAME_LEN: usize = 39;
pub const MAX_TOKEN_LEN: usize = 39;
pub const MAX_HOST_LEN: usize = 63;
pub const MAX_USER_LEN: usize = 31;
pub const MAX_PASSWORD_LEN: usize = 31;

/// Erros de validação de entrada (mutação ou blob).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Porta do broker inválida: '{0}' (1–65535)")]
    InvalidPort(String),

    #[error("Tipo de sensor inválido: {0} (0–4)")]
    InvalidKind(u64),

    #[error("Id de sensor vazio")]
    EmptySensorId,
}

/// Identidade do nó e parâmetros do broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfiguration {
    /// Nome exibido e client id no broker
    pub device_name: String,
    /// Segredo; publicação desabilitada com menos de 5 caracteres
    pub telemetry_token: String,
    pub broker_host: String,
    pub broker_port: u16,
    pub broker_user: String,
    pub broker_password: String,
}

impl Default for DeviceConfiguration {
    fn default() -> Self {
        Self {
            device_name: "ESP8266_SENTINEL_DYN".into(),
            telemetry_token: String::new(),
            broker_host: "broker.hivemq.com".into(),
            broker_port: 1883,
            broker_user: String::new(),
            broker_password: String::new(),
        }
    }
}

impl DeviceConfiguration {
    pub fn publishing_enabled(&self) -> bool {
        self.telemetry_token.chars().count() >= MIN_TOKEN_LEN
    }

    /// Credenciais só quando há usuário configurado; senão conexão anônima.
    pub fn credentials(&self) -> Option<Credentials<'_>> {
        if self.broker_user.is_empty() {
            None
        } else {
            Some(Credentials {
                user: &self.broker_user,
                password: &self.broker_password,
            })
        }
    }

    /// Aplica os limites de tamanho a todos os campos.
    pub fn sanitized(mut self) -> Self {
        clamp(&mut self.device_name, MAX_DEVICE_NAME_LEN, "device_name");
        clamp(&mut self.telemetry_token, MAX_TOKEN_LEN, "telemetry_token");
        clamp(&mut self.broker_host, MAX_HOST_LEN, "broker_host");
        clamp(&mut self.broker_user, MAX_USER_LEN, "broker_user");
        clamp(&mut self.broker_password, MAX_PASSWORD_LEN, "broker_password");
        if self.broker_port == 0 {
            warn!("Porta 0 no blob de configuração, usando 1883");
            self.broker_port = Self::default().broker_port;
        }
        self
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, String> {
        let text = std::str::from_utf8(bytes).map_err(|e| e.to_string())?;
        toml::from_str::<Self>(text)
            .map(Self::sanitized)
            .map_err(|e| e.to_string())
    }

    pub fn encode(&self) -> Result<Vec<u8>, String> {
        toml::to_string_pretty(self)
            .map(String::into_bytes)
            .map_err(|e| e.to_string())
    }
}

/// Alteração parcial: só os campos presentes são aplicados.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigUpdate {
    pub device_name: Option<String>,
    pub telemetry_token: Option<String>,
    pub broker_host: Option<String>,
    pub broker_port: Option<u16>,
    pub broker_user: Option<String>,
    pub broker_password: Option<String>,
}

impl ConfigUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Dono da [`DeviceConfiguration`] em execução.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    current: DeviceConfiguration,
}

impl ConfigStore {
    pub fn new(current: DeviceConfiguration) -> Self {
        Self {
            current: current.sanitized(),
        }
    }

    pub fn get(&self) -> &DeviceConfiguration {
        &self.current
    }

    /// Aplica a alteração sobre os valores atuais.
    ///
    /// A porta já chega validada; uma porta 0 rejeita tudo sem aplicar nada.
    pub fn set(&mut self, update: ConfigUpdate) -> Result<(), ValidationError> {
        if update.broker_port == Some(0) {
            return Err(ValidationError::InvalidPort("0".into()));
        }
        let mut next = self.current.clone();
        if let Some(v) = update.device_name {
            next.device_name = v;
        }
        if let Some(v) = update.telemetry_token {
            next.telemetry_token = v;
        }
        if let Some(v) = update.broker_host {
            next.broker_host = v;
        }
        if let Some(v) = update.broker_port {
            next.broker_port = v;
        }
        if let Some(v) = update.broker_user {
            next.broker_user = v;
        }
        if let Some(v) = update.broker_password {
            next.broker_password = v;
        }
        self.current = next.sanitized();
        Ok(())
    }
}

/// Trunca em até `max` bytes sem partir um caractere UTF-8.
pub fn truncate_to(value: &mut String, max: usize) -> bool {
    if value.len() <= max {
        return false;
    }
    let mut cut = max;
    while !value.is_char_boundary(cut) {
        cut -= 1;
    }
    value.truncate(cut);
    true
}

fn clamp(value: &mut String, max: usize, field: &str) {
    if truncate_to(value, max) {
        warn!("Campo {field} truncado para {max} bytes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_threshold() {
        let mut cfg = DeviceConfiguration::default();
        assert!(!cfg.publishing_enabled());
        cfg.telemetry_token = "abcd".into();
        assert!(!cfg.publishing_enabled());
        cfg.telemetry_token = "abcde".into();
        assert!(cfg.publishing_enabled());
    }

    #[test]
    fn credentials_only_with_user() {
        let mut cfg = DeviceConfiguration::default();
        cfg.broker_password = "secret".into();
        assert_eq!(cfg.credentials(), None);
        cfg.broker_user = "node".into();
        assert_eq!(
            cfg.credentials(),
            Some(Credentials {
                user: "node",
                password: "secret"
            })
        );
    }

    #[test]
    fn set_applies_only_supplied_fields() {
        let mut store = ConfigStore::default();
        store
            .set(ConfigUpdate {
                broker_host: Some("mqtt.local".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(store.get().broker_host, "mqtt.local");
        assert_eq!(store.get().device_name, "ESP8266_SENTINEL_DYN");
        assert_eq!(store.get().broker_port, 1883);
    }

    #[test]
    fn oversized_fields_are_truncated() {
        let mut store = ConfigStore::default();
        store
            .set(ConfigUpdate {
                telemetry_token: Some("t".repeat(80)),
                broker_host: Some("h".repeat(100)),
                broker_user: Some("ç".repeat(20)),
                ..Default::default()
            })
            .unwrap();
        let cfg = store.get();
        assert_eq!(cfg.telemetry_token.len(), MAX_TOKEN_LEN);
        assert_eq!(cfg.broker_host.len(), MAX_HOST_LEN);
        // "ç" ocupa 2 bytes: 15 caracteres cabem em 31
        assert_eq!(cfg.broker_user.chars().count(), 15);
        assert_eq!(cfg.device_name, "ESP8266_SENTINEL_DYN");
    }

    #[test]
    fn zero_port_rejects_whole_update() {
        let mut store = ConfigStore::default();
        let err = store
            .set(ConfigUpdate {
                device_name: Some("other".into()),
                broker_port: Some(0),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err, ValidationError::InvalidPort("0".into()));
        assert_eq!(store.get(), &DeviceConfiguration::default());
    }

    #[test]
    fn partial_blob_uses_defaults() {
        let cfg = DeviceConfiguration::decode(b"telemetry_token = \"abc123\"\n").unwrap();
        assert_eq!(cfg.telemetry_token, "abc123");
        assert_eq!(cfg.broker_host, "broker.hivemq.com");
        assert_eq!(cfg.broker_port, 1883);
    }

    #[test]
    fn blob_roundtrip() {
        let cfg = DeviceConfiguration {
            device_name: "estufa".into(),
            broker_user: "u".into(),
            ..Default::default()
        };
        let decoded = DeviceConfiguration::decode(&cfg.encode().unwrap()).unwrap();
        assert_eq!(decoded, cfg);
    }

    #[test]
    fn corrupt_blob_is_an_error() {
        assert!(DeviceConfiguration::decode(b"broker_port = \"x\"").is_err());
    }
}
