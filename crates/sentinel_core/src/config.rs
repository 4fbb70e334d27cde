//! Configuração do processo hospedeiro via TOML.
//!
//! Diferente do `device.toml` (editável remotamente), este `config.toml`
//! descreve onde e como o nó roda: diretório de dados, cadências, barramento
//! de sensores e endpoint de comandos.

use crate::cache::DEFAULT_TTL_MS;
use crate::node::NodeOptions;
use crate::scheduler::{DEFAULT_PUBLISH_INTERVAL_MS, DEFAULT_RECONNECT_INTERVAL_MS, Timings};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Erro ao ler {}: {source}", .path.display())]
    Read { path: PathBuf, source: std::io::Error },

    #[error("Erro ao parsear {}: {source}", .path.display())]
    Parse { path: PathBuf, source: toml::de::Error },

    #[error("Erro ao serializar configuração: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("Erro ao gravar {}: {source}", .path.display())]
    Write { path: PathBuf, source: std::io::Error },
}

/// Onde ficam os blobs persistidos.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Diretório de `device.toml` e `sensors.toml`
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
        }
    }
}

/// Cadências do loop (milissegundos).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub publish_interval_ms: u64,
    pub reconnect_interval_ms: u64,
    pub cache_ttl_ms: u64,
    /// Pausa entre passadas do loop
    pub loop_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            publish_interval_ms: DEFAULT_PUBLISH_INTERVAL_MS,
            reconnect_interval_ms: DEFAULT_RECONNECT_INTERVAL_MS,
            cache_ttl_ms: DEFAULT_TTL_MS,
            loop_interval_ms: 20,
        }
    }
}

/// Parâmetros de sessão MQTT que não são editáveis remotamente.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub keep_alive_secs: u64,
    pub connect_timeout_ms: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            keep_alive_secs: 15,
            connect_timeout_ms: 5_000,
        }
    }
}

/// Endpoint UDP da superfície de mutação.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    pub bind: String,
    /// Máximo de comandos atendidos por passada
    pub max_per_pass: usize,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".into(),
            max_per_pass: 8,
        }
    }
}

/// Implementação do barramento de sensores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusBackend {
    /// Leituras sintéticas (sem hardware)
    Simulated,
    /// Drivers IIO do Linux (`dht11`, ADC) via sysfs
    Iio,
}

/// Sonda DHT exposta como dispositivo IIO.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeMapping {
    pub address: i32,
    /// Ex.: `iio:device0`
    pub device: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub backend: BusBackend,
    pub iio_root: PathBuf,
    /// Dispositivo IIO do ADC (canal analógico)
    pub adc_device: String,
    pub probes: Vec<ProbeMapping>,
    /// Probabilidade de falha simulada (0.0–1.0)
    pub failure_rate: f64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            backend: BusBackend::Simulated,
            iio_root: PathBuf::from("/sys/bus/iio/devices"),
            adc_device: "iio:device0".into(),
            probes: Vec::new(),
            failure_rate: 0.0,
        }
    }
}

/// Rede e colaborador de provisionamento.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// IP reportado no payload (vazio = detectar)
    pub ip: String,
    /// Arquivo de credenciais apagado por `reset_network` (vazio = nenhum)
    pub credentials_file: String,
}

/// Configuração raiz do processo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub storage: StorageConfig,
    pub scheduler: SchedulerConfig,
    pub mqtt: MqttConfig,
    pub command: CommandConfig,
    pub bus: BusConfig,
    pub network: NetworkConfig,
}

impl NodeConfig {
    /// Lê `path`; `Ok(None)` quando o arquivo ainda não existe.
    pub fn read(path: &Path) -> Result<Option<Self>, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        toml::from_str(&content)
            .map(Some)
            .map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Como [`NodeConfig::read`], mas qualquer problema vira configuração padrão.
    pub fn load(path: &Path) -> Self {
        match Self::read(path) {
            Ok(Some(config)) => {
                info!("Configuração carregada de {}", path.display());
                config
            }
            Ok(None) => {
                info!("{} ausente, usando configuração padrão", path.display());
                Self::default()
            }
            Err(e) => {
                warn!("{e}; usando configuração padrão");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Configuração salva em {}", path.display());
        Ok(())
    }

    /// `config.toml` ao lado do executável (ou no diretório atual).
    pub fn default_path() -> PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(CONFIG_FILE)))
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE))
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.scheduler.publish_interval_ms < 1_000 {
            errors.push(format!(
                "Intervalo de publicação muito curto: {} ms (mínimo 1000)",
                self.scheduler.publish_interval_ms
            ));
        }
        if self.scheduler.reconnect_interval_ms < 1_000 {
            errors.push(format!(
                "Intervalo de reconexão muito curto: {} ms (mínimo 1000)",
                self.scheduler.reconnect_interval_ms
            ));
        }
        if self.scheduler.loop_interval_ms > 1_000 {
            errors.push(format!(
                "Pausa do loop longa demais: {} ms (máximo 1000)",
                self.scheduler.loop_interval_ms
            ));
        }
        if self.mqtt.keep_alive_secs < 5 {
            errors.push(format!(
                "Keep-alive MQTT inválido: {} s (mínimo 5)",
                self.mqtt.keep_alive_secs
            ));
        }
        if self.command.bind.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!("Endereço de comandos inválido: '{}'", self.command.bind));
        }
        if !(0.0..=1.0).contains(&self.bus.failure_rate) {
            errors.push(format!(
                "Taxa de falha simulada inválida: {} (0.0–1.0)",
                self.bus.failure_rate
            ));
        }

        errors
    }

    /// Parâmetros de runtime do [`crate::node::Node`].
    pub fn node_options(&self) -> NodeOptions {
        NodeOptions {
            timings: Timings {
                reconnect_interval_ms: self.scheduler.reconnect_interval_ms,
                publish_interval_ms: self.scheduler.publish_interval_ms,
            },
            cache_ttl_ms: self.scheduler.cache_ttl_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = NodeConfig::default();
        let errors = config.validate();
        assert!(errors.is_empty(), "Erros: {:?}", errors);
    }

    #[test]
    fn roundtrip_toml() {
        let mut config = NodeConfig::default();
        config.bus.probes.push(ProbeMapping {
            address: 5,
            device: "iio:device1".into(),
        });
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: NodeConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.bus.probes, config.bus.probes);
        assert_eq!(parsed.command.bind, config.command.bind);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let partial = r#"
[scheduler]
publish_interval_ms = 60000

[bus]
backend = "iio"
"#;
        let config: NodeConfig = toml::from_str(partial).unwrap();
        assert_eq!(config.scheduler.publish_interval_ms, 60_000);
        // Outros campos devem ter valor padrão
        assert_eq!(config.scheduler.reconnect_interval_ms, 10_000);
        assert_eq!(config.bus.backend, BusBackend::Iio);
        assert_eq!(config.storage.dir, PathBuf::from("data"));
    }

    #[test]
    fn invalid_values_are_reported() {
        let mut config = NodeConfig::default();
        config.mqtt.keep_alive_secs = 1;
        config.command.bind = "nowhere".into();
        config.bus.failure_rate = 2.0;
        assert_eq!(config.validate().len(), 3);
    }

    fn temp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("sentinel-config-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(CONFIG_FILE)
    }

    #[test]
    fn missing_file_reads_as_none() {
        let path = temp_path("missing");
        assert!(NodeConfig::read(&path).unwrap().is_none());
        assert_eq!(NodeConfig::load(&path).command.bind, "0.0.0.0:8080");
    }

    #[test]
    fn saved_file_reads_back() {
        let path = temp_path("saved");
        let mut config = NodeConfig::default();
        config.scheduler.publish_interval_ms = 45_000;
        config.save(&path).unwrap();
        let read = NodeConfig::read(&path).unwrap().unwrap();
        assert_eq!(read.scheduler.publish_interval_ms, 45_000);
    }

    #[test]
    fn broken_file_is_a_parse_error_and_loads_defaults() {
        let path = temp_path("broken");
        std::fs::write(&path, "[scheduler\npublish_interval_ms = ").unwrap();
        assert!(matches!(NodeConfig::read(&path), Err(ConfigError::Parse { .. })));
        assert_eq!(NodeConfig::load(&path).scheduler.publish_interval_ms, 30_000);
    }

    #[test]
    fn node_options_follow_scheduler_section() {
        let mut config = NodeConfig::default();
        config.scheduler.cache_ttl_ms = 500;
        let options = config.node_options();
        assert_eq!(options.cache_ttl_ms, 500);
        assert_eq!(options.timings.publish_interval_ms, 30_000);
    }
}
