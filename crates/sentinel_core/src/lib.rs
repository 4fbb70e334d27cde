//! # Sentinel Core
//!
//! Núcleo do nó de telemetria Sentinel: registro de sensores editável,
//! cache de aquisição, agendador de publicação com máquina de estados da
//! conexão e superfície de mutação remota.
//!
//! ## Módulos
//! - [`types`] – Sensores, endereços físicos e payload
//! - [`ports`] – Traits de persistência, transporte, barramento e relógio
//! - [`pins`] – Tabela de pinos simbólicos
//! - [`registry`] – Registro ordenado de sensores
//! - [`cache`] – Deduplicação de leituras físicas por endereço
//! - [`device`] – Configuração do dispositivo/broker
//! - [`protocol`] – Payload JSON limitado e tópico de publicação
//! - [`scheduler`] – Reconexão com backoff e cadência de publicação
//! - [`node`] – Dono único do estado e loop cooperativo
//! - [`mutation`] – Comandos remotos (add/remove/config/list/restart)
//! - [`storage`] – Persistência em arquivos
//! - [`config`] – Configuração do processo via TOML

pub mod types;
pub mod ports;
pub mod pins;
pub mod registry;
pub mod cache;
pub mod device;
pub mod protocol;
pub mod scheduler;
pub mod node;
pub mod mutation;
pub mod storage;
pub mod config;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports convenientes
pub use config::NodeConfig;
pub use device::{ConfigUpdate, DeviceConfiguration};
pub use mutation::{Command, Response, RestartRequest};
pub use node::{Node, NodeOptions};
pub use registry::SensorRegistry;
pub use scheduler::LinkState;
pub use types::{Address, SensorDefinition, SensorKind, TelemetryPayload};
