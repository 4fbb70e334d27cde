//! Superfície de mutação remota.
//!
//! Comandos JSON (um por datagrama) que adicionam/removem sensores, alteram a
//! configuração, listam o estado e pedem reinício. Cada comando é síncrono e
//! atômico em relação ao loop cooperativo.
//!
//! ```text
//! {"op":"add","id":"T1","pin":"D1","unit":"C","kind":0}
//! {"op":"remove","index":0}            {"op":"remove","id":"T1"}
//! {"op":"update_config","token":"abc123","broker_port":"1884"}
//! {"op":"list"}   {"op":"reboot"}   {"op":"reset_network"}
//! ```

use crate::device::{ConfigUpdate, ValidationError, truncate_to};
use crate::node::Node;
use crate::pins;
use crate::ports::{BlobStore, Clock, SensorBus, StoreError, Transport};
use crate::registry::RegistryError;
use crate::scheduler::LinkState;
use crate::types::{Address, SensorDefinition, SensorKind};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const MAX_SENSOR_ID_LEN: usize = 32;
pub const MAX_UNIT_LEN: usize = 16;

/// Erros das operações de mutação.
#[derive(Debug, thiserror::Error)]
pub enum MutationError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A alteração foi aplicada em memória, mas não chegou ao meio durável.
    #[error("Alteração aplicada, mas não persistida: {0}")]
    NotPersisted(#[source] StoreError),

    #[error("Erro ao serializar configuração: {0}")]
    Encode(String),
}

// ──────────────────────────────────────────────
// Comandos
// ──────────────────────────────────────────────

/// Pino como símbolo (`"D1"`) ou inteiro cru.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PinInput {
    Raw(i64),
    Symbol(String),
}

/// Porta como número ou texto numérico.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PortInput {
    Number(u64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    Add {
        id: String,
        pin: PinInput,
        #[serde(default)]
        unit: String,
        kind: u64,
    },
    Remove {
        #[serde(default)]
        index: Option<usize>,
        #[serde(default)]
        id: Option<String>,
    },
    UpdateConfig {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        token: Option<String>,
        #[serde(default)]
        broker_host: Option<String>,
        #[serde(default)]
        broker_port: Option<PortInput>,
        #[serde(default)]
        broker_user: Option<String>,
        #[serde(default)]
        broker_password: Option<String>,
    },
    List,
    Reboot,
    ResetNetwork,
}

/// Reinício pedido pelo operador; executado pelo dono do processo depois da resposta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartRequest {
    Reboot,
    /// Esquecer credenciais de rede e voltar ao modo de provisionamento
    ResetNetwork,
}

// ──────────────────────────────────────────────
// Respostas
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorView {
    pub index: usize,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin: Option<&'static str>,
    pub address: i32,
    pub unit: String,
    pub kind: u8,
    pub kind_label: &'static str,
    /// `null` quando a leitura falhou
    pub value: Option<f32>,
}

/// Estado do dispositivo; segredos nunca são ecoados.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceView {
    pub device_name: String,
    pub broker_host: String,
    pub broker_port: u16,
    pub broker_user: String,
    pub token_set: bool,
    pub publishing_enabled: bool,
    pub link: &'static str,
    pub ip: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persisted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensors: Option<Vec<SensorView>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart: Option<RestartRequest>,
}

impl Response {
    fn ok() -> Self {
        Self {
            ok: true,
            ..Default::default()
        }
    }

    pub fn failure(error: impl ToString) -> Self {
        Self {
            ok: false,
            error: Some(error.to_string()),
            ..Default::default()
        }
    }

    /// Converte o resultado de uma mutação; falha de escrita não é falha da operação.
    fn from_mutation(result: Result<(), MutationError>) -> Self {
        match result {
            Ok(()) => Self {
                persisted: Some(true),
                ..Self::ok()
            },
            Err(MutationError::NotPersisted(e)) => Self {
                persisted: Some(false),
                warning: Some(e.to_string()),
                ..Self::ok()
            },
            Err(e) => Self::failure(e),
        }
    }
}

// ──────────────────────────────────────────────
// Validação
// ──────────────────────────────────────────────

/// Monta a definição a partir da entrada externa.
pub fn sensor_from_input(id: &str, pin: &PinInput, unit: &str, kind: u64) -> Result<SensorDefinition, ValidationError> {
    let kind = u8::try_from(kind)
        .ok()
        .and_then(SensorKind::from_index)
        .ok_or(ValidationError::InvalidKind(kind))?;

    let mut id = id.trim().to_string();
    if id.is_empty() {
        return Err(ValidationError::EmptySensorId);
    }
    if truncate_to(&mut id, MAX_SENSOR_ID_LEN) {
        warn!("Id de sensor truncado para {MAX_SENSOR_ID_LEN} bytes");
    }
    let mut unit = unit.to_string();
    if truncate_to(&mut unit, MAX_UNIT_LEN) {
        warn!("Unidade truncada para {MAX_UNIT_LEN} bytes");
    }

    let address = match pin {
        PinInput::Symbol(symbol) => pins::resolve(symbol),
        PinInput::Raw(raw) => match i32::try_from(*raw) {
            Ok(raw) => Address(raw),
            Err(_) => {
                warn!("Pino {raw} fora do intervalo, usando endereço 0");
                Address(0)
            }
        },
    };

    Ok(SensorDefinition::new(id, address, unit, kind))
}

pub fn port_from_input(input: &PortInput) -> Result<u16, ValidationError> {
    let parsed = match input {
        PortInput::Number(n) => u16::try_from(*n).ok(),
        PortInput::Text(s) => s.trim().parse::<u16>().ok(),
    };
    match parsed {
        Some(port) if port > 0 => Ok(port),
        _ => Err(ValidationError::InvalidPort(match input {
            PortInput::Number(n) => n.to_string(),
            PortInput::Text(s) => s.clone(),
        })),
    }
}

// ──────────────────────────────────────────────
// Despacho
// ──────────────────────────────────────────────

/// Decodifica e executa um comando recebido como bytes JSON.
pub fn handle_request<S, T, B, C>(node: &mut Node<S, T, B, C>, request: &[u8]) -> Response
where
    S: BlobStore,
    T: Transport,
    B: SensorBus,
    C: Clock,
{
    match serde_json::from_slice::<Command>(request) {
        Ok(command) => apply(node, command),
        Err(e) => Response::failure(format!("Comando inválido: {e}")),
    }
}

/// Executa um comando sobre o nó.
pub fn apply<S, T, B, C>(node: &mut Node<S, T, B, C>, command: Command) -> Response
where
    S: BlobStore,
    T: Transport,
    B: SensorBus,
    C: Clock,
{
    match command {
        Command::Add { id, pin, unit, kind } => match sensor_from_input(&id, &pin, &unit, kind) {
            Ok(definition) => Response::from_mutation(node.add_sensor(definition)),
            Err(e) => Response::failure(e),
        },

        Command::Remove { index, id } => {
            let result = match (index, id) {
                (Some(index), None) => node.remove_sensor_at(index),
                (None, Some(id)) => node.remove_sensor(&id),
                _ => return Response::failure("Informe exatamente um de 'index' ou 'id'"),
            };
            match result {
                Ok(removal) => Response {
                    removed: Some(removal.definition.id),
                    ..Response::from_mutation(removal.persisted)
                },
                Err(e) => Response::from_mutation(Err(e)),
            }
        }

        Command::UpdateConfig {
            name,
            token,
            broker_host,
            broker_port,
            broker_user,
            broker_password,
        } => {
            let broker_port = match broker_port.as_ref().map(port_from_input).transpose() {
                Ok(port) => port,
                Err(e) => return Response::failure(e),
            };
            let update = ConfigUpdate {
                device_name: name,
                telemetry_token: token,
                broker_host,
                broker_port,
                broker_user,
                broker_password,
            };
            if update.is_empty() {
                return Response::failure("Nenhum campo informado");
            }
            Response::from_mutation(node.update_config(update))
        }

        Command::List => Response {
            sensors: Some(sensor_views(node)),
            device: Some(device_view(node)),
            ..Response::ok()
        },

        Command::Reboot => Response {
            restart: Some(RestartRequest::Reboot),
            ..Response::ok()
        },

        Command::ResetNetwork => Response {
            restart: Some(RestartRequest::ResetNetwork),
            ..Response::ok()
        },
    }
}

fn sensor_views<S, T, B, C>(node: &mut Node<S, T, B, C>) -> Vec<SensorView>
where
    S: BlobStore,
    T: Transport,
    B: SensorBus,
    C: Clock,
{
    node.live_readings()
        .into_iter()
        .map(|live| SensorView {
            index: live.index,
            pin: pins::symbol_of(live.definition.address),
            address: live.definition.address.0,
            kind: live.definition.kind.index(),
            kind_label: live.definition.kind.label(),
            id: live.definition.id,
            unit: live.definition.unit,
            value: live.value,
        })
        .collect()
}

fn device_view<S, T, B, C>(node: &Node<S, T, B, C>) -> DeviceView
where
    S: BlobStore,
    T: Transport,
    B: SensorBus,
    C: Clock,
{
    let device = node.device();
    DeviceView {
        device_name: device.device_name.clone(),
        broker_host: device.broker_host.clone(),
        broker_port: device.broker_port,
        broker_user: device.broker_user.clone(),
        token_set: !device.telemetry_token.is_empty(),
        publishing_enabled: device.publishing_enabled(),
        link: match node.link_state() {
            LinkState::Disconnected => "disconnected",
            LinkState::Connecting => "connecting",
            LinkState::Connected => "connected",
        },
        ip: node.local_ip().to_string(),
    }
}
