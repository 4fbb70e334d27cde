//! Portas para os colaboradores externos do núcleo.
//!
//! O núcleo não conhece o hardware, o broker nem o meio de persistência:
//! conversa apenas com estes traits. O binário `sentinel_node` fornece as
//! implementações reais; os testes usam fakes.

use crate::types::{Address, Climate, DhtModel};

// ──────────────────────────────────────────────
// Persistência
// ──────────────────────────────────────────────

/// Os dois blobs persistidos pelo nó.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlobKey {
    /// Identidade do dispositivo e parâmetros do broker
    Device,
    /// Registro de sensores
    Sensors,
}

impl BlobKey {
    pub fn file_name(self) -> &'static str {
        match self {
            BlobKey::Device => "device.toml",
            BlobKey::Sensors => "sensors.toml",
        }
    }
}

/// Erros do adaptador de persistência.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Blob {} não encontrado", .0.file_name())]
    NotFound(BlobKey),

    #[error("Erro de E/S em {}: {source}", key.file_name())]
    Io {
        key: BlobKey,
        #[source]
        source: std::io::Error,
    },
}

/// Leitura/escrita opaca de blobs em meio durável.
pub trait BlobStore {
    fn read(&self, key: BlobKey) -> Result<Vec<u8>, StoreError>;

    fn write(&mut self, key: BlobKey, bytes: &[u8]) -> Result<(), StoreError>;
}

// ──────────────────────────────────────────────
// Transporte (publish/subscribe)
// ──────────────────────────────────────────────

/// Erros de rede do cliente de transporte.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Sem sessão ativa com o broker")]
    NotConnected,

    #[error("Broker recusou a conexão: {0}")]
    Refused(String),

    #[error("Tempo esgotado aguardando o broker")]
    Timeout,

    #[error("Falha de conexão: {0}")]
    Connection(String),

    #[error("Falha ao publicar: {0}")]
    Publish(String),
}

/// Credenciais de autenticação no broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Credentials<'a> {
    pub user: &'a str,
    pub password: &'a str,
}

/// Cliente publish/subscribe. A política de quando chamar cada método
/// pertence ao [`crate::scheduler::PublishScheduler`].
pub trait Transport {
    /// Define host/porta usados no próximo `connect`.
    fn configure(&mut self, host: &str, port: u16);

    /// Abre sessão; `None` conecta anonimamente.
    fn connect(&mut self, client_id: &str, credentials: Option<Credentials<'_>>) -> Result<(), TransportError>;

    fn disconnect(&mut self);

    /// Publicação fire-and-forget.
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError>;

    /// Atende keepalive e mensagens de entrada. Chamado a cada passada enquanto conectado.
    fn pump(&mut self) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;
}

// ──────────────────────────────────────────────
// Barramento de sensores
// ──────────────────────────────────────────────

/// Falha de leitura física. No núcleo vira NaN, nunca um abort.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SensorReadError {
    #[error("Timeout aguardando resposta do sensor no endereço {0}")]
    Timeout(Address),

    #[error("Checksum inválido no endereço {0}")]
    Checksum(Address),

    #[error("Dispositivo indisponível no endereço {0}: {1}")]
    Unavailable(Address, String),
}

/// Transações físicas cruas. Não faz cache nem espera de acomodação.
pub trait SensorBus {
    fn read_dht(&mut self, address: Address, model: DhtModel) -> Result<Climate, SensorReadError>;

    fn read_analog(&mut self, address: Address) -> Result<f32, SensorReadError>;
}

// ──────────────────────────────────────────────
// Relógio
// ──────────────────────────────────────────────

/// Tempo monotônico em milissegundos e espera bloqueante.
pub trait Clock {
    fn now_ms(&self) -> u64;

    /// Bloqueia o loop inteiro pelo período (custo aceito no modelo cooperativo).
    fn delay_ms(&self, ms: u64);
}
