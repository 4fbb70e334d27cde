//! Agendador de publicação e máquina de estados da conexão.
//!
//! ```text
//! DISCONNECTED ──(tentativa)──► CONNECTING ──ok──► CONNECTED
//!       ▲                           │                  │
//!       └──────────falha────────────┘◄──────queda──────┘
//! ```
//!
//! Reconexão e publicação têm cadências independentes (10 s e 30 s por
//! padrão): o link cai e volta bem antes do próximo prazo de telemetria sem
//! martelar o broker. Cada passada faz no máximo uma tentativa de conexão.

use crate::device::DeviceConfiguration;
use crate::ports::Transport;
use tracing::{debug, info, warn};

pub const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 10_000;
pub const DEFAULT_PUBLISH_INTERVAL_MS: u64 = 30_000;

/// Estado da sessão com o broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

/// Cadências do agendador (ms).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub reconnect_interval_ms: u64,
    pub publish_interval_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            reconnect_interval_ms: DEFAULT_RECONNECT_INTERVAL_MS,
            publish_interval_ms: DEFAULT_PUBLISH_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PublishScheduler {
    timings: Timings,
    state: LinkState,
    last_connect_attempt: Option<u64>,
    last_publish: u64,
    /// `configure` pendente antes do próximo `connect`
    needs_configure: bool,
}

impl PublishScheduler {
    /// O relógio de publicação começa em `now`.
    pub fn new(timings: Timings, now: u64) -> Self {
        Self {
            timings,
            state: LinkState::Disconnected,
            last_connect_attempt: None,
            last_publish: now,
            needs_configure: true,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Parte de conexão de uma passada do loop: reconecta se devido e
    /// atende o protocolo do transporte quando conectado.
    pub fn service_link<T: Transport>(&mut self, now: u64, transport: &mut T, device: &DeviceConfiguration) -> LinkState {
        if self.state == LinkState::Connected && !transport.is_connected() {
            warn!("Conexão com o broker perdida");
            self.state = LinkState::Disconnected;
        }

        if self.state != LinkState::Connected && self.connect_due(now) {
            self.attempt_connect(now, transport, device);
        }

        if self.state == LinkState::Connected {
            if let Err(e) = transport.pump() {
                warn!("Transporte falhou ao atender o protocolo: {e}");
                self.state = LinkState::Disconnected;
            }
        }

        self.state
    }

    /// Consome o slot de publicação se o intervalo venceu.
    ///
    /// O slot é consumido mesmo que nada seja publicado (token curto, link
    /// fora); não há rajada de recuperação.
    pub fn take_publish_slot(&mut self, now: u64) -> bool {
        if now.saturating_sub(self.last_publish) >= self.timings.publish_interval_ms {
            self.last_publish = now;
            true
        } else {
            false
        }
    }

    /// Publicação fire-and-forget; falha só é registrada.
    pub fn publish<T: Transport>(&mut self, transport: &mut T, topic: &str, payload: &[u8]) -> bool {
        if self.state != LinkState::Connected {
            debug!("Publicação ignorada: sem sessão com o broker");
            return false;
        }
        match transport.publish(topic, payload) {
            Ok(()) => {
                info!("→ {} bytes publicados em {topic}", payload.len());
                true
            }
            Err(e) => {
                warn!("Falha ao publicar em {topic}: {e}");
                false
            }
        }
    }

    /// Parâmetros do broker mudaram: derruba a sessão já e zera o backoff
    /// para que a próxima passada reconfigure e reconecte.
    pub fn invalidate_session<T: Transport>(&mut self, transport: &mut T) {
        transport.disconnect();
        self.state = LinkState::Disconnected;
        self.needs_configure = true;
        self.last_connect_attempt = None;
        info!("Sessão com o broker encerrada para aplicar nova configuração");
    }

    fn connect_due(&self, now: u64) -> bool {
        match self.last_connect_attempt {
            None => true,
            Some(last) => now.saturating_sub(last) >= self.timings.reconnect_interval_ms,
        }
    }

    fn attempt_connect<T: Transport>(&mut self, now: u64, transport: &mut T, device: &DeviceConfiguration) {
        self.last_connect_attempt = Some(now);
        self.state = LinkState::Connecting;

        if self.needs_configure {
            transport.configure(&device.broker_host, device.broker_port);
            self.needs_configure = false;
        }

        info!(
            "Conectando ao broker {}:{} como '{}'...",
            device.broker_host, device.broker_port, device.device_name
        );
        match transport.connect(&device.device_name, device.credentials()) {
            Ok(()) => {
                info!("✓ Conectado ao broker");
                self.state = LinkState::Connected;
            }
            Err(e) => {
                warn!(
                    "✗ Falha ao conectar: {e} (nova tentativa em {}s)",
                    self.timings.reconnect_interval_ms / 1000
                );
                self.state = LinkState::Disconnected;
            }
        }
    }
}
