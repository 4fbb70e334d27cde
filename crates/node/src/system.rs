//! Relógio do sistema, IP local e reinícios pedidos pelo operador.

use sentinel_core::config::NetworkConfig;
use sentinel_core::mutation::RestartRequest;
use sentinel_core::ports::Clock;
use std::net::{IpAddr, UdpSocket};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Relógio monotônico a partir do início do processo.
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn delay_ms(&self, ms: u64) {
        std::thread::sleep(Duration::from_millis(ms));
    }
}

/// IP da interface de saída padrão (nenhum pacote é enviado).
pub fn detect_local_ip() -> Option<IpAddr> {
    let sock = UdpSocket::bind("0.0.0.0:0").ok()?;
    sock.connect("8.8.8.8:80").ok()?;
    sock.local_addr().ok().map(|addr| addr.ip())
}

/// IP a reportar: override da configuração ou detectado.
pub fn resolve_ip(network: &NetworkConfig) -> String {
    if !network.ip.is_empty() {
        return network.ip.clone();
    }
    detect_local_ip()
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "0.0.0.0".into())
}

/// Executa o reinício pedido. Sem volta: o supervisor sobe o processo de novo.
pub fn perform_restart(request: RestartRequest, network: &NetworkConfig) -> ! {
    match request {
        RestartRequest::Reboot => info!("Reiniciando o nó..."),
        RestartRequest::ResetNetwork => {
            if network.credentials_file.is_empty() {
                warn!("Nenhum arquivo de credenciais configurado para esquecer");
            } else {
                match std::fs::remove_file(&network.credentials_file) {
                    Ok(()) => info!("Credenciais de rede apagadas: {}", network.credentials_file),
                    Err(e) => error!("Falha ao apagar {}: {e}", network.credentials_file),
                }
            }
            info!("Reiniciando em modo de provisionamento...");
        }
    }
    std::process::exit(0)
}
