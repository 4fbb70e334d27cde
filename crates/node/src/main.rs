//! # Sentinel Node
//!
//! Amostra os sensores cadastrados e publica telemetria via MQTT, aceitando
//! reconfiguração ao vivo pela superfície de comandos UDP.
//!
//! ## Uso
//! ```bash
//! sentinel_node                          # config.toml ao lado do executável
//! sentinel_node --config /etc/sentinel/config.toml
//! ```

mod bus;
mod command;
mod mqtt;
mod system;

use bus::HostBus;
use command::CommandServer;
use mqtt::MqttTransport;
use sentinel_core::config::NodeConfig;
use sentinel_core::node::Node;
use sentinel_core::scheduler::LinkState;
use sentinel_core::storage::FileStore;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use system::SystemClock;
use tracing::{error, info, warn};

fn main() -> ExitCode {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ── Carregar config ──
    let config_path = config_path_from_args().unwrap_or_else(NodeConfig::default_path);
    let config = NodeConfig::load(&config_path);

    // Salva config padrão se não existir
    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!("{e}");
        }
        return ExitCode::FAILURE;
    }

    // ── Persistência ──
    let store = match FileStore::open(&config.storage.dir) {
        Ok(store) => store,
        Err(e) => {
            error!("Falha ao abrir {}: {e}", config.storage.dir.display());
            return ExitCode::FAILURE;
        }
    };

    // ── Nó ──
    let transport = MqttTransport::new(
        Duration::from_secs(config.mqtt.keep_alive_secs),
        Duration::from_millis(config.mqtt.connect_timeout_ms),
    );
    let bus = HostBus::from_config(&config.bus);
    let mut node = Node::start(store, transport, bus, SystemClock::new(), config.node_options());
    node.set_local_ip(system::resolve_ip(&config.network));

    // ── Comandos ──
    let commands = match CommandServer::bind(&config.command.bind, config.command.max_per_pass) {
        Ok(server) => Some(server),
        Err(e) => {
            error!("Falha ao abrir endpoint de comandos em {}: {e}", config.command.bind);
            None
        }
    };

    // ── Banner ──
    println!();
    println!("══════════════════════════════════════════════");
    println!("   SENTINEL NODE – ATIVO");
    println!("══════════════════════════════════════════════");
    println!("  Dispositivo: {}", node.device().device_name);
    println!("  Broker:      {}:{}", node.device().broker_host, node.device().broker_port);
    println!("  Sensores:    {}", node.registry().len());
    println!("  IP:          {}", node.local_ip());
    println!("  Comandos:    udp://{}", config.command.bind);
    println!("══════════════════════════════════════════════");
    println!();

    // ── Loop principal ──
    let pause = Duration::from_millis(config.scheduler.loop_interval_ms);
    let mut previous = LinkState::Disconnected;
    loop {
        if let Some(server) = &commands {
            if let Some(request) = server.serve(&mut node) {
                node.shutdown();
                system::perform_restart(request, &config.network);
            }
        }

        let state = node.poll();
        if state == LinkState::Connected && previous != LinkState::Connected {
            node.set_local_ip(system::resolve_ip(&config.network));
            info!("Link ativo, IP {}", node.local_ip());
        }
        previous = state;

        std::thread::sleep(pause);
    }
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return Some(PathBuf::from(path));
        }
    }
    None
}
