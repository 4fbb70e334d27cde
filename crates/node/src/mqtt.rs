//! Transporte MQTT sobre o cliente síncrono do `rumqttc`.
//!
//! O event loop do `rumqttc` reconecta sozinho ao ser sondado depois de um
//! erro; aqui a sessão é descartada na primeira falha para que a política de
//! reconexão fique só com o agendador do núcleo.

use rumqttc::{Client, ConnectReturnCode, Connection, Event, MqttOptions, Packet, QoS, RecvTimeoutError};
use sentinel_core::ports::{Credentials, Transport, TransportError};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Espera máxima por evento dentro de um `pump`.
const PUMP_WAIT: Duration = Duration::from_millis(5);
/// Eventos atendidos por `pump`, para não segurar o loop.
const MAX_EVENTS_PER_PUMP: usize = 16;
const REQUEST_CAPACITY: usize = 16;

struct Session {
    client: Client,
    connection: Connection,
}

pub struct MqttTransport {
    host: String,
    port: u16,
    keep_alive: Duration,
    connect_timeout: Duration,
    session: Option<Session>,
}

impl MqttTransport {
    pub fn new(keep_alive: Duration, connect_timeout: Duration) -> Self {
        Self {
            host: String::new(),
            port: 1883,
            keep_alive,
            connect_timeout,
            session: None,
        }
    }
}

impl Transport for MqttTransport {
    fn configure(&mut self, host: &str, port: u16) {
        debug!("Broker configurado: {host}:{port}");
        self.host = host.to_string();
        self.port = port;
    }

    fn connect(&mut self, client_id: &str, credentials: Option<Credentials<'_>>) -> Result<(), TransportError> {
        self.session = None;

        let mut options = MqttOptions::new(client_id, self.host.as_str(), self.port);
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(true);
        if let Some(c) = credentials {
            options.set_credentials(c.user, c.password);
        }

        let (client, mut connection) = Client::new(options, REQUEST_CAPACITY);
        let deadline = Instant::now() + self.connect_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(TransportError::Timeout);
            }
            match connection.recv_timeout(remaining) {
                Ok(Ok(Event::Incoming(Packet::ConnAck(ack)))) => {
                    if ack.code != ConnectReturnCode::Success {
                        return Err(TransportError::Refused(format!("{:?}", ack.code)));
                    }
                    self.session = Some(Session { client, connection });
                    return Ok(());
                }
                Ok(Ok(event)) => trace!(?event, "Evento MQTT durante conexão"),
                Ok(Err(e)) => return Err(TransportError::Connection(e.to_string())),
                Err(RecvTimeoutError::Timeout) => return Err(TransportError::Timeout),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(TransportError::Connection("event loop encerrado".into()));
                }
            }
        }
    }

    fn disconnect(&mut self) {
        if let Some(mut session) = self.session.take() {
            // Dá uma chance do DISCONNECT sair antes de largar o socket
            if session.client.try_disconnect().is_ok() {
                let _ = session.connection.recv_timeout(Duration::from_millis(100));
            }
            debug!("Sessão MQTT encerrada");
        }
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        let session = self.session.as_mut().ok_or(TransportError::NotConnected)?;
        session
            .client
            .try_publish(topic, QoS::AtMostOnce, false, payload.to_vec())
            .map_err(|e| TransportError::Publish(e.to_string()))?;
        // Escoa a fila para o pacote sair ainda nesta passada
        self.pump()
    }

    fn pump(&mut self) -> Result<(), TransportError> {
        let session = self.session.as_mut().ok_or(TransportError::NotConnected)?;
        let result = drain(&mut session.connection);
        if result.is_err() {
            self.session = None;
        }
        result
    }

    fn is_connected(&self) -> bool {
        self.session.is_some()
    }
}

fn drain(connection: &mut Connection) -> Result<(), TransportError> {
    for _ in 0..MAX_EVENTS_PER_PUMP {
        match connection.recv_timeout(PUMP_WAIT) {
            Ok(Ok(Event::Incoming(Packet::Disconnect))) => {
                return Err(TransportError::Connection("broker encerrou a sessão".into()));
            }
            Ok(Ok(event)) => trace!(?event, "Evento MQTT"),
            Ok(Err(e)) => return Err(TransportError::Connection(e.to_string())),
            Err(RecvTimeoutError::Timeout) => return Ok(()),
            Err(RecvTimeoutError::Disconnected) => {
                return Err(TransportError::Connection("event loop encerrado".into()));
            }
        }
    }
    Ok(())
}
