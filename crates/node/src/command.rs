//! Endpoint UDP da superfície de mutação.
//!
//! Um comando JSON por datagrama, uma resposta JSON por comando. O socket é
//! não bloqueante e atendido uma vez por passada do loop.

use sentinel_core::mutation::{RestartRequest, handle_request};
use sentinel_core::node::Node;
use sentinel_core::ports::{BlobStore, Clock, SensorBus, Transport};
use std::io::ErrorKind;
use std::net::UdpSocket;
use tracing::{debug, info, warn};

const MAX_DATAGRAM: usize = 2048;

pub struct CommandServer {
    socket: UdpSocket,
    max_per_pass: usize,
}

impl CommandServer {
    pub fn bind(addr: &str, max_per_pass: usize) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;
        info!("Comandos escutando em {}", socket.local_addr()?);
        Ok(Self {
            socket,
            max_per_pass: max_per_pass.max(1),
        })
    }

    /// Atende os comandos pendentes. Um pedido de reinício interrompe o
    /// atendimento e é devolvido depois que a resposta já saiu.
    pub fn serve<S, T, B, C>(&self, node: &mut Node<S, T, B, C>) -> Option<RestartRequest>
    where
        S: BlobStore,
        T: Transport,
        B: SensorBus,
        C: Clock,
    {
        let mut buf = [0u8; MAX_DATAGRAM];
        for _ in 0..self.max_per_pass {
            let (size, source) = match self.socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => return None,
                Err(e) => {
                    warn!("Erro ao receber comando: {e}");
                    return None;
                }
            };

            let response = handle_request(node, &buf[..size]);
            if response.ok {
                debug!("Comando de {source} executado");
            } else {
                info!("Comando de {source} recusado: {}", response.error.as_deref().unwrap_or("?"));
            }

            match serde_json::to_vec(&response) {
                Ok(reply) => {
                    if let Err(e) = self.socket.send_to(&reply, source) {
                        warn!("Erro ao responder {source}: {e}");
                    }
                }
                Err(e) => warn!("Erro ao serializar resposta: {e}"),
            }

            if response.restart.is_some() {
                return response.restart;
            }
        }
        None
    }
}
