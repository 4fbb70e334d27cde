//! Fakes das portas para os testes do núcleo.
//!
//! Todos compartilham estado via `Rc`, então um clone mantido pelo teste
//! enxerga o que o [`crate::node::Node`] fez com o original.

use crate::ports::{
    BlobKey, BlobStore, Clock, Credentials, SensorBus, SensorReadError, StoreError, Transport, TransportError,
};
use crate::types::{Address, Climate, DhtModel};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

// ──────────────────────────────────────────────
// Relógio manual
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }

    fn delay_ms(&self, ms: u64) {
        self.advance(ms);
    }
}

// ──────────────────────────────────────────────
// Barramento roteirizado
// ──────────────────────────────────────────────

#[derive(Debug, Default)]
struct BusState {
    climates: HashMap<Address, Climate>,
    analog: HashMap<Address, f32>,
    failing: HashSet<Address>,
    dht_transactions: usize,
    analog_transactions: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedBus {
    state: Rc<RefCell<BusState>>,
}

impl ScriptedBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_climate(&self, address: Address, temperature: f32, humidity: f32) {
        let mut state = self.state.borrow_mut();
        state.failing.remove(&address);
        state.climates.insert(address, Climate { temperature, humidity });
    }

    pub fn set_analog(&self, address: Address, value: f32) {
        self.state.borrow_mut().analog.insert(address, value);
    }

    pub fn fail(&self, address: Address) {
        self.state.borrow_mut().failing.insert(address);
    }

    pub fn dht_transactions(&self) -> usize {
        self.state.borrow().dht_transactions
    }

    pub fn analog_transactions(&self) -> usize {
        self.state.borrow().analog_transactions
    }
}

impl SensorBus for ScriptedBus {
    fn read_dht(&mut self, address: Address, _model: DhtModel) -> Result<Climate, SensorReadError> {
        let mut state = self.state.borrow_mut();
        state.dht_transactions += 1;
        if state.failing.contains(&address) {
            return Err(SensorReadError::Checksum(address));
        }
        state.climates.get(&address).copied().ok_or(SensorReadError::Timeout(address))
    }

    fn read_analog(&mut self, address: Address) -> Result<f32, SensorReadError> {
        let mut state = self.state.borrow_mut();
        state.analog_transactions += 1;
        state
            .analog
            .get(&address)
            .copied()
            .ok_or_else(|| SensorReadError::Unavailable(address, "sem ADC".into()))
    }
}

// ──────────────────────────────────────────────
// Transporte gravador
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Configure { host: String, port: u16 },
    Connect { client_id: String, user: Option<String> },
    Disconnect,
    Publish { topic: String, payload: String },
    Pump,
}

#[derive(Debug)]
struct TransportState {
    calls: Vec<Call>,
    connected: bool,
    accept_connect: bool,
    fail_pump: bool,
    fail_publish: bool,
}

#[derive(Debug, Clone)]
pub struct RecordingTransport {
    state: Rc<RefCell<TransportState>>,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self {
            state: Rc::new(RefCell::new(TransportState {
                calls: Vec::new(),
                connected: false,
                accept_connect: true,
                fail_pump: false,
                fail_publish: false,
            })),
        }
    }
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn clear(&self) {
        self.state.borrow_mut().calls.clear();
    }

    pub fn accept_connect(&self, accept: bool) {
        self.state.borrow_mut().accept_connect = accept;
    }

    pub fn fail_pump(&self, fail: bool) {
        self.state.borrow_mut().fail_pump = fail;
    }

    /// Publicações são registradas, mas recusadas (link continua de pé).
    pub fn fail_publish(&self, fail: bool) {
        self.state.borrow_mut().fail_publish = fail;
    }

    /// Simula queda do link sem `disconnect` explícito.
    pub fn drop_link(&self) {
        self.state.borrow_mut().connected = false;
    }

    pub fn connects(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, Call::Connect { .. })).count()
    }

    pub fn publishes(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Publish { topic, payload } => Some((topic, payload)),
                _ => None,
            })
            .collect()
    }
}

impl Transport for RecordingTransport {
    fn configure(&mut self, host: &str, port: u16) {
        self.state.borrow_mut().calls.push(Call::Configure {
            host: host.to_string(),
            port,
        });
    }

    fn connect(&mut self, client_id: &str, credentials: Option<Credentials<'_>>) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::Connect {
            client_id: client_id.to_string(),
            user: credentials.map(|c| c.user.to_string()),
        });
        if state.accept_connect {
            state.connected = true;
            Ok(())
        } else {
            Err(TransportError::Refused("not authorized".into()))
        }
    }

    fn disconnect(&mut self) {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::Disconnect);
        state.connected = false;
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::Publish {
            topic: topic.to_string(),
            payload: String::from_utf8_lossy(payload).into_owned(),
        });
        if !state.connected {
            Err(TransportError::NotConnected)
        } else if state.fail_publish {
            Err(TransportError::Publish("fila cheia".into()))
        } else {
            Ok(())
        }
    }

    fn pump(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::Pump);
        if state.fail_pump {
            state.connected = false;
            return Err(TransportError::Connection("connection reset".into()));
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.borrow().connected
    }
}

// ──────────────────────────────────────────────
// Persistência em memória
// ──────────────────────────────────────────────

#[derive(Debug, Default)]
struct StoreState {
    blobs: HashMap<BlobKey, Vec<u8>>,
    fail_writes: bool,
    writes: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Rc<RefCell<StoreState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blob(self, key: BlobKey, text: &str) -> Self {
        self.state.borrow_mut().blobs.insert(key, text.as_bytes().to_vec());
        self
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.borrow_mut().fail_writes = fail;
    }

    pub fn writes(&self) -> usize {
        self.state.borrow().writes
    }

    pub fn blob(&self, key: BlobKey) -> Option<String> {
        self.state
            .borrow()
            .blobs
            .get(&key)
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }
}

impl BlobStore for MemoryStore {
    fn read(&self, key: BlobKey) -> Result<Vec<u8>, StoreError> {
        self.state.borrow().blobs.get(&key).cloned().ok_or(StoreError::NotFound(key))
    }

    fn write(&mut self, key: BlobKey, bytes: &[u8]) -> Result<(), StoreError> {
        let mut state = self.state.borrow_mut();
        if state.fail_writes {
            return Err(StoreError::Io {
                key,
                source: std::io::Error::new(std::io::ErrorKind::Other, "flash cheia"),
            });
        }
        state.writes += 1;
        state.blobs.insert(key, bytes.to_vec());
        Ok(())
    }
}
