//! Cache de aquisição de valores.
//!
//! Camada entre o registro e o I/O físico. Sensores lógicos distintos
//! (temperatura e umidade) costumam dividir a mesma sonda DHT; sem o cache,
//! ler os dois no mesmo tick dobraria as transações físicas e aumentaria as
//! falhas de timing do protocolo.
//!
//! O cache é um mapa pequeno endereço → última leitura, com capacidade igual
//! ao número de sondas distintas no registro (mínimo 1). Ao encher, a entrada
//! mais antiga é descartada.

use crate::ports::{Clock, SensorBus};
use crate::types::{Address, Climate, SensorDefinition};
use tracing::{debug, trace};

/// Validade padrão de uma leitura física.
pub const DEFAULT_TTL_MS: u64 = 2_000;

/// Última leitura bem-sucedida de uma sonda.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheEntry {
    pub address: Address,
    pub climate: Climate,
    /// Instante da leitura (ms do [`Clock`])
    pub taken_at: u64,
}

/// Cache exclusivo do caminho de leitura; registro e agendador nunca o tocam.
#[derive(Debug, Clone)]
pub struct AcquisitionCache {
    entries: Vec<CacheEntry>,
    capacity: usize,
    ttl_ms: u64,
}

impl Default for AcquisitionCache {
    fn default() -> Self {
        Self::new(1, DEFAULT_TTL_MS)
    }
}

impl AcquisitionCache {
    pub fn new(capacity: usize, ttl_ms: u64) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
            ttl_ms,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Ajusta a capacidade; descarta as entradas mais antigas se sobrar.
    pub fn resize(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.entries.len() > self.capacity {
            self.evict_oldest();
        }
    }

    /// Entrada válida para o endereço em `now`, se houver.
    pub fn lookup(&self, address: Address, now: u64) -> Option<&CacheEntry> {
        self.entries
            .iter()
            .find(|e| e.address == address && now.saturating_sub(e.taken_at) < self.ttl_ms)
    }

    /// Valor atual do sensor, ou NaN se a leitura falhar.
    pub fn read<B: SensorBus, C: Clock>(&mut self, definition: &SensorDefinition, bus: &mut B, clock: &C) -> f32 {
        let (Some(model), Some(axis)) = (definition.kind.dht_model(), definition.kind.axis()) else {
            return read_analog(definition, bus);
        };

        if definition.address.is_analog_channel() {
            clock.delay_ms(model.settle_ms());
            return match bus.read_dht(definition.address, model) {
                Ok(climate) => climate.get(axis),
                Err(e) => {
                    debug!("Sensor '{}': {e}", definition.id);
                    f32::NAN
                }
            };
        }

        if let Some(entry) = self.lookup(definition.address, clock.now_ms()) {
            trace!("Cache hit para '{}' no endereço {}", definition.id, definition.address);
            return entry.climate.get(axis);
        }

        clock.delay_ms(model.settle_ms());
        match bus.read_dht(definition.address, model) {
            Ok(climate) => {
                self.store(CacheEntry {
                    address: definition.address,
                    climate,
                    taken_at: clock.now_ms(),
                });
                climate.get(axis)
            }
            Err(e) => {
                debug!("Sensor '{}': {e}", definition.id);
                f32::NAN
            }
        }
    }

    fn store(&mut self, entry: CacheEntry) {
        if let Some(slot) = self.entries.iter_mut().find(|e| e.address == entry.address) {
            *slot = entry;
            return;
        }
        if self.entries.len() >= self.capacity {
            self.evict_oldest();
        }
        self.entries.push(entry);
    }

    fn evict_oldest(&mut self) {
        if let Some(oldest) = self
            .entries
            .iter()
            .enumerate()
            .min_by_key(|(_, e)| e.taken_at)
            .map(|(i, _)| i)
        {
            self.entries.swap_remove(oldest);
        }
    }
}

fn read_analog<B: SensorBus>(definition: &SensorDefinition, bus: &mut B) -> f32 {
    match bus.read_analog(definition.address) {
        Ok(value) => value,
        Err(e) => {
            debug!("Sensor '{}': {e}", definition.id);
            f32::NAN
        }
    }
}
