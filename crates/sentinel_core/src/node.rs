//! O nó de telemetria: dono único do registro, da configuração, do cache e
//! do agendador.
//!
//! Tudo roda dentro de um loop cooperativo de thread única: cada operação
//! (passada do agendador, mutação remota) termina antes da próxima começar,
//! então não há locks. Mutações fazem write-through na persistência; se a
//! escrita falha, o estado em memória continua valendo para a sessão e o
//! chamador recebe [`MutationError::NotPersisted`].

use crate::cache::{AcquisitionCache, DEFAULT_TTL_MS};
use crate::device::{ConfigStore, ConfigUpdate, DeviceConfiguration};
use crate::mutation::MutationError;
use crate::ports::{BlobKey, BlobStore, Clock, SensorBus, StoreError, Transport};
use crate::protocol::{build_payload, encode_payload, topic_for};
use crate::registry::SensorRegistry;
use crate::scheduler::{LinkState, PublishScheduler, Timings};
use crate::types::{Reading, SensorDefinition, TelemetryPayload};
use tracing::{debug, error, info, warn};

/// Parâmetros de runtime do nó.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeOptions {
    pub timings: Timings,
    pub cache_ttl_ms: u64,
}

impl Default for NodeOptions {
    fn default() -> Self {
        Self {
            timings: Timings::default(),
            cache_ttl_ms: DEFAULT_TTL_MS,
        }
    }
}

/// Sensor com seu índice atual e valor ao vivo (`None` se a leitura falhou).
#[derive(Debug, Clone, PartialEq)]
pub struct LiveReading {
    pub index: usize,
    pub definition: SensorDefinition,
    pub value: Option<f32>,
}

/// Sensor retirado do registro. A remoção vale em memória mesmo quando
/// `persisted` traz erro.
#[derive(Debug)]
pub struct Removal {
    pub definition: SensorDefinition,
    pub persisted: Result<(), MutationError>,
}

pub struct Node<S, T, B, C> {
    store: S,
    transport: T,
    bus: B,
    clock: C,
    registry: SensorRegistry,
    config: ConfigStore,
    cache: AcquisitionCache,
    scheduler: PublishScheduler,
    local_ip: String,
}

impl<S, T, B, C> Node<S, T, B, C>
where
    S: BlobStore,
    T: Transport,
    B: SensorBus,
    C: Clock,
{
    /// Carrega os dois blobs; ausente ou corrompido vira padrão, nunca erro fatal.
    pub fn start(store: S, transport: T, bus: B, clock: C, options: NodeOptions) -> Self {
        let config = ConfigStore::new(load_device(&store));
        let registry = load_registry(&store);
        let cache = AcquisitionCache::new(registry.probe_addresses().len(), options.cache_ttl_ms);
        let scheduler = PublishScheduler::new(options.timings, clock.now_ms());

        info!(
            "Nó '{}' iniciado com {} sensores (broker {}:{})",
            config.get().device_name,
            registry.len(),
            config.get().broker_host,
            config.get().broker_port
        );

        Self {
            store,
            transport,
            bus,
            clock,
            registry,
            config,
            cache,
            scheduler,
            local_ip: String::from("0.0.0.0"),
        }
    }

    // ──────────────────────────────────────────
    // Loop de controle
    // ──────────────────────────────────────────

    /// Uma passada do loop: serviço do link e, se devido, publicação.
    pub fn poll(&mut self) -> LinkState {
        let now = self.clock.now_ms();
        let state = self.scheduler.service_link(now, &mut self.transport, self.config.get());

        let now = self.clock.now_ms();
        if self.scheduler.take_publish_slot(now) {
            self.publish_tick();
        }
        state
    }

    fn publish_tick(&mut self) {
        if !self.config.get().publishing_enabled() {
            debug!("Publicação desabilitada: token ausente ou curto demais");
            return;
        }
        if self.scheduler.state() != LinkState::Connected {
            debug!("Tick de publicação sem sessão com o broker, aguardando o próximo");
            return;
        }

        let payload = self.collect_payload();
        match encode_payload(&payload) {
            Ok(encoded) => {
                if encoded.dropped > 0 {
                    warn!(
                        "Payload excede o buffer: {} leituras descartadas, {} enviadas",
                        encoded.dropped, encoded.included
                    );
                }
                let topic = topic_for(&payload.token);
                self.scheduler.publish(&mut self.transport, &topic, &encoded.bytes);
            }
            Err(e) => error!("Erro ao montar payload: {e}"),
        }
    }

    /// Lê todos os sensores (via cache) e monta o payload do tick.
    pub fn collect_payload(&mut self) -> TelemetryPayload {
        let mut readings = Vec::with_capacity(self.registry.len());
        for sensor in self.registry.all() {
            let value = self.cache.read(sensor, &mut self.bus, &self.clock);
            if value.is_nan() {
                debug!("Sensor '{}' sem leitura, fora do payload", sensor.id);
            }
            readings.push(Reading {
                sensor_id: sensor.id.clone(),
                value,
                unit: sensor.unit.clone(),
            });
        }
        let device = self.config.get();
        build_payload(&device.telemetry_token, &device.device_name, &self.local_ip, readings)
    }

    /// Valores ao vivo de todos os sensores, na ordem do registro.
    pub fn live_readings(&mut self) -> Vec<LiveReading> {
        let mut out = Vec::with_capacity(self.registry.len());
        for (index, sensor) in self.registry.all().iter().enumerate() {
            let value = self.cache.read(sensor, &mut self.bus, &self.clock);
            out.push(LiveReading {
                index,
                definition: sensor.clone(),
                value: (!value.is_nan()).then_some(value),
            });
        }
        out
    }

    // ──────────────────────────────────────────
    // Mutações
    // ──────────────────────────────────────────

    pub fn add_sensor(&mut self, definition: SensorDefinition) -> Result<(), MutationError> {
        info!(
            "Sensor '{}' adicionado (endereço {}, {})",
            definition.id,
            definition.address,
            definition.kind.label()
        );
        self.registry.add(definition);
        self.registry_changed()
    }

    pub fn remove_sensor_at(&mut self, index: usize) -> Result<Removal, MutationError> {
        let removed = self.registry.remove_at(index)?;
        Ok(self.removed(index, removed))
    }

    /// Remove pelo `id` estável (imune a índices desatualizados).
    pub fn remove_sensor(&mut self, id: &str) -> Result<Removal, MutationError> {
        let (index, removed) = self.registry.remove_by_id(id)?;
        Ok(self.removed(index, removed))
    }

    fn removed(&mut self, index: usize, definition: SensorDefinition) -> Removal {
        info!("Sensor '{}' removido da posição {index}", definition.id);
        Removal {
            definition,
            persisted: self.registry_changed(),
        }
    }

    /// Aplica, derruba a sessão e persiste. A sessão cai mesmo que a escrita falhe.
    pub fn update_config(&mut self, update: ConfigUpdate) -> Result<(), MutationError> {
        self.config.set(update)?;
        self.scheduler.invalidate_session(&mut self.transport);

        let bytes = self.config.get().encode().map_err(MutationError::Encode)?;
        self.write(BlobKey::Device, &bytes)
    }

    fn registry_changed(&mut self) -> Result<(), MutationError> {
        self.cache.resize(self.registry.probe_addresses().len());
        let bytes = self.registry.save()?;
        self.write(BlobKey::Sensors, &bytes)
    }

    fn write(&mut self, key: BlobKey, bytes: &[u8]) -> Result<(), MutationError> {
        self.store.write(key, bytes).map_err(|e| {
            error!("Falha ao persistir {}: {e} (alteração vale só até o próximo boot)", key.file_name());
            MutationError::NotPersisted(e)
        })
    }

    // ──────────────────────────────────────────
    // Acessores
    // ──────────────────────────────────────────

    pub fn registry(&self) -> &SensorRegistry {
        &self.registry
    }

    pub fn device(&self) -> &DeviceConfiguration {
        self.config.get()
    }

    pub fn link_state(&self) -> LinkState {
        self.scheduler.state()
    }

    pub fn local_ip(&self) -> &str {
        &self.local_ip
    }

    /// Endereço reportado no campo `ip` do payload.
    pub fn set_local_ip(&mut self, ip: impl Into<String>) {
        self.local_ip = ip.into();
    }

    /// Encerra a sessão com o broker (desligamento ordenado).
    pub fn shutdown(&mut self) {
        self.transport.disconnect();
    }
}

fn load_device<S: BlobStore>(store: &S) -> DeviceConfiguration {
    match store.read(BlobKey::Device) {
        Ok(bytes) => match DeviceConfiguration::decode(&bytes) {
            Ok(cfg) => {
                info!("Configuração do dispositivo carregada");
                cfg
            }
            Err(e) => {
                warn!("Configuração do dispositivo corrompida ({e}), usando padrão");
                DeviceConfiguration::default()
            }
        },
        Err(StoreError::NotFound(_)) => {
            info!("Sem configuração persistida, usando padrão");
            DeviceConfiguration::default()
        }
        Err(e) => {
            warn!("{e}, usando configuração padrão");
            DeviceConfiguration::default()
        }
    }
}

fn load_registry<S: BlobStore>(store: &S) -> SensorRegistry {
    let mut registry = SensorRegistry::new();
    match store.read(BlobKey::Sensors) {
        Ok(bytes) => {
            if let Err(e) = registry.load(&bytes) {
                warn!("{e}, iniciando com registro vazio");
            }
        }
        Err(StoreError::NotFound(_)) => info!("Sem registro de sensores persistido"),
        Err(e) => warn!("{e}, iniciando com registro vazio"),
    }
    registry
}
