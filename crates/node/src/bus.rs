//! Barramentos de sensores do hospedeiro.
//!
//! - **IIO** — drivers do kernel Linux: `dht11` expõe `in_temp_input` e
//!   `in_humidityrelative_input` (mili-unidades); o ADC expõe
//!   `in_voltageN_raw`. O driver detecta DHT11/DHT22 sozinho.
//! - **Simulado** — curvas suaves com ruído, para rodar sem hardware.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sentinel_core::config::{BusBackend, BusConfig};
use sentinel_core::ports::{SensorBus, SensorReadError};
use sentinel_core::types::{Address, Climate, DhtModel};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// Barramento escolhido pela configuração.
pub enum HostBus {
    Simulated(SimulatedBus),
    Iio(IioBus),
}

impl HostBus {
    pub fn from_config(config: &BusConfig) -> Self {
        match config.backend {
            BusBackend::Simulated => {
                info!("Barramento simulado (falha {:.0}%)", config.failure_rate * 100.0);
                HostBus::Simulated(SimulatedBus::new(config.failure_rate))
            }
            BusBackend::Iio => {
                info!(
                    "Barramento IIO em {} ({} sondas mapeadas)",
                    config.iio_root.display(),
                    config.probes.len()
                );
                HostBus::Iio(IioBus::new(config))
            }
        }
    }
}

impl SensorBus for HostBus {
    fn read_dht(&mut self, address: Address, model: DhtModel) -> Result<Climate, SensorReadError> {
        match self {
            HostBus::Simulated(bus) => bus.read_dht(address, model),
            HostBus::Iio(bus) => bus.read_dht(address, model),
        }
    }

    fn read_analog(&mut self, address: Address) -> Result<f32, SensorReadError> {
        match self {
            HostBus::Simulated(bus) => bus.read_analog(address),
            HostBus::Iio(bus) => bus.read_analog(address),
        }
    }
}

// ──────────────────────────────────────────────
// IIO (sysfs)
// ──────────────────────────────────────────────

pub struct IioBus {
    root: PathBuf,
    adc_device: String,
    probes: HashMap<Address, String>,
}

impl IioBus {
    pub fn new(config: &BusConfig) -> Self {
        Self {
            root: config.iio_root.clone(),
            adc_device: config.adc_device.clone(),
            probes: config
                .probes
                .iter()
                .map(|p| (Address(p.address), p.device.clone()))
                .collect(),
        }
    }

    fn read_attr(&self, address: Address, device: &str, attr: &str) -> Result<f64, SensorReadError> {
        let path = self.root.join(device).join(attr);
        let text = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::TimedOut => SensorReadError::Timeout(address),
            _ => SensorReadError::Unavailable(address, format!("{}: {e}", path.display())),
        })?;
        text.trim()
            .parse::<f64>()
            .map_err(|_| SensorReadError::Checksum(address))
    }
}

impl SensorBus for IioBus {
    fn read_dht(&mut self, address: Address, _model: DhtModel) -> Result<Climate, SensorReadError> {
        let device = self
            .probes
            .get(&address)
            .ok_or_else(|| SensorReadError::Unavailable(address, "sem mapeamento IIO".into()))?;
        let temp = self.read_attr(address, device, "in_temp_input")?;
        let hum = self.read_attr(address, device, "in_humidityrelative_input")?;
        Ok(Climate {
            temperature: (temp / 1000.0) as f32,
            humidity: (hum / 1000.0) as f32,
        })
    }

    fn read_analog(&mut self, address: Address) -> Result<f32, SensorReadError> {
        let channel = if address.is_analog_channel() { 0 } else { address.0 };
        let attr = format!("in_voltage{channel}_raw");
        self.read_attr(address, &self.adc_device, &attr).map(|v| v as f32)
    }
}

// ──────────────────────────────────────────────
// Simulado
// ──────────────────────────────────────────────

/// Período das curvas simuladas (segundos).
const SIM_PERIOD_SECS: f64 = 600.0;

pub struct SimulatedBus {
    rng: StdRng,
    failure_rate: f64,
    started: Instant,
}

impl SimulatedBus {
    pub fn new(failure_rate: f64) -> Self {
        Self {
            rng: StdRng::from_entropy(),
            failure_rate: failure_rate.clamp(0.0, 1.0),
            started: Instant::now(),
        }
    }

    fn phase(&self, address: Address) -> f64 {
        let t = self.started.elapsed().as_secs_f64() / SIM_PERIOD_SECS;
        (t + f64::from(address.0) * 0.1) * 2.0 * std::f64::consts::PI
    }

    fn should_fail(&mut self) -> bool {
        self.failure_rate > 0.0 && self.rng.gen_bool(self.failure_rate)
    }
}

impl SensorBus for SimulatedBus {
    fn read_dht(&mut self, address: Address, model: DhtModel) -> Result<Climate, SensorReadError> {
        if self.should_fail() {
            return Err(SensorReadError::Timeout(address));
        }
        let phase = self.phase(address);
        let temperature = 22.0 + 3.0 * phase.sin() + self.rng.gen_range(-0.2..0.2);
        let humidity = 55.0 - 10.0 * phase.sin() + self.rng.gen_range(-1.0..1.0);
        // DHT11 só entrega inteiros
        let (temperature, humidity) = match model {
            DhtModel::Dht11 => (temperature.round(), humidity.round()),
            DhtModel::Dht22 => ((temperature * 10.0).round() / 10.0, (humidity * 10.0).round() / 10.0),
        };
        Ok(Climate {
            temperature: temperature as f32,
            humidity: humidity.clamp(0.0, 100.0) as f32,
        })
    }

    fn read_analog(&mut self, address: Address) -> Result<f32, SensorReadError> {
        if self.should_fail() {
            return Err(SensorReadError::Timeout(address));
        }
        let raw = 512.0 + 300.0 * self.phase(address).cos() + self.rng.gen_range(-8.0..8.0);
        Ok(raw.round().clamp(0.0, 1023.0) as f32)
    }
}
