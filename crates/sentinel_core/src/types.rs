//! Definição de tipos do domínio de telemetria.
//!
//! Sensores cadastrados, endereços físicos e o payload JSON publicado no
//! broker. Nada aqui guarda estado de runtime.

use serde::{Deserialize, Serialize};
use std::fmt;

// ──────────────────────────────────────────────
// Endereço físico
// ──────────────────────────────────────────────

/// Linha/canal de hardware onde um sensor está ligado (GPIO ou ADC).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Address(pub i32);

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canal analógico `A0`. Leituras nele nunca passam pelo cache.
pub const ANALOG_CHANNEL: Address = Address(17);

impl Address {
    pub fn is_analog_channel(self) -> bool {
        self == ANALOG_CHANNEL
    }
}

// ──────────────────────────────────────────────
// Tipos de sensor
// ──────────────────────────────────────────────

/// Variante do protocolo DHT (mesmo fio, timing/codificação diferentes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DhtModel {
    Dht11,
    Dht22,
}

impl DhtModel {
    /// Tempo de acomodação após o setup do pino, antes da transação.
    pub fn settle_ms(self) -> u64 {
        match self {
            DhtModel::Dht11 => 100,
            DhtModel::Dht22 => 100,
        }
    }
}

/// Eixo de medição de uma sonda DHT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Temperature,
    Humidity,
}

/// Tipo de sensor (enum fechado; o índice 0–4 é o usado na superfície de mutação).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    #[default]
    Dht11Temperature,
    Dht11Humidity,
    Dht22Temperature,
    Dht22Humidity,
    AnalogRaw,
}

impl SensorKind {
    pub const ALL: [SensorKind; 5] = [
        SensorKind::Dht11Temperature,
        SensorKind::Dht11Humidity,
        SensorKind::Dht22Temperature,
        SensorKind::Dht22Humidity,
        SensorKind::AnalogRaw,
    ];

    /// Converte o índice externo (0–4) no tipo correspondente.
    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(usize::from(index)).copied()
    }

    pub fn index(self) -> u8 {
        match self {
            SensorKind::Dht11Temperature => 0,
            SensorKind::Dht11Humidity => 1,
            SensorKind::Dht22Temperature => 2,
            SensorKind::Dht22Humidity => 3,
            SensorKind::AnalogRaw => 4,
        }
    }

    /// Variante DHT, ou `None` para leitura analógica.
    pub fn dht_model(self) -> Option<DhtModel> {
        match self {
            SensorKind::Dht11Temperature | SensorKind::Dht11Humidity => Some(DhtModel::Dht11),
            SensorKind::Dht22Temperature | SensorKind::Dht22Humidity => Some(DhtModel::Dht22),
            SensorKind::AnalogRaw => None,
        }
    }

    pub fn axis(self) -> Option<Axis> {
        match self {
            SensorKind::Dht11Temperature | SensorKind::Dht22Temperature => Some(Axis::Temperature),
            SensorKind::Dht11Humidity | SensorKind::Dht22Humidity => Some(Axis::Humidity),
            SensorKind::AnalogRaw => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SensorKind::Dht11Temperature => "DHT11 Temperature",
            SensorKind::Dht11Humidity => "DHT11 Humidity",
            SensorKind::Dht22Temperature => "DHT22 Temperature",
            SensorKind::Dht22Humidity => "DHT22 Humidity",
            SensorKind::AnalogRaw => "Analog Raw",
        }
    }
}

/// Par temperatura/umidade devolvido por uma transação DHT.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Climate {
    /// Temperatura (°C)
    pub temperature: f32,
    /// Umidade relativa (%)
    pub humidity: f32,
}

impl Climate {
    pub fn get(&self, axis: Axis) -> f32 {
        match axis {
            Axis::Temperature => self.temperature,
            Axis::Humidity => self.humidity,
        }
    }
}

// ──────────────────────────────────────────────
// Definição de sensor
// ──────────────────────────────────────────────

/// Sensor cadastrado pelo usuário. Imutável: só é trocado por substituição.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorDefinition {
    /// Identificador atribuído pelo usuário (esperado único, não garantido)
    pub id: String,
    /// Endereço físico já resolvido
    pub address: Address,
    /// Unidade exibida (texto livre)
    pub unit: String,
    pub kind: SensorKind,
}

impl SensorDefinition {
    pub fn new(id: impl Into<String>, address: Address, unit: impl Into<String>, kind: SensorKind) -> Self {
        Self {
            id: id.into(),
            address,
            unit: unit.into(),
            kind,
        }
    }
}

// ──────────────────────────────────────────────
// Payload publicado
// ──────────────────────────────────────────────

/// Uma leitura dentro do payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub sensor_id: String,
    pub value: f32,
    pub unit: String,
}

/// Payload de telemetria montado a cada tick de publicação.
///
/// A ordem dos campos é a ordem de serialização.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryPayload {
    pub token: String,
    pub device_id: String,
    pub ip: String,
    pub readings: Vec<Reading>,
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_index_is_stable() {
        for (i, kind) in SensorKind::ALL.iter().enumerate() {
            assert_eq!(kind.index() as usize, i);
            assert_eq!(SensorKind::from_index(i as u8), Some(*kind));
        }
        assert_eq!(SensorKind::from_index(5), None);
    }

    #[test]
    fn kind_axis_and_model() {
        assert_eq!(SensorKind::Dht22Humidity.dht_model(), Some(DhtModel::Dht22));
        assert_eq!(SensorKind::Dht22Humidity.axis(), Some(Axis::Humidity));
        assert_eq!(SensorKind::Dht11Temperature.axis(), Some(Axis::Temperature));
        assert_eq!(SensorKind::AnalogRaw.dht_model(), None);
        assert_eq!(SensorKind::AnalogRaw.axis(), None);
    }

    #[test]
    fn kind_serializes_as_snake_case() {
        let json = serde_json::to_string(&SensorKind::Dht11Humidity).unwrap();
        assert_eq!(json, "\"dht11_humidity\"");
    }

    #[test]
    fn climate_picks_axis() {
        let c = Climate {
            temperature: 21.5,
            humidity: 40.0,
        };
        assert_eq!(c.get(Axis::Temperature), 21.5);
        assert_eq!(c.get(Axis::Humidity), 40.0);
    }
}
