//! Registro ordenado de sensores.
//!
//! A ordem de inserção é o índice visível externamente (exibição e remoção).
//! O registro não guarda estado de runtime nem fala com a persistência:
//! quem faz o write-through é o [`crate::node::Node`].

use crate::types::{Address, SensorDefinition};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Erros do registro.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Índice {index} fora do intervalo (registro com {len} sensores)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Nenhum sensor com id '{0}'")]
    UnknownId(String),

    #[error("Registro corrompido: {0}")]
    Decode(String),

    #[error("Erro de serialização: {0}")]
    Encode(String),
}

/// Formato do blob `sensors.toml` (TOML não aceita array na raiz).
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct RegistryFile {
    sensors: Vec<SensorDefinition>,
}

/// Coleção ordenada de [`SensorDefinition`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorRegistry {
    sensors: Vec<SensorDefinition>,
}

impl SensorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adiciona no fim.
    pub fn add(&mut self, definition: SensorDefinition) {
        self.sensors.push(definition);
    }

    /// Remove por posição; os índices seguintes descem uma unidade.
    pub fn remove_at(&mut self, index: usize) -> Result<SensorDefinition, RegistryError> {
        if index >= self.sensors.len() {
            return Err(RegistryError::IndexOutOfRange {
                index,
                len: self.sensors.len(),
            });
        }
        Ok(self.sensors.remove(index))
    }

    /// Remove a primeira entrada com o `id` informado.
    pub fn remove_by_id(&mut self, id: &str) -> Result<(usize, SensorDefinition), RegistryError> {
        let index = self
            .sensors
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| RegistryError::UnknownId(id.to_string()))?;
        Ok((index, self.sensors.remove(index)))
    }

    pub fn all(&self) -> &[SensorDefinition] {
        &self.sensors
    }

    pub fn get(&self, index: usize) -> Option<&SensorDefinition> {
        self.sensors.get(index)
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    /// Endereços distintos de sondas DHT (dimensiona o cache de aquisição).
    pub fn probe_addresses(&self) -> BTreeSet<Address> {
        self.sensors
            .iter()
            .filter(|s| s.kind.dht_model().is_some() && !s.address.is_analog_channel())
            .map(|s| s.address)
            .collect()
    }

    /// Substitui o conteúdo pelo snapshot persistido.
    ///
    /// Em caso de erro o registro fica como estava.
    pub fn load(&mut self, bytes: &[u8]) -> Result<(), RegistryError> {
        let text = std::str::from_utf8(bytes).map_err(|e| RegistryError::Decode(e.to_string()))?;
        let file: RegistryFile = toml::from_str(text).map_err(|e| RegistryError::Decode(e.to_string()))?;
        self.sensors = file.sensors;
        Ok(())
    }

    /// Serializa um snapshot para persistência.
    pub fn save(&self) -> Result<Vec<u8>, RegistryError> {
        let file = RegistryFile {
            sensors: self.sensors.clone(),
        };
        toml::to_string_pretty(&file)
            .map(String::into_bytes)
            .map_err(|e| RegistryError::Encode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ANALOG_CHANNEL, SensorKind};

    fn sample() -> SensorRegistry {
        let mut r = SensorRegistry::new();
        r.add(SensorDefinition::new("T1", Address(5), "C", SensorKind::Dht11Temperature));
        r.add(SensorDefinition::new("H1", Address(5), "%", SensorKind::Dht11Humidity));
        r.add(SensorDefinition::new("LDR", ANALOG_CHANNEL, "raw", SensorKind::AnalogRaw));
        r
    }

    #[test]
    fn add_appends_in_order() {
        let r = sample();
        let ids: Vec<_> = r.all().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["T1", "H1", "LDR"]);
    }

    #[test]
    fn remove_at_compacts() {
        let mut r = sample();
        let removed = r.remove_at(0).unwrap();
        assert_eq!(removed.id, "T1");
        assert_eq!(r.len(), 2);
        assert_eq!(r.get(0).unwrap().id, "H1");
    }

    #[test]
    fn remove_at_out_of_range_leaves_registry_unchanged() {
        let mut r = sample();
        let before = r.clone();
        assert_eq!(
            r.remove_at(3),
            Err(RegistryError::IndexOutOfRange { index: 3, len: 3 })
        );
        assert_eq!(r, before);

        let mut empty = SensorRegistry::new();
        assert!(empty.remove_at(0).is_err());
    }

    #[test]
    fn remove_by_id_takes_first_match() {
        let mut r = sample();
        r.add(SensorDefinition::new("T1", Address(4), "C", SensorKind::Dht22Temperature));
        let (index, removed) = r.remove_by_id("T1").unwrap();
        assert_eq!(index, 0);
        assert_eq!(removed.address, Address(5));
        assert_eq!(r.all().last().unwrap().id, "T1");
        assert_eq!(r.remove_by_id("nope"), Err(RegistryError::UnknownId("nope".into())));
    }

    #[test]
    fn load_save_roundtrip_preserves_order() {
        let r = sample();
        let bytes = r.save().unwrap();
        let mut loaded = SensorRegistry::new();
        loaded.load(&bytes).unwrap();
        assert_eq!(loaded, r);
    }

    #[test]
    fn partial_blob_uses_defaults() {
        let blob = br#"
[[sensors]]
id = "only-id"

[[sensors]]
id = "A"
address = 4
unit = "%"
kind = "dht22_humidity"
"#;
        let mut r = SensorRegistry::new();
        r.load(blob).unwrap();
        assert_eq!(r.len(), 2);
        assert_eq!(r.get(0).unwrap().address, Address(0));
        assert_eq!(r.get(0).unwrap().kind, SensorKind::Dht11Temperature);
        assert_eq!(r.get(1).unwrap().kind, SensorKind::Dht22Humidity);
    }

    #[test]
    fn corrupt_blob_is_rejected_without_side_effects() {
        let mut r = sample();
        let before = r.clone();
        assert!(matches!(r.load(b"sensors = 12 ["), Err(RegistryError::Decode(_))));
        assert!(matches!(r.load(&[0xff, 0xfe]), Err(RegistryError::Decode(_))));
        assert_eq!(r, before);
    }

    #[test]
    fn probe_addresses_skip_analog() {
        let mut r = sample();
        r.add(SensorDefinition::new("T2", Address(4), "C", SensorKind::Dht22Temperature));
        r.add(SensorDefinition::new("raw", Address(12), "v", SensorKind::AnalogRaw));
        let probes: Vec<_> = r.probe_addresses().into_iter().collect();
        assert_eq!(probes, [Address(4), Address(5)]);
    }
}
