//! Resolução de nomes simbólicos de pino (NodeMCU v2) para endereços físicos.

use crate::types::{ANALOG_CHANNEL, Address};
use tracing::warn;

/// Tabela fixa símbolo → GPIO.
pub const PIN_TABLE: [(&str, Address); 10] = [
    ("A0", ANALOG_CHANNEL),
    ("D0", Address(16)),
    ("D1", Address(5)),
    ("D2", Address(4)),
    ("D3", Address(0)),
    ("D4", Address(2)),
    ("D5", Address(14)),
    ("D6", Address(12)),
    ("D7", Address(13)),
    ("D8", Address(15)),
];

/// Resolve um símbolo de pino.
///
/// Símbolo desconhecido cai para o inteiro do início do texto (`"5x"` → 5,
/// sinal opcional); sem dígitos iniciais vira o endereço `0` (GPIO0 real).
/// O comportamento é mantido e apenas registrado.
pub fn resolve(symbol: &str) -> Address {
    let symbol = symbol.trim();
    if let Some((_, address)) = PIN_TABLE.iter().find(|(name, _)| *name == symbol) {
        return *address;
    }
    match leading_integer(symbol) {
        Some(raw) => {
            if raw.to_string() != symbol {
                warn!("Pino '{symbol}' lido como endereço {raw}");
            }
            Address(raw)
        }
        None => {
            warn!("Pino '{symbol}' não reconhecido, usando endereço 0");
            Address(0)
        }
    }
}

/// Sinal opcional seguido dos dígitos iniciais; o resto é ignorado.
fn leading_integer(text: &str) -> Option<i32> {
    let sign_len = usize::from(text.starts_with(['-', '+']));
    let digits = text[sign_len..].bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    text[..sign_len + digits].parse().ok()
}

/// Nome simbólico de um endereço, se houver.
pub fn symbol_of(address: Address) -> Option<&'static str> {
    PIN_TABLE
        .iter()
        .find(|(_, a)| *a == address)
        .map(|(name, _)| *name)
}
