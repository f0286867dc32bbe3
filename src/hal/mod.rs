//! Hardware Abstraction Layer (HAL)
//!
//! Fronteira entre o núcleo e o kernel hospedeiro. O núcleo não programa
//! hardware diretamente: relógio cru, one-shot, IPIs, troca de contexto e
//! máscara de interrupções chegam todos por `HostPort`.
//!
//! # Plataformas
//! - `platform::sim`: host simulado (testes e self tests)

pub mod platform;
pub mod traits;

pub use traits::*;
