//! Traits do HAL
//!
//! Define as interfaces abstratas para o kernel hospedeiro.

pub mod host;

pub use host::*;
