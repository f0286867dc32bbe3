//! Core Module
//!
//! Contexto do núcleo e tudo o que não é escalonamento nem sincronização:
//! configuração, relógio e timers, suporte SMP, logging e diagnóstico.

pub mod config;
pub mod debug;
pub mod logging;
pub mod nucleus;
pub mod smp;
pub mod time;

#[cfg(feature = "self_test")]
pub mod selftest;
