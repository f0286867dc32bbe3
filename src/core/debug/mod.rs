//! Arquivo: core/debug/mod.rs
//!
//! Propósito: Módulo de diagnóstico e depuração.
//! Fornece ferramentas para inspeção, logging e estatísticas do núcleo.
//!
//! Módulos contidos:
//! - `klog`: Sink de saída usado pelos macros de log (kinfo, kerror, etc).
//! - `oops`: Violações de invariantes internos.
//! - `stats`: Contadores globais de eventos.

pub mod klog;
pub mod oops;
pub mod stats;
