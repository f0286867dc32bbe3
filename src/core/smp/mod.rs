//! Suporte SMP do núcleo: registro por CPU e IPIs.

pub mod ipi;
pub mod percpu;

pub use ipi::{IpiTarget, IpiVector};
pub use percpu::{CpuSet, PerCpu, MAX_CPUS};
