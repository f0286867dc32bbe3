//! Núcleo do escalonador
//!
//! `scheduler` contém o ciclo de troca (`schedule`), os pedidos de
//! reescalonamento e a contabilidade do tick do host. `classes` administra
//! os grupos de quota e o quadro TP.

pub mod classes;
pub mod scheduler;

pub use classes::QuotaSnapshot;
