//! Definições do Núcleo (ABI interna).
//!
//! Contém os tipos e códigos de status compartilhados entre o núcleo e as
//! personalidades que o consomem.

pub mod error;
pub mod types;

pub use error::{SysError, SysResult};
pub use types::{CpuId, Nanos, ObjectName, QuotaGroupId, STicks, SynchId, ThreadId, Ticks, TimerId};
