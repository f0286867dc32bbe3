//! Tipos fundamentais do núcleo

use crate::klib::arena::Handle;

/// Ticks crus do relógio de hardware
pub type Ticks = u64;

/// Diferença assinada de ticks
pub type STicks = i64;

/// Nanossegundos
pub type Nanos = u64;

/// Índice lógico de CPU
pub type CpuId = u32;

/// Thread ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ThreadId(pub(crate) Handle);

impl ThreadId {
    pub const fn as_u32(self) -> u32 {
        self.0.as_u32()
    }

    pub(crate) const fn from_raw(raw: u32) -> Self {
        Self(Handle::from_u32(raw))
    }
}

/// Handle de objeto de sincronização
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct SynchId(pub(crate) Handle);

impl SynchId {
    pub const fn as_u32(self) -> u32 {
        self.0.as_u32()
    }
}

/// Handle de timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TimerId(pub(crate) Handle);

impl TimerId {
    pub const fn as_u32(self) -> u32 {
        self.0.as_u32()
    }
}

/// Grupo de quota: índice local ao escalonador de uma CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuotaGroupId {
    pub cpu: CpuId,
    pub index: u16,
}

/// Nome de objeto com tamanho fixo (sem alocação)
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ObjectName {
    bytes: [u8; 32],
    len: u8,
}

impl ObjectName {
    pub const EMPTY: Self = Self {
        bytes: [0; 32],
        len: 0,
    };

    /// Copia `name`, truncando em 32 bytes numa fronteira de caractere.
    pub fn new(name: &str) -> Self {
        let mut len = name.len().min(32);
        while !name.is_char_boundary(len) {
            len -= 1;
        }
        let mut bytes = [0u8; 32];
        bytes[..len].copy_from_slice(&name.as_bytes()[..len]);
        Self {
            bytes,
            len: len as u8,
        }
    }

    pub fn as_str(&self) -> &str {
        // Construído apenas a partir de &str cortado em fronteira válida
        core::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or("")
    }
}

impl core::fmt::Debug for ObjectName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
