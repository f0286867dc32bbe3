//! # Códigos de Status do Núcleo
//!
//! O núcleo só reporta códigos de status. A tradução para errno POSIX,
//! códigos pSOS ou VxWorks é responsabilidade de cada personalidade.
//!
//! ## Taxonomia
//! - **Identidade:** handle destruído ou inválido -> `BadHandle`.
//! - **Timeout:** status esperado, nunca exceção -> `TimedOut`.
//! - **Interrupção:** pedido externo de desbloqueio -> `Interrupted`.
//! - **Exclusão:** aquisição recursiva ou trylock contendido -> `Deadlock` / `Busy`.
//! - **Programação:** prioridade inválida, CPU fora da afinidade -> `InvalidArgument`.
//! - **Destruição:** objeto destruído enquanto a thread esperava -> `Destroyed`.

/// Enum de erros do núcleo.
///
/// Valores são i32 para permitir representação negativa em isize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum SysError {
    // === Erros Gerais (1-15) ===
    /// Operação não permitida (ex: liberar mutex de outro dono)
    PermissionDenied = 1,
    /// Objeto não encontrado
    NotFound = 2,
    /// Argumento inválido
    InvalidArgument = 4,
    /// Espera interrompida por `unblock`
    Interrupted = 6,
    /// Timeout expirado
    TimedOut = 7,
    /// Recurso ocupado
    Busy = 8,
    /// Aquisição recursiva de um objeto já possuído
    Deadlock = 9,

    // === Erros de Handle (16-31) ===
    /// Handle inválido ou de objeto já destruído
    BadHandle = 16,
    /// Objeto destruído durante a espera
    Destroyed = 20,

    // === Erros de Memória (32-47) ===
    /// Slab cheio
    OutOfMemory = 32,
}

impl SysError {
    /// Converte para isize negativo (formato usado pelas personalidades)
    #[inline]
    pub fn as_code(self) -> isize {
        -(self as i32 as isize)
    }

    /// Cria erro a partir de código negativo
    pub fn from_code(code: isize) -> Option<Self> {
        if code >= 0 {
            return None;
        }
        match -code {
            1 => Some(Self::PermissionDenied),
            2 => Some(Self::NotFound),
            4 => Some(Self::InvalidArgument),
            6 => Some(Self::Interrupted),
            7 => Some(Self::TimedOut),
            8 => Some(Self::Busy),
            9 => Some(Self::Deadlock),
            16 => Some(Self::BadHandle),
            20 => Some(Self::Destroyed),
            32 => Some(Self::OutOfMemory),
            _ => None,
        }
    }

    /// Erros de exclusão: retornados sem bloquear.
    pub fn is_exclusion(self) -> bool {
        matches!(self, Self::Busy | Self::Deadlock)
    }

    /// Nome curto para logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::PermissionDenied => "EPERM",
            Self::NotFound => "ENOENT",
            Self::InvalidArgument => "EINVAL",
            Self::Interrupted => "EINTR",
            Self::TimedOut => "ETIMEDOUT",
            Self::Busy => "EBUSY",
            Self::Deadlock => "EDEADLK",
            Self::BadHandle => "EBADH",
            Self::Destroyed => "EIDRM",
            Self::OutOfMemory => "ENOMEM",
        }
    }
}

/// Resultado de operação do núcleo: Ok(valor) ou Err(SysError)
pub type SysResult<T> = Result<T, SysError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_negative_and_reversible() {
        assert_eq!(SysError::TimedOut.as_code(), -7);
        assert_eq!(SysError::from_code(-20), Some(SysError::Destroyed));
        assert_eq!(SysError::from_code(0), None);
        assert_eq!(SysError::from_code(-3), None);
        assert!(SysError::Deadlock.is_exclusion());
    }
}
