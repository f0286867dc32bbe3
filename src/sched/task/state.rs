//! Estados de thread
//!
//! `ThreadState` diz onde a thread está (fila de prontas, fila de espera,
//! timer, nenhuma). `ThreadInfo` diz por que ela acordou da última espera.

use bitflags::bitflags;

bitflags! {
    /// Estado de uma thread
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ThreadState: u32 {
        /// Suspensa explicitamente
        const SUSP    = 1 << 0;
        /// Esperando um synch (em alguma pendq)
        const PEND    = 1 << 1;
        /// Esperando seu timer de timeout
        const DELAY   = 1 << 2;
        /// Criada, nunca iniciada
        const DORMANT = 1 << 3;
        /// Devolvida ao kernel hospedeiro
        const RELAX   = 1 << 4;
        /// Em trânsito para outra CPU
        const MIGRATE = 1 << 5;
        /// Ligada a uma fila de prontas
        const READY   = 1 << 6;
        /// Corrente em sua CPU
        const RUNNING = 1 << 7;
        /// Removida, aguardando sair da CPU
        const ZOMBIE  = 1 << 8;
        /// Thread root (idle) da CPU
        const ROOT    = 1 << 9;
        /// Round-robin habilitado
        const RRB     = 1 << 10;
        /// Prioridade elevada por herança
        const BOOST   = 1 << 11;
        /// Já passou por `start_thread`
        const STARTED = 1 << 12;
    }
}

bitflags! {
    /// Motivo do último despertar
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ThreadInfo: u32 {
        /// Espera expirou
        const TIMEO = 1 << 0;
        /// Synch destruído durante a espera
        const RMID  = 1 << 1;
        /// Desbloqueada por `unblock_thread`
        const BREAK = 1 << 2;
        /// Concedida / sinalizada
        const WAKEN = 1 << 3;
        /// Bloqueada em `wait_period`
        const PWAIT = 1 << 4;
    }
}

impl ThreadState {
    /// Bits que impedem a thread de executar
    pub const BLOCK_BITS: Self = Self::SUSP
        .union(Self::PEND)
        .union(Self::DELAY)
        .union(Self::DORMANT)
        .union(Self::RELAX)
        .union(Self::MIGRATE);

    /// Verifica se pode ser escalonada
    pub const fn is_runnable(self) -> bool {
        !self.intersects(Self::BLOCK_BITS) && !self.contains(Self::ZOMBIE)
    }
}

impl ThreadInfo {
    /// Bits de resultado de espera, limpos a cada nova espera.
    pub const WAIT_BITS: Self = Self::TIMEO
        .union(Self::RMID)
        .union(Self::BREAK)
        .union(Self::WAKEN);
}
