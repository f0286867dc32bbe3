//! Palavra de posse rápida
//!
//! Um `AtomicU64` compartilhado entre o núcleo e o chamador. Aquisição e
//! liberação sem contenção são um único CAS, sem tocar no nklock.
//!
//! ```text
//!  63        34   33         32      31                 0
//! +------------+-----------+-------+--------------------+
//! |  reservado | DESTROYED | CLAIM |  handle do dono    |
//! +------------+-----------+-------+--------------------+
//! ```
//!
//! Palavra 0 = livre. CLAIM ligado obriga o dono a liberar pelo caminho
//! lento (há waiters a acordar).

use core::sync::atomic::{AtomicU64, Ordering};

use crate::sys::ThreadId;

const OWNER_MASK: u64 = 0xffff_ffff;
const CLAIM_BIT: u64 = 1 << 32;
const DESTROYED_BIT: u64 = 1 << 33;

#[derive(Debug, Default)]
pub struct FastLock {
    word: AtomicU64,
}

/// Leitura decodificada da palavra
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockWord(u64);

impl LockWord {
    pub fn owner(self) -> Option<ThreadId> {
        match self.0 & OWNER_MASK {
            0 => None,
            raw => Some(ThreadId::from_raw(raw as u32)),
        }
    }

    pub fn is_claimed(self) -> bool {
        self.0 & CLAIM_BIT != 0
    }

    pub fn is_destroyed(self) -> bool {
        self.0 & DESTROYED_BIT != 0
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

fn encode(owner: ThreadId, claimed: bool) -> u64 {
    let mut word = owner.as_u32() as u64;
    if claimed {
        word |= CLAIM_BIT;
    }
    word
}

impl FastLock {
    pub const fn new() -> Self {
        Self {
            word: AtomicU64::new(0),
        }
    }

    pub fn load(&self) -> LockWord {
        LockWord(self.word.load(Ordering::Acquire))
    }

    /// CAS livre -> `owner`
    pub fn try_acquire(&self, owner: ThreadId) -> bool {
        self.word
            .compare_exchange(0, encode(owner, false), Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// CAS `owner` sem CLAIM -> livre. Falha se houver waiters ou se o
    /// objeto foi destruído.
    pub fn try_release(&self, owner: ThreadId) -> bool {
        self.word
            .compare_exchange(encode(owner, false), 0, Ordering::Release, Ordering::Relaxed)
            .is_ok()
    }

    /// Liga CLAIM se a palavra ainda for `seen`.
    pub(crate) fn try_claim(&self, seen: LockWord) -> bool {
        self.word
            .compare_exchange(seen.0, seen.0 | CLAIM_BIT, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }

    /// Só sob o nklock
    pub(crate) fn set_owner(&self, owner: Option<ThreadId>, claimed: bool) {
        let word = owner.map_or(0, |o| encode(o, claimed));
        self.word.store(word, Ordering::Release);
    }

    pub(crate) fn clear_claim(&self) {
        self.word.fetch_and(!CLAIM_BIT, Ordering::AcqRel);
    }

    /// Marca como destruído; nenhum CAS rápido volta a ter sucesso.
    pub(crate) fn poison(&self) {
        self.word.store(DESTROYED_BIT, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncontended_cycle() {
        let lock = FastLock::new();
        let me = ThreadId::from_raw(0x0001_0003);
        assert!(lock.try_acquire(me));
        assert_eq!(lock.load().owner(), Some(me));
        assert!(!lock.try_acquire(ThreadId::from_raw(7)));
        assert!(lock.try_release(me));
        assert_eq!(lock.load().owner(), None);
    }

    #[test]
    fn claim_forces_slow_release() {
        let lock = FastLock::new();
        let me = ThreadId::from_raw(5);
        assert!(lock.try_acquire(me));
        assert!(lock.try_claim(lock.load()));
        assert!(lock.load().is_claimed());
        assert!(!lock.try_release(me));
    }

    #[test]
    fn poisoned_word_rejects_fast_paths() {
        let lock = FastLock::new();
        lock.poison();
        assert!(lock.load().is_destroyed());
        assert!(!lock.try_acquire(ThreadId::from_raw(1)));
    }
}
