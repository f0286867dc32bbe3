//! nklock: spinlock com máscara de interrupções
//!
//! Protege todo o estado mutável do núcleo. As interrupções locais ficam
//! mascaradas (via `HostPort::irq_save`) desde antes do giro até a
//! liberação, então um tick nunca encontra o lock preso na própria CPU.
//!
//! A CPU dona fica registrada: reentrar na mesma CPU (um callback de timer
//! chamando o `Nucleus`, por exemplo) travaria para sempre, e vira
//! `nucleus_bug` em vez disso.

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::core::debug::oops::nucleus_bug;
use crate::hal::HostPort;
use crate::sys::CpuId;

const NO_OWNER: CpuId = CpuId::MAX;

/// Spinlock - busy-wait, NÃO pode dormir
pub struct Spinlock<T> {
    locked: AtomicBool,
    owner: AtomicU32,
    data: UnsafeCell<T>,
}

// SAFETY: o acesso a `data` é serializado por `locked`
unsafe impl<T: Send> Send for Spinlock<T> {}
unsafe impl<T: Send> Sync for Spinlock<T> {}

impl<T> Spinlock<T> {
    pub const fn new(data: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            owner: AtomicU32::new(NO_OWNER),
            data: UnsafeCell::new(data),
        }
    }

    /// Mascara as interrupções locais e gira até obter o lock.
    pub fn lock<'a>(&'a self, host: &'a dyn HostPort) -> SpinlockGuard<'a, T> {
        let irqs = host.irq_save();
        let cpu = host.current_cpu();
        if self.owner.load(Ordering::Relaxed) == cpu {
            nucleus_bug("(nklock) Reentrada na cpu=", cpu as u64);
        }

        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            while self.locked.load(Ordering::Relaxed) {
                core::hint::spin_loop();
            }
        }
        self.owner.store(cpu, Ordering::Relaxed);

        SpinlockGuard { lock: self, host, irqs }
    }

    /// Uma tentativa só; em caso de falha as interrupções voltam ao que eram.
    pub fn try_lock<'a>(&'a self, host: &'a dyn HostPort) -> Option<SpinlockGuard<'a, T>> {
        let irqs = host.irq_save();
        if self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            host.irq_restore(irqs);
            return None;
        }
        self.owner.store(host.current_cpu(), Ordering::Relaxed);
        Some(SpinlockGuard { lock: self, host, irqs })
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }

    /// CPU que segura o lock agora
    pub fn owner(&self) -> Option<CpuId> {
        match self.owner.load(Ordering::Relaxed) {
            NO_OWNER => None,
            cpu => Some(cpu),
        }
    }
}

/// Guard do nklock: libera e restaura as interrupções ao sair do escopo
pub struct SpinlockGuard<'a, T> {
    lock: &'a Spinlock<T>,
    host: &'a dyn HostPort,
    irqs: bool,
}

impl<T> Deref for SpinlockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: o guard prova a posse do lock
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for SpinlockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: o guard prova a posse do lock
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for SpinlockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.owner.store(NO_OWNER, Ordering::Relaxed);
        self.lock.locked.store(false, Ordering::Release);
        self.host.irq_restore(self.irqs);
    }
}

#[cfg(test)]
mod tests {
    use super::Spinlock;
    use crate::hal::platform::sim::SimHost;

    #[test]
    fn guard_masks_and_restores_interrupts() {
        let host = SimHost::new();
        let lock = Spinlock::new(0u32);
        {
            let mut guard = lock.lock(&host);
            *guard += 1;
            assert!(!host.irqs_enabled());
            assert!(lock.is_locked());
            assert_eq!(lock.owner(), Some(0));
        }
        assert!(host.irqs_enabled());
        assert!(!lock.is_locked());
        assert_eq!(lock.owner(), None);
        assert_eq!(*lock.lock(&host), 1);
    }

    #[test]
    fn try_lock_fails_while_held_elsewhere() {
        let host = SimHost::new();
        let lock = Spinlock::new(());
        let _guard = lock.lock(&host);
        host.set_cpu(1);
        assert!(lock.try_lock(&host).is_none());
        // A falha não pode deixar as interrupções mascaradas a mais
        assert!(!host.irqs_enabled());
    }

    #[test]
    #[should_panic]
    fn reentry_on_the_same_cpu_is_a_bug() {
        let host = SimHost::new();
        let lock = Spinlock::new(());
        let _outer = lock.lock(&host);
        let _inner = lock.lock(&host);
    }
}
