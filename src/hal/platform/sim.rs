//! Host simulado
//!
//! Implementa `HostPort` sem hardware: o relógio cru é um contador que o
//! chamador avança, e one-shots, IPIs e trocas de contexto são apenas
//! registrados para inspeção. Usado pelos testes unitários e pelos self
//! tests de boot.

use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use spin::Mutex;

use crate::core::smp::{IpiTarget, IpiVector};
use crate::hal::HostPort;
use crate::sys::{CpuId, ThreadId, Ticks};

/// Eventos registrados pelo host simulado
#[derive(Debug, Default)]
pub struct SimLog {
    /// (cpu, delay) de cada programação de one-shot
    pub shots: Vec<(CpuId, Ticks)>,
    pub ipis: Vec<(IpiTarget, IpiVector)>,
    /// (cpu, prev, next)
    pub switches: Vec<(CpuId, ThreadId, ThreadId)>,
}

pub struct SimHost {
    now: AtomicU64,
    cpu: AtomicU32,
    irqs_enabled: AtomicBool,
    log: Mutex<SimLog>,
}

impl SimHost {
    pub fn new() -> Self {
        Self {
            now: AtomicU64::new(0),
            cpu: AtomicU32::new(0),
            irqs_enabled: AtomicBool::new(true),
            log: Mutex::new(SimLog::default()),
        }
    }

    pub fn set_time(&self, ticks: Ticks) {
        self.now.store(ticks, Ordering::SeqCst);
    }

    pub fn advance(&self, ticks: Ticks) {
        self.now.fetch_add(ticks, Ordering::SeqCst);
    }

    pub fn now(&self) -> Ticks {
        self.now.load(Ordering::SeqCst)
    }

    /// Muda a CPU "corrente" vista pelo núcleo.
    pub fn set_cpu(&self, cpu: CpuId) {
        self.cpu.store(cpu, Ordering::SeqCst);
    }

    pub fn irqs_enabled(&self) -> bool {
        self.irqs_enabled.load(Ordering::SeqCst)
    }

    /// Último delay programado para `cpu`
    pub fn last_shot(&self, cpu: CpuId) -> Option<Ticks> {
        self.log
            .lock()
            .shots
            .iter()
            .rev()
            .find(|(c, _)| *c == cpu)
            .map(|(_, delay)| *delay)
    }

    pub fn ipis(&self) -> Vec<(IpiTarget, IpiVector)> {
        self.log.lock().ipis.clone()
    }

    pub fn switches(&self) -> Vec<(CpuId, ThreadId, ThreadId)> {
        self.log.lock().switches.clone()
    }

    pub fn clear_log(&self) {
        let mut log = self.log.lock();
        log.shots.clear();
        log.ipis.clear();
        log.switches.clear();
    }
}

impl Default for SimHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostPort for SimHost {
    fn current_cpu(&self) -> CpuId {
        self.cpu.load(Ordering::SeqCst)
    }

    fn read_raw(&self) -> Ticks {
        self.now.load(Ordering::SeqCst)
    }

    fn program_shot(&self, cpu: CpuId, delay: Ticks) {
        self.log.lock().shots.push((cpu, delay));
    }

    fn send_ipi(&self, target: IpiTarget, vector: IpiVector) {
        self.log.lock().ipis.push((target, vector));
    }

    fn switch_to(&self, cpu: CpuId, prev: ThreadId, next: ThreadId) {
        self.log.lock().switches.push((cpu, prev, next));
    }

    fn irq_save(&self) -> bool {
        self.irqs_enabled.swap(false, Ordering::SeqCst)
    }

    fn irq_restore(&self, was_enabled: bool) {
        self.irqs_enabled.store(was_enabled, Ordering::SeqCst);
    }
}
