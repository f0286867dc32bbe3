//! Arquivo: core/nucleus.rs
//!
//! Propósito: Contexto explícito do núcleo.
//! Reúne o relógio, a porta do hospedeiro, os contadores e todo o estado
//! mutável (threads, synchs, timers, escalonadores e filas de timers por CPU)
//! atrás de um único spinlock global, o nklock.
//!
//! Detalhes de Implementação:
//! - O que é imutável após o boot (`Core`) fica fora do lock.
//! - Operações internas são métodos de `NucleusState` que recebem `&Core`;
//!   a API pública em `Nucleus` adquire o lock, delega e, no fim, roda o
//!   escalonador da CPU corrente.
//! - O registro por CPU (root, timer do tick do host, escalonador, fila de
//!   timers) é montado uma vez em `Nucleus::new`.

use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::core::config::NucleusConfig;
use crate::core::debug::stats::NucleusStats;
use crate::core::smp::PerCpu;
use crate::core::time::clock::Clock;
use crate::core::time::timer::{Timer, TimerHandler};
use crate::core::time::timerq::TimerQueue;
use crate::hal::HostPort;
use crate::klib::arena::Arena;
use crate::sched::scheduler::policy::{SchedParam, SchedPolicy};
use crate::sched::scheduler::{Sched, SchedStatus};
use crate::sched::task::entity::Thread;
use crate::sched::task::state::{ThreadInfo, ThreadState};
use crate::sync::spinlock::{Spinlock, SpinlockGuard};
use crate::sync::synch::SynchObject;
use crate::sys::{CpuId, Nanos, ObjectName, SynchId, SysError, SysResult, ThreadId, Ticks};

/// Parte imutável do núcleo, lida sem o nklock.
pub struct Core {
    pub(crate) host: Arc<dyn HostPort>,
    pub(crate) clock: Clock,
    pub(crate) stats: NucleusStats,
    pub(crate) config: NucleusConfig,
}

/// Estado protegido pelo nklock
pub struct NucleusState {
    pub(crate) threads: Arena<Thread>,
    pub(crate) synchs: Arena<SynchObject>,
    pub(crate) timers: Arena<Timer>,
    pub(crate) scheds: PerCpu<Sched>,
    pub(crate) timerqs: PerCpu<TimerQueue>,
}

impl NucleusState {
    pub(crate) fn valid_cpu(&self, cpu: CpuId) -> bool {
        (cpu as usize) < self.scheds.nr_cpus()
    }
}

pub struct Nucleus {
    pub(crate) core: Core,
    state: Spinlock<NucleusState>,
}

/// Cópia pontual de uma thread
#[derive(Debug, Clone, Copy)]
pub struct ThreadSnapshot {
    pub id: ThreadId,
    pub name: ObjectName,
    pub cpu: CpuId,
    pub state: ThreadState,
    pub info: ThreadInfo,
    pub policy: SchedPolicy,
    pub base: SchedParam,
    pub current: SchedParam,
    pub wchan: Option<SynchId>,
    /// Synchs possuídos com waiters
    pub claims: usize,
    pub exec_time_ns: Nanos,
    pub switches: u64,
    pub waits: u64,
}

/// Cópia pontual do escalonador de uma CPU
#[derive(Debug, Clone, Copy)]
pub struct SchedSnapshot {
    pub cpu: CpuId,
    pub curr: ThreadId,
    pub root: ThreadId,
    pub status: SchedStatus,
    pub nr_ready: usize,
    pub nr_timers: usize,
    pub switches: u64,
    pub tp_partition: Option<usize>,
}

impl Nucleus {
    /// Monta o núcleo: uma root e um timer de tick do host por CPU.
    pub fn new(config: NucleusConfig, host: Arc<dyn HostPort>) -> SysResult<Self> {
        config.validate()?;
        crate::kinfo!("(Nucleus) Inicializando, CPUs=", config.nr_cpus);

        let clock = Clock::new(&config.clock)?;
        let now = clock.read_raw(&*host);

        let mut threads = Arena::new();
        let mut timers = Arena::new();
        let mut per_cpu = Vec::with_capacity(config.nr_cpus);
        for cpu in 0..config.nr_cpus as CpuId {
            let root = NucleusState::thread_alloc(&mut threads, &mut timers, cpu, |id| {
                Thread::new_root(id, cpu)
            })?;
            if let Some(thread) = threads.get_mut(root.0) {
                thread.accounting.start_exec(now);
            }
            let htimer = NucleusState::timer_alloc(
                &mut timers,
                "[host-timer]",
                cpu,
                config.timer.host_tick_prio,
                TimerHandler::HostTick,
            )?;
            per_cpu.push((root, htimer));
        }

        let scheds = PerCpu::new_with(config.nr_cpus, |cpu| {
            let (root, htimer) = per_cpu[cpu as usize];
            Sched::new(cpu, root, htimer, config.tp_partitions)
        });
        let timerqs = PerCpu::new_with(config.nr_cpus, |_| TimerQueue::new());

        let nucleus = Self {
            core: Core {
                host,
                clock,
                stats: NucleusStats::new(),
                config,
            },
            state: Spinlock::new(NucleusState {
                threads,
                synchs: Arena::new(),
                timers,
                scheds,
                timerqs,
            }),
        };
        crate::kok!("(Nucleus) Núcleo pronto");
        Ok(nucleus)
    }

    /// Adquire o nklock (interrupções locais mascaradas)
    pub(crate) fn lock(&self) -> SpinlockGuard<'_, NucleusState> {
        self.state.lock(&*self.core.host)
    }

    /// Roda o escalonador da CPU corrente, sob o lock já adquirido.
    pub(crate) fn commit(&self, st: &mut NucleusState) {
        let cpu = self.core.host.current_cpu();
        if st.valid_cpu(cpu) {
            st.schedule(&self.core, cpu);
        }
    }

    pub fn config(&self) -> &NucleusConfig {
        &self.core.config
    }

    pub fn clock(&self) -> &Clock {
        &self.core.clock
    }

    pub fn stats(&self) -> &NucleusStats {
        &self.core.stats
    }

    pub fn nr_cpus(&self) -> usize {
        self.core.config.nr_cpus
    }

    pub fn read_raw(&self) -> Ticks {
        self.core.clock.read_raw(&*self.core.host)
    }

    pub fn read_monotonic(&self) -> Nanos {
        self.core.clock.read_monotonic(&*self.core.host)
    }

    pub fn read_realtime(&self) -> Nanos {
        self.core.clock.read_realtime(&*self.core.host)
    }

    /// Nova gravidade; vale a partir da próxima programação do hardware.
    pub fn set_gravity(&self, gravity_ns: Nanos) {
        let _st = self.lock();
        self.core.clock.set_gravity_ns(gravity_ns);
        crate::kdebug!("(Clock) Gravidade em ticks=", self.core.clock.gravity());
    }

    /// Thread corrente de `cpu`
    pub fn current_thread(&self, cpu: CpuId) -> SysResult<ThreadId> {
        let st = self.lock();
        st.scheds.get(cpu).map(|sched| sched.curr).ok_or(SysError::InvalidArgument)
    }

    pub fn root_thread(&self, cpu: CpuId) -> SysResult<ThreadId> {
        let st = self.lock();
        st.scheds.get(cpu).map(|sched| sched.root).ok_or(SysError::InvalidArgument)
    }

    pub fn thread_snapshot(&self, thread: ThreadId) -> SysResult<ThreadSnapshot> {
        let st = self.lock();
        let t = st.threads.get(thread.0).ok_or(SysError::BadHandle)?;
        Ok(ThreadSnapshot {
            id: t.id,
            name: t.name,
            cpu: t.cpu,
            state: t.state,
            info: t.info,
            policy: t.policy,
            base: t.bparam,
            current: t.cparam,
            wchan: t.wchan,
            claims: t.claimq.len(),
            exec_time_ns: self.core.clock.ticks_to_ns_rounded(t.accounting.total_cpu_time),
            switches: t.accounting.switches,
            waits: t.accounting.waits,
        })
    }

    pub fn sched_snapshot(&self, cpu: CpuId) -> SysResult<SchedSnapshot> {
        let st = self.lock();
        let sched = st.scheds.get(cpu).ok_or(SysError::InvalidArgument)?;
        Ok(SchedSnapshot {
            cpu,
            curr: sched.curr,
            root: sched.root,
            status: sched.status,
            nr_ready: sched.nr_ready(),
            nr_timers: st.timerqs[cpu].len(),
            switches: sched.switches,
            tp_partition: sched.tp.active_partition(),
        })
    }

    /// Threads vivas (roots incluídas)
    pub fn nr_threads(&self) -> usize {
        self.lock().threads.len()
    }
}
