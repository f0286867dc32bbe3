//! Arquivo: core/time/timer.rs
//!
//! Propósito: Timers do núcleo (one-shot e periódicos).
//! Cada timer pertence a uma CPU e fica em no máximo uma fila por vez.
//! Handlers rodam dentro de `clock_tick`, com o nklock adquirido.
//!
//! Detalhes de Implementação:
//! - Datas em ticks crus absolutos; a API pública recebe ns.
//! - Timers internos (timeout de thread, liberação periódica, tick do host,
//!   reposição de quota, troca de janela TP) usam variantes fechadas de
//!   `TimerHandler`; só `User` chama código de fora.
//! - Iniciar um timer já ativo equivale a parar e iniciar de novo.
//! - Parar um timer inativo não faz nada.

use alloc::boxed::Box;

use bitflags::bitflags;

use super::timerq::TimerKey;
use crate::core::nucleus::{Core, Nucleus, NucleusState};
use crate::klib::arena::Arena;
use crate::sys::{CpuId, Nanos, ObjectName, SysError, SysResult, ThreadId, Ticks, TimerId};

/// Prioridade de timers de fundo (ex: tick do host)
pub const TIMER_LOPRIO: i32 = -999_999_999;
/// Prioridade padrão
pub const TIMER_STDPRIO: i32 = 0;
/// Prioridade máxima
pub const TIMER_HIPRIO: i32 = 999_999_999;

bitflags! {
    /// Status de um timer
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct TimerStatus: u32 {
        /// Fora de qualquer fila
        const DEQUEUED = 1 << 0;
        /// Destruído
        const KILLED   = 1 << 1;
        /// Recarrega a cada `interval`
        const PERIODIC = 1 << 2;
        /// Data relativa ao relógio de parede
        const REALTIME = 1 << 3;
        /// Disparou ao menos uma vez desde o último start
        const FIRED    = 1 << 4;
    }
}

/// Como interpretar o valor passado a `start_timer`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerMode {
    /// A partir de agora
    Relative,
    /// Data monotônica absoluta
    Absolute,
    /// Data de parede absoluta (segue `adjust_clock`)
    Realtime,
}

/// Limite de uma espera bloqueante
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Espera sem limite
    Infinite,
    /// Não bloquear: falhar na hora se precisaria esperar
    NonBlock,
    Relative(Nanos),
    Absolute(Nanos),
    Realtime(Nanos),
}

impl Timeout {
    pub(crate) fn as_timer(&self) -> Option<(Nanos, TimerMode)> {
        match *self {
            Self::Relative(ns) => Some((ns, TimerMode::Relative)),
            Self::Absolute(ns) => Some((ns, TimerMode::Absolute)),
            Self::Realtime(ns) => Some((ns, TimerMode::Realtime)),
            Self::Infinite | Self::NonBlock => None,
        }
    }
}

/// Informação entregue ao callback de um timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerEvent {
    pub timer: TimerId,
    pub cpu: CpuId,
    /// Data prevista do disparo (ticks)
    pub date: Ticks,
    /// Períodos perdidos colapsados neste disparo
    pub overruns: u64,
}

/// Callback de timer de usuário. Roda sob o nklock: não pode chamar o
/// `Nucleus` de volta.
pub type TimerCallback = Box<dyn FnMut(&TimerEvent) + Send>;

pub(crate) enum TimerHandler {
    User(TimerCallback),
    ThreadTimeout(ThreadId),
    PeriodicRelease(ThreadId),
    HostTick,
    QuotaRefill,
    TpSwitch,
}

/// Efeito de um timer interno, aplicado depois do disparo
#[derive(Debug, Clone, Copy)]
pub(crate) enum TimerAction {
    Timeout(ThreadId),
    Release(ThreadId),
    HostTick,
    QuotaRefill,
    TpSwitch,
}

impl TimerHandler {
    fn fire(&mut self, event: &TimerEvent) -> Option<TimerAction> {
        match self {
            Self::User(callback) => {
                callback(event);
                None
            }
            Self::ThreadTimeout(thread) => Some(TimerAction::Timeout(*thread)),
            Self::PeriodicRelease(thread) => Some(TimerAction::Release(*thread)),
            Self::HostTick => Some(TimerAction::HostTick),
            Self::QuotaRefill => Some(TimerAction::QuotaRefill),
            Self::TpSwitch => Some(TimerAction::TpSwitch),
        }
    }

    fn is_user(&self) -> bool {
        matches!(self, Self::User(_))
    }
}

/// Um timer do núcleo
pub struct Timer {
    pub(crate) id: TimerId,
    pub(crate) name: ObjectName,
    pub(crate) status: TimerStatus,
    pub(crate) cpu: CpuId,
    pub(crate) prio: i32,
    /// Próximo vencimento (ticks)
    pub(crate) date: Ticks,
    /// 0 = one-shot
    pub(crate) interval: Ticks,
    /// Próxima liberação esperada (timers periódicos)
    pub(crate) pexpect: Ticks,
    pub(crate) key: Option<TimerKey>,
    pub(crate) handler: TimerHandler,
    /// Overruns do último disparo
    pub(crate) overruns: u64,
    pub(crate) scheduled: u64,
    pub(crate) fired: u64,
}

impl Timer {
    pub(crate) fn new(id: TimerId, name: &str, cpu: CpuId, prio: i32, handler: TimerHandler) -> Self {
        Self {
            id,
            name: ObjectName::new(name),
            status: TimerStatus::DEQUEUED,
            cpu,
            prio,
            date: 0,
            interval: 0,
            pexpect: 0,
            key: None,
            handler,
            overruns: 0,
            scheduled: 0,
            fired: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        !self.status.contains(TimerStatus::DEQUEUED)
    }

    /// Reenfileirar após o disparo?
    fn reload_pending(&self) -> bool {
        self.status.contains(TimerStatus::PERIODIC | TimerStatus::DEQUEUED)
            && !self.status.contains(TimerStatus::KILLED)
    }

    /// Períodos perdidos até `now`; avança a liberação esperada.
    pub(crate) fn take_overruns(&mut self, now: Ticks) -> u64 {
        if self.interval == 0 {
            return 0;
        }
        let mut overruns = 0;
        if now > self.pexpect && now - self.pexpect >= self.interval {
            overruns = (now - self.pexpect) / self.interval;
            self.pexpect += overruns * self.interval;
        }
        self.pexpect = self.pexpect.saturating_add(self.interval);
        overruns
    }
}

/// Cópia pontual de um timer, para diagnóstico
#[derive(Debug, Clone, Copy)]
pub struct TimerSnapshot {
    pub id: TimerId,
    pub name: ObjectName,
    pub cpu: CpuId,
    pub status: TimerStatus,
    pub prio: i32,
    /// None quando parado
    pub date: Option<Ticks>,
    pub interval: Ticks,
    pub scheduled: u64,
    pub fired: u64,
    pub overruns: u64,
}

// =============================================================================
// OPERAÇÕES SOB O NKLOCK
// =============================================================================

impl NucleusState {
    /// Aloca um timer parado. Função associada para servir também ao boot,
    /// antes de existir um `NucleusState`.
    pub(crate) fn timer_alloc(
        timers: &mut Arena<Timer>,
        name: &str,
        cpu: CpuId,
        prio: i32,
        handler: TimerHandler,
    ) -> SysResult<TimerId> {
        timers
            .insert_with(|handle| Timer::new(TimerId(handle), name, cpu, prio, handler))
            .map(TimerId)
            .ok_or(SysError::OutOfMemory)
    }

    pub(crate) fn timer_enqueue(&mut self, id: TimerId) {
        let Some(timer) = self.timers.get_mut(id.0) else {
            return;
        };
        let key = self.timerqs[timer.cpu].insert(id, timer.date, timer.prio);
        timer.key = Some(key);
        timer.status.remove(TimerStatus::DEQUEUED);
    }

    pub(crate) fn timer_dequeue(&mut self, id: TimerId) {
        let Some(timer) = self.timers.get_mut(id.0) else {
            return;
        };
        if let Some(key) = timer.key.take() {
            self.timerqs[timer.cpu].remove(&key);
        }
        timer.status.insert(TimerStatus::DEQUEUED);
    }

    /// O timer é o que o hardware de sua CPU deve esperar?
    pub(crate) fn timer_heading(&self, id: TimerId) -> bool {
        use crate::sched::scheduler::SchedStatus;

        let Some(timer) = self.timers.get(id.0) else {
            return false;
        };
        let queue = &self.timerqs[timer.cpu];
        let sched = &self.scheds[timer.cpu];
        match queue.head() {
            Some((_, head)) if head == id => true,
            Some((_, head)) if head == sched.htimer && sched.status.contains(SchedStatus::HDEFER) => {
                queue.second().map(|(_, next)| next) == Some(id)
            }
            _ => false,
        }
    }

    /// Inicia com valor em ns no modo dado.
    pub(crate) fn timer_start(
        &mut self,
        core: &Core,
        id: TimerId,
        value: Nanos,
        interval: Nanos,
        mode: TimerMode,
    ) -> SysResult<()> {
        let clock = &core.clock;
        let now = clock.read_raw(&*core.host);
        let date = match mode {
            TimerMode::Relative => now.saturating_add(clock.ns_to_ticks(value)),
            TimerMode::Absolute => clock.ns_to_ticks(value),
            TimerMode::Realtime => clock.ns_to_ticks(clock.realtime_to_monotonic(value)),
        };
        let mut interval_ticks = clock.ns_to_ticks(interval);
        if interval > 0 && interval_ticks == 0 {
            interval_ticks = 1;
        }
        self.timer_start_ticks(
            core,
            id,
            date,
            interval_ticks,
            mode == TimerMode::Realtime,
            mode != TimerMode::Relative && interval == 0 && date <= now,
        )
    }

    /// Inicia com data absoluta em ticks. `expired` rejeita one-shots
    /// absolutos cuja data já passou.
    pub(crate) fn timer_start_ticks(
        &mut self,
        core: &Core,
        id: TimerId,
        date: Ticks,
        interval: Ticks,
        realtime: bool,
        expired: bool,
    ) -> SysResult<()> {
        if !self.timers.contains(id.0) {
            return Err(SysError::BadHandle);
        }
        // Start sobre timer ativo: parar primeiro
        self.timer_stop(core, id)?;
        if expired {
            return Err(SysError::TimedOut);
        }

        let timer = self.timers.get_mut(id.0).ok_or(SysError::BadHandle)?;
        timer.date = date;
        timer.interval = interval;
        timer.pexpect = date;
        timer.overruns = 0;
        timer.scheduled += 1;
        if interval > 0 {
            timer.status.insert(TimerStatus::PERIODIC);
        }
        timer.status.set(TimerStatus::REALTIME, realtime);
        let cpu = timer.cpu;

        self.timer_enqueue(id);
        if self.timer_heading(id) {
            self.program_shot(core, cpu);
        }
        Ok(())
    }

    pub(crate) fn timer_stop(&mut self, core: &Core, id: TimerId) -> SysResult<()> {
        let timer = self.timers.get_mut(id.0).ok_or(SysError::BadHandle)?;
        timer.status.remove(TimerStatus::FIRED | TimerStatus::PERIODIC);
        if timer.key.is_none() {
            return Ok(());
        }
        let cpu = timer.cpu;
        let heading = self.timer_heading(id);
        self.timer_dequeue(id);
        if heading {
            self.program_shot(core, cpu);
        }
        Ok(())
    }

    pub(crate) fn timer_destroy(&mut self, core: &Core, id: TimerId) -> SysResult<()> {
        self.timer_stop(core, id)?;
        if let Some(mut timer) = self.timers.remove(id.0) {
            timer.status.insert(TimerStatus::KILLED);
        }
        Ok(())
    }

    pub(crate) fn timer_migrate(&mut self, core: &Core, id: TimerId, cpu: CpuId) -> SysResult<()> {
        if !self.valid_cpu(cpu) {
            return Err(SysError::InvalidArgument);
        }
        let timer = self.timers.get(id.0).ok_or(SysError::BadHandle)?;
        let old = timer.cpu;
        if old == cpu {
            return Ok(());
        }
        let queued = timer.key.is_some();

        if queued {
            let heading = self.timer_heading(id);
            self.timer_dequeue(id);
            if heading {
                self.program_shot(core, old);
            }
        }
        if let Some(timer) = self.timers.get_mut(id.0) {
            timer.cpu = cpu;
        }
        if queued {
            self.timer_enqueue(id);
            if self.timer_heading(id) {
                self.program_shot(core, cpu);
            }
        }
        crate::ktrace!("(Timer) Migrado para cpu=", cpu);
        Ok(())
    }

    fn timer_set_prio(&mut self, core: &Core, id: TimerId, prio: i32) -> SysResult<()> {
        let timer = self.timers.get_mut(id.0).ok_or(SysError::BadHandle)?;
        timer.prio = prio;
        if timer.key.is_none() {
            return Ok(());
        }
        let cpu = timer.cpu;
        self.timer_dequeue(id);
        self.timer_enqueue(id);
        if self.timer_heading(id) {
            self.program_shot(core, cpu);
        }
        Ok(())
    }

    /// Dispara o handler de um timer já retirado da fila.
    pub(crate) fn timer_fire(&mut self, core: &Core, id: TimerId, cpu: CpuId, date: Ticks, overruns: u64) {
        let Some(timer) = self.timers.get_mut(id.0) else {
            return;
        };
        timer.fired += 1;
        timer.overruns = overruns;
        core.stats.inc_timer_fires();

        let event = TimerEvent {
            timer: id,
            cpu,
            date,
            overruns,
        };
        let action = timer.handler.fire(&event);
        timer.status.insert(TimerStatus::FIRED);

        if let Some(action) = action {
            self.timer_action(core, cpu, action);
        }
    }

    /// Recarrega um periódico após o disparo, pulando períodos passados.
    pub(crate) fn timer_reload(&mut self, core: &Core, id: TimerId, now: Ticks) {
        let gravity = core.clock.gravity();
        let Some(timer) = self.timers.get_mut(id.0) else {
            return;
        };
        if !timer.reload_pending() {
            return;
        }
        let horizon = now.saturating_add(gravity);
        let interval = timer.interval;
        let next = timer
            .overruns
            .checked_add(1)
            .and_then(|n| n.checked_mul(interval))
            .and_then(|step| timer.date.checked_add(step));
        // Períodos que já ficaram atrás do horizonte contam como overruns
        let caught_up = next.and_then(|date| {
            if date >= horizon {
                return Some((date, 0));
            }
            let behind = (horizon - date).div_ceil(interval);
            behind
                .checked_mul(interval)
                .and_then(|step| date.checked_add(step))
                .map(|later| (later, behind))
        });
        let Some((date, behind)) = caught_up else {
            // Próxima data fora do alcance do relógio: fica fora da fila
            crate::kwarn!("(Timer) Recarga fora do alcance, id=", id.as_u32());
            return;
        };
        timer.overruns = timer.overruns.saturating_add(behind);
        timer.date = date;
        let target = timer.cpu;

        self.timer_enqueue(id);
        // Migrado pelo próprio handler: avisar a CPU de destino
        if target != core.host.current_cpu() && self.timer_heading(id) {
            self.program_shot(core, target);
        }
    }

    pub(crate) fn timer_snapshot(&self, id: TimerId) -> SysResult<TimerSnapshot> {
        let timer = self.timers.get(id.0).ok_or(SysError::BadHandle)?;
        Ok(TimerSnapshot {
            id,
            name: timer.name,
            cpu: timer.cpu,
            status: timer.status,
            prio: timer.prio,
            date: timer.is_running().then_some(timer.date),
            interval: timer.interval,
            scheduled: timer.scheduled,
            fired: timer.fired,
            overruns: timer.overruns,
        })
    }

    fn user_timer(&self, id: TimerId) -> SysResult<&Timer> {
        let timer = self.timers.get(id.0).ok_or(SysError::BadHandle)?;
        if !timer.handler.is_user() {
            return Err(SysError::PermissionDenied);
        }
        Ok(timer)
    }
}

// =============================================================================
// API PÚBLICA
// =============================================================================

impl Nucleus {
    /// Cria um timer parado na CPU `cpu`.
    pub fn create_timer(
        &self,
        name: &str,
        cpu: CpuId,
        callback: impl FnMut(&TimerEvent) + Send + 'static,
    ) -> SysResult<TimerId> {
        let mut st = self.lock();
        if !st.valid_cpu(cpu) {
            return Err(SysError::InvalidArgument);
        }
        let id = NucleusState::timer_alloc(
            &mut st.timers,
            name,
            cpu,
            TIMER_STDPRIO,
            TimerHandler::User(Box::new(callback)),
        )?;
        crate::ktrace!("(Timer) Criado id=", id.as_u32());
        Ok(id)
    }

    /// Arma o timer. `interval` 0 = one-shot.
    pub fn start_timer(&self, id: TimerId, value: Nanos, interval: Nanos, mode: TimerMode) -> SysResult<()> {
        let mut st = self.lock();
        st.user_timer(id)?;
        st.timer_start(&self.core, id, value, interval, mode)
    }

    pub fn stop_timer(&self, id: TimerId) -> SysResult<()> {
        let mut st = self.lock();
        st.user_timer(id)?;
        st.timer_stop(&self.core, id)
    }

    /// Remove o timer (da fila, se preciso) e libera o slot.
    pub fn destroy_timer(&self, id: TimerId) -> SysResult<()> {
        let mut st = self.lock();
        st.user_timer(id)?;
        st.timer_destroy(&self.core, id)
    }

    pub fn migrate_timer(&self, id: TimerId, cpu: CpuId) -> SysResult<()> {
        let mut st = self.lock();
        st.user_timer(id)?;
        st.timer_migrate(&self.core, id, cpu)
    }

    /// Prioridade entre timers de mesma data
    pub fn set_timer_priority(&self, id: TimerId, prio: i32) -> SysResult<()> {
        let mut st = self.lock();
        st.user_timer(id)?;
        st.timer_set_prio(&self.core, id, prio)
    }

    /// Próximo vencimento (ticks), ou None se parado.
    pub fn timer_date(&self, id: TimerId) -> SysResult<Option<Ticks>> {
        Ok(self.lock().timer_snapshot(id)?.date)
    }

    /// Tempo até o próximo vencimento, ou None se parado.
    pub fn timer_remaining(&self, id: TimerId) -> SysResult<Option<Nanos>> {
        let date = self.timer_date(id)?;
        let now = self.read_raw();
        Ok(date.map(|date| self.core.clock.ticks_to_ns(date.saturating_sub(now))))
    }

    pub fn timer_interval(&self, id: TimerId) -> SysResult<Nanos> {
        let interval = self.lock().timer_snapshot(id)?.interval;
        Ok(self.core.clock.ticks_to_ns(interval))
    }

    /// Overruns do último disparo
    pub fn timer_overruns(&self, id: TimerId) -> SysResult<u64> {
        Ok(self.lock().timer_snapshot(id)?.overruns)
    }

    pub fn timer_snapshot(&self, id: TimerId) -> SysResult<TimerSnapshot> {
        self.lock().timer_snapshot(id)
    }
}
