//! Operações sobre synchs
//!
//! Os caminhos rápidos de `acquire`/`release` rodam fora do nklock, só
//! com CAS na palavra de posse. Todo o resto acontece sob o lock.

use alloc::vec::Vec;

use crate::core::nucleus::{Core, Nucleus, NucleusState};
use crate::core::time::timer::Timeout;
use crate::sched::task::state::{ThreadInfo, ThreadState};
use crate::sys::{SynchId, SysError, SysResult, ThreadId};

use super::{FlushReason, Grant, SynchFlags, SynchObject, SynchRef, SynchSnapshot};

impl NucleusState {
    fn create_synch(&mut self, name: &str, flags: SynchFlags) -> SysResult<SynchRef> {
        if !SynchFlags::ATTRS.contains(flags) {
            return Err(SysError::InvalidArgument);
        }
        if flags.contains(SynchFlags::PIP) && !flags.contains(SynchFlags::OWNER) {
            return Err(SysError::InvalidArgument);
        }
        // Herança exige a cabeça da pendq como waiter mais urgente
        let flags = if flags.contains(SynchFlags::PIP) {
            flags | SynchFlags::PRIO
        } else {
            flags
        };

        let handle = self
            .synchs
            .insert_with(|h| SynchObject::new(SynchId(h), name, flags))
            .ok_or(SysError::OutOfMemory)?;
        let s = self.synchs.get(handle).ok_or(SysError::BadHandle)?;
        crate::kdebug!("(Synch) Criado id=", s.id.as_u32());
        Ok(SynchRef {
            id: s.id,
            fastlock: s.fastlock.clone(),
        })
    }

    fn synch(&self, sid: SynchId) -> SysResult<&SynchObject> {
        self.synchs.get(sid.0).ok_or(SysError::BadHandle)
    }

    fn owned_synch(&self, sid: SynchId) -> SysResult<&SynchObject> {
        let s = self.synch(sid)?;
        if !s.has_owner_semantics() {
            return Err(SysError::InvalidArgument);
        }
        Ok(s)
    }

    fn wait_queue(&self, sid: SynchId) -> SysResult<&SynchObject> {
        let s = self.synch(sid)?;
        if s.has_owner_semantics() {
            return Err(SysError::InvalidArgument);
        }
        Ok(s)
    }

    /// Dono ainda vivo? Handle velho ou zumbi contam como abandono.
    fn live_owner(&self, owner: ThreadId) -> bool {
        self.threads
            .get(owner.0)
            .is_some_and(|t| !t.state.contains(ThreadState::ZOMBIE))
    }

    /// Põe `sid` na claimq de `owner`.
    fn claim(&mut self, sid: SynchId, owner: ThreadId) {
        let Some(s) = self.synchs.get_mut(sid.0) else {
            return;
        };
        if s.flags.contains(SynchFlags::CLAIMED) {
            return;
        }
        s.flags.insert(SynchFlags::CLAIMED);
        if let Some(t) = self.threads.get_mut(owner.0) {
            t.claimq.push(sid);
        }
    }

    fn unclaim(&mut self, sid: SynchId, owner: ThreadId) {
        let Some(s) = self.synchs.get_mut(sid.0) else {
            return;
        };
        if !s.flags.contains(SynchFlags::CLAIMED) {
            return;
        }
        s.flags.remove(SynchFlags::CLAIMED);
        if let Some(t) = self.threads.get_mut(owner.0) {
            t.claimq.retain(|c| *c != sid);
        }
    }

    /// Caminho lento de `acquire`.
    fn acquire(&mut self, core: &Core, tid: ThreadId, sid: SynchId, timeout: Timeout) -> SysResult<Grant> {
        self.user_thread(tid)?;
        let fastlock = self.owned_synch(sid)?.fastlock.clone().ok_or(SysError::InvalidArgument)?;
        core.stats.inc_slow_acquires();

        let owner = loop {
            let word = fastlock.load();
            if word.is_destroyed() {
                return Err(SysError::BadHandle);
            }
            match word.owner() {
                None => {
                    if fastlock.try_acquire(tid) {
                        return Ok(Grant::Immediate);
                    }
                }
                Some(owner) if owner == tid => return Err(SysError::Deadlock),
                Some(owner) if !self.live_owner(owner) => {
                    if self.take_abandoned(core, sid, owner, tid) {
                        return Ok(Grant::Immediate);
                    }
                }
                Some(_) if timeout == Timeout::NonBlock => return Err(SysError::Busy),
                Some(owner) => {
                    // O dono pode ter liberado pelo caminho rápido entre a leitura e o CAS
                    if fastlock.try_claim(word) {
                        break owner;
                    }
                }
            }
        };

        self.pendq_insert(sid, tid);
        let pip = self.synch(sid)?.flags.contains(SynchFlags::PIP);
        if pip {
            self.claim(sid, owner);
        }
        self.block_thread(core, tid, ThreadState::PEND, timeout, Some(sid))?;
        if pip {
            self.pi_propagate(core, owner);
        }
        crate::ktrace!("(Synch) Contenção, waiter=", tid.as_u32());
        Ok(Grant::Pending)
    }

    /// O dono registrado sumiu sem liberar. Sem waiters `tid` assume direto;
    /// com waiters a posse vai para a cabeça da pendq e `tid` volta a disputar.
    fn take_abandoned(&mut self, core: &Core, sid: SynchId, stale: ThreadId, tid: ThreadId) -> bool {
        let Some(s) = self.synchs.get(sid.0) else {
            return false;
        };
        crate::kwarn!("(Synch) Posse abandonada retomada, antigo dono=", stale.as_u32());
        if !s.pendq.is_empty() {
            self.transfer_ownership(core, sid, stale);
            return false;
        }
        if let Some(fastlock) = &s.fastlock {
            fastlock.set_owner(Some(tid), false);
        }
        true
    }

    fn wait_result(&self, tid: ThreadId) -> SysResult<Grant> {
        let t = self.threads.get(tid.0).ok_or(SysError::BadHandle)?;
        if t.state.contains(ThreadState::PEND) {
            return Ok(Grant::Pending);
        }
        if t.info.contains(ThreadInfo::RMID) {
            Err(SysError::Destroyed)
        } else if t.info.contains(ThreadInfo::TIMEO) {
            Err(SysError::TimedOut)
        } else if t.info.contains(ThreadInfo::BREAK) {
            Err(SysError::Interrupted)
        } else if t.info.contains(ThreadInfo::WAKEN) {
            Ok(Grant::AfterWait)
        } else {
            Err(SysError::InvalidArgument)
        }
    }

    /// Caminho lento de `release`. Retorna o novo dono, se houver.
    fn release(&mut self, core: &Core, tid: ThreadId, sid: SynchId) -> SysResult<Option<ThreadId>> {
        let s = self.owned_synch(sid)?;
        let word = s.fastlock.as_ref().ok_or(SysError::InvalidArgument)?.load();
        if word.is_destroyed() {
            return Err(SysError::BadHandle);
        }
        if word.owner() != Some(tid) {
            return Err(SysError::PermissionDenied);
        }
        Ok(self.transfer_ownership(core, sid, tid))
    }

    /// Passa a posse de `sid` de `old` para a cabeça da pendq.
    pub(crate) fn transfer_ownership(&mut self, core: &Core, sid: SynchId, old: ThreadId) -> Option<ThreadId> {
        let s = self.synchs.get_mut(sid.0)?;
        let fastlock = s.fastlock.clone()?;
        let pip = s.flags.contains(SynchFlags::PIP);
        let next = s.pendq.pop_front();
        let more = !s.pendq.is_empty();
        self.unclaim(sid, old);

        let Some(next) = next else {
            fastlock.set_owner(None, false);
            if pip {
                self.pi_propagate(core, old);
            }
            return None;
        };

        fastlock.set_owner(Some(next), more);
        if let Some(t) = self.threads.get_mut(next.0) {
            t.wchan = None;
            t.wwake = Some(sid);
            t.info.insert(ThreadInfo::WAKEN);
        }
        if pip {
            if more {
                self.claim(sid, next);
            }
            self.pi_propagate(core, old);
            self.pi_propagate(core, next);
        }
        self.resume_thread(core, next, ThreadState::PEND);
        crate::ktrace!("(Synch) Posse transferida para tid=", next.as_u32());
        Some(next)
    }

    fn flush(&mut self, core: &Core, sid: SynchId, reason: FlushReason) -> SysResult<usize> {
        let s = self.synchs.get_mut(sid.0).ok_or(SysError::BadHandle)?;
        if reason == FlushReason::Signaled && s.has_owner_semantics() {
            return Err(SysError::InvalidArgument);
        }
        let waiters: Vec<ThreadId> = s.pendq.drain(..).collect();
        let owner = s.owner();
        let pip = s.flags.contains(SynchFlags::PIP);
        if let Some(fastlock) = &s.fastlock {
            fastlock.clear_claim();
        }
        if let Some(owner) = owner {
            self.unclaim(sid, owner);
        }

        let bit = match reason {
            FlushReason::Signaled => ThreadInfo::WAKEN,
            FlushReason::Broken => ThreadInfo::BREAK,
            FlushReason::TimedOut => ThreadInfo::TIMEO,
            FlushReason::Destroyed => ThreadInfo::RMID,
        };
        for &waiter in &waiters {
            if let Some(t) = self.threads.get_mut(waiter.0) {
                t.wchan = None;
                t.info.insert(bit);
                if reason == FlushReason::Signaled {
                    t.wwake = Some(sid);
                }
            }
            self.resume_thread(core, waiter, ThreadState::PEND);
        }

        if let (true, Some(owner)) = (pip, owner) {
            self.pi_propagate(core, owner);
        }
        Ok(waiters.len())
    }

    fn destroy_synch(&mut self, core: &Core, sid: SynchId) -> SysResult<()> {
        self.flush(core, sid, FlushReason::Destroyed)?;
        if let Some(s) = self.synchs.remove(sid.0) {
            if let Some(fastlock) = &s.fastlock {
                fastlock.poison();
            }
        }
        crate::kdebug!("(Synch) Destruído id=", sid.as_u32());
        Ok(())
    }

    /// Solta `tid` da pendq em que espera, sem acordá-la.
    pub(crate) fn forget_sleeper(&mut self, core: &Core, tid: ThreadId) {
        let Some(t) = self.threads.get_mut(tid.0) else {
            return;
        };
        let Some(sid) = t.wchan.take() else {
            return;
        };
        let Some(s) = self.synchs.get_mut(sid.0) else {
            return;
        };
        if let Some(pos) = s.pendq.iter().position(|w| *w == tid) {
            s.pendq.remove(pos);
        }
        let drained = s.pendq.is_empty();
        let owner = s.owner();
        let pip = s.flags.contains(SynchFlags::PIP);
        if drained {
            if let Some(fastlock) = &s.fastlock {
                fastlock.clear_claim();
            }
            if let Some(owner) = owner {
                self.unclaim(sid, owner);
            }
        }
        if let (true, Some(owner)) = (pip, owner) {
            self.pi_propagate(core, owner);
        }
    }

    /// Entrega adiante tudo o que `tid` possui com waiters, com ou sem PIP.
    pub(crate) fn release_claims(&mut self, core: &Core, tid: ThreadId) {
        let contended: Vec<SynchId> = self
            .synchs
            .iter()
            .filter(|(_, s)| {
                !s.pendq.is_empty()
                    && s.fastlock.as_ref().is_some_and(|f| f.load().owner() == Some(tid))
            })
            .map(|(h, _)| SynchId(h))
            .collect();
        for sid in contended {
            self.transfer_ownership(core, sid, tid);
        }
    }

    fn sleep_on(&mut self, core: &Core, tid: ThreadId, sid: SynchId, timeout: Timeout) -> SysResult<Grant> {
        self.user_thread(tid)?;
        self.wait_queue(sid)?;
        if timeout == Timeout::NonBlock {
            return Err(SysError::TimedOut);
        }
        self.pendq_insert(sid, tid);
        self.block_thread(core, tid, ThreadState::PEND, timeout, Some(sid))?;
        Ok(Grant::Pending)
    }

    /// Acorda `tid`, já retirada da pendq de `sid`, com WAKEN.
    fn wake_sleeper(&mut self, core: &Core, sid: SynchId, tid: ThreadId) {
        if let Some(t) = self.threads.get_mut(tid.0) {
            t.wchan = None;
            t.wwake = Some(sid);
            t.info.insert(ThreadInfo::WAKEN);
        }
        self.resume_thread(core, tid, ThreadState::PEND);
    }

    fn wakeup_many_sleepers(&mut self, core: &Core, sid: SynchId, n: usize) -> SysResult<Vec<ThreadId>> {
        self.wait_queue(sid)?;
        let s = self.synchs.get_mut(sid.0).ok_or(SysError::BadHandle)?;
        let count = n.min(s.pendq.len());
        let woken: Vec<ThreadId> = s.pendq.drain(..count).collect();
        for &tid in &woken {
            self.wake_sleeper(core, sid, tid);
        }
        Ok(woken)
    }

    fn wakeup_this_sleeper(&mut self, core: &Core, sid: SynchId, tid: ThreadId) -> SysResult<()> {
        self.wait_queue(sid)?;
        let s = self.synchs.get_mut(sid.0).ok_or(SysError::BadHandle)?;
        let pos = s.pendq.iter().position(|w| *w == tid).ok_or(SysError::NotFound)?;
        s.pendq.remove(pos);
        self.wake_sleeper(core, sid, tid);
        Ok(())
    }

    fn synch_snapshot(&self, sid: SynchId) -> SysResult<SynchSnapshot> {
        let s = self.synch(sid)?;
        Ok(SynchSnapshot {
            id: s.id,
            name: s.name,
            flags: s.flags,
            owner: s.owner(),
            nr_waiters: s.pendq.len(),
        })
    }
}

impl Nucleus {
    /// Cria um synch. `OWNER` dá exclusão mútua com palavra rápida; `PIP`
    /// exige `OWNER` e implica `PRIO`.
    pub fn create_synch(&self, name: &str, flags: SynchFlags) -> SysResult<SynchRef> {
        self.lock().create_synch(name, flags)
    }

    /// Adquire `synch` para `thread`. Sem contenção, não toca no nklock.
    pub fn acquire(&self, thread: ThreadId, synch: &SynchRef, timeout: Timeout) -> SysResult<Grant> {
        if let Some(fastlock) = synch.fastlock() {
            if fastlock.try_acquire(thread) {
                self.core.stats.inc_fast_acquires();
                return Ok(Grant::Immediate);
            }
        }
        let mut st = self.lock();
        let grant = st.acquire(&self.core, thread, synch.id, timeout)?;
        self.commit(&mut st);
        Ok(grant)
    }

    /// Desfecho da última espera de `thread`.
    pub fn wait_result(&self, thread: ThreadId) -> SysResult<Grant> {
        self.lock().wait_result(thread)
    }

    /// Libera `synch`. Retorna o novo dono quando havia waiters.
    pub fn release(&self, thread: ThreadId, synch: &SynchRef) -> SysResult<Option<ThreadId>> {
        if let Some(fastlock) = synch.fastlock() {
            if fastlock.try_release(thread) {
                return Ok(None);
            }
        }
        let mut st = self.lock();
        let next = st.release(&self.core, thread, synch.id)?;
        self.commit(&mut st);
        Ok(next)
    }

    /// Acorda todos os waiters com o motivo dado. Retorna quantos.
    pub fn flush(&self, synch: &SynchRef, reason: FlushReason) -> SysResult<usize> {
        let mut st = self.lock();
        let woken = st.flush(&self.core, synch.id, reason)?;
        self.commit(&mut st);
        Ok(woken)
    }

    pub fn destroy_synch(&self, synch: &SynchRef) -> SysResult<()> {
        let mut st = self.lock();
        st.destroy_synch(&self.core, synch.id)?;
        self.commit(&mut st);
        Ok(())
    }

    /// Dorme na fila de espera `synch`.
    pub fn sleep_on(&self, thread: ThreadId, synch: &SynchRef, timeout: Timeout) -> SysResult<Grant> {
        let mut st = self.lock();
        let grant = st.sleep_on(&self.core, thread, synch.id, timeout)?;
        self.commit(&mut st);
        Ok(grant)
    }

    /// Acorda a cabeça da fila.
    pub fn wakeup_one_sleeper(&self, synch: &SynchRef) -> SysResult<Option<ThreadId>> {
        let mut st = self.lock();
        let woken = st.wakeup_many_sleepers(&self.core, synch.id, 1)?;
        self.commit(&mut st);
        Ok(woken.first().copied())
    }

    /// Acorda até `n` waiters, na ordem da fila. Retorna quantos.
    pub fn wakeup_many_sleepers(&self, synch: &SynchRef, n: usize) -> SysResult<usize> {
        let mut st = self.lock();
        let woken = st.wakeup_many_sleepers(&self.core, synch.id, n)?;
        self.commit(&mut st);
        Ok(woken.len())
    }

    pub fn wakeup_this_sleeper(&self, synch: &SynchRef, thread: ThreadId) -> SysResult<()> {
        let mut st = self.lock();
        st.wakeup_this_sleeper(&self.core, synch.id, thread)?;
        self.commit(&mut st);
        Ok(())
    }

    pub fn pending_count(&self, synch: &SynchRef) -> SysResult<usize> {
        Ok(self.lock().synch(synch.id)?.pendq.len())
    }

    /// Cabeça da pendq, sem retirá-la
    pub fn peek_pending(&self, synch: &SynchRef) -> SysResult<Option<ThreadId>> {
        Ok(self.lock().synch(synch.id)?.pendq.front().copied())
    }

    pub fn synch_owner(&self, synch: &SynchRef) -> SysResult<Option<ThreadId>> {
        Ok(self.lock().owned_synch(synch.id)?.owner())
    }

    pub fn synch_snapshot(&self, synch: &SynchRef) -> SysResult<SynchSnapshot> {
        self.lock().synch_snapshot(synch.id)
    }
}
