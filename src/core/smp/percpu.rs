//! Arquivo: core/smp/percpu.rs
//!
//! Propósito: Registro Por-CPU do núcleo.
//! Cada CPU possui seu próprio escalonador e sua própria fila de timers.
//! O registro é montado uma vez no boot e nunca muda de tamanho depois.
//!
//! Detalhes de Implementação:
//! - `PerCpu<T>` é um slice boxado indexado por `CpuId`.
//! - O acesso acontece sempre sob o nklock, então não há `UnsafeCell`:
//!   a exclusão vem do lock global, não da CPU corrente.
//! - `CpuSet` é a máscara de afinidade (até `MAX_CPUS` CPUs).

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::ops::{Index, IndexMut};

use crate::sys::CpuId;

/// Número máximo de CPUs suportadas.
pub const MAX_CPUS: usize = 32;

/// Dados replicados por CPU, fixos após o boot.
pub struct PerCpu<T> {
    data: Box<[T]>,
}

impl<T> PerCpu<T> {
    /// Constrói uma instância por CPU.
    pub fn new_with(nr_cpus: usize, mut init: impl FnMut(CpuId) -> T) -> Self {
        let data: Vec<T> = (0..nr_cpus).map(|cpu| init(cpu as CpuId)).collect();
        Self {
            data: data.into_boxed_slice(),
        }
    }

    pub fn nr_cpus(&self) -> usize {
        self.data.len()
    }

    pub fn get(&self, cpu: CpuId) -> Option<&T> {
        self.data.get(cpu as usize)
    }

    pub fn get_mut(&mut self, cpu: CpuId) -> Option<&mut T> {
        self.data.get_mut(cpu as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = (CpuId, &T)> {
        self.data.iter().enumerate().map(|(cpu, v)| (cpu as CpuId, v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (CpuId, &mut T)> {
        self.data
            .iter_mut()
            .enumerate()
            .map(|(cpu, v)| (cpu as CpuId, v))
    }
}

impl<T> Index<CpuId> for PerCpu<T> {
    type Output = T;

    fn index(&self, cpu: CpuId) -> &T {
        &self.data[cpu as usize]
    }
}

impl<T> IndexMut<CpuId> for PerCpu<T> {
    fn index_mut(&mut self, cpu: CpuId) -> &mut T {
        &mut self.data[cpu as usize]
    }
}

/// Máscara de CPUs (afinidade)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuSet(u32);

impl CpuSet {
    pub const EMPTY: Self = Self(0);

    pub const fn single(cpu: CpuId) -> Self {
        Self(1 << cpu)
    }

    /// CPUs `0..nr_cpus`
    pub const fn first(nr_cpus: usize) -> Self {
        if nr_cpus >= MAX_CPUS {
            Self(u32::MAX)
        } else {
            Self((1u32 << nr_cpus) - 1)
        }
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub fn insert(&mut self, cpu: CpuId) {
        if (cpu as usize) < MAX_CPUS {
            self.0 |= 1 << cpu;
        }
    }

    pub fn contains(&self, cpu: CpuId) -> bool {
        (cpu as usize) < MAX_CPUS && self.0 & (1 << cpu) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Contido em `other`?
    pub fn is_subset(&self, other: CpuSet) -> bool {
        self.0 & !other.0 == 0
    }

    /// Menor CPU do conjunto
    pub fn first_cpu(&self) -> Option<CpuId> {
        if self.0 == 0 {
            None
        } else {
            Some(self.0.trailing_zeros())
        }
    }
}
