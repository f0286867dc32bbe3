//! # Arena com Handles Geracionais
//!
//! Slab de objetos do núcleo (threads, synchs, timers). Referências cruzadas
//! entre objetos são handles `índice + geração`, validados a cada acesso:
//! um handle de objeto já liberado nunca resolve para o ocupante seguinte
//! do mesmo slot.
//!
//! A geração nunca é 0, então nenhum handle válido vale 0. A palavra de
//! fast lock dos synchs depende disso para representar "livre".
//!
//! Um slot que chega à última geração é aposentado ao ser liberado, em vez
//! de dar a volta: cada slot serve no máximo `u16::MAX` ocupantes.

use alloc::vec::Vec;

/// Handle é índice + generation
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u32);

impl Handle {
    pub const INVALID: Self = Self(0);

    pub const fn new(index: u16, generation: u16) -> Self {
        Self((generation as u32) << 16 | index as u32)
    }

    pub const fn index(&self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }

    pub const fn generation(&self) -> u16 {
        (self.0 >> 16) as u16
    }

    pub const fn is_valid(&self) -> bool {
        self.generation() != 0
    }

    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    pub const fn from_u32(raw: u32) -> Self {
        Self(raw)
    }
}

struct Slot<T> {
    generation: u16,
    value: Option<T>,
}

/// Slab de objetos endereçados por `Handle`.
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u16>,
    len: usize,
}

impl<T> Arena<T> {
    /// Índices são u16.
    pub const MAX_CAPACITY: usize = 1 << 16;

    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Reserva um slot e constrói o objeto já conhecendo seu handle.
    pub fn insert_with(&mut self, build: impl FnOnce(Handle) -> T) -> Option<Handle> {
        let index = match self.free.pop() {
            Some(index) => index as usize,
            None => {
                if self.slots.len() >= Self::MAX_CAPACITY {
                    return None;
                }
                self.slots.push(Slot {
                    generation: 0,
                    value: None,
                });
                self.slots.len() - 1
            }
        };

        let slot = &mut self.slots[index];
        // Slots na última geração nunca voltam para `free`
        slot.generation += 1;
        let handle = Handle::new(index as u16, slot.generation);
        slot.value = Some(build(handle));
        self.len += 1;
        Some(handle)
    }

    pub fn insert(&mut self, value: T) -> Option<Handle> {
        self.insert_with(|_| value)
    }

    /// Obtém objeto por handle (validando generation)
    pub fn get(&self, handle: Handle) -> Option<&T> {
        let slot = self.slots.get(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.value.as_ref()
    }

    /// Obtém objeto mutável
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.value.as_mut()
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.get(handle).is_some()
    }

    /// Libera o slot. O handle antigo deixa de resolver imediatamente.
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        let index = handle.index();
        let slot = self.slots.get_mut(index as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        let value = slot.value.take()?;
        if slot.generation < u16::MAX {
            self.free.push(index);
        }
        self.len -= 1;
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Itera sobre objetos vivos.
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value
                .as_ref()
                .map(|value| (Handle::new(index as u16, slot.generation), value))
        })
    }

    /// Itera sobre objetos vivos (mutável).
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle, &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            let generation = slot.generation;
            slot.value
                .as_mut()
                .map(|value| (Handle::new(index as u16, generation), value))
        })
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}
