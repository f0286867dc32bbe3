//! Bitmap de prioridades em dois níveis
//!
//! `lomap` marca níveis ocupados; `himap` marca quais palavras de `lomap`
//! têm algum bit. Achar o nível mais alto custa dois `leading_zeros`,
//! independente de quantas threads existem.

/// Número de níveis endereçáveis.
pub const PRIO_LEVELS: usize = 256;

const WORDS: usize = PRIO_LEVELS / 64;

/// Bitmap de níveis ocupados
#[derive(Debug, Clone)]
pub struct PrioMap {
    himap: u64,
    lomap: [u64; WORDS],
}

impl PrioMap {
    pub const fn new() -> Self {
        Self {
            himap: 0,
            lomap: [0; WORDS],
        }
    }

    /// Define um bit
    pub fn set(&mut self, level: usize) {
        debug_assert!(level < PRIO_LEVELS);
        let word = level / 64;
        let bit = level % 64;
        self.lomap[word] |= 1 << bit;
        self.himap |= 1 << word;
    }

    /// Limpa um bit
    pub fn clear(&mut self, level: usize) {
        debug_assert!(level < PRIO_LEVELS);
        let word = level / 64;
        let bit = level % 64;
        self.lomap[word] &= !(1 << bit);
        if self.lomap[word] == 0 {
            self.himap &= !(1 << word);
        }
    }

    /// Testa um bit
    pub fn test(&self, level: usize) -> bool {
        debug_assert!(level < PRIO_LEVELS);
        (self.lomap[level / 64] & (1 << (level % 64))) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.himap == 0
    }

    /// Nível ocupado mais alto
    pub fn highest(&self) -> Option<usize> {
        if self.himap == 0 {
            return None;
        }
        let word = 63 - self.himap.leading_zeros() as usize;
        let bit = 63 - self.lomap[word].leading_zeros() as usize;
        Some(word * 64 + bit)
    }
}

impl Default for PrioMap {
    fn default() -> Self {
        Self::new()
    }
}
