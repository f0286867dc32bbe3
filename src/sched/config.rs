//! Constantes de configuração do Scheduler

/// Prioridade mínima das classes RT, Quota e TP
pub const PRIORITY_MIN: i32 = 0;

/// Prioridade máxima das classes RT, Quota e TP
pub const PRIORITY_MAX: i32 = 255;

/// Prioridade máxima da classe Weak
pub const WEAK_PRIORITY_MAX: i32 = 99;

/// Prioridade da thread root (Idle)
pub const PRIORITY_IDLE: i32 = 0;

/// Distância entre os pesos de classes consecutivas.
/// Maior que qualquer faixa de prioridade, então uma classe mais pesada
/// sempre preempta uma mais leve.
pub const CLASS_WEIGHT_FACTOR: i32 = 256;

/// Quantum padrão de round-robin (ns)
pub const DEFAULT_QUANTUM_NS: u64 = 10_000_000;

/// Período padrão de reposição das quotas (ns)
pub const DEFAULT_QUOTA_PERIOD_NS: u64 = 1_000_000_000;

/// Grupos de quota por CPU
pub const MAX_QUOTA_GROUPS: usize = 32;

/// Partições TP por CPU
pub const MAX_TP_PARTITIONS: usize = 16;

/// Limite da caminhada de herança de prioridade pela cadeia de donos
pub const DEFAULT_PI_DEPTH: usize = 64;
