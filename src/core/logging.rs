// =============================================================================
// NUCLEO LOGGING SYSTEM - ZERO OVERHEAD
// =============================================================================
//
// Sistema de logging do núcleo de tempo real com custo ZERO em release.
//
// ARQUITETURA:
// Este sistema foi projetado para ser completamente removível em release:
// - Usa features do Cargo para compile-time filtering
// - Com feature "no_logs", TODOS os macros viram expressões vazias
// - SEM core::fmt - Evita geração de código SSE/AVX
// - SEM alocação - Apenas strings literais
// - Escreve no sink registrado pelo kernel hospedeiro (ver klog::set_sink)
//
// NÍVEIS DE LOG (do mais crítico ao menos):
// - ERROR: Erros fatais ou críticos
// - WARN:  Situações suspeitas mas recuperáveis
// - INFO:  Fluxo normal de execução
// - DEBUG: Informações de debugging
// - TRACE: Detalhes extremos (cada operação)
//
// FEATURES:
// - no_logs:   Remove 100% dos logs (custo zero no binário)
// - log_info:  Apenas ERROR, WARN, INFO
// - log_trace: Todos os níveis (padrão)
//
// COMO USAR:
//   kinfo!("(Timer) Fila vazia");              // Apenas string
//   kinfo!("(Sched) Troca para tid=", tid);    // String + hex
//   klog!("date=", date, " interval=", iv);    // Múltiplos valores
//
// =============================================================================

// =============================================================================
// PREFIXOS COM CORES ANSI
// =============================================================================
//
// Cores ANSI para terminais que suportam (como o QEMU serial console).
// Cada prefixo inclui: código de cor + texto + reset de cor.
//
// Formato: \x1b[<código>m  onde:
//   1;31 = Bold Red
//   1;33 = Bold Yellow
//   32   = Green
//   36   = Cyan
//   35   = Magenta
//   0    = Reset
//

pub const P_ERROR: &str = "\x1b[1;31m[ERRO]\x1b[0m ";
pub const P_WARN: &str = "\x1b[1;33m[WARN]\x1b[0m ";
pub const P_INFO: &str = "\x1b[32m[INFO]\x1b[0m ";
pub const P_DEBUG: &str = "\x1b[36m[DEBG]\x1b[0m ";
pub const P_TRACE: &str = "\x1b[35m[TRAC]\x1b[0m ";

// =============================================================================
// MACROS DE LOG - NÍVEL ERROR
// =============================================================================
//
// kerror! - Sempre ativo (exceto com no_logs)
// Usado para erros críticos que podem causar crash.
//

#[cfg(not(feature = "no_logs"))]
#[macro_export]
macro_rules! kerror {
    // Apenas string literal
    ($msg:expr) => {{
        $crate::core::debug::klog::emit_str($crate::core::logging::P_ERROR);
        $crate::core::debug::klog::emit_str($msg);
        $crate::core::debug::klog::emit_nl();
    }};
    // String + valor hex
    ($msg:expr, $val:expr) => {{
        $crate::core::debug::klog::emit_str($crate::core::logging::P_ERROR);
        $crate::core::debug::klog::emit_str($msg);
        $crate::core::debug::klog::emit_hex($val as u64);
        $crate::core::debug::klog::emit_nl();
    }};
}

#[cfg(feature = "no_logs")]
#[macro_export]
macro_rules! kerror {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// MACROS DE LOG - NÍVEL WARN
// =============================================================================
//
// kwarn! - Ativo exceto com no_logs
// Usado para situações suspeitas mas recuperáveis.
//

#[cfg(not(feature = "no_logs"))]
#[macro_export]
macro_rules! kwarn {
    ($msg:expr) => {{
        $crate::core::debug::klog::emit_str($crate::core::logging::P_WARN);
        $crate::core::debug::klog::emit_str($msg);
        $crate::core::debug::klog::emit_nl();
    }};
    ($msg:expr, $val:expr) => {{
        $crate::core::debug::klog::emit_str($crate::core::logging::P_WARN);
        $crate::core::debug::klog::emit_str($msg);
        $crate::core::debug::klog::emit_hex($val as u64);
        $crate::core::debug::klog::emit_nl();
    }};
}

#[cfg(feature = "no_logs")]
#[macro_export]
macro_rules! kwarn {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// MACROS DE LOG - NÍVEL INFO
// =============================================================================
//
// kinfo! - Ativo exceto com no_logs / log_error
// Usado para eventos importantes do fluxo normal.
//

#[cfg(not(any(feature = "no_logs", feature = "log_error")))]
#[macro_export]
macro_rules! kinfo {
    ($msg:expr) => {{
        $crate::core::debug::klog::emit_str($crate::core::logging::P_INFO);
        $crate::core::debug::klog::emit_str($msg);
        $crate::core::debug::klog::emit_nl();
    }};
    ($msg:expr, $val:expr) => {{
        $crate::core::debug::klog::emit_str($crate::core::logging::P_INFO);
        $crate::core::debug::klog::emit_str($msg);
        $crate::core::debug::klog::emit_hex($val as u64);
        $crate::core::debug::klog::emit_nl();
    }};
}

#[cfg(any(feature = "no_logs", feature = "log_error"))]
#[macro_export]
macro_rules! kinfo {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// MACROS DE LOG - NÍVEL DEBUG
// =============================================================================
//
// kdebug! - Ativo apenas com log_trace ou log_debug
// Usado para informações de debugging.
//

#[cfg(any(feature = "log_trace", feature = "log_debug"))]
#[macro_export]
macro_rules! kdebug {
    ($msg:expr) => {{
        $crate::core::debug::klog::emit_str($crate::core::logging::P_DEBUG);
        $crate::core::debug::klog::emit_str($msg);
        $crate::core::debug::klog::emit_nl();
    }};
    ($msg:expr, $val:expr) => {{
        $crate::core::debug::klog::emit_str($crate::core::logging::P_DEBUG);
        $crate::core::debug::klog::emit_str($msg);
        $crate::core::debug::klog::emit_hex($val as u64);
        $crate::core::debug::klog::emit_nl();
    }};
}

#[cfg(not(any(feature = "log_trace", feature = "log_debug")))]
#[macro_export]
macro_rules! kdebug {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// MACROS DE LOG - NÍVEL TRACE
// =============================================================================
//
// ktrace! - Ativo apenas com log_trace
// Usado para detalhes extremos de cada operação.
//

#[cfg(feature = "log_trace")]
#[macro_export]
macro_rules! ktrace {
    ($msg:expr) => {{
        $crate::core::debug::klog::emit_str($crate::core::logging::P_TRACE);
        $crate::core::debug::klog::emit_str($msg);
        $crate::core::debug::klog::emit_nl();
    }};
    ($msg:expr, $val:expr) => {{
        $crate::core::debug::klog::emit_str($crate::core::logging::P_TRACE);
        $crate::core::debug::klog::emit_str($msg);
        $crate::core::debug::klog::emit_hex($val as u64);
        $crate::core::debug::klog::emit_nl();
    }};
}

#[cfg(not(feature = "log_trace"))]
#[macro_export]
macro_rules! ktrace {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// MACROS AUXILIARES
// =============================================================================

/// klog! - Log genérico sem prefixo de nível.
///
/// Útil para construir logs complexos com múltiplos valores.
///
/// # Uso
/// ```ignore
/// klog!("date=", date);                    // String + hex
/// klog!("cpu=", cpu, " curr=", tid);       // Múltiplos
/// ```
#[cfg(not(feature = "no_logs"))]
#[macro_export]
macro_rules! klog {
    // Apenas string
    ($msg:expr) => {{
        $crate::core::debug::klog::emit_str($msg);
    }};
    // String + hex
    ($msg:expr, $val:expr) => {{
        $crate::core::debug::klog::emit_str($msg);
        $crate::core::debug::klog::emit_hex($val as u64);
    }};
    // String + hex + string
    ($msg1:expr, $val:expr, $msg2:expr) => {{
        $crate::core::debug::klog::emit_str($msg1);
        $crate::core::debug::klog::emit_hex($val as u64);
        $crate::core::debug::klog::emit_str($msg2);
    }};
    // String + hex + string + hex
    ($msg1:expr, $val1:expr, $msg2:expr, $val2:expr) => {{
        $crate::core::debug::klog::emit_str($msg1);
        $crate::core::debug::klog::emit_hex($val1 as u64);
        $crate::core::debug::klog::emit_str($msg2);
        $crate::core::debug::klog::emit_hex($val2 as u64);
    }};
}

#[cfg(feature = "no_logs")]
#[macro_export]
macro_rules! klog {
    ($($t:tt)*) => {{}};
}

/// knl! - Emite apenas newline.
#[cfg(not(feature = "no_logs"))]
#[macro_export]
macro_rules! knl {
    () => {{
        $crate::core::debug::klog::emit_nl();
    }};
}

#[cfg(feature = "no_logs")]
#[macro_export]
macro_rules! knl {
    () => {{}};
}

// =============================================================================
// MACROS DE STATUS (OK/FAIL)
// =============================================================================

/// kok! - Log de sucesso (prefixo verde [OK]).
#[cfg(not(feature = "no_logs"))]
#[macro_export]
macro_rules! kok {
    ($msg:expr) => {{
        $crate::core::debug::klog::emit_str("\x1b[32m[OK]\x1b[0m ");
        $crate::core::debug::klog::emit_str($msg);
        $crate::core::debug::klog::emit_nl();
    }};
}

#[cfg(feature = "no_logs")]
#[macro_export]
macro_rules! kok {
    ($($t:tt)*) => {{}};
}

/// kfail! - Log de falha (prefixo vermelho [FAIL]).
#[cfg(not(feature = "no_logs"))]
#[macro_export]
macro_rules! kfail {
    ($msg:expr) => {{
        $crate::core::debug::klog::emit_str("\x1b[1;31m[FAIL]\x1b[0m ");
        $crate::core::debug::klog::emit_str($msg);
        $crate::core::debug::klog::emit_nl();
    }};
}

#[cfg(feature = "no_logs")]
#[macro_export]
macro_rules! kfail {
    ($($t:tt)*) => {{}};
}
