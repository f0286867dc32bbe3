//! Arquivo: core/debug/oops.rs
//!
//! Propósito: Violações de contrato internas do núcleo.
//! Um estado inconsistente (ex: remover da runqueue uma thread que não está
//! nela) não é erro recuperável: os dados sob o nklock já não são
//! confiáveis e continuar esconderia a corrupção.
//!
//! Detalhes de Implementação:
//! - Loga o erro de forma visível, com o valor que identifica o objeto.
//! - Em seguida entra em pânico.

/// Reporta uma violação de invariante e aborta.
#[cold]
pub fn nucleus_bug(msg: &'static str, value: u64) -> ! {
    crate::kerror!("*****************************************************");
    crate::kerror!("*                  NUCLEUS BUG                      *");
    crate::kerror!("*****************************************************");
    crate::kerror!(msg, value);
    panic!("{} {:#x}", msg, value);
}
