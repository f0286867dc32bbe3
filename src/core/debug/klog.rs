//! Sink de log do núcleo
//!
//! O núcleo não conhece a serial nem o console: o kernel hospedeiro registra
//! uma função que recebe fragmentos de texto. Sem sink registrado, os logs
//! são descartados.
//!
//! Os macros de `core::logging` chamam apenas `emit_str`, `emit_hex` e
//! `emit_nl`. Nada aqui usa `core::fmt`.

use spin::RwLock;

/// Função que recebe cada fragmento emitido.
pub type LogSink = fn(&str);

static SINK: RwLock<Option<LogSink>> = RwLock::new(None);

/// Registra (ou remove, com `None`) o destino dos logs.
pub fn set_sink(sink: Option<LogSink>) {
    *SINK.write() = sink;
}

/// Emite uma string crua
#[inline]
pub fn emit_str(s: &str) {
    if let Some(sink) = *SINK.read() {
        sink(s);
    }
}

/// Emite fim de linha
#[inline]
pub fn emit_nl() {
    emit_str("\r\n");
}

/// Emite um valor em hexadecimal com prefixo `0x`
pub fn emit_hex(value: u64) {
    let mut buf = [0u8; 18];
    emit_str(format_hex(value, &mut buf));
}

/// Formata `value` como `0x...` sem zeros à esquerda.
pub fn format_hex(value: u64, buf: &mut [u8; 18]) -> &str {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";

    buf[0] = b'0';
    buf[1] = b'x';
    let nibbles = if value == 0 {
        1
    } else {
        (64 - value.leading_zeros() as usize + 3) / 4
    };
    for i in 0..nibbles {
        let shift = (nibbles - 1 - i) * 4;
        buf[2 + i] = DIGITS[((value >> shift) & 0xF) as usize];
    }
    // Apenas dígitos ASCII foram escritos
    core::str::from_utf8(&buf[..2 + nibbles]).unwrap_or("0x?")
}
