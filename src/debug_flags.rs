use std::sync::OnceLock;

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "on" | "ON"))
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| parse_u64_hex_or_dec(&v))
        .unwrap_or(default)
}

pub fn parse_u64_hex_or_dec(s: &str) -> Option<u64> {
    let s = s.trim();
    if let Some(stripped) = s.strip_prefix("0x").or_else(|| s.strip_prefix('$')) {
        u64::from_str_radix(stripped, 16).ok()
    } else {
        s.parse::<u64>().ok()
    }
}

pub fn quiet() -> bool {
    static ON: OnceLock<bool> = OnceLock::new();
    *ON.get_or_init(|| env_flag("QUIET", false))
}

// Per-instruction trace at log level trace
pub fn trace_cpu() -> bool {
    static ON: OnceLock<bool> = OnceLock::new();
    *ON.get_or_init(|| env_flag("TRACE_CPU", false))
}

// Instruction count after which the APU ready signature shows up; 0 = never
pub fn apu_boot_signature() -> u64 {
    static N: OnceLock<u64> = OnceLock::new();
    *N.get_or_init(|| env_u64("APU_BOOT_SIGNATURE", 0))
}

// 0 = unbounded
pub fn max_steps() -> u64 {
    static N: OnceLock<u64> = OnceLock::new();
    *N.get_or_init(|| env_u64("MAX_STEPS", 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_parse_in_hex_or_decimal() {
        assert_eq!(parse_u64_hex_or_dec("42"), Some(42));
        assert_eq!(parse_u64_hex_or_dec("0x8000"), Some(0x8000));
        assert_eq!(parse_u64_hex_or_dec(" $00FFC0 "), Some(0xFFC0));
        assert_eq!(parse_u64_hex_or_dec("nope"), None);
    }
}
