//! Host memory probing used to size the memory cache.

/// Used when the platform gives no answer.
const FALLBACK_AVAILABLE_MEMORY: usize = 1024 * 1024 * 1024;

/// Returns the memory currently available to new allocations, in bytes.
///
/// On Linux this is `MemAvailable` from `/proc/meminfo` (or `MemTotal` on
/// kernels that lack it). Elsewhere a fixed 1 GiB is assumed.
#[must_use]
pub fn available_memory() -> usize {
    read_meminfo().unwrap_or(FALLBACK_AVAILABLE_MEMORY)
}

/// Computes a byte budget as `fraction` of `available`, never below one byte.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
pub fn memory_budget(available: usize, fraction: f64) -> usize {
    let fraction = if fraction.is_finite() {
        fraction.clamp(0.0, 1.0)
    } else {
        0.0
    };
    ((available as f64) * fraction).max(1.0) as usize
}

#[cfg(target_os = "linux")]
fn read_meminfo() -> Option<usize> {
    let content = std::fs::read_to_string("/proc/meminfo").ok()?;
    parse_meminfo(&content)
}

#[cfg(not(target_os = "linux"))]
fn read_meminfo() -> Option<usize> {
    None
}

/// Extracts available memory from `/proc/meminfo` text.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_meminfo(content: &str) -> Option<usize> {
    let field = |name: &str| {
        content.lines().find_map(|line| {
            let rest = line.strip_prefix(name)?.strip_prefix(':')?;
            let kb = rest.split_whitespace().next()?.parse::<usize>().ok()?;
            Some(kb * 1024)
        })
    };
    field("MemAvailable").or_else(|| field("MemTotal"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_memory_is_positive() {
        assert!(available_memory() > 0);
    }

    #[test]
    fn test_parse_prefers_mem_available() {
        let content = "MemTotal:       16384000 kB\nMemFree:         1000 kB\nMemAvailable:    8192000 kB\n";
        assert_eq!(parse_meminfo(content), Some(8_192_000 * 1024));
    }

    #[test]
    fn test_parse_falls_back_to_total() {
        let content = "MemTotal:       2048 kB\nMemFree:         1000 kB\n";
        assert_eq!(parse_meminfo(content), Some(2048 * 1024));
    }

    #[test]
    fn test_parse_garbage() {
        assert_eq!(parse_meminfo("nonsense"), None);
    }

    #[test]
    fn test_budget_is_fraction_of_available() {
        assert_eq!(memory_budget(1000, 0.2), 200);
        assert_eq!(memory_budget(1000, 5.0), 1000);
        assert_eq!(memory_budget(1000, 0.0), 1);
        assert_eq!(memory_budget(1000, f64::NAN), 1);
    }
}
