//! Memory measurement for the experiment runners.
//!
//! The peak resident set size is read from `/proc/self/status` (Linux only). On other
//! platforms the functions report zero.

/// Extracts a `kB` field such as `VmHWM:    1234 kB` from the contents of a
/// `/proc/<pid>/status` file.
fn status_field_kb(status: &str, key: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix(key)?.strip_prefix(':'))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|value| value.parse().ok())
}

/// Peak resident set size (`VmHWM`) of the current process in kilobytes, or 0 if it
/// cannot be read.
#[cfg(target_os = "linux")]
pub fn get_peak_rss_kb() -> u64 {
    match std::fs::read_to_string("/proc/self/status") {
        Ok(status) => status_field_kb(&status, "VmHWM").unwrap_or(0),
        Err(e) => {
            log::debug!("Could not read /proc/self/status: {e}");
            0
        }
    }
}

#[cfg(not(target_os = "linux"))]
pub fn get_peak_rss_kb() -> u64 {
    use std::sync::Once;
    static WARN_ONCE: Once = Once::new();
    WARN_ONCE.call_once(|| {
        log::warn!("Peak RSS measurement is only supported on Linux; reporting 0.");
    });
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_field_parsing() {
        let status = "Name:\tirlb\nVmPeak:\t  204800 kB\nVmHWM:\t   10240 kB\nThreads:\t1\n";
        assert_eq!(status_field_kb(status, "VmHWM"), Some(10240));
        assert_eq!(status_field_kb(status, "VmPeak"), Some(204800));
        assert_eq!(status_field_kb(status, "VmRSS"), None);
        // A key that is only a prefix of another one does not match.
        assert_eq!(status_field_kb(status, "Vm"), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_peak_rss_is_reported() {
        assert!(get_peak_rss_kb() > 0);
    }
}
