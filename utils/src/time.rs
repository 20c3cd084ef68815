//! Duration formatting for log lines and CLI output.

const UNITS: [(u64, &str); 4] = [(86_400, "d"), (3_600, "h"), (60, "m"), (1, "s")];

/// Render `secs` with its two most significant non-zero units, e.g.
/// `"2h 5m"`, `"1d"`, `"45s"`.
pub fn format_duration(secs: u64) -> String {
    if secs == 0 {
        return "0s".to_string();
    }
    let mut rest = secs;
    let parts: Vec<String> = UNITS
        .iter()
        .filter_map(|&(size, suffix)| {
            let n = rest / size;
            rest %= size;
            (n > 0).then(|| format!("{n}{suffix}"))
        })
        .take(2)
        .collect();
    parts.join(" ")
}
