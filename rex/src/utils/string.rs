// SPDX-License-Identifier: MIT

pub fn pretty_bytes(n: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];
    let mut val = n as f64;
    let mut idx = 0usize;
    while val >= 1024.0 && idx + 1 < UNITS.len() {
        val /= 1024.0;
        idx += 1;
    }
    if idx == 0 {
        format!("{} {}", sep_u64(n), UNITS[0])
    } else {
        format!("{val:.1} {}", UNITS[idx])
    }
}

/// Groups digits by thousands: `12 345 678`.
pub fn sep_u64(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(' ');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sep_u64() {
        assert_eq!(sep_u64(0), "0");
        assert_eq!(sep_u64(999), "999");
        assert_eq!(sep_u64(1_000), "1 000");
        assert_eq!(sep_u64(15_260_537), "15 260 537");
    }

    #[test]
    fn test_pretty_bytes() {
        assert_eq!(pretty_bytes(512), "512 B");
        assert_eq!(pretty_bytes(256 * 1024), "256.0 KiB");
        assert_eq!(pretty_bytes(3 * 1024 * 1024 * 1024 / 2), "1.5 GiB");
    }
}
