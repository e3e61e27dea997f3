//! Human-readable renderings of snapshot numbers.

/// Atomic units per XMR.
const ATOMIC_UNITS: f64 = 1_000_000_000_000.0;

pub fn difficulty(value: u64) -> String {
    if value >= 1_000_000_000_000 {
        format!("{:.2} TH", value as f64 / 1e12)
    } else if value >= 1_000_000_000 {
        format!("{:.2} GH", value as f64 / 1e9)
    } else if value >= 1_000_000 {
        format!("{:.2} MH", value as f64 / 1e6)
    } else {
        group_thousands(value)
    }
}

pub fn hashrate(value: u64) -> String {
    if value >= 1_000_000_000 {
        format!("{:.2} GH/s", value as f64 / 1e9)
    } else if value >= 1_000_000 {
        format!("{:.2} MH/s", value as f64 / 1e6)
    } else if value >= 1_000 {
        format!("{:.2} KH/s", value as f64 / 1e3)
    } else {
        format!("{} H/s", value)
    }
}

/// Fee in XMR; small fees get more decimals.
pub fn fee(atomic: u64) -> String {
    if atomic == 0 {
        return "--".to_string();
    }
    let xmr = atomic as f64 / ATOMIC_UNITS;
    if xmr < 0.0001 {
        format!("{:.8}", xmr)
    } else {
        format!("{:.6}", xmr)
    }
}

pub fn block_reward(atomic: u64) -> String {
    if atomic == 0 {
        return "--".to_string();
    }
    format!("{:.4}", atomic as f64 / ATOMIC_UNITS)
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_difficulty() {
        assert_eq!(difficulty(360_000_000_000), "360.00 GH");
        assert_eq!(difficulty(1_500_000_000_000), "1.50 TH");
        assert_eq!(difficulty(2_500_000), "2.50 MH");
        assert_eq!(difficulty(999_999), "999,999");
        assert_eq!(difficulty(0), "0");
    }

    #[test]
    fn test_hashrate() {
        assert_eq!(hashrate(3_000_000_000), "3.00 GH/s");
        assert_eq!(hashrate(2_750_000), "2.75 MH/s");
        assert_eq!(hashrate(1_500), "1.50 KH/s");
        assert_eq!(hashrate(999), "999 H/s");
    }

    #[test]
    fn test_fee() {
        assert_eq!(fee(0), "--");
        assert_eq!(fee(20_000), "0.00000002");
        assert_eq!(fee(300_000_000), "0.000300");
    }

    #[test]
    fn test_block_reward() {
        assert_eq!(block_reward(0), "--");
        assert_eq!(block_reward(600_000_000_000), "0.6000");
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(1_234_567), "1,234,567");
        assert_eq!(group_thousands(123), "123");
        assert_eq!(group_thousands(1_000), "1,000");
    }
}
