/// Display helpers for the result table

use chrono::{DateTime, Utc};

pub const PUMP_FUN_COIN_URL: &str = "https://pump.fun/coin";

/// `dd/mm/YYYY HH:MM:SS`, or `N/A` when the provider has no pair timestamp yet
pub fn format_creation_date(created_at: Option<DateTime<Utc>>) -> String {
    match created_at {
        Some(ts) => ts.format("%d/%m/%Y %H:%M:%S").to_string(),
        None => "N/A".to_string(),
    }
}

/// Compact USD: `$1.2M` style from one million up, whole dollars below
pub fn format_usd(value: f64) -> String {
    if value >= 1_000_000_000.0 {
        format!("${:.1}B", value / 1_000_000_000.0)
    } else if value >= 1_000_000.0 {
        format!("${:.1}M", value / 1_000_000.0)
    } else {
        format!("${}", group_thousands(value.max(0.0).round() as u64))
    }
}

/// `ABCDEF...UVWXYZ`
pub fn truncate_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 12 {
        return address.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 6..].iter().collect();
    format!("{}...{}", head, tail)
}

/// pump.fun coin page for a token
pub fn coin_url(mint: &str) -> String {
    format!("{}/{}", PUMP_FUN_COIN_URL, mint)
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
