use chrono::{DateTime, Utc};
use url::Url;

/// Host of `url` without a leading `www.`; `None` when the URL does not parse
/// or has no host.
pub fn extract_domain(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(host.strip_prefix("www.").unwrap_or(host).to_string())
}

/// Human-readable age of `then` relative to `now`, e.g. "3 hours ago".
pub fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    format_age((now - then).num_seconds())
}

/// Same as [`time_ago`] for a unix timestamp in seconds.
pub fn time_ago_unix(timestamp: i64, now: DateTime<Utc>) -> String {
    format_age(now.timestamp() - timestamp)
}

fn format_age(diff_secs: i64) -> String {
    // Clock skew can put upstream timestamps slightly in the future
    let diff = diff_secs.max(0);

    if diff < 3600 {
        plural(diff / 60, "minute")
    } else if diff < 86400 {
        plural(diff / 3600, "hour")
    } else {
        plural(diff / 86400, "day")
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("{} {} ago", n, unit)
    } else {
        format!("{} {}s ago", n, unit)
    }
}

/// Formats an integer with comma thousands separators: 1234567 -> "1,234,567".
pub fn group_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Integer percentage of `part` in `total`, rounded half up.
pub fn percent(part: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((part as f64 / total as f64) * 100.0).round() as u32
}
