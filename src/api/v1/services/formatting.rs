//! Conversions between YouTube payload encodings and what the dashboard displays.

use chrono::{DateTime, Datelike, Utc};

const FRENCH_MONTHS: [&str; 12] = [
    "Janvier",
    "Février",
    "Mars",
    "Avril",
    "Mai",
    "Juin",
    "Juillet",
    "Août",
    "Septembre",
    "Octobre",
    "Novembre",
    "Décembre",
];

/// Parses an ISO 8601 duration as returned by `videos.list` (`PT1H2M3S`, `P1DT2H`, `P0D`)
/// into whole seconds. Returns `None` for anything that is not a duration.
pub fn parse_duration(duration: &str) -> Option<i64> {
    let rest = duration.trim().strip_prefix('P')?;

    let mut total_seconds = 0i64;
    let mut current_num = String::new();
    let mut in_time_part = false;

    for c in rest.chars() {
        if c.is_ascii_digit() {
            current_num.push(c);
            continue;
        }

        if c == 'T' {
            if !current_num.is_empty() || in_time_part {
                return None;
            }
            in_time_part = true;
            continue;
        }

        let num: i64 = current_num.parse().ok()?;
        current_num.clear();

        let unit_seconds = match (in_time_part, c) {
            (false, 'W') => 7 * 86_400,
            (false, 'D') => 86_400,
            (true, 'H') => 3_600,
            (true, 'M') => 60,
            (true, 'S') => 1,
            _ => return None,
        };
        total_seconds = total_seconds.checked_add(num.checked_mul(unit_seconds)?)?;
    }

    if !current_num.is_empty() {
        return None;
    }

    Some(total_seconds)
}

/// `H:MM:SS` when the video lasts an hour or more, `M:SS` otherwise.
pub fn format_duration(duration_seconds: i64) -> String {
    let duration_seconds = duration_seconds.max(0);
    let hours = duration_seconds / 3600;
    let minutes = (duration_seconds % 3600) / 60;
    let seconds = duration_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Inverse of `format_duration`: accepts `H:MM:SS`, `M:SS` or a bare number of seconds.
pub fn parse_display_duration(display: &str) -> Option<i64> {
    let parts: Vec<&str> = display.trim().split(':').collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }

    parts.iter().try_fold(0i64, |total, part| {
        let value: i64 = part.parse().ok()?;
        if value < 0 {
            return None;
        }
        total.checked_mul(60)?.checked_add(value)
    })
}

/// Decodes the HTML entities the Data API leaves in titles and descriptions.
/// Single pass: `&amp;lt;` becomes `&lt;`, not `<`.
pub fn decode_html_entities(text: &str) -> String {
    let mut decoded = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find('&') {
        decoded.push_str(&rest[..start]);
        let candidate = &rest[start..];

        match candidate.find(';').and_then(|end| {
            decode_entity(&candidate[1..end]).map(|c| (c, end))
        }) {
            Some((c, end)) => {
                decoded.push(c);
                rest = &candidate[end + 1..];
            }
            None => {
                decoded.push('&');
                rest = &candidate[1..];
            }
        }
    }

    decoded.push_str(rest);
    decoded
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = entity.strip_prefix('#')?;
            let value = match code.strip_prefix('x').or_else(|| code.strip_prefix('X')) {
                Some(hex) if !hex.is_empty() && hex.bytes().all(|b| b.is_ascii_hexdigit()) => {
                    u32::from_str_radix(hex, 16).ok()?
                }
                None if !code.is_empty() && code.bytes().all(|b| b.is_ascii_digit()) => code.parse::<u32>().ok()?,
                _ => return None,
            };
            char::from_u32(value).filter(|c| *c != '\0')
        }
    }
}

/// "15 Janvier 2025".
pub fn format_published_label(published_at: &DateTime<Utc>) -> String {
    format!(
        "{} {} {}",
        published_at.day(),
        FRENCH_MONTHS[published_at.month0() as usize],
        published_at.year()
    )
}
