use chrono::{ DateTime, NaiveDateTime, Utc };
use colored::Colorize;

/// Echo of the user's side of the dialogue.
pub fn you_speak(text: &str) {
    println!("{}", text.green());
}

/// Echo of the assistant's side of the dialogue.
pub fn assistant_speaks(text: &str) {
    println!("{}", text.cyan());
}

/// Instructions and warnings the user should act on.
pub fn notice(text: &str) {
    println!("{}", text.yellow());
}

pub fn plain(text: &str) {
    println!("{}", text);
}

/// Render an ISO-8601 listing timestamp, falling back to the raw value when
/// the backend changes its format.
pub fn format_listing_time(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|dt|
                dt.format("%Y-%m-%d %H:%M:%S").to_string()
            )
        })
        .unwrap_or_else(|_| raw.to_string())
}

/// Render a unix-epoch message timestamp from a conversation mapping.
pub fn format_message_time(epoch: f64) -> String {
    DateTime::<Utc>::from_timestamp(epoch as i64, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| epoch.to_string())
}

/// One listing row: index, timestamp, dimmed id, title. The active
/// conversation gets its index highlighted.
pub fn listing_row(index: usize, time: &str, id: &str, title: &str, active: bool) {
    let marker = format!("{}.", index);
    let marker = if active { marker.yellow() } else { marker.bright_black() };
    println!("{} {} {} {}", marker, time, id.bright_black(), title);
}

/// One transcript row: dimmed timestamp, speaker-colored text.
pub fn transcript_row(time: &str, role: &str, text: &str) {
    let text = if role == "user" { text.green() } else { text.cyan() };
    println!("{} {}", time.bright_black(), text);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_time_handles_fromisoformat_style_values() {
        assert_eq!(
            format_listing_time("2023-04-01T10:30:00.123456"),
            "2023-04-01 10:30:00"
        );
        assert_eq!(
            format_listing_time("2023-04-01T10:30:00+00:00"),
            "2023-04-01 10:30:00"
        );
    }

    #[test]
    fn listing_time_falls_back_to_the_raw_value() {
        assert_eq!(format_listing_time("not a date"), "not a date");
    }

    #[test]
    fn message_time_renders_epoch_seconds() {
        assert_eq!(format_message_time(1_680_345_000.0), "2023-04-01 10:30:00");
    }
}
