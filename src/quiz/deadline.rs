use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, NaiveTime, TimeZone};

const FULL_FORMAT: &str = "%H:%M %d.%m.%Y";
const TIME_FORMAT: &str = "%H:%M";

/// Parse a deadline entered as either `HH:MM DD.MM.YYYY` or bare `HH:MM`.
/// A bare time means the next occurrence of that wall-clock time: today if
/// still ahead of `now`, otherwise tomorrow. `now` carries the zone the
/// result is anchored to.
pub fn parse_deadline(
    input: &str,
    now: DateTime<FixedOffset>,
) -> Option<DateTime<FixedOffset>> {
    let input = input.trim();
    let tz = *now.offset();

    if let Ok(naive) = NaiveDateTime::parse_from_str(input, FULL_FORMAT) {
        return tz.from_local_datetime(&naive).single();
    }

    let time = NaiveTime::parse_from_str(input, TIME_FORMAT).ok()?;
    let mut candidate = now.date_naive().and_time(time);
    if candidate <= now.naive_local() {
        candidate = candidate + Duration::days(1);
    }
    tz.from_local_datetime(&candidate).single()
}

/// The display form shown in previews, quiz overviews and result cards.
pub fn format_instant(instant: &DateTime<FixedOffset>) -> String {
    instant.format(FULL_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noon() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(5 * 3600)
            .unwrap()
            .with_ymd_and_hms(2025, 7, 7, 12, 0, 0)
            .unwrap()
    }

    #[test]
    fn full_format_pins_the_exact_instant() {
        let parsed = parse_deadline("22:00 09.07.2025", noon()).unwrap();
        assert_eq!(format_instant(&parsed), "22:00 09.07.2025");
        assert_eq!(parsed.offset().local_minus_utc(), 5 * 3600);
    }

    #[test]
    fn bare_time_still_ahead_lands_today() {
        let parsed = parse_deadline("13:30", noon()).unwrap();
        assert_eq!(format_instant(&parsed), "13:30 07.07.2025");
    }

    #[test]
    fn bare_time_already_passed_rolls_to_tomorrow() {
        let parsed = parse_deadline("11:00", noon()).unwrap();
        assert_eq!(format_instant(&parsed), "11:00 08.07.2025");
    }

    #[test]
    fn bare_time_equal_to_now_rolls_to_tomorrow() {
        let parsed = parse_deadline("12:00", noon()).unwrap();
        assert_eq!(format_instant(&parsed), "12:00 08.07.2025");
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_deadline("soon", noon()).is_none());
        assert!(parse_deadline("25:00", noon()).is_none());
        assert!(parse_deadline("22:00 32.01.2025", noon()).is_none());
    }
}
