//! Wire formats for dates and times, and parsers for the same values in URL paths.

use time::{
    format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime,
    Time,
};

time::serde::format_description!(pub iso_date, Date, "[year]-[month]-[day]");
time::serde::format_description!(
    pub clock_time,
    Time,
    "[hour]:[minute][optional [:[second]]]"
);

pub fn parse_date(raw: &str) -> Option<Date> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]")).ok()
}

/// RFC 3339 timestamp, or a bare `YYYY-MM-DD` taken as midnight UTC.
pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    OffsetDateTime::parse(raw, &Rfc3339)
        .ok()
        .or_else(|| parse_date(raw).map(|d| d.midnight().assume_utc()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    #[test]
    fn parses_dates() {
        assert_eq!(parse_date("2024-01-08"), Some(date!(2024 - 01 - 08)));
        assert_eq!(parse_date("2024-13-01"), None);
        assert_eq!(parse_date("08/01/2024"), None);
    }

    #[test]
    fn parses_timestamps_and_bare_dates() {
        assert_eq!(
            parse_timestamp("2024-01-01T07:30:00Z"),
            Some(datetime!(2024-01-01 07:30:00 UTC))
        );
        assert_eq!(
            parse_timestamp("2024-01-01T09:30:00+02:00"),
            Some(datetime!(2024-01-01 07:30:00 UTC))
        );
        assert_eq!(parse_timestamp("2024-01-01"), Some(datetime!(2024-01-01 00:00:00 UTC)));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[derive(serde::Serialize, serde::Deserialize, Debug, PartialEq)]
    struct Sample {
        #[serde(with = "iso_date")]
        day: Date,
        #[serde(with = "clock_time")]
        at: Time,
    }

    #[test]
    fn serde_formats_accept_short_clock_times() {
        let s: Sample = serde_json::from_str(r#"{"day":"2024-01-01","at":"08:30"}"#).unwrap();
        assert_eq!(s.day, date!(2024 - 01 - 01));
        assert_eq!(s.at, time::macros::time!(8:30));
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["day"], "2024-01-01");
    }
}
