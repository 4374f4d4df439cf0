//! Calendar-date helpers shared by profile fields and feed filters.
//!
//! Dates travel as `YYYY-MM-DD` strings on the wire.

use time::format_description::StaticFormatDescription;
use time::macros::format_description;
use time::Date;

const DATE_FORMAT: StaticFormatDescription = format_description!("[year]-[month]-[day]");

// Serde adapters; `iso_date::option` handles `Option<Date>` fields.
time::serde::format_description!(pub iso_date, Date, DATE_FORMAT);

pub fn parse_date(value: &str) -> Option<Date> {
    Date::parse(value.trim(), DATE_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Month;

    #[test]
    fn parses_iso_calendar_dates() {
        let date = parse_date("2023-08-27").expect("valid date");
        assert_eq!(date.year(), 2023);
        assert_eq!(date.month(), Month::August);
        assert_eq!(date.day(), 27);
    }

    #[test]
    fn rejects_malformed_dates() {
        assert!(parse_date("27/08/2023").is_none());
        assert!(parse_date("2023-02-30").is_none());
        assert!(parse_date("").is_none());
    }

    #[derive(serde::Serialize, serde::Deserialize)]
    struct Profile {
        #[serde(default, with = "iso_date::option")]
        born: Option<Date>,
    }

    #[test]
    fn optional_date_fields_use_iso_format() {
        let profile: Profile = serde_json::from_str(r#"{"born":"1990-01-05"}"#).unwrap();
        assert_eq!(serde_json::to_string(&profile).unwrap(), r#"{"born":"1990-01-05"}"#);

        let empty: Profile = serde_json::from_str("{}").unwrap();
        assert!(empty.born.is_none());
        assert_eq!(serde_json::to_string(&empty).unwrap(), r#"{"born":null}"#);

        assert!(serde_json::from_str::<Profile>(r#"{"born":"yesterday"}"#).is_err());
    }
}
