//! Form field helpers shared by the clinic services
//!
//! Forms arrive as loosely typed JSON; every field is optional so that a
//! missing value becomes a field error instead of a decode failure.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use regex::Regex;
use std::sync::OnceLock;

use crate::crud::ValidationErrors;

const MONTHS_ES: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"))
}

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^https?://.+").expect("valid url regex"))
}

pub fn is_valid_email(value: &str) -> bool {
    email_regex().is_match(value)
}

pub fn is_valid_url(value: &str) -> bool {
    url_regex().is_match(value)
}

/// Trimmed text, empty when missing
pub fn text(value: &Option<String>) -> String {
    value.as_deref().map(str::trim).unwrap_or_default().to_string()
}

/// Trimmed non-empty text, or a field error
pub fn required_text(
    errors: &mut ValidationErrors,
    field: &str,
    value: &Option<String>,
    message: &str,
) -> String {
    let value = text(value);
    errors.check(value.is_empty(), field, message);
    value
}

/// Parse a `YYYY-MM-DD` field
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

/// Parse an `HH:mm` field
pub fn parse_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}

/// Required `YYYY-MM-DD` field
pub fn required_date(
    errors: &mut ValidationErrors,
    field: &str,
    value: &Option<String>,
    message: &str,
) -> Option<NaiveDate> {
    let raw = text(value);
    if raw.is_empty() {
        errors.add(field, message);
        return None;
    }
    let date = parse_date(&raw);
    errors.check(date.is_none(), field, "Fecha inválida (AAAA-MM-DD)");
    date
}

/// Required `HH:mm` field
pub fn required_time(
    errors: &mut ValidationErrors,
    field: &str,
    value: &Option<String>,
    message: &str,
) -> Option<NaiveTime> {
    let raw = text(value);
    if raw.is_empty() {
        errors.add(field, message);
        return None;
    }
    let time = parse_time(&raw);
    errors.check(time.is_none(), field, "Hora inválida (HH:mm)");
    time
}

/// Combine a calendar date and wall-clock time into a UTC instant
pub fn at(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    Utc.from_utc_datetime(&NaiveDateTime::new(date, time))
}

/// Midnight UTC of a date
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    at(date, NaiveTime::MIN)
}

/// `05 de marzo, 2024`
pub fn long_date_es(instant: &DateTime<Utc>) -> String {
    let month = MONTHS_ES[instant.month0() as usize];
    format!("{:02} de {}, {}", instant.day(), month, instant.year())
}

/// `5/3/2024`
pub fn short_date_es(date: &NaiveDate) -> String {
    format!("{}/{}/{}", date.day(), date.month(), date.year())
}

/// `09:30`
pub fn clock(instant: &DateTime<Utc>) -> String {
    format!("{:02}:{:02}", instant.hour(), instant.minute())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_and_url() {
        assert!(is_valid_email("ana@clinica.mx"));
        assert!(!is_valid_email("ana@clinica"));
        assert!(!is_valid_email("ana clinica@x.mx"));
        assert!(is_valid_url("https://clinica.mx"));
        assert!(!is_valid_url("clinica.mx"));
    }

    #[test]
    fn test_required_fields() {
        let mut errors = ValidationErrors::new();
        let title = required_text(&mut errors, "title", &Some("  Ana ".into()), "x");
        assert_eq!(title, "Ana");
        required_text(&mut errors, "code", &Some("   ".into()), "El campo Código es obligatorio");
        required_date(&mut errors, "date", &Some("2024-13-01".into()), "x");
        required_time(&mut errors, "time", &None, "Campo Hora obligatorio");

        assert_eq!(errors.get("code"), Some("El campo Código es obligatorio"));
        assert_eq!(errors.get("date"), Some("Fecha inválida (AAAA-MM-DD)"));
        assert_eq!(errors.get("time"), Some("Campo Hora obligatorio"));
        assert!(!errors.contains("title"));
    }

    #[test]
    fn test_spanish_formats() {
        let date = parse_date("2024-03-05").unwrap();
        let instant = at(date, parse_time("09:30").unwrap());
        assert_eq!(long_date_es(&instant), "05 de marzo, 2024");
        assert_eq!(short_date_es(&date), "5/3/2024");
        assert_eq!(clock(&instant), "09:30");
    }
}
