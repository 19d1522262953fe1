use chrono::NaiveTime;
use lazy_static::lazy_static;
use regex::Regex;

use crate::{error::AppError, models::appointment::CustomerDetails};

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").unwrap();

    // NL/BE numbers: local (06…, 04…, 010…) or international (+31, +32, 0031, 0032).
    static ref PHONE_RE: Regex =
        Regex::new(r"^(?:\+3[12]|003[12]|0)[1-9][0-9]{7,9}$").unwrap();

    // NL "1234 AB" (space optional) or BE "1234".
    static ref NL_POSTAL_RE: Regex = Regex::new(r"^([1-9][0-9]{3}) ?([A-Za-z]{2})$").unwrap();
    static ref BE_POSTAL_RE: Regex = Regex::new(r"^[1-9][0-9]{3}$").unwrap();
}

const MAX_NAME_LEN: usize = 255;
const MAX_REMARKS_LEN: usize = 2000;

pub fn normalize_email(email: &str) -> Result<String, AppError> {
    let email = email.trim().to_lowercase();
    if email.len() > 255 || !EMAIL_RE.is_match(&email) {
        return Err(AppError::validation("Invalid email address"));
    }
    Ok(email)
}

/// Strips spaces, dashes, dots and parentheses before matching.
pub fn normalize_phone(phone: &str) -> Result<String, AppError> {
    let compact: String = phone
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();
    if !PHONE_RE.is_match(&compact) {
        return Err(AppError::validation("Invalid phone number"));
    }
    Ok(compact)
}

/// NL codes become "1234 AB"; BE codes stay four digits.
pub fn normalize_postal_code(code: &str) -> Result<String, AppError> {
    let code = code.trim();
    if let Some(caps) = NL_POSTAL_RE.captures(code) {
        return Ok(format!("{} {}", &caps[1], caps[2].to_uppercase()));
    }
    if BE_POSTAL_RE.is_match(code) {
        return Ok(code.to_string());
    }
    Err(AppError::validation("Invalid postal code"))
}

pub fn required_text(value: &str, field: &str, max_len: usize) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::validation(format!("{field} is required")));
    }
    if value.chars().count() > max_len {
        return Err(AppError::validation(format!("{field} is too long")));
    }
    Ok(value.to_string())
}

/// Trims and drops empty strings.
pub fn optional_text(value: Option<&str>, field: &str, max_len: usize) -> Result<Option<String>, AppError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) if v.chars().count() > max_len => {
            Err(AppError::validation(format!("{field} is too long")))
        }
        Some(v) => Ok(Some(v.to_string())),
    }
}

/// Parses "HH:MM" (seconds tolerated).
pub fn parse_time(value: &str) -> Result<NaiveTime, AppError> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| AppError::validation(format!("Invalid time '{value}', use HH:MM")))
}

/// Customer details after validation and normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidCustomer {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub street: Option<String>,
    pub postal_code: String,
    pub city: Option<String>,
    pub remarks: Option<String>,
}

pub fn validate_customer(input: &CustomerDetails) -> Result<ValidCustomer, AppError> {
    Ok(ValidCustomer {
        name: required_text(&input.name, "Name", MAX_NAME_LEN)?,
        email: normalize_email(&input.email)?,
        phone: normalize_phone(&input.phone)?,
        street: optional_text(input.street.as_deref(), "Street", MAX_NAME_LEN)?,
        postal_code: normalize_postal_code(&input.postal_code)?,
        city: optional_text(input.city.as_deref(), "City", 128)?,
        remarks: optional_text(input.remarks.as_deref(), "Remarks", MAX_REMARKS_LEN)?,
    })
}

pub fn validate_remarks(remarks: Option<&str>) -> Result<Option<String>, AppError> {
    optional_text(remarks, "Remarks", MAX_REMARKS_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details() -> CustomerDetails {
        CustomerDetails {
            name: "  Jan Jansen ".into(),
            email: " Jan.Jansen@Example.NL ".into(),
            phone: "06-1234 5678".into(),
            street: Some("Dorpsstraat 1".into()),
            postal_code: "1234ab".into(),
            city: Some("  ".into()),
            remarks: None,
        }
    }

    #[test]
    fn customer_fields_are_normalized() {
        let c = validate_customer(&details()).unwrap();
        assert_eq!(c.name, "Jan Jansen");
        assert_eq!(c.email, "jan.jansen@example.nl");
        assert_eq!(c.phone, "0612345678");
        assert_eq!(c.postal_code, "1234 AB");
        assert_eq!(c.city, None);
    }

    #[test]
    fn dutch_and_belgian_postal_codes() {
        assert_eq!(normalize_postal_code("1234 ab").unwrap(), "1234 AB");
        assert_eq!(normalize_postal_code("9000").unwrap(), "9000");
        assert!(normalize_postal_code("0123 AB").is_err());
        assert!(normalize_postal_code("12345").is_err());
        assert!(normalize_postal_code("1234 A").is_err());
    }

    #[test]
    fn phone_numbers() {
        assert_eq!(normalize_phone("+31 6 12345678").unwrap(), "+31612345678");
        assert_eq!(normalize_phone("0032 470 12 34 56").unwrap(), "0032470123456");
        assert_eq!(normalize_phone("(010) 123-4567").unwrap(), "0101234567");
        assert!(normalize_phone("+44 20 7946 0958").is_err());
        assert!(normalize_phone("12345").is_err());
    }

    #[test]
    fn emails() {
        assert!(normalize_email("a@b.co").is_ok());
        assert!(normalize_email("not-an-email").is_err());
        assert!(normalize_email("a@b").is_err());
    }

    #[test]
    fn missing_name_is_rejected() {
        let mut d = details();
        d.name = "   ".into();
        let err = validate_customer(&d).unwrap_err();
        assert_eq!(err.to_string(), "Name is required");
    }

    #[test]
    fn times_accept_minutes_and_seconds() {
        assert_eq!(parse_time("09:30").unwrap(), NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(parse_time("14:00:00").unwrap(), NaiveTime::from_hms_opt(14, 0, 0).unwrap());
        assert!(parse_time("25:00").is_err());
        assert!(parse_time("noon").is_err());
    }
}
