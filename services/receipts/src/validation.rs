//! Input validation utilities

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// File extensions accepted for receipt uploads
pub const ALLOWED_EXTENSIONS: [&str; 9] = [
    "png", "jpeg", "jpg", "gif", "tiff", "raw", "svg", "webp", "pdf",
];

/// Validate a display name
pub fn validate_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Name is required".to_string());
    }

    if name.len() > 100 {
        return Err("Name must be at most 100 characters long".to_string());
    }

    Ok(())
}

/// Validate email
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 100 {
        return Err("Email must be at most 100 characters long".to_string());
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Validate password
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }

    if password.len() < 8 {
        return Err("Password must be at least 8 characters long".to_string());
    }

    if password.len() > 250 {
        return Err("Password must be at most 250 characters long".to_string());
    }

    Ok(())
}

/// Validate the free-text activity description of a receipt
pub fn validate_activity(activity: &str) -> Result<(), String> {
    if activity.trim().is_empty() {
        return Err("Activity is required".to_string());
    }

    if activity.len() > 250 {
        return Err("Activity must be at most 250 characters long".to_string());
    }

    Ok(())
}

/// Validate that an uploaded filename carries an allowed extension
pub fn validate_receipt_filename(filename: &str) -> Result<(), String> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => Err("Only image or pdf uploads are allowed".to_string()),
    }
}

/// Parse a decimal currency amount into integer minor units
///
/// Uses string arithmetic throughout so `12.34` becomes exactly `1234`
/// without binary floating-point drift. Both `.` and `,` are accepted as
/// decimal separator; a third fractional digit rounds half-up.
pub fn parse_amount(input: &str) -> Result<i64, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("Amount is required".to_string());
    }
    if input.starts_with('-') {
        return Err("Amount must not be negative".to_string());
    }

    let (whole, fraction) = match input.find(['.', ',']) {
        Some(pos) => (&input[..pos], &input[pos + 1..]),
        None => (input, ""),
    };

    let whole: i64 = if whole.is_empty() {
        0
    } else {
        whole
            .parse()
            .map_err(|_| "Invalid amount".to_string())?
    };

    if !fraction.chars().all(|c| c.is_ascii_digit()) {
        return Err("Invalid amount".to_string());
    }

    let mut digits = fraction.chars();
    let tens = digits.next().and_then(|c| c.to_digit(10)).unwrap_or(0) as i64;
    let units = digits.next().and_then(|c| c.to_digit(10)).unwrap_or(0) as i64;
    let round_up = digits
        .next()
        .and_then(|c| c.to_digit(10))
        .map(|d| d >= 5)
        .unwrap_or(false);

    whole
        .checked_mul(100)
        .and_then(|minor| minor.checked_add(tens * 10 + units + i64::from(round_up)))
        .ok_or_else(|| "Amount is too large".to_string())
}
