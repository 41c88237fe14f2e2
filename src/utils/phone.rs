use crate::error::{AppError, AppResult};
use regex::Regex;

/// Validate a purchase destination number: local format, `08` prefix,
/// digits only, more than 9 characters.
pub fn validate_destination_msisdn(phone: &str) -> AppResult<()> {
    let re = Regex::new(r"^08\d{8,}$").unwrap();

    if !re.is_match(phone) {
        return Err(AppError::ValidationError(
            "Format nomor salah. Gunakan awalan 08, angka saja.".to_string(),
        ));
    }

    Ok(())
}

/// Validate an OTP login number: international format with `628` prefix.
pub fn validate_login_msisdn(phone: &str) -> AppResult<()> {
    let re = Regex::new(r"^628\d{7,}$").unwrap();

    if !re.is_match(phone) {
        return Err(AppError::ValidationError(
            "Format nomor salah. Harap gunakan awalan 628.".to_string(),
        ));
    }

    Ok(())
}

/// Rewrite a leading `0` to the `62` country prefix. Numbers already in
/// international format pass through unchanged.
pub fn normalize_msisdn(phone: &str) -> String {
    if let Some(rest) = phone.strip_prefix('0') {
        format!("62{rest}")
    } else {
        phone.to_string()
    }
}
