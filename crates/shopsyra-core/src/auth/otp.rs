//! Input checks for the OTP sign-in flow.

use anyhow::{bail, Result};

/// Country code prepended to local mobile numbers
pub const COUNTRY_CODE: &str = "+91";

/// Minimum number of digits in a local mobile number
const MIN_MOBILE_DIGITS: usize = 10;

/// Number of digits in a one-time code
pub const OTP_LENGTH: usize = 4;

/// Normalize a mobile number to `+91XXXXXXXXXX`.
///
/// Accepts a bare local number or one already carrying the country code.
pub fn normalize_mobile(input: &str) -> Result<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        bail!("Please enter your mobile number");
    }
    let local = trimmed.strip_prefix(COUNTRY_CODE).unwrap_or(trimmed);
    if !local.chars().all(|c| c.is_ascii_digit()) || local.len() < MIN_MOBILE_DIGITS {
        bail!("Please enter a valid mobile number");
    }
    Ok(format!("{}{}", COUNTRY_CODE, local))
}

/// Trim and check a one-time code.
pub fn validate_otp(input: &str) -> Result<String> {
    let otp = input.trim();
    if otp.len() != OTP_LENGTH || !otp.chars().all(|c| c.is_ascii_digit()) {
        bail!("Please enter a valid {}-digit OTP", OTP_LENGTH);
    }
    Ok(otp.to_string())
}
