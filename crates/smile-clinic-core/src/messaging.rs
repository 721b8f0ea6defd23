//! Outbound WhatsApp message formatting.
//!
//! Pure functions: a template plus replacements gives the final text, and
//! a phone plus text gives the `wa.me` deep link.

use chrono::NaiveDate;
use url::form_urlencoded;

use crate::models::Appointment;

/// Country code prepended to local-format numbers.
pub const DEFAULT_COUNTRY_CODE: &str = "55";

/// Numbers with at most this many digits are treated as local.
const MAX_LOCAL_DIGITS: usize = 11;

/// Replace every `{key}` token with its value. Unknown tokens are left as is.
pub fn apply_replacements(template: &str, replacements: &[(&str, &str)]) -> String {
    replacements
        .iter()
        .fold(template.to_string(), |message, (key, value)| {
            message.replace(&format!("{{{key}}}"), value)
        })
}

/// Fill a template for a patient; `{nome}` is always supplied and `extra`
/// entries take precedence over it.
pub fn compose_message(template: &str, patient_name: &str, extra: &[(&str, &str)]) -> String {
    let message = apply_replacements(template, extra);
    apply_replacements(&message, &[("nome", patient_name)])
}

/// Replacements for an appointment reminder: `{data}` as `dd/MM/yyyy` and
/// `{horario}` as `HH:mm`.
pub fn appointment_reminder_replacements(appointment: &Appointment) -> Vec<(&'static str, String)> {
    let date = NaiveDate::parse_from_str(&appointment.date, "%Y-%m-%d")
        .map(|d| d.format("%d/%m/%Y").to_string())
        .unwrap_or_else(|_| appointment.date.clone());
    vec![("data", date), ("horario", appointment.time.clone())]
}

/// Strip everything but digits and add the country code to local numbers.
pub fn full_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    if digits.len() <= MAX_LOCAL_DIGITS {
        format!("{DEFAULT_COUNTRY_CODE}{digits}")
    } else {
        digits
    }
}

/// Deep link opening a WhatsApp chat with the message pre-filled.
pub fn whatsapp_link(phone: &str, message: &str) -> String {
    let text: String = form_urlencoded::byte_serialize(message.as_bytes()).collect();
    format!("https://wa.me/{}?text={}", full_phone(phone), text)
}
