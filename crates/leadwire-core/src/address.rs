// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport address normalization.
//!
//! Chat addresses look like `5491122334455@s.whatsapp.net`, optionally with a
//! device suffix (`5491122334455:12@s.whatsapp.net`). Some accounts expose an
//! opaque `…@lid` chat address and carry the phone address separately.

/// Server suffix of a user (phone-number) address.
pub const USER_SERVER: &str = "s.whatsapp.net";

/// True for group chats and status broadcasts, which the pipeline ignores.
pub fn is_group_or_broadcast(address: &str) -> bool {
    address.ends_with("@g.us") || address.ends_with("@broadcast") || address == "status@broadcast"
}

/// True for opaque (non phone-number) addresses.
pub fn is_opaque(address: &str) -> bool {
    address.ends_with("@lid")
}

/// Reduce an address or raw number to its bare digits.
///
/// Returns `None` when nothing digit-like remains.
pub fn normalize_phone(address: &str) -> Option<String> {
    let user = address.split('@').next().unwrap_or(address);
    let user = user.split(':').next().unwrap_or(user);
    let digits: String = user.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() { None } else { Some(digits) }
}

/// Synthesized default address for a phone number.
pub fn default_address(phone: &str) -> String {
    match normalize_phone(phone) {
        Some(digits) => format!("{digits}@{USER_SERVER}"),
        None => phone.to_string(),
    }
}

/// Resolve the sender phone of an inbound event.
///
/// Prefers the explicit phone address when the chat address is opaque.
pub fn sender_phone(remote_address: &str, sender_phone: Option<&str>) -> Option<String> {
    if is_opaque(remote_address) {
        return sender_phone.and_then(normalize_phone);
    }
    normalize_phone(remote_address).or_else(|| sender_phone.and_then(normalize_phone))
}
