// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Input validation and normalization of lookup values.
//!
//! Every value that becomes a hashed index passes through here first, so two
//! spellings of the same address always hash to the same digest.

use serde::{Deserialize, Serialize};

use crate::error::{VaultError, VaultResult};

/// Maximum length of app names and consent briefs.
const MAX_NAME_LEN: usize = 64;

/// Shortest phone number (in digits, country code included) we accept.
const MIN_PHONE_DIGITS: usize = 8;

/// How a user record is addressed in a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexMode {
    Token,
    Login,
    Email,
    Phone,
}

impl IndexMode {
    pub fn parse(mode: &str) -> Option<Self> {
        match mode {
            "token" => Some(IndexMode::Token),
            "login" => Some(IndexMode::Login),
            "email" => Some(IndexMode::Email),
            "phone" => Some(IndexMode::Phone),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IndexMode::Token => "token",
            IndexMode::Login => "login",
            IndexMode::Email => "email",
            IndexMode::Phone => "phone",
        }
    }

    /// Whether values of this mode are personal data and must be hashed
    /// before they are stored anywhere.
    pub fn is_pii(&self) -> bool {
        !matches!(self, IndexMode::Token)
    }
}

impl std::fmt::Display for IndexMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical lowercase hyphenated UUID.
pub fn is_valid_uuid(value: &str) -> bool {
    value.len() == 36
        && value
            .chars()
            .all(|c| c == '-' || c.is_ascii_digit() || ('a'..='f').contains(&c))
        && uuid::Uuid::try_parse(value).is_ok()
}

/// App names: a lowercase letter followed by lowercase letters or digits.
pub fn is_valid_app(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    name.len() <= MAX_NAME_LEN && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}

/// Lowercase a consent brief and check it is 1-64 chars of `[a-z0-9-]`.
pub fn normalize_brief(brief: &str) -> Option<String> {
    let brief = brief.trim().to_lowercase();
    let valid = !brief.is_empty()
        && brief.len() <= MAX_NAME_LEN
        && brief
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    valid.then_some(brief)
}

/// Wildcard match used by app and brief allow-lists.
///
/// `*` matches anything, `x*` is a prefix match, `*x` a suffix match and
/// `*x*` a substring match. Anything else must match exactly. An empty
/// pattern matches nothing.
pub fn pattern_match(pattern: &str, name: &str) -> bool {
    if pattern.is_empty() {
        return false;
    }
    if pattern == "*" {
        return true;
    }
    let starts = pattern.starts_with('*');
    let ends = pattern.len() > 1 && pattern.ends_with('*');
    match (starts, ends) {
        (true, true) => name.contains(&pattern[1..pattern.len() - 1]),
        (true, false) => name.ends_with(&pattern[1..]),
        (false, true) => name.starts_with(&pattern[..pattern.len() - 1]),
        (false, false) => name == pattern,
    }
}

/// True if any pattern in the list matches.
pub fn matches_any(patterns: &[String], name: &str) -> bool {
    patterns.iter().any(|p| pattern_match(p, name))
}

pub fn normalize_email(address: &str) -> Option<String> {
    let email = address.trim().to_lowercase();
    let (local, domain) = email.split_once('@')?;
    let valid = !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace);
    valid.then_some(email)
}

/// International calling code for an ISO 3166 alpha-2 region.
fn calling_code(region: &str) -> Option<&'static str> {
    let code = match region.to_ascii_uppercase().as_str() {
        "US" | "CA" => "1",
        "RU" | "KZ" => "7",
        "EG" => "20",
        "ZA" => "27",
        "GR" => "30",
        "NL" => "31",
        "BE" => "32",
        "FR" => "33",
        "ES" => "34",
        "IT" => "39",
        "CH" => "41",
        "AT" => "43",
        "GB" | "UK" => "44",
        "DK" => "45",
        "SE" => "46",
        "NO" => "47",
        "PL" => "48",
        "DE" => "49",
        "MX" => "52",
        "BR" => "55",
        "AU" => "61",
        "NZ" => "64",
        "SG" => "65",
        "JP" => "81",
        "KR" => "82",
        "CN" => "86",
        "TR" => "90",
        "IN" => "91",
        "PT" => "351",
        "IE" => "353",
        "FI" => "358",
        "UA" => "380",
        "CZ" => "420",
        "IL" => "972",
        "AE" => "971",
        _ => return None,
    };
    Some(code)
}

/// Domestic trunk prefix dialed before national numbers. Italian numbers
/// keep their leading zero.
fn trunk_prefix(region: &str) -> Option<char> {
    match region.to_ascii_uppercase().as_str() {
        "US" | "CA" => Some('1'),
        "RU" | "KZ" => Some('8'),
        "IT" => None,
        _ => Some('0'),
    }
}

/// Reduce a phone number to international digits (no `+`).
///
/// `+` and `00` prefixes are international already. Anything else is a
/// national number of the default region: its trunk prefix is dropped and
/// the calling code prepended, even when the national digits happen to
/// start with the same digits as the code.
pub fn normalize_phone(address: &str, default_region: &str) -> Option<String> {
    let trimmed = address.trim();
    let international = trimmed.starts_with('+');
    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    let allowed = trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')' | '.'));
    if !allowed || digits.is_empty() {
        return None;
    }

    let number = if international {
        digits
    } else if let Some(rest) = digits.strip_prefix("00") {
        rest.to_string()
    } else {
        let code = calling_code(default_region)?;
        let national = match trunk_prefix(default_region) {
            Some(trunk) => digits.strip_prefix(trunk).unwrap_or(&digits),
            None => &digits,
        };
        format!("{code}{national}")
    };

    (number.len() >= MIN_PHONE_DIGITS && number.len() <= 15).then_some(number)
}

/// Normalize the address part of a `/:mode/:address` path.
pub fn normalize_address(mode: IndexMode, address: &str, default_region: &str) -> VaultResult<String> {
    let normalized = match mode {
        IndexMode::Token => is_valid_uuid(address).then(|| address.to_string()),
        IndexMode::Login => {
            let login = address.trim();
            (!login.is_empty()).then(|| login.to_string())
        }
        IndexMode::Email => normalize_email(address),
        IndexMode::Phone => normalize_phone(address, default_region),
    };
    normalized.ok_or_else(|| VaultError::Validation(format!("bad {mode} value")))
}

/// Parse a path mode segment.
pub fn parse_mode(mode: &str) -> VaultResult<IndexMode> {
    IndexMode::parse(mode).ok_or_else(|| VaultError::Validation("bad index".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_validation() {
        assert!(is_valid_uuid(&uuid::Uuid::new_v4().to_string()));
        assert!(!is_valid_uuid("not-a-uuid"));
        assert!(!is_valid_uuid(""));
        assert!(!is_valid_uuid("6F9619FF-8B86-D011-B42D-00C04FC964FF"));
        assert!(!is_valid_uuid("6f9619ff8b86d011b42d00c04fc964ff"));
    }

    #[test]
    fn app_names() {
        for good in ["penn", "teller", "a123"] {
            assert!(is_valid_app(good), "{good}");
        }
        for bad in ["P1", "1as", "_a", "a_a", "a.a", "a a", ""] {
            assert!(!is_valid_app(bad), "{bad}");
        }
    }

    #[test]
    fn wildcard_matching_table() {
        let cases = [
            ("*", "tom", true),
            ("aa", "tom", false),
            ("", "aa", false),
            ("test*", "123testabc", false),
            ("test*", "testabc", true),
            ("*test*", "test1", true),
            ("*test", "123testabc", false),
            ("*test", "123test", true),
            ("tom", "tom", true),
        ];
        for (pattern, name, expected) in cases {
            assert_eq!(pattern_match(pattern, name), expected, "{pattern} vs {name}");
        }
    }

    #[test]
    fn brief_normalization() {
        assert_eq!(normalize_brief(" Marketing-Emails "), Some("marketing-emails".to_string()));
        assert_eq!(normalize_brief(""), None);
        assert_eq!(normalize_brief("with space"), None);
        assert_eq!(normalize_brief(&"a".repeat(65)), None);
    }

    #[test]
    fn email_normalization() {
        assert_eq!(
            normalize_email("  User@Example.COM "),
            Some("user@example.com".to_string())
        );
        assert_eq!(normalize_email("no-at-sign"), None);
        assert_eq!(normalize_email("a@b@c"), None);
        assert_eq!(normalize_email("@example.com"), None);
    }

    #[test]
    fn phone_normalization() {
        assert_eq!(normalize_phone("+972-54-123-4567", "US"), Some("972541234567".to_string()));
        assert_eq!(normalize_phone("054 123 4567", "IL"), Some("972541234567".to_string()));
        assert_eq!(normalize_phone("00972541234567", "US"), Some("972541234567".to_string()));
        assert_eq!(normalize_phone("(415) 555-0100", "US"), Some("14155550100".to_string()));
        assert_eq!(normalize_phone("0541234567", "ZZ"), None);
        assert_eq!(normalize_phone("abc", "US"), None);
        assert_eq!(normalize_phone("+1", "US"), None);
        assert_eq!(normalize_phone("1 (415) 555-0100", "US"), Some("14155550100".to_string()));
        assert_eq!(normalize_phone("8 701 234 5678", "KZ"), Some("77012345678".to_string()));
        assert_eq!(normalize_phone("06 1234 5678", "IT"), Some("390612345678".to_string()));
    }

    #[test]
    fn national_numbers_starting_with_the_calling_code_keep_it() {
        let expected = Some("919123456789".to_string());
        assert_eq!(normalize_phone("91234 56789", "IN"), expected);
        assert_eq!(normalize_phone("+91 91234 56789", "US"), expected);
        assert_eq!(normalize_phone("091234 56789", "IN"), expected);

        assert_eq!(normalize_phone("701 234 5678", "KZ"), Some("77012345678".to_string()));
        assert_eq!(normalize_phone("4470 1234 567", "GB"), Some("4444701234567".to_string()));
    }

    #[test]
    fn normalize_address_by_mode() {
        let token = uuid::Uuid::new_v4().to_string();
        assert_eq!(normalize_address(IndexMode::Token, &token, "US").unwrap(), token);
        assert!(matches!(
            normalize_address(IndexMode::Token, "nope", "US"),
            Err(VaultError::Validation(_))
        ));
        assert_eq!(
            normalize_address(IndexMode::Email, "A@B.io", "US").unwrap(),
            "a@b.io"
        );
        assert!(matches!(parse_mode("fax"), Err(VaultError::Validation(_))));
        assert_eq!(parse_mode("phone").unwrap(), IndexMode::Phone);
    }
}
