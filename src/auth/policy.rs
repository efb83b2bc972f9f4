use thiserror::Error;

/// Special characters accepted by the strength rules.
pub const SPECIAL_CHARS: &str = "!@#$%^&*(),.?\":{}|<>";

const MIN_LEN: usize = 7;

/// First failing rule, checked in a fixed order so reports are
/// deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PolicyViolation {
    #[error("Password must be at least 7 characters long")]
    TooShort,
    #[error("Password must contain at least one capital letter")]
    NoUppercase,
    #[error("Password must contain at least one number")]
    NoDigit,
    #[error("Password must contain at least one special character")]
    NoSpecial,
}

/// Strength check applied on every path that sets a password (signup,
/// OTP reset, authenticated change). Never applied when merely checking
/// an existing password.
pub fn validate_password(candidate: &str) -> Result<(), PolicyViolation> {
    if candidate.chars().count() < MIN_LEN {
        return Err(PolicyViolation::TooShort);
    }
    if !candidate.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(PolicyViolation::NoUppercase);
    }
    if !candidate.chars().any(|c| c.is_ascii_digit()) {
        return Err(PolicyViolation::NoDigit);
    }
    if !candidate.chars().any(|c| SPECIAL_CHARS.contains(c)) {
        return Err(PolicyViolation::NoSpecial);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_password_meeting_all_rules() {
        assert_eq!(validate_password("Abcdef1!"), Ok(()));
        assert_eq!(validate_password("Ghijkl2@"), Ok(()));
        // exactly at the length floor
        assert_eq!(validate_password("Abcd1!x"), Ok(()));
    }

    #[test]
    fn rejects_short_password_first() {
        // also lacks a digit and a special char; length reports first
        assert_eq!(validate_password("Abc"), Err(PolicyViolation::TooShort));
        assert_eq!(validate_password("Abcd1!"), Err(PolicyViolation::TooShort));
    }

    #[test]
    fn rejects_missing_uppercase() {
        assert_eq!(
            validate_password("abcdef1!"),
            Err(PolicyViolation::NoUppercase)
        );
    }

    #[test]
    fn rejects_missing_digit() {
        assert_eq!(
            validate_password("Abcdefg!"),
            Err(PolicyViolation::NoDigit)
        );
    }

    #[test]
    fn rejects_missing_special() {
        assert_eq!(
            validate_password("Abcdefg1"),
            Err(PolicyViolation::NoSpecial)
        );
    }

    #[test]
    fn every_listed_special_char_satisfies_the_rule() {
        for c in SPECIAL_CHARS.chars() {
            let candidate = format!("Abcdef1{c}");
            assert_eq!(validate_password(&candidate), Ok(()), "char {c:?}");
        }
    }

    #[test]
    fn passes_iff_all_predicates_hold() {
        let cases = [
            ("", false),
            ("A1!", false),
            ("abcdefg1!", false),
            ("ABCDEFG!", false),
            ("ABCDEFG1", false),
            ("Abcdefg1!", true),
            ("P@ssw0rd", true),
        ];
        for (candidate, expected) in cases {
            assert_eq!(
                validate_password(candidate).is_ok(),
                expected,
                "candidate {candidate:?}"
            );
        }
    }
}
