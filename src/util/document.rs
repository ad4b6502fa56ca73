//! Brazilian tax-id numbers: CPF (people, 11 digits) and CNPJ (institutions,
//! 14 digits).
//!
//! The validators are total: any input, however malformed, yields `false`.

use std::fmt;
use thiserror::Error;

const CPF_LEN: usize = 11;
const CNPJ_LEN: usize = 14;

/// Which kind of document a digit string looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Cpf,
    Cnpj,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::Cpf => f.write_str("cpf"),
            DocumentKind::Cnpj => f.write_str("cnpj"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("Expected 11 (CPF) or 14 (CNPJ) digits, found {0}")]
    UnknownLength(usize),
    #[error("Invalid {0} check digits")]
    InvalidCheckDigits(DocumentKind),
}

/// Keep only ASCII digits.
pub fn only_digits(input: &str) -> String {
    input.chars().filter(char::is_ascii_digit).collect()
}

fn digits(input: &str) -> Vec<u32> {
    input.chars().filter_map(|c| c.to_digit(10)).collect()
}

fn all_same(digits: &[u32]) -> bool {
    digits.windows(2).all(|w| w[0] == w[1])
}

/// Classify a document by its digit count.
pub fn detect_type(value: &str) -> Option<DocumentKind> {
    match digits(value).len() {
        CPF_LEN => Some(DocumentKind::Cpf),
        CNPJ_LEN => Some(DocumentKind::Cnpj),
        _ => None,
    }
}

/// Validate a CPF. Punctuation is ignored.
///
/// ```
/// use petfeed::util::validate_cpf;
///
/// assert!(validate_cpf("111.444.777-35"));
/// assert!(!validate_cpf("111.111.111-11"));
/// ```
pub fn validate_cpf(input: &str) -> bool {
    let d = digits(input);
    if d.len() != CPF_LEN || all_same(&d) {
        return false;
    }

    // Weights run from len+1 down to 2
    let check_digit = |len: usize| -> u32 {
        let sum: u32 = d[..len]
            .iter()
            .zip((2..=len as u32 + 1).rev())
            .map(|(digit, weight)| digit * weight)
            .sum();
        match 11 - sum % 11 {
            r if r >= 10 => 0,
            r => r,
        }
    };

    check_digit(9) == d[9] && check_digit(10) == d[10]
}

/// Validate a CNPJ. Punctuation is ignored.
///
/// ```
/// use petfeed::util::validate_cnpj;
///
/// assert!(validate_cnpj("11.222.333/0001-81"));
/// assert!(!validate_cnpj("11.222.333/0001-80"));
/// ```
pub fn validate_cnpj(input: &str) -> bool {
    let d = digits(input);
    if d.len() != CNPJ_LEN || all_same(&d) {
        return false;
    }

    // Weights cycle 2..=9 starting from the rightmost digit
    let check_digit = |len: usize| -> u32 {
        let sum: u32 = d[..len]
            .iter()
            .rev()
            .enumerate()
            .map(|(i, digit)| digit * (2 + (i as u32 % 8)))
            .sum();
        match sum % 11 {
            r if r < 2 => 0,
            r => 11 - r,
        }
    };

    check_digit(12) == d[12] && check_digit(13) == d[13]
}

/// Render a CPF as `000.000.000-00`. `None` unless the input has 11 digits.
pub fn format_cpf(input: &str) -> Option<String> {
    let d = only_digits(input);
    if d.len() != CPF_LEN {
        return None;
    }
    Some(format!("{}.{}.{}-{}", &d[..3], &d[3..6], &d[6..9], &d[9..]))
}

/// Render a CNPJ as `00.000.000/0000-00`. `None` unless the input has 14
/// digits.
pub fn format_cnpj(input: &str) -> Option<String> {
    let d = only_digits(input);
    if d.len() != CNPJ_LEN {
        return None;
    }
    Some(format!(
        "{}.{}.{}/{}-{}",
        &d[..2],
        &d[2..5],
        &d[5..8],
        &d[8..12],
        &d[12..]
    ))
}

/// A validated CPF or CNPJ, stored as bare digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Document {
    kind: DocumentKind,
    digits: String,
}

impl Document {
    /// Detect, validate and normalize a user-typed document number.
    pub fn parse(input: &str) -> Result<Self, DocumentError> {
        let digits = only_digits(input);
        let kind = detect_type(&digits).ok_or(DocumentError::UnknownLength(digits.len()))?;
        let valid = match kind {
            DocumentKind::Cpf => validate_cpf(&digits),
            DocumentKind::Cnpj => validate_cnpj(&digits),
        };
        if !valid {
            return Err(DocumentError::InvalidCheckDigits(kind));
        }
        Ok(Self { kind, digits })
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    /// Bare digits, as the backend expects them.
    pub fn digits(&self) -> &str {
        &self.digits
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let masked = match self.kind {
            DocumentKind::Cpf => format_cpf(&self.digits),
            DocumentKind::Cnpj => format_cnpj(&self.digits),
        };
        f.write_str(masked.as_deref().unwrap_or(&self.digits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_cpf_known_values() {
        assert!(validate_cpf("11144477735"));
        assert!(validate_cpf("111.444.777-35"));
        assert!(!validate_cpf("11111111111"));
        assert!(!validate_cpf("00000000000"));
        assert!(!validate_cpf("12345678900"));
    }

    #[test]
    fn test_cpf_wrong_length() {
        assert!(!validate_cpf(""));
        assert!(!validate_cpf("1114447773"));
        assert!(!validate_cpf("111444777350"));
        assert!(!validate_cpf("abc"));
    }

    #[test]
    fn test_cpf_first_digit_clamped_to_zero() {
        // First check digit computes to 10 and is clamped
        assert!(validate_cpf("12345678909"));
    }

    #[test]
    fn test_cnpj_known_values() {
        assert!(validate_cnpj("11222333000181"));
        assert!(validate_cnpj("11.222.333/0001-81"));
        assert!(!validate_cnpj("11111111111111"));
        assert!(!validate_cnpj("11222333000182"));
    }

    #[test]
    fn test_cnpj_wrong_length() {
        assert!(!validate_cnpj("1122233300018"));
        assert!(!validate_cnpj("112223330001810"));
        assert!(!validate_cnpj("11144477735"));
    }

    #[test]
    fn test_detect_type() {
        assert_eq!(detect_type("11144477735"), Some(DocumentKind::Cpf));
        assert_eq!(detect_type("11222333000181"), Some(DocumentKind::Cnpj));
        assert_eq!(detect_type("123"), None);
        assert_eq!(detect_type(""), None);
    }

    #[test]
    fn test_format() {
        assert_eq!(format_cpf("11144477735").as_deref(), Some("111.444.777-35"));
        assert_eq!(
            format_cnpj("11222333000181").as_deref(),
            Some("11.222.333/0001-81")
        );
        assert_eq!(format_cpf("123"), None);
    }

    #[test]
    fn test_document_parse() {
        let doc = Document::parse("111.444.777-35").unwrap();
        assert_eq!(doc.kind(), DocumentKind::Cpf);
        assert_eq!(doc.digits(), "11144477735");
        assert_eq!(doc.to_string(), "111.444.777-35");

        assert_eq!(
            Document::parse("12345678900"),
            Err(DocumentError::InvalidCheckDigits(DocumentKind::Cpf))
        );
        assert_eq!(
            Document::parse("12-34"),
            Err(DocumentError::UnknownLength(4))
        );
    }

    proptest! {
        #[test]
        fn prop_validators_never_panic(s in "\\PC*") {
            let _ = validate_cpf(&s);
            let _ = validate_cnpj(&s);
            let _ = detect_type(&s);
        }

        #[test]
        fn prop_cpf_rejects_other_lengths(d in "[0-9]{0,30}") {
            prop_assume!(d.len() != 11);
            prop_assert!(!validate_cpf(&d));
        }

        #[test]
        fn prop_cnpj_rejects_other_lengths(d in "[0-9]{0,30}") {
            prop_assume!(d.len() != 14);
            prop_assert!(!validate_cnpj(&d));
        }

        #[test]
        fn prop_repeated_digits_rejected(n in 0u32..10) {
            let c = char::from_digit(n, 10).unwrap();
            prop_assert!(!validate_cpf(&c.to_string().repeat(11)));
            prop_assert!(!validate_cnpj(&c.to_string().repeat(14)));
        }
    }
}
