//! Utility functions for common operations.
//!
//! This module provides reusable utilities for:
//!
//! - **Document numbers**: CPF/CNPJ check-digit validation, type detection
//!   and formatting
//! - **URL validation**: base URL checks for the platform API
//!
//! # Examples
//!
//! ```
//! use petfeed::util::{detect_type, validate_cnpj, validate_cpf, DocumentKind};
//!
//! assert!(validate_cpf("111.444.777-35"));
//! assert!(validate_cnpj("11.222.333/0001-81"));
//! assert_eq!(detect_type("11144477735"), Some(DocumentKind::Cpf));
//! ```

mod document;
mod url_validator;

pub use document::{
    detect_type, format_cnpj, format_cpf, only_digits, validate_cnpj, validate_cpf, Document,
    DocumentError, DocumentKind,
};
pub use url_validator::{validate_base_url, UrlValidationError};
