//! Checks that a file belongs to the publisher that claims it

use crate::config::{Host, Publisher};
use crate::publiccode::{PublicCode, ValidationError};
use crate::url::template::render;

/// Code declared by the file: `it.riuso.codiceIPA`, else `organisation.uri`
pub fn declared_code(publiccode: &PublicCode) -> Option<&str> {
    publiccode
        .it
        .riuso
        .codice_ipa
        .as_deref()
        .or_else(|| publiccode.organisation.as_ref().and_then(|o| o.uri.as_deref()))
        .map(str::trim)
        .filter(|code| !code.is_empty())
}

/// Code the host expects files of `publisher` to declare
pub fn expected_code(publisher: &Publisher, host: &Host) -> Result<String, ValidationError> {
    let code = publisher.code.trim();
    if code.is_empty() {
        return Err(ValidationError::MissingPublisherCode(publisher.name.clone()));
    }

    render(&host.provenance_template, &[("code", code)]).map_err(|e| {
        ValidationError::InvalidField {
            field: "provenance-template",
            message: e.to_string(),
        }
    })
}

/// Accepts the file only if it declares the publisher's code
///
/// Codes are compared case-insensitively. Returns the declared code.
pub fn check_provenance(
    publiccode: &PublicCode,
    publisher: &Publisher,
    host: &Host,
) -> Result<String, ValidationError> {
    let expected = expected_code(publisher, host)?;
    let declared = declared_code(publiccode).ok_or(ValidationError::MissingDeclaredCode)?;

    if !declared.eq_ignore_ascii_case(&expected) {
        return Err(ValidationError::ProvenanceMismatch {
            expected,
            declared: declared.to_string(),
        });
    }

    Ok(declared.to_string())
}
