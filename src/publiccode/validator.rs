use crate::publiccode::{PublicCode, ValidationError};
use url::Url;

/// Turns raw file bytes into a [`PublicCode`] record
pub trait MetadataValidator: Send + Sync {
    fn parse(&self, body: &[u8]) -> Result<PublicCode, ValidationError>;
}

/// Checks the YAML syntax and the keys every file must carry
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicValidator;

impl MetadataValidator for BasicValidator {
    fn parse(&self, body: &[u8]) -> Result<PublicCode, ValidationError> {
        let publiccode: PublicCode = serde_yaml::from_slice(body)?;

        if publiccode.publiccode_yml_version.trim().is_empty() {
            return Err(ValidationError::MissingField("publiccodeYmlVersion"));
        }
        if publiccode.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name"));
        }
        if publiccode.url.trim().is_empty() {
            return Err(ValidationError::MissingField("url"));
        }

        let url = Url::parse(&publiccode.url).map_err(|e| ValidationError::InvalidField {
            field: "url",
            message: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ValidationError::InvalidField {
                field: "url",
                message: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        Ok(publiccode)
    }
}
