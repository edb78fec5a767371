//! `publiccode.yml` parsing and provenance checks
//!
//! Only the fields the index stores are decoded; unknown keys are ignored.
//! Video links are stored as written, without oEmbed resolution.
//! Field-level checks beyond the required keys are the validator's business.

mod provenance;
mod validator;

pub use provenance::{check_provenance, declared_code, expected_code};
pub use validator::{BasicValidator, MetadataValidator};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised while accepting a metadata file
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("invalid value for '{field}': {message}")]
    InvalidField { field: &'static str, message: String },

    #[error("publisher '{0}' has no code to check provenance against")]
    MissingPublisherCode(String),

    #[error("file does not declare an administration code")]
    MissingDeclaredCode,

    #[error("file declares code '{declared}', publisher expects '{expected}'")]
    ProvenanceMismatch { expected: String, declared: String },
}

/// The decoded subset of a `publiccode.yml` file
///
/// Sections are also serialized into the index documents, so their field
/// names match the file's own camelCase keys.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicCode {
    #[serde(default)]
    pub publiccode_yml_version: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub application_suite: Option<String>,

    #[serde(default)]
    pub url: String,

    #[serde(default, rename = "landingURL")]
    pub landing_url: Option<String>,

    #[serde(default, deserialize_with = "string_or_list")]
    pub is_based_on: Vec<String>,

    #[serde(default)]
    pub software_version: Option<String>,

    #[serde(default, deserialize_with = "string_or_date")]
    pub release_date: Option<String>,

    #[serde(default)]
    pub logo: Option<String>,

    #[serde(default)]
    pub monochrome_logo: Option<String>,

    #[serde(default)]
    pub input_types: Vec<String>,

    #[serde(default)]
    pub output_types: Vec<String>,

    #[serde(default)]
    pub platforms: Vec<String>,

    #[serde(default, alias = "tags")]
    pub categories: Vec<String>,

    #[serde(default)]
    pub used_by: Vec<String>,

    #[serde(default)]
    pub roadmap: Option<String>,

    #[serde(default)]
    pub development_status: Option<String>,

    #[serde(default)]
    pub software_type: Option<String>,

    #[serde(default)]
    pub intended_audience: IntendedAudience,

    #[serde(default)]
    pub description: BTreeMap<String, Description>,

    #[serde(default)]
    pub legal: Legal,

    #[serde(default)]
    pub maintenance: Maintenance,

    #[serde(default)]
    pub localisation: Localisation,

    #[serde(default)]
    pub depends_on: DependsOn,

    #[serde(default)]
    pub it: ItalianSection,

    #[serde(default)]
    pub organisation: Option<Organisation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntendedAudience {
    #[serde(default)]
    pub only_for: Vec<String>,
    #[serde(default)]
    pub countries: Vec<String>,
    #[serde(default)]
    pub unsupported_countries: Vec<String>,
}

/// One language of the `description` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Description {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub localised_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generic_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    #[serde(default, rename = "apiDocumentation", skip_serializing_if = "Option::is_none")]
    pub api_documentation: Option<String>,
    #[serde(default)]
    pub feature_list: Vec<String>,
    #[serde(default)]
    pub screenshots: Vec<String>,
    #[serde(default)]
    pub videos: Vec<String>,
    #[serde(default)]
    pub awards: Vec<String>,
    #[serde(default)]
    pub free_tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Legal {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_copyright_owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors_file: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Maintenance {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub maintenance_type: Option<String>,
    #[serde(default)]
    pub contractors: Vec<Contractor>,
    #[serde(default)]
    pub contacts: Vec<Contact>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contractor {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, deserialize_with = "string_or_date", skip_serializing_if = "Option::is_none")]
    pub until: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Localisation {
    #[serde(default)]
    pub localisation_ready: bool,
    #[serde(default)]
    pub available_languages: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependsOn {
    #[serde(default)]
    pub open: Vec<Dependency>,
    #[serde(default)]
    pub proprietary: Vec<Dependency>,
    #[serde(default)]
    pub hardware: Vec<Dependency>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_min: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_max: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub optional: bool,
}

/// The `it` country section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItalianSection {
    #[serde(default)]
    pub conforme: Conforme,
    #[serde(default)]
    pub riuso: Riuso,
    #[serde(default)]
    pub spid: bool,
    #[serde(default)]
    pub pagopa: bool,
    #[serde(default)]
    pub cie: bool,
    #[serde(default)]
    pub anpr: bool,
    #[serde(default)]
    pub ecosistemi: Vec<String>,
    #[serde(default)]
    pub design_kit: DesignKit,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conforme {
    #[serde(default)]
    pub accessibile: bool,
    #[serde(default)]
    pub interoperabile: bool,
    #[serde(default)]
    pub sicuro: bool,
    #[serde(default)]
    pub privacy: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Riuso {
    #[serde(default, rename = "codiceIPA", skip_serializing_if = "Option::is_none")]
    pub codice_ipa: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesignKit {
    #[serde(default)]
    pub seo: bool,
    #[serde(default)]
    pub ui: bool,
    #[serde(default)]
    pub web: bool,
    #[serde(default)]
    pub content: bool,
}

/// The `organisation` section of newer format versions
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Organisation {
    #[serde(default)]
    pub uri: Option<String>,
}

impl PublicCode {
    /// Short descriptions by language, skipping empty ones
    pub fn short_descriptions(&self) -> BTreeMap<String, String> {
        self.description
            .iter()
            .filter_map(|(lang, d)| {
                d.short_description
                    .as_ref()
                    .filter(|s| !s.trim().is_empty())
                    .map(|s| (lang.clone(), s.trim().to_string()))
            })
            .collect()
    }
}

/// Accepts a date written as a quoted string or a bare YAML scalar
fn string_or_date<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<serde_yaml::Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_yaml::Value::String(s)) => Some(s),
        Some(serde_yaml::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Accepts a single string or a list of strings
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<serde_yaml::Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_yaml::Value::String(s)) => vec![s],
        Some(serde_yaml::Value::Sequence(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                serde_yaml::Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}
