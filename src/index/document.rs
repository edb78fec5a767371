//! Documents written to the search index

use crate::publiccode::{
    DependsOn, Description, IntendedAudience, ItalianSection, Legal, Localisation, Maintenance,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A validated, enriched repository record
///
/// Keyed in the index by [`RepositoryDocument::id`], the SHA-256 of the
/// repository's canonical URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryDocument {
    pub id: String,
    pub repository: String,
    pub repository_url: String,
    pub host: String,
    pub file_raw_url: String,
    pub crawl_time: String,
    pub generation: String,

    /// Provenance code declared by the file and matched against the publisher
    pub provenance_code: String,
    pub publisher_name: String,

    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_suite: Option<String>,
    pub url: String,
    #[serde(default, rename = "landingURL", skip_serializing_if = "Option::is_none")]
    pub landing_url: Option<String>,
    #[serde(default)]
    pub is_based_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub software_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monochrome_logo: Option<String>,
    #[serde(default)]
    pub input_types: Vec<String>,
    #[serde(default)]
    pub output_types: Vec<String>,
    #[serde(default)]
    pub used_by: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roadmap: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub development_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub software_type: Option<String>,
    #[serde(default)]
    pub platforms: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub intended_audience: IntendedAudience,
    /// Full description sections by language
    #[serde(default)]
    pub description: BTreeMap<String, Description>,
    #[serde(default)]
    pub short_descriptions: BTreeMap<String, String>,
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

    pub vitality_score: f64,
    pub vitality_data_chart: Vec<u32>,
}

/// One record per administration code seen in indexed files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdministrationDocument {
    #[serde(rename = "it-riuso-codiceIPA")]
    pub code: String,

    #[serde(rename = "it-riuso-codiceIPA-label")]
    pub name: String,
}
