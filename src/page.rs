use serde::{Deserialize, Serialize};

use crate::pipeline::PipelineError;

/// Parsed page record produced by the external HTML parsing layer.
///
/// Every field is defaulted so a payload with missing keys degrades to
/// empty values instead of failing deserialization. Only a payload that is
/// not valid JSON at all is rejected as malformed input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsedPage {
    pub url: String,
    pub title: String,
    pub meta_description: String,
    pub headings: Headings,
    pub paragraphs: Vec<String>,
    pub lists: Vec<Vec<String>>,
    pub tables: Vec<Vec<Vec<String>>>,
    pub breadcrumbs: Vec<Breadcrumb>,
    pub internal_links: Vec<PageLink>,
    pub external_links: Vec<PageLink>,
    pub full_text: String,
    pub flags: PageFlags,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Headings {
    pub h1: Vec<String>,
    pub h2: Vec<String>,
    pub h3: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Breadcrumb {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PageLink {
    pub url: String,
    pub anchor: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PageFlags {
    pub has_hreflang: bool,
}

impl ParsedPage {
    pub fn from_json(payload: &str) -> Result<Self, PipelineError> {
        serde_json::from_str(payload).map_err(|e| PipelineError::MalformedInput(e.to_string()))
    }

    /// URL path component, lowercased. Avoids a full URL parser: everything
    /// after the host and before query/fragment.
    pub fn url_path(&self) -> String {
        let rest = self
            .url
            .strip_prefix("https://")
            .or_else(|| self.url.strip_prefix("http://"))
            .unwrap_or(&self.url);
        let path = match rest.find('/') {
            Some(idx) => &rest[idx..],
            None => "",
        };
        let path = path.split(['?', '#']).next().unwrap_or("");
        path.to_lowercase()
    }
}

/// A data point the page's intent suggests should exist but the source
/// never states.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DataGap {
    pub field: &'static str,
    pub message: &'static str,
}

const GAP_RULES: &[(&str, &str, &[&str])] = &[
    ("price", "Preco nao informado", &["preco", "r$", "valor", "a partir de"]),
    ("versions", "Versoes nao informadas", &["versao", "versoes", "trim", "configuracao"]),
    ("consumption", "Consumo nao informado", &["consumo", "km/l", "autonomia", "eficiencia"]),
    ("warranty", "Garantia nao informada", &["garantia", "anos de garantia"]),
];

pub fn expected_data_gaps(page: &ParsedPage) -> Vec<DataGap> {
    let text = page.full_text.to_lowercase();
    GAP_RULES
        .iter()
        .filter(|(_, _, hints)| !hints.iter().any(|hint| text.contains(hint)))
        .map(|(field, message, _)| DataGap { field, message })
        .collect()
}

// ── Tests ──
