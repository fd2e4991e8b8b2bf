use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::page::ParsedPage;

static PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(r\$\s?\d[\d\.,]*)").unwrap());
static VERSIONS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(vers(?:ao|oes).{0,100})").unwrap());
static CONSUMPTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d{1,2}\s?km/l|consumo.{0,80})").unwrap());
static WARRANTY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(garantia.{0,100})").unwrap());
static CONTACT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(telefone.{0,80}|whatsapp.{0,80}|endereco.{0,120})").unwrap());

/// Facts pulled straight from the page text. Five independent regex
/// searches; absence of any field is expected, not an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FactBundle {
    pub price: Option<String>,
    pub versions: Option<String>,
    pub consumption: Option<String>,
    pub warranty: Option<String>,
    pub address_or_contact: Option<String>,
}

fn first_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text).map(|c| c[1].trim().to_string())
}

pub fn extract_facts(page: &ParsedPage) -> FactBundle {
    let text = page.full_text.as_str();
    FactBundle {
        price: first_capture(&PRICE_RE, text),
        versions: first_capture(&VERSIONS_RE, text),
        consumption: first_capture(&CONSUMPTION_RE, text),
        warranty: first_capture(&WARRANTY_RE, text),
        address_or_contact: first_capture(&CONTACT_RE, text),
    }
}

// ── Tests ──
