use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use serde::Serialize;

use crate::page::ParsedPage;

static MODEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(208|2008|boxer|partner(?:\s+rapid)?|sonic|onix|tracker|spin|s10)\b")
        .unwrap()
});
static LOCATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(sao paulo|rio de janeiro|belo horizonte|curitiba|porto alegre|brasil)\b")
        .unwrap()
});
static ORG_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(s\.a\.|sa|ltda|inc|corp|group)\b").unwrap());
static ORG_CANDIDATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z][a-zA-Z]+(?:\s+[A-Z][a-zA-Z]+){0,2})\b").unwrap());

const EVIDENCE_WINDOW: usize = 90;
const ORG_CANDIDATE_CAP: usize = 40;
const SITE_EVIDENCE_CAP: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EntityType {
    Organization,
    Brand,
    Model,
    Location,
    #[serde(rename = "Tax/Regulation")]
    TaxRegulation,
    FinancialProduct,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Organization => "Organization",
            EntityType::Brand => "Brand",
            EntityType::Model => "Model",
            EntityType::Location => "Location",
            EntityType::TaxRegulation => "Tax/Regulation",
            EntityType::FinancialProduct => "FinancialProduct",
        }
    }
}

/// Bounded excerpt around the first mention, for traceability.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evidence {
    pub snippet: String,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    pub entity_name: String,
    pub entity_type: EntityType,
    pub aliases: Vec<String>,
    pub evidence: Evidence,
}

/// Fixed vocabulary of known brand/org/regulation/financial-product terms.
const ENTITY_DICTIONARY: &[(&str, EntityType, &[&str])] = &[
    ("stellantis", EntityType::Organization, &["Stellantis", "Grupo Stellantis"]),
    ("chevrolet", EntityType::Brand, &["Chevrolet"]),
    ("peugeot", EntityType::Brand, &["Peugeot"]),
    ("skinceuticals", EntityType::Brand, &["SkinCeuticals"]),
    ("iof", EntityType::TaxRegulation, &["IOF", "Imposto sobre Operacoes Financeiras"]),
    ("ipva", EntityType::TaxRegulation, &["IPVA"]),
    ("financiamento", EntityType::FinancialProduct, &["Financiamento"]),
    ("consorcio", EntityType::FinancialProduct, &["Consorcio"]),
    ("seguro", EntityType::FinancialProduct, &["Seguro"]),
];

fn char_floor(text: &str, idx: usize) -> usize {
    let mut i = idx.min(text.len());
    while i > 0 && !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn char_ceil(text: &str, idx: usize) -> usize {
    let mut i = idx.min(text.len());
    while i < text.len() && !text.is_char_boundary(i) {
        i += 1;
    }
    i
}

/// First case-insensitive occurrence of `token` in `text`, with a bounded
/// window on each side. Byte offsets; the window is clamped to char
/// boundaries.
fn collect_evidence(text: &str, token: &str) -> Option<Evidence> {
    let re = RegexBuilder::new(&regex::escape(token))
        .case_insensitive(true)
        .build()
        .ok()?;
    let m = re.find(text)?;
    let start = char_floor(text, m.start().saturating_sub(EVIDENCE_WINDOW));
    let end = char_ceil(text, m.end() + EVIDENCE_WINDOW);
    Some(Evidence {
        snippet: text[start..end].trim().to_string(),
        start: m.start(),
        end: m.end(),
    })
}

fn title_case(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extract entities from a page: dictionary, model-regex, gazetteer, and
/// org-heuristic passes feeding one dedup set keyed by (lowercased name,
/// type). Mentions with no retrievable evidence are dropped. Output sorted
/// by (type, name).
pub fn extract_entities(page: &ParsedPage) -> Vec<Entity> {
    let full_text = page.full_text.as_str();
    let lowered = full_text.to_lowercase();

    let mut entities: Vec<Entity> = Vec::new();
    let mut added: HashSet<(String, EntityType)> = HashSet::new();

    for (key, entity_type, aliases) in ENTITY_DICTIONARY {
        if !lowered.contains(key) {
            continue;
        }
        let Some(evidence) = collect_evidence(full_text, key) else {
            continue;
        };
        let entity_name = aliases[0].to_string();
        if !added.insert((entity_name.to_lowercase(), *entity_type)) {
            continue;
        }
        entities.push(Entity {
            entity_name,
            entity_type: *entity_type,
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            evidence,
        });
    }

    for m in MODEL_RE.captures_iter(full_text) {
        let model = &m[1];
        let name = if model.chars().all(|c| c.is_ascii_digit()) {
            model.to_uppercase()
        } else {
            title_case(model)
        };
        if added.contains(&(name.to_lowercase(), EntityType::Model)) {
            continue;
        }
        let Some(evidence) = collect_evidence(full_text, model) else {
            continue;
        };
        added.insert((name.to_lowercase(), EntityType::Model));
        entities.push(Entity {
            entity_name: name.clone(),
            entity_type: EntityType::Model,
            aliases: vec![name],
            evidence,
        });
    }

    for m in LOCATION_RE.captures_iter(&lowered) {
        let location = title_case(&m[1]);
        if added.contains(&(location.to_lowercase(), EntityType::Location)) {
            continue;
        }
        let Some(evidence) = collect_evidence(full_text, &m[1]) else {
            continue;
        };
        added.insert((location.to_lowercase(), EntityType::Location));
        entities.push(Entity {
            entity_name: location.clone(),
            entity_type: EntityType::Location,
            aliases: vec![location],
            evidence,
        });
    }

    for candidate in collect_org_candidates(full_text) {
        if added.contains(&(candidate.to_lowercase(), EntityType::Organization)) {
            continue;
        }
        let Some(evidence) = collect_evidence(full_text, &candidate) else {
            continue;
        };
        added.insert((candidate.to_lowercase(), EntityType::Organization));
        entities.push(Entity {
            entity_name: candidate.clone(),
            entity_type: EntityType::Organization,
            aliases: vec![candidate],
            evidence,
        });
    }

    entities.sort_by(|a, b| {
        (a.entity_type.as_str(), &a.entity_name).cmp(&(b.entity_type.as_str(), &b.entity_name))
    });
    entities
}

/// Heuristic org detection: capitalized 1-3 token sequences containing a
/// corporate-suffix token, scanning at most the first 40 candidates. This
/// is a deliberate heuristic, not NER, and accepts false positives; it sits
/// behind its own boundary so a real recognizer can replace it.
fn collect_org_candidates(full_text: &str) -> Vec<String> {
    ORG_CANDIDATE_RE
        .captures_iter(full_text)
        .take(ORG_CANDIDATE_CAP)
        .map(|c| c[1].to_string())
        .filter(|candidate| ORG_SUFFIX_RE.is_match(candidate))
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteEvidence {
    pub snippet: String,
    pub start: usize,
    pub end: usize,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteEntity {
    pub entity_name: String,
    pub entity_type: EntityType,
    pub aliases: Vec<String>,
    pub mentions: usize,
    pub evidence: Vec<SiteEvidence>,
}

/// Sitewide fold over per-page entities. Merge key is (lowercased name,
/// type); aliases are unioned, evidence capped at 5 records each stamped
/// with its source URL. Order-independent: the output is fully sorted by
/// (-mentions, name, type).
pub fn aggregate_sitewide_entities(pages: &[(String, Vec<Entity>)]) -> Vec<SiteEntity> {
    let mut merged: HashMap<(String, EntityType), SiteEntity> = HashMap::new();

    for (url, entities) in pages {
        for entity in entities {
            let key = (entity.entity_name.to_lowercase(), entity.entity_type);
            let record = merged.entry(key).or_insert_with(|| SiteEntity {
                entity_name: entity.entity_name.clone(),
                entity_type: entity.entity_type,
                aliases: Vec::new(),
                mentions: 0,
                evidence: Vec::new(),
            });
            let mut aliases: BTreeSet<String> = record.aliases.drain(..).collect();
            aliases.extend(entity.aliases.iter().cloned());
            record.aliases = aliases.into_iter().collect();
            record.mentions += 1;
            record.evidence.push(SiteEvidence {
                snippet: entity.evidence.snippet.clone(),
                start: entity.evidence.start,
                end: entity.evidence.end,
                url: url.clone(),
            });
        }
    }

    let mut output: Vec<SiteEntity> = merged
        .into_values()
        .map(|mut record| {
            record.evidence.truncate(SITE_EVIDENCE_CAP);
            record
        })
        .collect();
    output.sort_by(|a, b| {
        b.mentions
            .cmp(&a.mentions)
            .then_with(|| a.entity_name.cmp(&b.entity_name))
            .then_with(|| a.entity_type.as_str().cmp(b.entity_type.as_str()))
    });
    output
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn page_with_text(text: &str) -> ParsedPage {
        ParsedPage {
            full_text: text.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn dictionary_hit_with_evidence() {
        let page = page_with_text("A Chevrolet apresenta sua nova linha de veiculos.");
        let entities = extract_entities(&page);
        let chev = entities.iter().find(|e| e.entity_name == "Chevrolet").unwrap();
        assert_eq!(chev.entity_type, EntityType::Brand);
        assert!(chev.evidence.snippet.contains("Chevrolet"));
        assert_eq!(chev.evidence.start, 2);
    }

    #[test]
    fn model_names_normalized() {
        let page = page_with_text("O onix e o tracker lideram; o 208 tambem aparece.");
        let entities = extract_entities(&page);
        let names: Vec<&str> = entities.iter().map(|e| e.entity_name.as_str()).collect();
        assert!(names.contains(&"Onix"));
        assert!(names.contains(&"Tracker"));
        assert!(names.contains(&"208"));
    }

    #[test]
    fn locations_title_cased() {
        let page = page_with_text("Unidades em sao paulo e belo horizonte.");
        let entities = extract_entities(&page);
        let locations: Vec<&str> = entities
            .iter()
            .filter(|e| e.entity_type == EntityType::Location)
            .map(|e| e.entity_name.as_str())
            .collect();
        assert_eq!(locations, vec!["Belo Horizonte", "Sao Paulo"]);
    }

    #[test]
    fn org_suffix_heuristic() {
        let page = page_with_text("Contrato firmado com a Acme Motors Ltda nesta semana.");
        let entities = extract_entities(&page);
        assert!(entities
            .iter()
            .any(|e| e.entity_type == EntityType::Organization
                && e.entity_name.contains("Acme")));
    }

    #[test]
    fn no_duplicate_name_type_pairs() {
        let page = page_with_text("Onix onix ONIX e mais onix. Chevrolet e chevrolet.");
        let entities = extract_entities(&page);
        let mut keys: Vec<(String, EntityType)> = entities
            .iter()
            .map(|e| (e.entity_name.to_lowercase(), e.entity_type))
            .collect();
        let before = keys.len();
        keys.sort_by(|a, b| (a.1.as_str(), &a.0).cmp(&(b.1.as_str(), &b.0)));
        keys.dedup();
        assert_eq!(keys.len(), before);
    }

    #[test]
    fn output_sorted_by_type_then_name() {
        let page = page_with_text("Seguro e financiamento para o onix da Chevrolet em curitiba.");
        let entities = extract_entities(&page);
        let sorted: Vec<(String, String)> = entities
            .iter()
            .map(|e| (e.entity_type.as_str().to_string(), e.entity_name.clone()))
            .collect();
        let mut expected = sorted.clone();
        expected.sort();
        assert_eq!(sorted, expected);
    }

    #[test]
    fn empty_text_yields_no_entities() {
        assert!(extract_entities(&ParsedPage::default()).is_empty());
    }

    #[test]
    fn evidence_window_respects_char_boundaries() {
        // Multibyte chars right at the window edge must not split
        let text = format!("{}Chevrolet{}", "é".repeat(120), "ã".repeat(120));
        let page = page_with_text(&text);
        let entities = extract_entities(&page);
        assert!(entities.iter().any(|e| e.entity_name == "Chevrolet"));
    }

    #[test]
    fn sitewide_merge_counts_and_order() {
        let chevrolet = |text: &str| {
            extract_entities(&page_with_text(text))
                .into_iter()
                .collect::<Vec<_>>()
        };
        let pages = vec![
            ("https://a.example/1".to_string(), chevrolet("Chevrolet Onix em destaque")),
            ("https://a.example/2".to_string(), chevrolet("Chevrolet para todos")),
        ];
        let merged = aggregate_sitewide_entities(&pages);
        assert_eq!(merged[0].entity_name, "Chevrolet");
        assert_eq!(merged[0].mentions, 2);
        assert_eq!(merged[0].evidence.len(), 2);
        assert_eq!(merged[0].evidence[0].url, "https://a.example/1");
        let onix = merged.iter().find(|e| e.entity_name == "Onix").unwrap();
        assert_eq!(onix.mentions, 1);
    }
}
