use std::collections::BTreeSet;

use serde::Serialize;

use crate::page::{DataGap, ParsedPage};
use crate::pipeline::compose::ContentPack;
use crate::pipeline::entities::Entity;
use crate::pipeline::schema::SchemaNode;
use crate::pipeline::score::ScorePack;

/// Categorized, human-readable issues. The three buckets are always
/// present, each deduplicated and sorted lexicographically.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssuesPack {
    #[serde(rename = "Technical SEO")]
    pub technical_seo: Vec<String>,
    #[serde(rename = "AEO/GEO Content Quality")]
    pub content_quality: Vec<String>,
    #[serde(rename = "Structured Data")]
    pub structured_data: Vec<String>,
}

impl IssuesPack {
    pub fn is_empty(&self) -> bool {
        self.technical_seo.is_empty()
            && self.content_quality.is_empty()
            && self.structured_data.is_empty()
    }
}

fn sorted_unique(issues: Vec<String>) -> Vec<String> {
    issues.into_iter().collect::<BTreeSet<_>>().into_iter().collect()
}

/// Convert scoring/parity/extraction gaps into categorized issues. The
/// rules mirror the scoring engine but are checked directly against the
/// artifacts, independent of it.
#[allow(clippy::too_many_arguments)]
pub fn build_issues(
    page: &ParsedPage,
    score: &ScorePack,
    content: &ContentPack,
    entities: &[Entity],
    parity_ok: bool,
    parity_errors: &[String],
    expected_gaps: &[DataGap],
) -> IssuesPack {
    let mut technical = Vec::new();
    let mut quality = Vec::new();
    let mut structured = Vec::new();

    if page.meta_description.is_empty() {
        technical.push("Meta description ausente".to_string());
    }
    if page.headings.h2.is_empty() {
        technical.push("Poucos H2".to_string());
    }
    if !page.flags.has_hreflang {
        technical.push("hreflang ausente".to_string());
    }

    if !score.breakdown.answer_first.rules_failed.is_empty() {
        quality.push("Resposta direta ausente ou longa demais".to_string());
    }
    if content
        .faq
        .iter()
        .any(|qa| qa.question.to_lowercase().starts_with("o que e "))
    {
        quality.push("FAQ com perguntas artificiais".to_string());
    }
    if entities.len() < 4 {
        quality.push("Entidades mal classificadas ou tokens soltos".to_string());
    }
    if !expected_gaps.is_empty() {
        quality.push("Dados criticos esperados ausentes na fonte".to_string());
    }

    let has_faq_node = content
        .schema_graph
        .iter()
        .any(|node| matches!(node, SchemaNode::FaqPage { .. }));
    if !content.faq.is_empty() && !has_faq_node {
        structured.push("Schema FAQPage ausente apesar de FAQ existir".to_string());
    }
    if !parity_ok {
        structured.push("Paridade schema<->conteudo quebrada".to_string());
        structured.extend(parity_errors.iter().cloned());
    }

    IssuesPack {
        technical_seo: sorted_unique(technical),
        content_quality: sorted_unique(quality),
        structured_data: sorted_unique(structured),
    }
}

// ── Tests ──
