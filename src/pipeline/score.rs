use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::pipeline::compose::ContentPack;
use crate::pipeline::entities::Entity;
use crate::pipeline::intent::Intent;
use crate::pipeline::schema::SchemaDocument;

pub(crate) const QUESTION_PREFIXES_LOWER: &[&str] =
    &["como", "quanto", "quais", "onde", "quando", "qual", "quem"];

static H3_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^###\s+(.+)$").unwrap());

const CATEGORY_MAX: u32 = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryScore {
    pub score: u32,
    pub max: u32,
    pub rules_failed: Vec<String>,
}

impl CategoryScore {
    fn new() -> Self {
        Self { score: 0, max: CATEGORY_MAX, rules_failed: Vec::new() }
    }

    fn fail(&mut self, rule: &str) {
        self.rules_failed.push(rule.to_string());
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub answer_first: CategoryScore,
    pub extractability: CategoryScore,
    pub entity_clarity: CategoryScore,
    pub coverage: CategoryScore,
    pub schema_parity: CategoryScore,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScorePack {
    pub total: u32,
    pub breakdown: ScoreBreakdown,
    pub intent: Intent,
    pub primary_question: String,
    pub paragraph_count: usize,
}

/// Markdown blocks that read as prose: split on blank lines, skip
/// headings, tables and bullet items.
pub(crate) fn prose_blocks(markdown: &str) -> Vec<&str> {
    markdown
        .split("\n\n")
        .map(str::trim)
        .filter(|block| {
            !block.is_empty()
                && !block.starts_with('#')
                && !block.starts_with('|')
                && !block.starts_with("- ")
        })
        .collect()
}

/// Rubric-score the composed artifact. Five categories, each capped at 20,
/// summed and clamped to [0, 100]. Fully deterministic: identical inputs
/// must yield bit-identical packs.
pub fn compute_score(
    intent: Intent,
    primary_question: &str,
    entities: &[Entity],
    content: &ContentPack,
    schema: &SchemaDocument,
    secondary_questions: &[String],
) -> ScorePack {
    let markdown = content.markdown.as_str();
    let lines: Vec<&str> = markdown.lines().collect();

    let mut answer_first = CategoryScore::new();
    let mut extractability = CategoryScore::new();
    let mut entity_clarity = CategoryScore::new();
    let mut coverage = CategoryScore::new();
    let mut schema_parity = CategoryScore::new();

    // answer_first: short direct answer, placed at the top
    let sentence_count = content
        .direct_answer
        .split(['.', '!', '?'])
        .filter(|chunk| !chunk.trim().is_empty())
        .count();
    if !content.direct_answer.is_empty() && (1..=2).contains(&sentence_count) {
        answer_first.score += 12;
    } else {
        answer_first.fail("Resposta direta ausente ou fora de 1-2 frases");
    }
    if lines
        .iter()
        .take(6)
        .any(|line| line.trim().to_lowercase().starts_with("**resposta direta:**"))
    {
        answer_first.score += 8;
    } else {
        answer_first.fail("Resposta direta nao esta no topo");
    }

    // extractability: question headings, bullets, a table
    let headings: Vec<&str> = H3_HEADING_RE
        .captures_iter(markdown)
        .map(|c| c.get(1).map(|m| m.as_str()).unwrap_or(""))
        .collect();
    if headings.is_empty() {
        extractability.fail("Faltam headings em formato pergunta");
    } else {
        let prefix_hits = headings
            .iter()
            .filter(|h| {
                let lowered = h.trim().to_lowercase();
                QUESTION_PREFIXES_LOWER.iter().any(|p| lowered.starts_with(p))
            })
            .count() as u32;
        extractability.score += (prefix_hits * 2).min(10);
        if (prefix_hits as usize) < headings.len() {
            extractability.fail("Nem todos os headings estao em formato de pergunta");
        }
    }
    if lines.iter().any(|line| line.starts_with("- ")) {
        extractability.score += 5;
    } else {
        extractability.fail("Faltam listas curtas");
    }
    if markdown.contains('|') {
        extractability.score += 5;
    } else {
        extractability.fail("Falta tabela simples de entidades");
    }

    // entity_clarity: evidenced entities and type diversity
    let evidenced: Vec<&Entity> = entities
        .iter()
        .filter(|e| !e.evidence.snippet.is_empty())
        .collect();
    let distinct_types: HashSet<&str> =
        evidenced.iter().map(|e| e.entity_type.as_str()).collect();
    entity_clarity.score += (evidenced.len() as u32).min(12);
    entity_clarity.score += (distinct_types.len() as u32 * 2).min(8);
    if evidenced.len() < 4 {
        entity_clarity.fail("Poucas entidades com evidencia");
    }
    if distinct_types.len() < 2 {
        entity_clarity.fail("Baixa diversidade de tipos de entidade");
    }

    // coverage: secondary-question lead words present in the document
    let markdown_lower = markdown.to_lowercase();
    let covered = secondary_questions
        .iter()
        .filter(|question| {
            question
                .split_whitespace()
                .next()
                .is_some_and(|token| markdown_lower.contains(&token.to_lowercase()))
        })
        .count();
    let ratio = covered as f64 / secondary_questions.len().max(1) as f64;
    coverage.score = ((ratio * 20.0).round() as u32).min(20);
    if ratio < 0.6 {
        coverage.fail("Cobertura baixa das intencoes secundarias");
    }

    // schema_parity: FAQPage present, graph non-empty, positional match
    let faq_page = schema.faq_page();
    if !content.faq.is_empty() && faq_page.is_some() {
        schema_parity.score += 10;
    } else if !content.faq.is_empty() {
        schema_parity.fail("FAQPage ausente");
    } else {
        schema_parity.score += 6;
    }
    if !schema.graph.is_empty() {
        schema_parity.score += 5;
    } else {
        schema_parity.fail("Schema vazio");
    }
    let mismatch = match faq_page {
        Some(schema_faq) if !content.faq.is_empty() => {
            schema_faq.len() != content.faq.len()
                || content.faq.iter().zip(schema_faq).any(|(qa, item)| {
                    item.name != qa.question || item.accepted_answer.text != qa.answer
                })
        }
        _ => false,
    };
    if mismatch {
        schema_parity.fail("Paridade schema-conteudo quebrada");
    } else {
        schema_parity.score += 5;
    }

    let breakdown = ScoreBreakdown {
        answer_first,
        extractability,
        entity_clarity,
        coverage,
        schema_parity,
    };
    let total = breakdown.answer_first.score
        + breakdown.extractability.score
        + breakdown.entity_clarity.score
        + breakdown.coverage.score
        + breakdown.schema_parity.score;

    ScorePack {
        total: total.min(100),
        breakdown,
        intent,
        primary_question: primary_question.to_string(),
        paragraph_count: prose_blocks(markdown).len(),
    }
}

// ── Tests ──
