use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::pipeline::compose::ContentPack;
use crate::pipeline::entities::Entity;
use crate::pipeline::schema::{SchemaDocument, SchemaNode};
use crate::pipeline::score::{prose_blocks, QUESTION_PREFIXES_LOWER};

static QUESTION_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z]{4,}").unwrap());

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    pub name: &'static str,
    pub passed: bool,
    pub details: String,
}

/// Read-only self-audit of the final artifact: six independent checks,
/// never a mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestReport {
    pub passed_checks: usize,
    pub total_checks: usize,
    pub checks: Vec<CheckResult>,
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

pub fn run_harness(
    primary_question: &str,
    content: &ContentPack,
    entities: &[Entity],
    schema: &SchemaDocument,
) -> TestReport {
    let markdown = content.markdown.as_str();
    let lines: Vec<&str> = markdown.lines().collect();
    let mut checks = Vec::with_capacity(6);

    // 1. The primary question's keywords show up in the opening window
    let first_window = markdown
        .split_whitespace()
        .take(60)
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let question_tokens: HashSet<String> = QUESTION_TOKEN_RE
        .find_iter(primary_question)
        .map(|m| m.as_str().to_lowercase())
        .collect();
    let overlap = question_tokens
        .iter()
        .filter(|token| first_window.contains(token.as_str()))
        .count();
    checks.push(CheckResult {
        name: "answer_in_first_60_words",
        passed: !content.direct_answer.is_empty() && overlap >= 1,
        details: format!("token_overlap={}", overlap),
    });

    // 2. Every H3 is phrased as a question
    let question_headings: Vec<&str> = lines
        .iter()
        .filter_map(|line| line.strip_prefix("### "))
        .map(str::trim)
        .collect();
    let headings_ok = !question_headings.is_empty()
        && question_headings.iter().all(|h| {
            let lowered = h.to_lowercase();
            QUESTION_PREFIXES_LOWER.iter().any(|p| lowered.starts_with(p))
        });
    checks.push(CheckResult {
        name: "question_headings",
        passed: headings_ok,
        details: format!("headings={}", question_headings.len()),
    });

    // 3. Prose paragraphs stay short
    let paragraphs = prose_blocks(markdown);
    let avg_paragraph_size = paragraphs
        .iter()
        .map(|block| word_count(block))
        .sum::<usize>()
        / paragraphs.len().max(1);
    checks.push(CheckResult {
        name: "avg_paragraph_size",
        passed: avg_paragraph_size <= 75,
        details: format!("avg_words={}", avg_paragraph_size),
    });

    // 4. FAQ size within the useful band
    checks.push(CheckResult {
        name: "faq_count_5_to_8",
        passed: (5..=8).contains(&content.faq.len()),
        details: format!("faq_count={}", content.faq.len()),
    });

    // 5. Extracted entities actually appear in the document
    let markdown_lower = markdown.to_lowercase();
    let names_in_text = entities
        .iter()
        .filter(|e| {
            !e.entity_name.is_empty()
                && markdown_lower.contains(&e.entity_name.to_lowercase())
        })
        .count();
    checks.push(CheckResult {
        name: "entities_present_in_text",
        passed: names_in_text >= entities.len().min(3),
        details: format!("entities_in_text={}/{}", names_in_text, entities.len()),
    });

    // 6. FAQ/schema positional parity
    let faq_page = schema.faq_page();
    let parity_ok = match faq_page {
        Some(schema_faq) if !content.faq.is_empty() => {
            schema_faq.len() == content.faq.len()
                && content.faq.iter().zip(schema_faq).all(|(qa, item)| {
                    item.name == qa.question && item.accepted_answer.text == qa.answer
                })
        }
        None if !content.faq.is_empty() => false,
        _ => true,
    };
    let faq_node_count = schema
        .graph
        .iter()
        .filter(|node| matches!(node, SchemaNode::FaqPage { .. }))
        .count();
    checks.push(CheckResult {
        name: "schema_faq_parity",
        passed: parity_ok,
        details: format!("faq_schema_nodes={}", faq_node_count),
    });

    TestReport {
        passed_checks: checks.iter().filter(|c| c.passed).count(),
        total_checks: checks.len(),
        checks,
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::compose::QaPair;
    use crate::pipeline::facts::FactBundle;
    use crate::pipeline::schema::{FaqQuestion, SchemaNode, SCHEMA_CONTEXT};

    fn faq(n: usize) -> Vec<QaPair> {
        (0..n)
            .map(|i| QaPair {
                question: format!("Como resolver o caso {}?", i),
                answer: format!("Resposta {}.", i),
            })
            .collect()
    }

    fn content_for(markdown: &str, direct_answer: &str, faq: Vec<QaPair>) -> ContentPack {
        ContentPack {
            markdown: markdown.to_string(),
            direct_answer: direct_answer.to_string(),
            faq,
            facts: FactBundle::default(),
            schema_graph: Vec::new(),
        }
    }

    fn schema_for(faq: &[QaPair]) -> SchemaDocument {
        SchemaDocument {
            context: SCHEMA_CONTEXT.to_string(),
            graph: vec![SchemaNode::FaqPage {
                id: "#faq".to_string(),
                main_entity: faq
                    .iter()
                    .map(|qa| FaqQuestion::new(qa.question.clone(), qa.answer.clone()))
                    .collect(),
            }],
        }
    }

    #[test]
    fn all_checks_pass_on_well_formed_artifact() {
        let faq = faq(5);
        let markdown = format!(
            "# Modelos\n\n**Resposta direta:** Esta pagina lista os modelos disponiveis.\n\n{}",
            faq.iter()
                .map(|qa| format!("### {}\n{}", qa.question, qa.answer))
                .collect::<Vec<_>>()
                .join("\n\n")
        );
        let content = content_for(&markdown, "Esta pagina lista os modelos disponiveis.", faq.clone());
        let schema = schema_for(&faq);
        let report = run_harness(
            "Quais modelos estao disponiveis nesta pagina?",
            &content,
            &[],
            &schema,
        );
        assert_eq!(report.passed_checks, report.total_checks);
        assert_eq!(report.total_checks, 6);
    }

    #[test]
    fn missing_direct_answer_fails_first_check() {
        let content = content_for("# T", "", vec![]);
        let schema = SchemaDocument { context: SCHEMA_CONTEXT.to_string(), graph: vec![] };
        let report = run_harness("Qual?", &content, &[], &schema);
        let first = &report.checks[0];
        assert_eq!(first.name, "answer_in_first_60_words");
        assert!(!first.passed);
    }

    #[test]
    fn non_question_heading_fails_heading_check() {
        let content = content_for("### Detalhes gerais\ntexto", "R.", vec![]);
        let schema = SchemaDocument { context: SCHEMA_CONTEXT.to_string(), graph: vec![] };
        let report = run_harness("Qual?", &content, &[], &schema);
        let heading_check = report.checks.iter().find(|c| c.name == "question_headings").unwrap();
        assert!(!heading_check.passed);
    }

    #[test]
    fn faq_band_check() {
        let schema = SchemaDocument { context: SCHEMA_CONTEXT.to_string(), graph: vec![] };
        let short = run_harness("Q?", &content_for("# T", "R.", faq(4)), &[], &schema);
        let band = short.checks.iter().find(|c| c.name == "faq_count_5_to_8").unwrap();
        assert!(!band.passed);
        assert_eq!(band.details, "faq_count=4");
    }

    #[test]
    fn parity_check_detects_count_mismatch() {
        let content_faq = faq(5);
        let mut schema_faq = content_faq.clone();
        schema_faq.pop();
        let content = content_for("# T", "R.", content_faq);
        let report = run_harness("Q?", &content, &[], &schema_for(&schema_faq));
        let parity = report.checks.iter().find(|c| c.name == "schema_faq_parity").unwrap();
        assert!(!parity.passed);
        assert_eq!(parity.details, "faq_schema_nodes=1");
    }

    #[test]
    fn parity_details_count_faq_page_nodes() {
        let schema = SchemaDocument { context: SCHEMA_CONTEXT.to_string(), graph: vec![] };
        let report = run_harness("Q?", &content_for("# T", "R.", vec![]), &[], &schema);
        let parity = report.checks.iter().find(|c| c.name == "schema_faq_parity").unwrap();
        assert_eq!(parity.details, "faq_schema_nodes=0");

        let faq = faq(5);
        let report = run_harness("Q?", &content_for("# T", "R.", faq.clone()), &[], &schema_for(&faq));
        let parity = report.checks.iter().find(|c| c.name == "schema_faq_parity").unwrap();
        assert_eq!(parity.details, "faq_schema_nodes=1");
    }
}
