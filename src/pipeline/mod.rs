pub mod compose;
pub mod entities;
pub mod facts;
pub mod harness;
pub mod intent;
pub mod issues;
pub mod schema;
pub mod score;

use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::page::{expected_data_gaps, ParsedPage};
use compose::ContentPack;
use entities::{Entity, SiteEntity};
use harness::TestReport;
use intent::Intent;
use issues::IssuesPack;
use schema::SchemaDocument;
use score::ScorePack;

const SECONDARY_QUESTION_LIMIT: usize = 6;
const SOURCE_SUMMARY_CHARS: usize = 300;
const LEGACY_LINK_CAP: usize = 100;
const ANCHOR_TEXT_CAP: usize = 10;

static FILENAME_SAFE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9\-_]").unwrap());

/// Page-level pipeline failures. NoSignal situations are never errors:
/// every extractor degrades to an explicit fallback value instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input that cannot be deserialized into the ParsedPage contract.
    #[error("malformed parsed-page input: {0}")]
    MalformedInput(String),
    /// A contract break between pipeline stages; a logic bug, not bad input.
    #[error("internal invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct PageMeta {
    pub url: String,
    pub title: String,
    pub intent: Intent,
    #[serde(rename = "primaryQuestion")]
    pub primary_question: String,
    #[serde(rename = "secondaryQuestions")]
    pub secondary_questions: Vec<String>,
    #[serde(rename = "directAnswer")]
    pub direct_answer: String,
    #[serde(rename = "sourceSummary")]
    pub source_summary: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LegacyBasic {
    pub title: String,
    pub description: String,
    #[serde(rename = "descriptionLength")]
    pub description_length: usize,
    pub h1: Vec<String>,
    pub h2: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LegacyLinks {
    pub internal: Vec<String>,
    pub external: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlatIssue {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LegacySummary {
    pub score: u32,
    pub issues: Vec<FlatIssue>,
}

/// Everything the pipeline produces for one page. Immutable once built.
#[derive(Debug, Clone, Serialize)]
pub struct PageArtifacts {
    pub intent: Intent,
    pub primary_question: String,
    pub secondary_questions: Vec<String>,
    pub entities: Vec<Entity>,
    pub content_pack: ContentPack,
    pub schema: SchemaDocument,
    pub score_pack: ScorePack,
    pub issues_pack: IssuesPack,
    pub test_report: TestReport,
    pub page_meta: PageMeta,
    pub legacy_basic: LegacyBasic,
    pub legacy_links: LegacyLinks,
    pub legacy_summary: LegacySummary,
}

/// Run the full per-page pipeline in its fixed stage order. Pure and
/// deterministic; safe to run for many pages in parallel.
pub fn build_page_artifacts(page: &ParsedPage) -> Result<PageArtifacts, PipelineError> {
    let intent = intent::detect_intent(page);
    let primary_question = intent::primary_question(intent, page);
    let secondary_questions = intent::secondary_questions(intent, page, SECONDARY_QUESTION_LIMIT);
    let entities = entities::extract_entities(page);
    let gaps = expected_data_gaps(page);
    let facts = facts::extract_facts(page);

    let mut content_pack = compose::compose(
        page,
        intent,
        &primary_question,
        &secondary_questions,
        &entities,
        &facts,
        &gaps,
    );

    let schema = schema::build_schema(page, &content_pack, intent, &entities);
    let (parity_ok, parity_errors) = schema::check_parity(&schema, &content_pack);
    if !parity_ok {
        // Parity must hold by construction; a failure here is a regression
        // between the schema builder and the parity checker.
        error!(url = %page.url, ?parity_errors, "schema/content parity broken at build time");
        return Err(PipelineError::InvariantViolation(format!(
            "schema/content parity broken for {}: {}",
            page.url,
            parity_errors.join("; ")
        )));
    }

    let score_pack = score::compute_score(
        intent,
        &primary_question,
        &entities,
        &content_pack,
        &schema,
        &secondary_questions,
    );

    content_pack.schema_graph = schema.graph.clone();

    let issues_pack = issues::build_issues(
        page,
        &score_pack,
        &content_pack,
        &entities,
        parity_ok,
        &parity_errors,
        &gaps,
    );

    let test_report = harness::run_harness(&primary_question, &content_pack, &entities, &schema);

    let source_summary: String = page
        .paragraphs
        .first()
        .map(|p| p.chars().take(SOURCE_SUMMARY_CHARS).collect())
        .unwrap_or_default();

    let page_meta = PageMeta {
        url: page.url.clone(),
        title: page.title.clone(),
        intent,
        primary_question: primary_question.clone(),
        secondary_questions: secondary_questions.clone(),
        direct_answer: content_pack.direct_answer.clone(),
        source_summary,
    };

    let legacy_basic = LegacyBasic {
        title: page.title.clone(),
        description: page.meta_description.clone(),
        description_length: page.meta_description.chars().count(),
        h1: page.headings.h1.clone(),
        h2: page.headings.h2.clone(),
    };

    let legacy_links = LegacyLinks {
        internal: page
            .internal_links
            .iter()
            .take(LEGACY_LINK_CAP)
            .map(|l| l.url.clone())
            .collect(),
        external: page
            .external_links
            .iter()
            .take(LEGACY_LINK_CAP)
            .map(|l| l.url.clone())
            .collect(),
    };

    let legacy_summary = LegacySummary {
        score: score_pack.total,
        issues: flat_issues(&issues_pack),
    };

    Ok(PageArtifacts {
        intent,
        primary_question,
        secondary_questions,
        entities,
        content_pack,
        schema,
        score_pack,
        issues_pack,
        test_report,
        page_meta,
        legacy_basic,
        legacy_links,
        legacy_summary,
    })
}

fn flat_issues(issues: &IssuesPack) -> Vec<FlatIssue> {
    let buckets = [
        ("Technical SEO", &issues.technical_seo),
        ("AEO/GEO Content Quality", &issues.content_quality),
        ("Structured Data", &issues.structured_data),
    ];
    buckets
        .iter()
        .flat_map(|(kind, messages)| {
            messages.iter().map(|message| FlatIssue {
                kind: kind.to_string(),
                message: message.clone(),
            })
        })
        .collect()
}

/// Sitewide entity fold; must only run once every page artifact exists.
pub fn site_entities(artifacts: &[PageArtifacts]) -> Vec<SiteEntity> {
    let pages: Vec<(String, Vec<Entity>)> = artifacts
        .iter()
        .map(|a| (a.page_meta.url.clone(), a.entities.clone()))
        .collect();
    entities::aggregate_sitewide_entities(&pages)
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkEdge {
    pub from: String,
    pub to: String,
    #[serde(rename = "anchorTexts")]
    pub anchor_texts: Vec<String>,
    pub count: usize,
}

/// Fold all pages' internal links into directed, anchor-annotated,
/// count-weighted edges. Fold order does not matter: the output is sorted
/// by (-count, from, to).
pub fn build_internal_link_graph(pages: &[ParsedPage]) -> Vec<LinkEdge> {
    let mut edges: HashMap<(String, String), (BTreeSet<String>, usize)> = HashMap::new();

    for page in pages {
        if page.url.is_empty() {
            continue;
        }
        for link in &page.internal_links {
            if link.url.is_empty() {
                continue;
            }
            let entry = edges
                .entry((page.url.clone(), link.url.clone()))
                .or_default();
            if !link.anchor.is_empty() {
                entry.0.insert(link.anchor.clone());
            }
            entry.1 += 1;
        }
    }

    let mut output: Vec<LinkEdge> = edges
        .into_iter()
        .map(|((from, to), (anchors, count))| LinkEdge {
            from,
            to,
            anchor_texts: anchors.into_iter().take(ANCHOR_TEXT_CAP).collect(),
            count,
        })
        .collect();
    output.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.from.cmp(&b.from))
            .then_with(|| a.to.cmp(&b.to))
    });
    output
}

/// One-line human summary for CLI output.
pub fn build_summary_text(page: &ParsedPage, score: &ScorePack) -> String {
    let title_ok = if page.title.is_empty() { "ausente" } else { "presente" };
    let description_ok = if page.meta_description.is_empty() { "ausente" } else { "presente" };
    format!(
        "Analise concluida para {}. Titulo {}, meta description {}, {} H2 encontrados. Score AEO/GEO: {}.",
        page.url,
        title_ok,
        description_ok,
        page.headings.h2.len(),
        score.total
    )
}

/// Filesystem-safe base name for a page's output files.
pub fn safe_filename(url: &str) -> String {
    let stripped = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    let safe = FILENAME_SAFE_RE.replace_all(stripped, "_");
    let clipped: String = safe.chars().take(120).collect();
    if clipped.is_empty() {
        "pagina".to_string()
    } else {
        clipped
    }
}

// ── Tests ──
