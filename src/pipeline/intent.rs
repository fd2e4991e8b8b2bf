use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::page::ParsedPage;

static WARRANTY_H2_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bgarantia\b").unwrap());
static CONSUMPTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bconsumo|km/l|autonomia\b").unwrap());

/// Inferred purpose of a page. Drives branching in every downstream stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    InformationalComparative,
    Transactional,
    Local,
    Navigational,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::InformationalComparative => "informational_comparative",
            Intent::Transactional => "transactional",
            Intent::Local => "local",
            Intent::Navigational => "navigational",
        }
    }
}

const TITLE_MODEL_MARKERS: &[&str] = &["modelos", "gama", "our range", "our-range", "linha"];
const PATH_TRANSACTIONAL: &[&str] = &["/ofertas", "/comprar", "/financiamento", "/buy", "/oferta"];
const PATH_INFORMATIONAL: &[&str] = &["/modelos", "/gama", "/our-range"];
const PATH_LOCAL: &[&str] = &["/concessionarias", "/dealers", "/lojas", "/store-locator"];
const CORPUS_TRANSACTIONAL: &[&str] = &["agendar", "compre", "simule", "oferta", "financiamento"];
const CORPUS_LOCAL: &[&str] = &["endereco", "unidade", "concessionaria", "bairro", "cidade"];

/// Classify a page's intent. Total: always returns one of the four intents.
///
/// The title rule runs before the path rules: "gama/modelos" index pages
/// often embed pricing modules, but their primary intent is still
/// informational/comparative.
pub fn detect_intent(page: &ParsedPage) -> Intent {
    let path = page.url_path();
    let title = page.title.to_lowercase();
    let corpus = format!("{} {} {}", path, title, page.full_text.to_lowercase());

    if TITLE_MODEL_MARKERS.iter().any(|key| title.contains(key)) {
        return Intent::InformationalComparative;
    }

    if PATH_TRANSACTIONAL.iter().any(|key| path.contains(key)) {
        return Intent::Transactional;
    }
    if PATH_INFORMATIONAL.iter().any(|key| path.contains(key)) {
        return Intent::InformationalComparative;
    }
    if PATH_LOCAL.iter().any(|key| path.contains(key)) {
        return Intent::Local;
    }

    if corpus.contains("compar") || corpus.contains("diferen") {
        return Intent::InformationalComparative;
    }
    if CORPUS_TRANSACTIONAL.iter().any(|key| corpus.contains(key)) {
        return Intent::Transactional;
    }
    if CORPUS_LOCAL.iter().any(|key| corpus.contains(key)) {
        return Intent::Local;
    }
    Intent::Navigational
}

const BANK_INFORMATIONAL: &[&str] = &[
    "Quais sao os principais diferenciais deste modelo?",
    "Quais versoes estao disponiveis e o que muda entre elas?",
    "Qual e a faixa de preco e quais itens estao incluidos?",
    "Como este modelo se compara com alternativas da mesma categoria?",
    "Quais custos de manutencao e garantia sao informados?",
    "Onde consultar especificacoes tecnicas completas?",
];
const BANK_TRANSACTIONAL: &[&str] = &[
    "Qual e a oferta ativa e para quem ela se aplica?",
    "Quais sao as condicoes de entrada, parcelas e taxas?",
    "Quais documentos sao necessarios para contratacao?",
    "Ha regras de elegibilidade ou restricoes por perfil?",
    "Como simular e concluir a contratacao passo a passo?",
    "Onde validar prazo de vigencia da oferta?",
];
const BANK_LOCAL: &[&str] = &[
    "Onde ficam as unidades de atendimento?",
    "Quais sao os horarios de funcionamento por regiao?",
    "Como agendar visita, test-drive ou atendimento?",
    "Quais contatos oficiais estao disponiveis?",
    "Ha servicos especificos por unidade?",
    "Como confirmar cobertura na minha cidade?",
];
const BANK_NAVIGATIONAL: &[&str] = &[
    "Qual secao resolve mais rapido a necessidade principal?",
    "Onde encontrar contato e canais oficiais?",
    "Como navegar para paginas de produto, oferta e suporte?",
    "Quais links internos sao prioritarios?",
    "Onde estao politicas e informacoes legais?",
];

fn question_bank(intent: Intent) -> &'static [&'static str] {
    match intent {
        Intent::InformationalComparative => BANK_INFORMATIONAL,
        Intent::Transactional => BANK_TRANSACTIONAL,
        Intent::Local => BANK_LOCAL,
        Intent::Navigational => BANK_NAVIGATIONAL,
    }
}

pub fn primary_question(intent: Intent, page: &ParsedPage) -> String {
    let title = if page.title.is_empty() {
        "esta pagina"
    } else {
        page.title.as_str()
    };
    match intent {
        Intent::Transactional => {
            format!("Quais condicoes desta oferta em {} e como contratar?", title)
        }
        Intent::Local => format!("Onde encontrar atendimento e como agendar em {}?", title),
        Intent::InformationalComparative => {
            format!("Quais sao as versoes, diferencas e dados principais de {}?", title)
        }
        Intent::Navigational => {
            format!("Qual e a informacao principal disponivel em {}?", title)
        }
    }
}

/// Ordered secondary questions: bank + conditional front insertions,
/// "o que e" definitional queries dropped, exact dedup preserving first-seen
/// order, clamped to max(3, min(limit, 8)).
pub fn secondary_questions(intent: Intent, page: &ParsedPage, limit: usize) -> Vec<String> {
    let mut questions: Vec<String> =
        question_bank(intent).iter().map(|q| q.to_string()).collect();

    let h2_text = page.headings.h2.join(" ");
    if WARRANTY_H2_RE.is_match(&h2_text) {
        questions.insert(0, "Qual garantia oficial e informada para este item?".to_string());
    }
    if CONSUMPTION_RE.is_match(&page.full_text) {
        questions.insert(
            0,
            "Quais numeros de consumo e autonomia foram publicados?".to_string(),
        );
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut cleaned = Vec::new();
    for question in questions {
        let normalized = question.trim().to_string();
        if normalized.to_lowercase().starts_with("o que e ") {
            continue;
        }
        if !seen.insert(normalized.clone()) {
            continue;
        }
        cleaned.push(normalized);
    }
    cleaned.truncate(limit.clamp(3, 8));
    cleaned
}

// ── Tests ──
