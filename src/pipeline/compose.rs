use serde::Serialize;

use crate::page::{DataGap, ParsedPage};
use crate::pipeline::entities::Entity;
use crate::pipeline::facts::FactBundle;
use crate::pipeline::intent::Intent;
use crate::pipeline::schema::SchemaNode;

pub const DIRECT_ANSWER_MARKER: &str = "**Resposta direta:**";
pub const QUESTION_PREFIXES: &[&str] =
    &["Como", "Quanto", "Quais", "Onde", "Quando", "Qual", "Quem"];

const DIRECT_ANSWER_MAX_WORDS: usize = 35;
const PARAGRAPH_MAX_WORDS: usize = 60;
const FAQ_CAP: usize = 8;
const ENTITY_TABLE_CAP: usize = 10;
const MODEL_LINK_CAP: usize = 8;
const MODEL_LINK_MARKERS: &[&str] = &["/gama/", "/modelos/", "/our-range/"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

/// The canonical per-page artifact: synthesized markdown, its direct
/// answer and FAQ, the extracted facts, and (attached by the orchestrator
/// after the schema build) the structured-data graph.
#[derive(Debug, Clone, Serialize)]
pub struct ContentPack {
    pub markdown: String,
    pub direct_answer: String,
    pub faq: Vec<QaPair>,
    pub facts: FactBundle,
    pub schema_graph: Vec<SchemaNode>,
}

fn first_sentence(text: &str) -> String {
    let trimmed = text.trim();
    let mut chars = trimmed.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            let followed_by_space = chars.peek().is_some_and(|(_, next)| next.is_whitespace());
            if followed_by_space {
                return trimmed[..idx + c.len_utf8()].to_string();
            }
        }
    }
    trimmed.to_string()
}

fn truncate_words(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_words {
        return text.to_string();
    }
    format!(
        "{}...",
        words[..max_words].join(" ").trim_end_matches([',', '.', ';', ':'])
    )
}

/// Word-boundary truncation of the direct answer: at most 35 words, any
/// trailing `,.;:` punctuation on the cut replaced by a single period.
fn clamp_direct_answer(answer: String) -> String {
    let words: Vec<&str> = answer.split_whitespace().collect();
    if words.len() <= DIRECT_ANSWER_MAX_WORDS {
        return answer;
    }
    format!(
        "{}.",
        words[..DIRECT_ANSWER_MAX_WORDS].join(" ").trim_end_matches([',', '.', ';', ':'])
    )
}

fn build_direct_answer(page: &ParsedPage, intent: Intent) -> String {
    let answer = match intent {
        Intent::InformationalComparative => {
            "Esta pagina funciona como indice para a gama de modelos e paginas relacionadas \
             (modelos, ofertas e servicos). Para dados como preco, versoes e especificacoes, \
             consulte a pagina especifica de cada modelo."
                .to_string()
        }
        Intent::Local => {
            let sentence = first_sentence(&page.meta_description);
            if sentence.is_empty() {
                "Esta pagina direciona para unidades/canais de atendimento; detalhes completos \
                 nao foram identificados na fonte."
                    .to_string()
            } else {
                sentence
            }
        }
        _ => {
            let source = page
                .paragraphs
                .first()
                .map(String::as_str)
                .unwrap_or(page.meta_description.as_str());
            let sentence = first_sentence(source);
            if sentence.is_empty() {
                "A fonte nao publica resposta direta suficiente para a pergunta principal."
                    .to_string()
            } else {
                sentence
            }
        }
    };
    clamp_direct_answer(answer)
}

/// Answer the first 8 secondary questions from the fact bundle via keyword
/// routing; definitional "o que e" questions are skipped, everything else
/// falls back to an explicit "not stated" answer.
fn build_faq(questions: &[String], facts: &FactBundle) -> Vec<QaPair> {
    let mut faq = Vec::new();
    for question in questions.iter().take(FAQ_CAP) {
        let q = question.trim();
        let ql = q.to_lowercase();
        if ql.starts_with("o que e ") {
            continue;
        }

        let answer = if ql.contains("preco") {
            match &facts.price {
                Some(price) => format!("O preco informado na fonte e {}.", price),
                None => "Preco nao informado na fonte.".to_string(),
            }
        } else if ql.contains("vers") {
            facts
                .versions
                .clone()
                .unwrap_or_else(|| "Versoes nao informadas na fonte.".to_string())
        } else if ql.contains("consumo") || ql.contains("autonomia") {
            facts
                .consumption
                .clone()
                .unwrap_or_else(|| "Consumo nao informado na fonte.".to_string())
        } else if ql.contains("garantia") {
            facts
                .warranty
                .clone()
                .unwrap_or_else(|| "Garantia nao informada na fonte.".to_string())
        } else if ql.contains("onde") || ql.contains("contato") || ql.contains("agendar") {
            facts
                .address_or_contact
                .clone()
                .unwrap_or_else(|| "Contato e endereco nao informados na fonte.".to_string())
        } else if ql.contains("taxa") || ql.contains("entrada") || ql.contains("parcela") {
            "Condicoes financeiras devem ser confirmadas na pagina fonte.".to_string()
        } else {
            "Informacao nao identificada com precisao na fonte. Recomenda-se publicar este \
             dado explicitamente."
                .to_string()
        };

        faq.push(QaPair {
            question: q.to_string(),
            answer,
        });
    }
    faq.truncate(FAQ_CAP);
    faq
}

fn normalize_question_heading(question: &str) -> String {
    if QUESTION_PREFIXES.iter().any(|prefix| question.starts_with(prefix)) {
        return question.to_string();
    }
    let mut chars = question.chars();
    match chars.next() {
        Some(first) => format!("Como {}{}", first.to_lowercase(), chars.as_str()),
        None => question.to_string(),
    }
}

fn write_intent_sections(
    lines: &mut Vec<String>,
    intent: Intent,
    page: &ParsedPage,
    facts: &FactBundle,
) {
    match intent {
        Intent::InformationalComparative => {
            lines.push("## O que voce encontra nesta pagina".to_string());
            match page.paragraphs.first() {
                Some(paragraph) => lines.push(truncate_words(paragraph, PARAGRAPH_MAX_WORDS)),
                None => lines.push(
                    "A fonte nao traz uma descricao editorial clara; esta pagina parece \
                     funcionar como indice/navegacao para modelos e servicos."
                        .to_string(),
                ),
            }
            lines.push(String::new());

            let mut model_links: Vec<(&str, &str)> = Vec::new();
            let mut seen_urls = std::collections::HashSet::new();
            for link in &page.internal_links {
                let href = link.url.to_lowercase();
                let anchor = link.anchor.trim();
                if anchor.is_empty() {
                    continue;
                }
                if MODEL_LINK_MARKERS.iter().any(|marker| href.contains(marker))
                    && seen_urls.insert(link.url.as_str())
                {
                    model_links.push((anchor, link.url.as_str()));
                }
            }
            if !model_links.is_empty() {
                lines.push("## Principais links de modelos/linha".to_string());
                for (anchor, url) in model_links.iter().take(MODEL_LINK_CAP) {
                    lines.push(format!("- {}: {}", anchor, url));
                }
                lines.push(String::new());
            }

            lines.push("## Versoes e principais diferencas".to_string());
            match &facts.versions {
                Some(versions) => lines.push(format!("- {}", versions)),
                None => lines.push("- Versoes nao informadas na fonte.".to_string()),
            }
            lines.push(String::new());

            lines.push("## Preco".to_string());
            match &facts.price {
                Some(price) => lines.push(format!("- Valor identificado: {}", price)),
                None => lines.push("- Preco nao informado na fonte.".to_string()),
            }
            lines.push(String::new());
        }

        Intent::Transactional => {
            lines.push("## Qual e a oferta e para quem serve".to_string());
            lines.push(
                page.paragraphs
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "A oferta nao esta detalhada na fonte.".to_string()),
            );
            lines.push(String::new());

            lines.push("## Condicoes".to_string());
            match &facts.price {
                Some(price) => lines.push(format!("- Preco ou valor citado: {}", price)),
                None => {
                    lines.push("- Entrada, parcelas e taxas nao informadas na fonte.".to_string())
                }
            }
            lines.push(String::new());

            lines.push("## Como aproveitar a oferta".to_string());
            lines.push("1. Consulte a pagina oficial da oferta.".to_string());
            lines.push("2. Valide elegibilidade e documentos.".to_string());
            lines.push("3. Confirme prazo de vigencia e condicoes finais.".to_string());
            lines.push(String::new());
        }

        Intent::Local => {
            lines.push("## Onde encontrar atendimento".to_string());
            lines.push(
                facts
                    .address_or_contact
                    .clone()
                    .unwrap_or_else(|| "Endereco e contato nao informados na fonte.".to_string()),
            );
            lines.push(String::new());

            lines.push("## Como agendar".to_string());
            lines.push(
                "- Verifique se a pagina disponibiliza formulario, telefone ou canal oficial."
                    .to_string(),
            );
            lines.push(
                "- Se nao houver canal explicito, publicar instrucao de agendamento e recomendado."
                    .to_string(),
            );
            lines.push(String::new());
        }

        Intent::Navigational => {
            lines.push("## Informacoes principais".to_string());
            if page.paragraphs.is_empty() {
                lines.push("- A fonte nao trouxe contexto suficiente.".to_string());
            } else {
                for paragraph in page.paragraphs.iter().take(3) {
                    lines.push(format!("- {}", paragraph));
                }
            }
            lines.push(String::new());
        }
    }
}

/// Synthesize the answer document. Fixed assembly order: title, direct
/// answer, primary question block, intent sections, entity table, FAQ,
/// missing-data section.
pub fn compose(
    page: &ParsedPage,
    intent: Intent,
    primary_question: &str,
    secondary_questions: &[String],
    entities: &[Entity],
    facts: &FactBundle,
    expected_gaps: &[DataGap],
) -> ContentPack {
    let title = if page.title.is_empty() {
        "Pagina sem titulo"
    } else {
        page.title.as_str()
    };

    let direct_answer = build_direct_answer(page, intent);
    let faq = build_faq(secondary_questions, facts);

    let mut lines = vec![
        format!("# {}", title),
        String::new(),
        format!("{} {}", DIRECT_ANSWER_MARKER, direct_answer),
        String::new(),
    ];

    lines.push(format!("## {}", primary_question));
    if intent == Intent::InformationalComparative {
        lines.push(
            "A fonte nao consolida uma explicacao unica em texto corrido; trate esta pagina \
             como um indice. Use os links internos para abrir o modelo/tema especifico e entao \
             coletar dados (preco, versoes, consumo, garantia) da pagina correta."
                .to_string(),
        );
    } else {
        lines.push(page.paragraphs.first().cloned().unwrap_or_else(|| {
            "A fonte nao trouxe um bloco explicativo completo para esta pergunta.".to_string()
        }));
    }
    lines.push(String::new());

    write_intent_sections(&mut lines, intent, page, facts);

    lines.push("## Entidades relevantes".to_string());
    lines.push("| Entidade | Tipo |".to_string());
    lines.push("| --- | --- |".to_string());
    if entities.is_empty() {
        lines.push("| Nao informado | Nao informado |".to_string());
    } else {
        for entity in entities.iter().take(ENTITY_TABLE_CAP) {
            lines.push(format!(
                "| {} | {} |",
                entity.entity_name,
                entity.entity_type.as_str()
            ));
        }
    }
    lines.push(String::new());

    lines.push("## Perguntas frequentes".to_string());
    for qa in &faq {
        lines.push(format!("### {}", normalize_question_heading(&qa.question)));
        lines.push(qa.answer.clone());
        lines.push(String::new());
    }

    lines.push("## Dados nao informados".to_string());
    if expected_gaps.is_empty() {
        lines.push("- A fonte cobre os dados esperados para esta intencao.".to_string());
    } else {
        for gap in expected_gaps {
            lines.push(format!(
                "- {}. Recomenda-se publicar este dado de forma explicita.",
                gap.message
            ));
        }
    }

    ContentPack {
        markdown: lines.join("\n").trim().to_string(),
        direct_answer,
        faq,
        facts: facts.clone(),
        schema_graph: Vec::new(),
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::expected_data_gaps;

    fn questions(bank: &[&str]) -> Vec<String> {
        bank.iter().map(|q| q.to_string()).collect()
    }

    #[test]
    fn first_sentence_splits_on_terminal_punctuation() {
        assert_eq!(first_sentence("Primeira frase. Segunda frase."), "Primeira frase.");
        assert_eq!(first_sentence("Sem pontuacao final"), "Sem pontuacao final");
        // Punctuation not followed by whitespace does not split
        assert_eq!(first_sentence("Modelo 1.0 turbo"), "Modelo 1.0 turbo");
    }

    #[test]
    fn direct_answer_truncates_at_35_words() {
        let long: Vec<String> = (0..50).map(|i| format!("palavra{}", i)).collect();
        let page = ParsedPage {
            paragraphs: vec![long.join(" ")],
            ..Default::default()
        };
        let pack = compose(&page, Intent::Navigational, "Q?", &[], &[], &FactBundle::default(), &[]);
        assert_eq!(pack.direct_answer.split_whitespace().count(), 35);
        assert!(pack.direct_answer.ends_with("palavra34."));
    }

    #[test]
    fn direct_answer_truncation_punctuation() {
        // 35th word ends in a comma: stripped, then a single period appended
        let mut words: Vec<String> = (0..34).map(|i| format!("w{}", i)).collect();
        words.push("fim,".to_string());
        words.push("resto".to_string());
        let page = ParsedPage {
            paragraphs: vec![words.join(" ")],
            ..Default::default()
        };
        let pack = compose(&page, Intent::Navigational, "Q?", &[], &[], &FactBundle::default(), &[]);
        assert!(pack.direct_answer.ends_with("fim."));
        assert!(!pack.direct_answer.ends_with("fim,."));
    }

    #[test]
    fn empty_page_still_produces_document() {
        let page = ParsedPage::default();
        let gaps = expected_data_gaps(&page);
        let pack = compose(
            &page,
            Intent::Navigational,
            "Qual e a informacao principal disponivel em esta pagina?",
            &[],
            &[],
            &FactBundle::default(),
            &gaps,
        );
        assert!(!pack.direct_answer.is_empty());
        assert!(pack.markdown.starts_with("# Pagina sem titulo"));
        assert!(pack.markdown.contains("| Nao informado | Nao informado |"));
        assert!(pack.markdown.contains("## Dados nao informados"));
    }

    #[test]
    fn faq_routes_questions_to_facts() {
        let facts = FactBundle {
            price: Some("R$ 99.990".to_string()),
            warranty: Some("Garantia de 3 anos".to_string()),
            ..Default::default()
        };
        let qs = questions(&[
            "Qual e a faixa de preco e quais itens estao incluidos?",
            "Quais custos de manutencao e garantia sao informados?",
            "Quais versoes estao disponiveis e o que muda entre elas?",
            "Quais sao as condicoes de entrada, parcelas e taxas?",
        ]);
        let faq = build_faq(&qs, &facts);
        assert_eq!(faq[0].answer, "O preco informado na fonte e R$ 99.990.");
        assert_eq!(faq[1].answer, "Garantia de 3 anos");
        assert_eq!(faq[2].answer, "Versoes nao informadas na fonte.");
        assert_eq!(faq[3].answer, "Condicoes financeiras devem ser confirmadas na pagina fonte.");
    }

    #[test]
    fn faq_definitional_skips_consume_first_eight_slots() {
        // The first-8 window is taken before definitional questions are
        // dropped, so each skip costs one slot
        let mut qs = questions(&["O que e IPVA?"]);
        for i in 0..10 {
            qs.push(format!("Quando sai o modelo {}?", i));
        }
        let faq = build_faq(&qs, &FactBundle::default());
        assert!(faq.iter().all(|qa| !qa.question.starts_with("O que e")));
        assert_eq!(faq.len(), 7);
    }

    #[test]
    fn question_headings_get_interrogative_prefix() {
        assert_eq!(normalize_question_heading("Quais versoes existem?"), "Quais versoes existem?");
        assert_eq!(
            normalize_question_heading("Ha regras de elegibilidade ou restricoes por perfil?"),
            "Como ha regras de elegibilidade ou restricoes por perfil?"
        );
    }

    #[test]
    fn informational_section_lists_model_links() {
        let page = ParsedPage {
            title: "Gama".to_string(),
            internal_links: vec![
                crate::page::PageLink {
                    url: "https://x.example/modelos/onix".to_string(),
                    anchor: "Onix".to_string(),
                },
                // Duplicate URL collapses
                crate::page::PageLink {
                    url: "https://x.example/modelos/onix".to_string(),
                    anchor: "Onix de novo".to_string(),
                },
                crate::page::PageLink {
                    url: "https://x.example/sobre".to_string(),
                    anchor: "Sobre".to_string(),
                },
            ],
            ..Default::default()
        };
        let pack = compose(
            &page,
            Intent::InformationalComparative,
            "Q?",
            &[],
            &[],
            &FactBundle::default(),
            &[],
        );
        assert!(pack.markdown.contains("## Principais links de modelos/linha"));
        assert_eq!(pack.markdown.matches("modelos/onix").count(), 1);
        assert!(!pack.markdown.contains("- Sobre:"));
    }

    #[test]
    fn transactional_section_has_fixed_steps() {
        let pack = compose(
            &ParsedPage::default(),
            Intent::Transactional,
            "Q?",
            &[],
            &[],
            &FactBundle::default(),
            &[],
        );
        assert!(pack.markdown.contains("1. Consulte a pagina oficial da oferta."));
        assert!(pack.markdown.contains("3. Confirme prazo de vigencia e condicoes finais."));
    }
}
