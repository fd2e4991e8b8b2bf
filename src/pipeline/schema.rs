use serde::Serialize;

use crate::page::ParsedPage;
use crate::pipeline::compose::ContentPack;
use crate::pipeline::entities::{Entity, EntityType};
use crate::pipeline::intent::Intent;

pub const SCHEMA_CONTEXT: &str = "https://schema.org";

/// One typed node of the JSON-LD graph. The FAQPage shape is the shared
/// contract between the schema builder and the parity checker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "@type")]
pub enum SchemaNode {
    WebPage {
        #[serde(rename = "@id")]
        id: String,
        url: String,
        name: String,
        description: String,
    },
    BreadcrumbList {
        #[serde(rename = "@id")]
        id: String,
        #[serde(rename = "itemListElement")]
        item_list_element: Vec<ListItem>,
    },
    Organization {
        #[serde(rename = "@id")]
        id: String,
        name: String,
    },
    #[serde(rename = "FAQPage")]
    FaqPage {
        #[serde(rename = "@id")]
        id: String,
        #[serde(rename = "mainEntity")]
        main_entity: Vec<FaqQuestion>,
    },
    AutoDealer {
        #[serde(rename = "@id")]
        id: String,
        name: String,
        description: String,
    },
    HowTo {
        #[serde(rename = "@id")]
        id: String,
        name: String,
        step: Vec<HowToStep>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListItem {
    #[serde(rename = "@type")]
    kind: &'static str,
    pub position: usize,
    pub name: String,
    pub item: String,
}

impl ListItem {
    fn new(position: usize, name: String, item: String) -> Self {
        Self { kind: "ListItem", position, name, item }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaqQuestion {
    #[serde(rename = "@type")]
    kind: &'static str,
    pub name: String,
    #[serde(rename = "acceptedAnswer")]
    pub accepted_answer: FaqAnswer,
}

impl FaqQuestion {
    pub fn new(name: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            kind: "Question",
            name: name.into(),
            accepted_answer: FaqAnswer { kind: "Answer", text: answer.into() },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaqAnswer {
    #[serde(rename = "@type")]
    kind: &'static str,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HowToStep {
    #[serde(rename = "@type")]
    kind: &'static str,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaDocument {
    #[serde(rename = "@context")]
    pub context: String,
    #[serde(rename = "@graph")]
    pub graph: Vec<SchemaNode>,
}

impl SchemaDocument {
    pub fn faq_page(&self) -> Option<&[FaqQuestion]> {
        self.graph.iter().find_map(|node| match node {
            SchemaNode::FaqPage { main_entity, .. } => Some(main_entity.as_slice()),
            _ => None,
        })
    }
}

/// Build the structured-data graph mirroring the content pack. Node order
/// (WebPage, BreadcrumbList, Organization, FAQPage, AutoDealer, HowTo) is
/// part of the downstream parity contract.
pub fn build_schema(
    page: &ParsedPage,
    content: &ContentPack,
    intent: Intent,
    entities: &[Entity],
) -> SchemaDocument {
    let url = page.url.as_str();
    let title = if page.title.is_empty() { "Pagina" } else { page.title.as_str() };

    let mut graph = vec![SchemaNode::WebPage {
        id: format!("{}#webpage", url),
        url: url.to_string(),
        name: title.to_string(),
        description: content.direct_answer.clone(),
    }];

    if !page.breadcrumbs.is_empty() {
        graph.push(SchemaNode::BreadcrumbList {
            id: format!("{}#breadcrumbs", url),
            item_list_element: page
                .breadcrumbs
                .iter()
                .enumerate()
                .map(|(index, crumb)| {
                    ListItem::new(index + 1, crumb.name.clone(), crumb.url.clone())
                })
                .collect(),
        });
    }

    if let Some(org) = entities
        .iter()
        .find(|e| e.entity_type == EntityType::Organization)
    {
        graph.push(SchemaNode::Organization {
            id: format!("{}#organization", url),
            name: org.entity_name.clone(),
        });
    }

    if !content.faq.is_empty() {
        graph.push(SchemaNode::FaqPage {
            id: format!("{}#faq", url),
            main_entity: content
                .faq
                .iter()
                .map(|qa| FaqQuestion::new(qa.question.clone(), qa.answer.clone()))
                .collect(),
        });
    }

    if intent == Intent::Local {
        if let Some(contact) = &content.facts.address_or_contact {
            graph.push(SchemaNode::AutoDealer {
                id: format!("{}#autodealer", url),
                name: title.to_string(),
                description: contact.clone(),
            });
        }
    }

    if intent == Intent::InformationalComparative {
        graph.push(SchemaNode::HowTo {
            id: format!("{}#howto", url),
            name: format!("Como analisar {}", title),
            step: vec![
                HowToStep {
                    kind: "HowToStep",
                    text: "Revisar resposta direta e dados principais.".to_string(),
                },
                HowToStep {
                    kind: "HowToStep",
                    text: "Comparar versoes, preco e garantia com base na fonte.".to_string(),
                },
            ],
        });
    }

    SchemaDocument { context: SCHEMA_CONTEXT.to_string(), graph }
}

/// Validate FAQ/schema lockstep: same count, same question/answer per
/// position (answers compared after trimming). Trivially ok when both
/// sides are absent.
pub fn check_parity(schema: &SchemaDocument, content: &ContentPack) -> (bool, Vec<String>) {
    let faq_page = schema.faq_page();

    if faq_page.is_none() && content.faq.is_empty() {
        return (true, Vec::new());
    }
    if !content.faq.is_empty() && faq_page.is_none() {
        return (false, vec!["Schema FAQPage ausente apesar de FAQ existir".to_string()]);
    }

    let schema_faq = faq_page.unwrap_or(&[]);
    let mut errors = Vec::new();

    if schema_faq.len() != content.faq.len() {
        errors.push("Quantidade de perguntas no schema difere do conteudo".to_string());
    }

    for (index, qa) in content.faq.iter().enumerate() {
        let Some(item) = schema_faq.get(index) else {
            break;
        };
        if item.name != qa.question {
            errors.push(format!("Pergunta {} no schema difere do conteudo", index + 1));
        }
        if item.accepted_answer.text.trim() != qa.answer.trim() {
            errors.push(format!("Resposta {} no schema difere do conteudo", index + 1));
        }
    }

    (errors.is_empty(), errors)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::Breadcrumb;
    use crate::pipeline::compose::QaPair;
    use crate::pipeline::entities::Evidence;
    use crate::pipeline::facts::FactBundle;

    fn content_with_faq(faq: Vec<QaPair>) -> ContentPack {
        ContentPack {
            markdown: String::new(),
            direct_answer: "Resposta objetiva.".to_string(),
            faq,
            facts: FactBundle::default(),
            schema_graph: Vec::new(),
        }
    }

    fn qa(question: &str, answer: &str) -> QaPair {
        QaPair { question: question.to_string(), answer: answer.to_string() }
    }

    #[test]
    fn webpage_node_always_present() {
        let page = ParsedPage {
            url: "https://x.example/p".to_string(),
            ..Default::default()
        };
        let schema = build_schema(&page, &content_with_faq(vec![]), Intent::Navigational, &[]);
        assert!(matches!(
            &schema.graph[0],
            SchemaNode::WebPage { id, name, .. }
                if id == "https://x.example/p#webpage" && name == "Pagina"
        ));
        assert_eq!(schema.context, SCHEMA_CONTEXT);
    }

    #[test]
    fn breadcrumb_positions_are_one_based() {
        let page = ParsedPage {
            url: "https://x.example/p".to_string(),
            breadcrumbs: vec![
                Breadcrumb { name: "Home".to_string(), url: "https://x.example/".to_string() },
                Breadcrumb { name: "Modelos".to_string(), url: "https://x.example/modelos".to_string() },
            ],
            ..Default::default()
        };
        let schema = build_schema(&page, &content_with_faq(vec![]), Intent::Navigational, &[]);
        let items = schema
            .graph
            .iter()
            .find_map(|n| match n {
                SchemaNode::BreadcrumbList { item_list_element, .. } => Some(item_list_element),
                _ => None,
            })
            .unwrap();
        assert_eq!(items[0].position, 1);
        assert_eq!(items[1].position, 2);
        assert_eq!(items[1].name, "Modelos");
    }

    #[test]
    fn organization_node_uses_first_org_entity() {
        let org = Entity {
            entity_name: "Stellantis".to_string(),
            entity_type: EntityType::Organization,
            aliases: vec!["Stellantis".to_string()],
            evidence: Evidence { snippet: "Stellantis".to_string(), start: 0, end: 10 },
        };
        let schema = build_schema(
            &ParsedPage::default(),
            &content_with_faq(vec![]),
            Intent::Navigational,
            &[org],
        );
        assert!(schema
            .graph
            .iter()
            .any(|n| matches!(n, SchemaNode::Organization { name, .. } if name == "Stellantis")));
    }

    #[test]
    fn no_faq_page_node_when_faq_empty() {
        let schema = build_schema(
            &ParsedPage::default(),
            &content_with_faq(vec![]),
            Intent::Transactional,
            &[],
        );
        assert!(schema.faq_page().is_none());
    }

    #[test]
    fn autodealer_requires_local_intent_and_contact() {
        let mut content = content_with_faq(vec![]);
        content.facts.address_or_contact = Some("Telefone (11) 4002-8922".to_string());
        let schema = build_schema(&ParsedPage::default(), &content, Intent::Local, &[]);
        assert!(schema.graph.iter().any(|n| matches!(n, SchemaNode::AutoDealer { .. })));

        let schema = build_schema(&ParsedPage::default(), &content, Intent::Transactional, &[]);
        assert!(!schema.graph.iter().any(|n| matches!(n, SchemaNode::AutoDealer { .. })));
    }

    #[test]
    fn howto_node_for_informational_intent() {
        let schema = build_schema(
            &ParsedPage::default(),
            &content_with_faq(vec![]),
            Intent::InformationalComparative,
            &[],
        );
        let steps = schema
            .graph
            .iter()
            .find_map(|n| match n {
                SchemaNode::HowTo { step, .. } => Some(step),
                _ => None,
            })
            .unwrap();
        assert_eq!(steps.len(), 2);
    }

    #[test]
    fn parity_holds_by_construction() {
        let content = content_with_faq(vec![
            qa("Como contratar?", "Use o formulario oficial."),
            qa("Quais documentos?", "Documento oficial com foto."),
        ]);
        let schema = build_schema(&ParsedPage::default(), &content, Intent::Transactional, &[]);
        let (ok, errors) = check_parity(&schema, &content);
        assert!(ok);
        assert!(errors.is_empty());
    }

    #[test]
    fn parity_detects_question_mismatch() {
        let content = content_with_faq(vec![qa("Como contratar?", "Use o formulario oficial.")]);
        let schema = SchemaDocument {
            context: SCHEMA_CONTEXT.to_string(),
            graph: vec![SchemaNode::FaqPage {
                id: "#faq".to_string(),
                main_entity: vec![FaqQuestion::new("Pergunta errada", "Resposta errada")],
            }],
        };
        let (ok, errors) = check_parity(&schema, &content);
        assert!(!ok);
        assert!(!errors.is_empty());
    }

    #[test]
    fn parity_flags_missing_faq_page() {
        let content = content_with_faq(vec![qa("Como contratar?", "Use o formulario oficial.")]);
        let schema = SchemaDocument { context: SCHEMA_CONTEXT.to_string(), graph: vec![] };
        let (ok, errors) = check_parity(&schema, &content);
        assert!(!ok);
        assert_eq!(errors, vec!["Schema FAQPage ausente apesar de FAQ existir".to_string()]);
    }

    #[test]
    fn faq_page_serializes_as_json_ld() {
        let content = content_with_faq(vec![qa("Como contratar?", "Use o formulario oficial.")]);
        let page = ParsedPage { url: "https://x.example/p".to_string(), ..Default::default() };
        let schema = build_schema(&page, &content, Intent::Transactional, &[]);
        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json["@context"], "https://schema.org");
        let faq_node = json["@graph"]
            .as_array()
            .unwrap()
            .iter()
            .find(|n| n["@type"] == "FAQPage")
            .unwrap();
        assert_eq!(faq_node["mainEntity"][0]["@type"], "Question");
        assert_eq!(faq_node["mainEntity"][0]["name"], "Como contratar?");
        assert_eq!(
            faq_node["mainEntity"][0]["acceptedAnswer"]["text"],
            "Use o formulario oficial."
        );
    }
}
