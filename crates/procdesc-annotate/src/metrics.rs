//! Structural metrics over a BPMN 2.0 XML document.
//!
//! Counts flow nodes by subtype, sequence flows, pools and lanes, and derives
//! the coefficient of network complexity (CNC) and the Durfee square.

use procdesc_model::TypeCounts;
use roxmltree::{Document, Node, ParsingOptions};

pub const BPMN_NS: &str = "http://www.omg.org/spec/BPMN/20100524/MODEL";

pub const ACTIVITY_TYPES: &[&str] = &[
    "task",
    "userTask",
    "serviceTask",
    "manualTask",
    "scriptTask",
    "sendTask",
    "receiveTask",
    "businessRuleTask",
    "subProcess",
    "callActivity",
];

pub const EVENT_TYPES: &[&str] = &[
    "startEvent",
    "endEvent",
    "intermediateCatchEvent",
    "intermediateThrowEvent",
    "boundaryEvent",
];

pub const GATEWAY_TYPES: &[&str] = &[
    "exclusiveGateway",
    "inclusiveGateway",
    "parallelGateway",
    "eventBasedGateway",
    "complexGateway",
];

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("XML parse error: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("root element has no `id` attribute")]
    MissingId,
}

/// Everything the annotator extracts from the diagram markup.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagramMetrics {
    pub model_id: String,
    pub type_activities_count: TypeCounts,
    pub type_events_count: TypeCounts,
    pub type_gateways_count: TypeCounts,
    pub activities_count: usize,
    pub events_count: usize,
    pub gateways_count: usize,
    pub nodes_count: usize,
    pub sequence_flows_count: usize,
    pub pools_count: usize,
    pub lanes_count: usize,
    pub cnc: f64,
    pub durfee: usize,
}

impl DiagramMetrics {
    pub fn from_xml(xml: &str) -> Result<Self, MetricsError> {
        let opts = ParsingOptions {
            allow_dtd: true,
            ..ParsingOptions::default()
        };
        let doc = Document::parse_with_options(xml, opts)?;
        let root = doc.root_element();
        let model_id = root.attribute("id").ok_or(MetricsError::MissingId)?.to_string();

        let type_activities_count = count_types(&doc, ACTIVITY_TYPES);
        let type_events_count = count_types(&doc, EVENT_TYPES);
        let type_gateways_count = count_types(&doc, GATEWAY_TYPES);

        let activities_count: usize = type_activities_count.values().sum();
        let events_count: usize = type_events_count.values().sum();
        let gateways_count: usize = type_gateways_count.values().sum();
        let nodes_count = activities_count + events_count + gateways_count;

        let sequence_flows_count = count_elements(&doc, "sequenceFlow");
        let pools_count = count_elements(&doc, "participant");
        let lanes_count = count_elements(&doc, "lane");

        let cnc = if nodes_count == 0 {
            0.0
        } else {
            sequence_flows_count as f64 / nodes_count as f64
        };

        let type_totals: Vec<usize> = type_activities_count
            .values()
            .chain(type_events_count.values())
            .chain(type_gateways_count.values())
            .copied()
            .collect();

        Ok(Self {
            model_id,
            type_activities_count,
            type_events_count,
            type_gateways_count,
            activities_count,
            events_count,
            gateways_count,
            nodes_count,
            sequence_flows_count,
            pools_count,
            lanes_count,
            cnc,
            durfee: durfee_square(&type_totals),
        })
    }
}

fn is_bpmn(node: &Node<'_, '_>, local: &str) -> bool {
    node.is_element()
        && node.tag_name().namespace() == Some(BPMN_NS)
        && node.tag_name().name() == local
}

fn count_elements(doc: &Document<'_>, local: &str) -> usize {
    doc.descendants().filter(|n| is_bpmn(n, local)).count()
}

// Every listed subtype is present, zero when absent.
fn count_types(doc: &Document<'_>, types: &[&str]) -> TypeCounts {
    let mut counts: TypeCounts = types.iter().map(|t| (t.to_string(), 0)).collect();
    for node in doc.descendants().filter(|n| n.is_element()) {
        if node.tag_name().namespace() != Some(BPMN_NS) {
            continue;
        }
        if let Some(c) = counts.get_mut(node.tag_name().name()) {
            *c += 1;
        }
    }
    counts
}

/// Largest `d` such that at least `d` node types occur at least `d` times.
pub fn durfee_square(type_counts: &[usize]) -> usize {
    let mut sorted: Vec<usize> = type_counts.iter().copied().filter(|&c| c > 0).collect();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    sorted
        .iter()
        .enumerate()
        .take_while(|&(i, c)| *c > i)
        .count()
}
