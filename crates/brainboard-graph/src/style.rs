//! Static visual styling tables. Entity type picks node color/size/label;
//! edge confidence picks link width/color.

/// Visual styling for one entity type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeStyle {
    pub color: &'static str,
    pub size: f64,
    pub label: &'static str,
}

const DEFAULT_STYLE: NodeStyle = NodeStyle {
    color: "#9e9e9e",
    size: 12.0,
    label: "Other",
};

/// Style lookup for the known entity types. Unknown types get a neutral
/// gray size-12 default rather than erroring.
pub fn style_for(entity_type: &str) -> NodeStyle {
    match entity_type.to_ascii_lowercase().as_str() {
        "person" => NodeStyle {
            color: "#42a5f5",
            size: 16.0,
            label: "Person",
        },
        "project" => NodeStyle {
            color: "#66bb6a",
            size: 18.0,
            label: "Project",
        },
        "topic" => NodeStyle {
            color: "#ab47bc",
            size: 14.0,
            label: "Topic",
        },
        "tool" => NodeStyle {
            color: "#ffa726",
            size: 13.0,
            label: "Tool",
        },
        "issue" => NodeStyle {
            color: "#ef5350",
            size: 13.0,
            label: "Issue",
        },
        "document" => NodeStyle {
            color: "#8d6e63",
            size: 12.0,
            label: "Document",
        },
        "team" => NodeStyle {
            color: "#26a69a",
            size: 16.0,
            label: "Team",
        },
        "channel" => NodeStyle {
            color: "#5c6bc0",
            size: 13.0,
            label: "Channel",
        },
        "insight" => NodeStyle {
            color: "#fdd835",
            size: 14.0,
            label: "Insight",
        },
        "ad_campaign" => NodeStyle {
            color: "#ec407a",
            size: 14.0,
            label: "Ad Campaign",
        },
        "ad_platform" => NodeStyle {
            color: "#7e57c2",
            size: 14.0,
            label: "Ad Platform",
        },
        "optimization_action" => NodeStyle {
            color: "#29b6f6",
            size: 13.0,
            label: "Optimization",
        },
        _ => DEFAULT_STYLE,
    }
}

pub(crate) const EDGE_HEAVY_COLOR: &str = "#4caf50";
pub(crate) const EDGE_MEDIUM_COLOR: &str = "#ff9800";
pub(crate) const EDGE_THIN_COLOR: &str = "#9e9e9e";

/// Deterministic step function of confidence. Boundary values land in the
/// `>=` bucket; this thresholding is relied on for visual-regression parity.
pub(crate) fn confidence_style(confidence: f64) -> (f64, &'static str) {
    if confidence >= 0.8 {
        (3.0, EDGE_HEAVY_COLOR)
    } else if confidence >= 0.5 {
        (2.0, EDGE_MEDIUM_COLOR)
    } else {
        (1.0, EDGE_THIN_COLOR)
    }
}
