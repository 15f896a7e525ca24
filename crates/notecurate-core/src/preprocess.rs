//! Text pre-processing applied to pasted notes before import.

use serde::{Deserialize, Serialize};

use crate::defaults;

/// A pre-processing algorithm together with its configuration.
///
/// Serialized with the algorithm name as tag, e.g.
/// `{"name":"simple-prefix","prefix":">"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "kebab-case")]
pub enum Algorithm {
    /// Trim every line and drop empty ones.
    Trim,
    /// Prepend the most recent title line to every other line.
    SimplePackWithTitle {
        #[serde(default = "default_keyword")]
        keyword: String,
    },
    /// Prepend a fixed prefix to every line.
    SimplePrefix {
        #[serde(default)]
        prefix: String,
    },
}

fn default_keyword() -> String {
    defaults::PACK_TITLE_KEYWORD.to_string()
}

impl Algorithm {
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Trim => "trim",
            Algorithm::SimplePackWithTitle { .. } => "simple-pack-with-title",
            Algorithm::SimplePrefix { .. } => "simple-prefix",
        }
    }

    /// Run the algorithm over `text`.
    pub fn apply(&self, text: &str) -> String {
        match self {
            Algorithm::Trim => text
                .trim()
                .split('\n')
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join("\n"),
            Algorithm::SimplePackWithTitle { keyword } => {
                let mut title = "";
                let mut packed = Vec::new();
                for line in text.split('\n') {
                    if line.trim().starts_with(keyword.as_str()) {
                        title = line;
                    } else {
                        packed.push(format!("{}, {}", title, line));
                    }
                }
                packed.join("\n")
            }
            Algorithm::SimplePrefix { prefix } => text
                .split('\n')
                .map(|line| format!("{} {}", prefix, line))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// A configurable text field of an algorithm.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigField {
    pub key: &'static str,
    pub label: &'static str,
    pub default_value: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'static str>,
}

/// Catalog entry describing an algorithm to clients.
#[derive(Debug, Clone, Serialize)]
pub struct AlgorithmInfo {
    pub name: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub config: Vec<ConfigField>,
}

/// All available algorithms in display order.
pub fn catalog() -> Vec<AlgorithmInfo> {
    vec![
        AlgorithmInfo {
            name: "trim",
            label: "Trim Whitespaces",
            description: "Trim whitespaces and new lines from the text",
            config: vec![],
        },
        AlgorithmInfo {
            name: "simple-pack-with-title",
            label: "Simple Pack with Title",
            description:
                "Pack all items with title. The title is the line that starts with the keyword.",
            config: vec![ConfigField {
                key: "keyword",
                label: "Keyword",
                default_value: defaults::PACK_TITLE_KEYWORD,
                description: Some(
                    "Lines starting with the keyword become the title for all lines below them.",
                ),
            }],
        },
        AlgorithmInfo {
            name: "simple-prefix",
            label: "Simple Prefix",
            description: "Add a prefix to each line.",
            config: vec![ConfigField {
                key: "prefix",
                label: "Prefix",
                default_value: "",
                description: None,
            }],
        },
    ]
}
