//! Serde model of the SDMX-JSON data message.
//!
//! Covers both layouts seen in the wild: SDMX-JSON 1.0 keeps `dataSets` and
//! `structure` at the root, 2.0 nests them under `data` (with `structures`).

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub(crate) struct DataMessage {
    #[serde(default, alias = "meta")]
    pub(crate) header: Option<Value>,
    #[serde(default)]
    pub(crate) data: Option<DataSection>,
    #[serde(flatten)]
    pub(crate) root: DataSection,
}

impl DataMessage {
    /// The section that actually carries data sets.
    pub(crate) fn section(&self) -> &DataSection {
        match &self.data {
            Some(data) if data.data_sets.is_some() => data,
            _ => &self.root,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DataSection {
    #[serde(default, rename = "dataSets")]
    pub(crate) data_sets: Option<Vec<DataSet>>,
    #[serde(default)]
    pub(crate) structure: Option<Structure>,
    #[serde(default)]
    pub(crate) structures: Vec<Structure>,
}

impl DataSection {
    pub(crate) fn structure(&self) -> Option<&Structure> {
        self.structure.as_ref().or_else(|| self.structures.first())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct Structure {
    pub(crate) dimensions: ComponentLists,
    #[serde(default)]
    pub(crate) attributes: ComponentLists,
}

/// Components attached at each level of the message.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ComponentLists {
    #[serde(default, rename = "dataSet")]
    pub(crate) data_set: Vec<Component>,
    #[serde(default)]
    pub(crate) series: Vec<Component>,
    #[serde(default)]
    pub(crate) observation: Vec<Component>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Component {
    pub(crate) id: String,
    #[serde(default)]
    pub(crate) name: Option<String>,
    #[serde(default)]
    pub(crate) names: IndexMap<String, String>,
    // 1.0 uses a single "role", 2.0 a "roles" list
    #[serde(default)]
    pub(crate) role: Option<Value>,
    #[serde(default)]
    pub(crate) roles: Option<Value>,
    #[serde(default)]
    pub(crate) values: Vec<ComponentValue>,
}

impl Component {
    pub(crate) fn label(&self) -> Option<&str> {
        localized(self.name.as_deref(), &self.names)
    }

    pub(crate) fn is_time(&self) -> bool {
        self.id == "TIME_PERIOD"
            || [&self.role, &self.roles]
                .into_iter()
                .flatten()
                .any(names_time_role)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ComponentValue {
    // Free-text attribute values may come without an id.
    #[serde(default)]
    pub(crate) id: Option<String>,
    #[serde(default)]
    pub(crate) name: Option<String>,
    #[serde(default)]
    pub(crate) names: IndexMap<String, String>,
}

impl ComponentValue {
    pub(crate) fn label(&self) -> Option<&str> {
        localized(self.name.as_deref(), &self.names)
    }

    pub(crate) fn code(&self) -> &str {
        self.id.as_deref().or_else(|| self.label()).unwrap_or("")
    }
}

fn names_time_role(role: &Value) -> bool {
    match role {
        Value::String(s) => s == "time" || s == "TIME_PERIOD",
        Value::Array(items) => items.iter().any(names_time_role),
        _ => false,
    }
}

const PREFERRED_LANGUAGE: &str = "en";

fn localized<'a>(name: Option<&'a str>, names: &'a IndexMap<String, String>) -> Option<&'a str> {
    name.or_else(|| names.get(PREFERRED_LANGUAGE).map(String::as_str))
        .or_else(|| names.values().next().map(String::as_str))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DataSet {
    #[serde(default)]
    pub(crate) attributes: Vec<Option<usize>>,
    #[serde(default)]
    pub(crate) series: IndexMap<String, Series>,
    // Present when dimensionAtObservation=AllDimensions
    #[serde(default)]
    pub(crate) observations: IndexMap<String, Vec<Value>>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Series {
    #[serde(default)]
    pub(crate) attributes: Vec<Option<usize>>,
    #[serde(default)]
    pub(crate) observations: IndexMap<String, Vec<Value>>,
}
