//! Flattening of SDMX-JSON data messages into [`Record`]s.

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::error::{Error, Result};
use crate::message::{Component, ComponentValue, DataMessage, DataSet, Structure};
use crate::record::{OBS_VALUE, Record, TIME_PERIOD};

/// How dimension and attribute values are emitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LabelMode {
    /// Raw codes, keyed by component id.
    Id,
    /// Human-readable names, keyed by component name.
    Label,
    /// A code column followed by a label column for every component.
    #[default]
    Both,
}

impl LabelMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LabelMode::Id => "id",
            LabelMode::Label => "label",
            LabelMode::Both => "both",
        }
    }
}

impl FromStr for LabelMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "id" => Ok(LabelMode::Id),
            "label" => Ok(LabelMode::Label),
            "both" => Ok(LabelMode::Both),
            _ => Err(Error::InvalidLabelMode(s.to_string())),
        }
    }
}

impl fmt::Display for LabelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decodes an already parsed SDMX-JSON document.
pub fn decode(document: &Value, labels: LabelMode) -> Result<Vec<Record>> {
    let message = DataMessage::deserialize(document)
        .map_err(|e| Error::decode(format!("unexpected document shape: {e}")))?;
    decode_message(&message, labels)
}

/// Decodes a raw SDMX-JSON response body.
pub fn decode_str(body: &str, labels: LabelMode) -> Result<Vec<Record>> {
    let message: DataMessage = serde_json::from_str(body)
        .map_err(|e| Error::decode(format!("unexpected document shape: {e}")))?;
    decode_message(&message, labels)
}

pub(crate) fn decode_message(message: &DataMessage, labels: LabelMode) -> Result<Vec<Record>> {
    if let Some(id) = message.header.as_ref().and_then(|h| h.get("id")) {
        debug!(message_id = %id, "decoding SDMX-JSON data message");
    }

    let section = message.section();
    let data_sets = section
        .data_sets
        .as_ref()
        .ok_or_else(|| Error::decode("missing dataSets"))?;
    let structure = section
        .structure()
        .ok_or_else(|| Error::decode("missing structure"))?;

    let decoder = Decoder::new(structure, labels)?;
    let mut records = Vec::new();
    for data_set in data_sets {
        decoder.decode_data_set(data_set, &mut records)?;
    }
    Ok(records)
}

/// Column/value pairs for one resolved component.
type Columns = Vec<(String, String)>;

/// Column names one component writes to; `None` where the label mode emits
/// nothing.
#[derive(Debug, Clone, Default)]
struct ColumnKeys {
    code: Option<String>,
    label: Option<String>,
}

/// Column names for every component of a structure, unique across the table.
#[derive(Debug, Default)]
struct Layout {
    series_dims: Vec<ColumnKeys>,
    obs_dims: Vec<ColumnKeys>,
    data_set_attrs: Vec<ColumnKeys>,
    series_attrs: Vec<ColumnKeys>,
    obs_attrs: Vec<ColumnKeys>,
}

impl Layout {
    fn new(structure: &Structure, labels: LabelMode, time_pos: usize) -> Result<Self> {
        let mut taken: HashSet<String> = [TIME_PERIOD, OBS_VALUE].map(String::from).into();
        let mut assign = |components: &[Component], skip: Option<usize>| {
            components
                .iter()
                .enumerate()
                .map(|(pos, c)| match skip {
                    Some(s) if s == pos => Ok(ColumnKeys::default()),
                    _ => column_keys(c, labels, &mut taken),
                })
                .collect::<Result<Vec<_>>>()
        };
        Ok(Self {
            series_dims: assign(&structure.dimensions.series, None)?,
            obs_dims: assign(&structure.dimensions.observation, Some(time_pos))?,
            data_set_attrs: assign(&structure.attributes.data_set, None)?,
            series_attrs: assign(&structure.attributes.series, None)?,
            obs_attrs: assign(&structure.attributes.observation, None)?,
        })
    }
}

/// Picks the column names for one component. A preferred name already used
/// by an earlier component falls back to the id, then to `{id}_label`.
fn column_keys(
    component: &Component,
    labels: LabelMode,
    taken: &mut HashSet<String>,
) -> Result<ColumnKeys> {
    let id = component.id.as_str();
    let suffixed = format!("{id}_label");
    let mut claim = |candidates: &[&str]| {
        candidates
            .iter()
            .find(|c| taken.insert(c.to_string()))
            .map(|c| c.to_string())
            .ok_or_else(|| {
                Error::decode(format!(
                    "column name for '{id}' clashes with another component ({})",
                    candidates.join(", ")
                ))
            })
    };
    let name = component.label().unwrap_or(id);
    Ok(match labels {
        LabelMode::Id => ColumnKeys {
            code: Some(claim(&[id])?),
            label: None,
        },
        LabelMode::Label => ColumnKeys {
            code: None,
            label: Some(claim(&[name, id, suffixed.as_str()])?),
        },
        LabelMode::Both => ColumnKeys {
            code: Some(claim(&[id])?),
            label: Some(claim(&[label_column(component).as_str(), suffixed.as_str()])?),
        },
    })
}

struct Decoder<'a> {
    structure: &'a Structure,
    layout: Layout,
    /// Position of the time dimension among the observation dimensions.
    time_pos: usize,
}

impl<'a> Decoder<'a> {
    fn new(structure: &'a Structure, labels: LabelMode) -> Result<Self> {
        let obs_dims = &structure.dimensions.observation;
        let time_pos = obs_dims
            .iter()
            .position(Component::is_time)
            .or_else(|| obs_dims.len().checked_sub(1))
            .ok_or_else(|| Error::decode("structure has no observation dimension"))?;
        Ok(Self {
            structure,
            layout: Layout::new(structure, labels, time_pos)?,
            time_pos,
        })
    }

    fn decode_data_set(&self, data_set: &DataSet, out: &mut Vec<Record>) -> Result<()> {
        let set_attrs = self.data_set_attributes(data_set)?;

        for (key, series) in &data_set.series {
            let dims = self.resolve_key(key)?;
            let mut attrs = set_attrs.clone();
            resolve_indices(
                &self.structure.attributes.series,
                &self.layout.series_attrs,
                series.attributes.iter().copied(),
                &mut attrs,
            )?;
            for (obs_key, obs) in &series.observations {
                out.push(self.observation(&dims, &attrs, obs_key, obs)?);
            }
        }

        // AllDimensions layout: no series, observations keyed by every dimension.
        for (obs_key, obs) in &data_set.observations {
            out.push(self.observation(&Vec::new(), &set_attrs, obs_key, obs)?);
        }
        Ok(())
    }

    fn data_set_attributes(&self, data_set: &DataSet) -> Result<Columns> {
        let components = &self.structure.attributes.data_set;
        let keys = &self.layout.data_set_attrs;
        let mut out = Vec::new();
        if data_set.attributes.is_empty() {
            // Without explicit indices a single-valued attribute still applies.
            for (component, keys) in components.iter().zip(keys) {
                if let [value] = component.values.as_slice() {
                    push_columns(keys, value.code(), value.label(), &mut out);
                }
            }
            return Ok(out);
        }
        resolve_indices(components, keys, data_set.attributes.iter().copied(), &mut out)?;
        Ok(out)
    }

    fn observation(
        &self,
        series_dims: &Columns,
        attrs: &Columns,
        key: &str,
        obs: &[Value],
    ) -> Result<Record> {
        let obs_dims = &self.structure.dimensions.observation;
        let indices = parse_key(key, obs_dims.len(), "observation")?;

        let mut dimensions: IndexMap<String, String> = series_dims.iter().cloned().collect();
        let mut time_period = String::new();
        for (pos, ((component, keys), idx)) in
            obs_dims.iter().zip(&self.layout.obs_dims).zip(indices).enumerate()
        {
            let value = component_value(component, idx)?;
            if pos == self.time_pos {
                time_period = value.code().to_string();
            } else {
                let mut cols = Vec::new();
                push_columns(keys, value.code(), value.label(), &mut cols);
                dimensions.extend(cols);
            }
        }

        let value = match obs.first() {
            Some(v) => obs_value(v)?,
            None => None,
        };

        let mut attributes: IndexMap<String, String> = attrs.iter().cloned().collect();
        let mut obs_attrs = Vec::new();
        resolve_indices(
            &self.structure.attributes.observation,
            &self.layout.obs_attrs,
            obs.iter().skip(1).map(attribute_index).collect::<Result<Vec<_>>>()?,
            &mut obs_attrs,
        )?;
        attributes.extend(obs_attrs);

        Ok(Record {
            dimensions,
            time_period,
            value,
            attributes,
        })
    }

    fn resolve_key(&self, key: &str) -> Result<Columns> {
        let components = &self.structure.dimensions.series;
        let indices = parse_key(key, components.len(), "series")?;
        let mut out = Vec::with_capacity(components.len());
        for ((component, keys), idx) in components.iter().zip(&self.layout.series_dims).zip(indices) {
            let value = component_value(component, idx)?;
            push_columns(keys, value.code(), value.label(), &mut out);
        }
        Ok(out)
    }
}

/// Resolves attribute value indices; `None` entries are skipped.
fn resolve_indices(
    components: &[Component],
    keys: &[ColumnKeys],
    indices: impl IntoIterator<Item = Option<usize>>,
    out: &mut Columns,
) -> Result<()> {
    for ((component, keys), idx) in components.iter().zip(keys).zip(indices) {
        if let Some(idx) = idx {
            let value = component_value(component, idx)?;
            push_columns(keys, value.code(), value.label(), out);
        }
    }
    Ok(())
}

fn push_columns(keys: &ColumnKeys, code: &str, label: Option<&str>, out: &mut Columns) {
    if let Some(column) = &keys.code {
        out.push((column.clone(), code.to_string()));
    }
    if let Some(column) = &keys.label {
        out.push((column.clone(), label.unwrap_or(code).to_string()));
    }
}

fn label_column(component: &Component) -> String {
    match component.label() {
        Some(name) if name != component.id => name.to_string(),
        _ => format!("{}_label", component.id),
    }
}

fn component_value(component: &Component, idx: usize) -> Result<&ComponentValue> {
    component.values.get(idx).ok_or_else(|| {
        Error::decode(format!(
            "index {} out of range for '{}' ({} values)",
            idx,
            component.id,
            component.values.len()
        ))
    })
}

/// Parses a `0:1:2` key into exactly `expected` indices.
fn parse_key(key: &str, expected: usize, level: &str) -> Result<Vec<usize>> {
    let indices = if key.is_empty() {
        Vec::new()
    } else {
        key.split(':')
            .map(|part| {
                part.parse::<usize>().map_err(|_| {
                    Error::decode(format!("invalid {level} key '{key}': '{part}' is not an index"))
                })
            })
            .collect::<Result<Vec<_>>>()?
    };
    if indices.len() != expected {
        return Err(Error::decode(format!(
            "{level} key '{key}' has {} positions but the structure defines {expected} {level} dimensions",
            indices.len()
        )));
    }
    Ok(indices)
}

fn obs_value(v: &Value) -> Result<Option<f64>> {
    match v {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64()),
        Value::String(s) => Ok(s.trim().parse::<f64>().ok()),
        other => Err(Error::decode(format!("unsupported observation value {other}"))),
    }
}

fn attribute_index(v: &Value) -> Result<Option<usize>> {
    match v {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_u64()
            .map(|i| Some(i as usize))
            .ok_or_else(|| Error::decode(format!("invalid attribute index {n}"))),
        other => Err(Error::decode(format!("invalid attribute index {other}"))),
    }
}
