//! Cache Keys Module
//!
//! The catalog of cacheable data kinds, their TTL classes, and deterministic
//! cache key construction.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{CacheError, Result};

// == TTL Class ==
/// Freshness class shared by several data kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtlClass {
    Short,
    Medium,
    Long,
}

impl TtlClass {
    pub fn duration(self) -> Duration {
        match self {
            TtlClass::Short => Duration::from_secs(2 * 60),
            TtlClass::Medium => Duration::from_secs(5 * 60),
            TtlClass::Long => Duration::from_secs(15 * 60),
        }
    }
}

impl FromStr for TtlClass {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "short" => Ok(TtlClass::Short),
            "medium" => Ok(TtlClass::Medium),
            "long" => Ok(TtlClass::Long),
            other => Err(CacheError::Validation(format!("unknown TTL class '{}'", other))),
        }
    }
}

// == Data Kind ==
/// A class of cacheable query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DataKind {
    PropertyCounts,
    AreaBenchmarks,
    StatusCounts,
    ListingCounts,
    ActiveAgents,
    MarketStats,
    PropertiesWithCounts,
}

/// Default TTL class per data kind. Adding a kind means adding a row here.
const DEFAULT_TTL_TABLE: &[(DataKind, TtlClass)] = &[
    (DataKind::PropertyCounts, TtlClass::Medium),
    (DataKind::AreaBenchmarks, TtlClass::Long),
    (DataKind::StatusCounts, TtlClass::Short),
    (DataKind::ListingCounts, TtlClass::Short),
    (DataKind::ActiveAgents, TtlClass::Medium),
    (DataKind::MarketStats, TtlClass::Long),
    (DataKind::PropertiesWithCounts, TtlClass::Short),
];

impl DataKind {
    pub const ALL: [DataKind; 7] = [
        DataKind::PropertyCounts,
        DataKind::AreaBenchmarks,
        DataKind::StatusCounts,
        DataKind::ListingCounts,
        DataKind::ActiveAgents,
        DataKind::MarketStats,
        DataKind::PropertiesWithCounts,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DataKind::PropertyCounts => "propertyCounts",
            DataKind::AreaBenchmarks => "areaBenchmarks",
            DataKind::StatusCounts => "statusCounts",
            DataKind::ListingCounts => "listingCounts",
            DataKind::ActiveAgents => "activeAgents",
            DataKind::MarketStats => "marketStats",
            DataKind::PropertiesWithCounts => "propertiesWithCounts",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        DataKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| CacheError::Validation(format!("unknown data kind '{}'", s)))
    }
}

// == TTL Table ==
/// Mapping from data kind to TTL class, fixed once built.
#[derive(Debug, Clone)]
pub struct TtlTable {
    classes: HashMap<DataKind, TtlClass>,
}

impl Default for TtlTable {
    fn default() -> Self {
        Self {
            classes: DEFAULT_TTL_TABLE.iter().copied().collect(),
        }
    }
}

impl TtlTable {
    pub fn with_override(mut self, kind: DataKind, class: TtlClass) -> Self {
        self.classes.insert(kind, class);
        self
    }

    /// Applies overrides written as `kind=class,kind=class`.
    ///
    /// Malformed items are logged and skipped.
    pub fn with_overrides(mut self, overrides: &str) -> Self {
        for item in overrides.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let parsed = item
                .split_once('=')
                .ok_or_else(|| CacheError::Validation(format!("expected kind=class, got '{}'", item)))
                .and_then(|(kind, class)| Ok((kind.parse::<DataKind>()?, class.parse::<TtlClass>()?)));

            match parsed {
                Ok((kind, class)) => self = self.with_override(kind, class),
                Err(e) => warn!("Ignoring TTL override '{}': {}", item, e),
            }
        }
        self
    }

    pub fn class_for(&self, kind: DataKind) -> TtlClass {
        self.classes.get(&kind).copied().unwrap_or(TtlClass::Short)
    }

    pub fn ttl_for(&self, kind: DataKind) -> Duration {
        self.class_for(kind).duration()
    }
}

// == Parameters ==
/// A scalar query parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Str(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(i64::from(value))
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(ParamValue::Null, Into::into)
    }
}

/// Query parameters, ordered by name so equal sets always serialize the same.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheParams(BTreeMap<String, ParamValue>);

impl CacheParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Builds parameters from a JSON object of scalars. `null` means no parameters.
    pub fn from_json(value: Value) -> Result<Self> {
        let object = match value {
            Value::Null => return Ok(Self::new()),
            Value::Object(object) => object,
            other => {
                return Err(CacheError::Validation(format!(
                    "parameters must be an object, got {}",
                    other
                )))
            }
        };

        let mut params = Self::new();
        for (name, value) in object {
            let scalar = match value {
                Value::Null => ParamValue::Null,
                Value::Bool(b) => ParamValue::Bool(b),
                Value::String(s) => ParamValue::Str(s),
                Value::Number(n) => match n.as_i64() {
                    Some(i) => ParamValue::Int(i),
                    None => ParamValue::Float(n.as_f64().ok_or_else(|| {
                        CacheError::Validation(format!("parameter '{}' is out of range", name))
                    })?),
                },
                Value::Array(_) | Value::Object(_) => {
                    return Err(CacheError::Validation(format!(
                        "parameter '{}' must be a scalar",
                        name
                    )))
                }
            };
            params.0.insert(name, scalar);
        }
        Ok(params)
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in &self.0 {
            if name.is_empty() {
                return Err(CacheError::Validation("parameter name cannot be empty".into()));
            }
            if let ParamValue::Float(f) = value {
                if !f.is_finite() {
                    return Err(CacheError::Validation(format!(
                        "parameter '{}' must be a finite number",
                        name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Deterministic serialization: names in sorted order.
    pub fn stable_serialize(&self) -> Result<String> {
        self.validate()?;
        Ok(serde_json::to_string(&self.0)?)
    }
}

// == Build Key ==
/// `prefix + kind + ":" + stable_serialize(params)`.
pub fn build_key(prefix: &str, kind: DataKind, params: &CacheParams) -> Result<String> {
    Ok(format!("{}{}:{}", prefix, kind, params.stable_serialize()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_ttl_table_covers_every_kind() {
        let table = TtlTable::default();
        for kind in DataKind::ALL {
            assert!(DEFAULT_TTL_TABLE.iter().any(|(k, _)| *k == kind), "{} missing", kind);
        }
        assert_eq!(table.class_for(DataKind::AreaBenchmarks), TtlClass::Long);
        assert_eq!(table.ttl_for(DataKind::StatusCounts), Duration::from_secs(120));
    }

    #[test]
    fn test_ttl_overrides() {
        let table = TtlTable::default()
            .with_overrides("marketStats=short, statusCounts = long,bogus=short,activeAgents=forever,junk");

        assert_eq!(table.class_for(DataKind::MarketStats), TtlClass::Short);
        assert_eq!(table.class_for(DataKind::StatusCounts), TtlClass::Long);
        assert_eq!(table.class_for(DataKind::ActiveAgents), TtlClass::Medium);
    }

    #[test]
    fn test_data_kind_round_trips_through_names() {
        for kind in DataKind::ALL {
            assert_eq!(kind.as_str().parse::<DataKind>().unwrap(), kind);
            assert_eq!(
                serde_json::to_value(kind).unwrap(),
                Value::String(kind.as_str().to_string())
            );
        }
        assert!("nope".parse::<DataKind>().is_err());
    }

    #[test]
    fn test_key_independent_of_insertion_order() {
        let a = CacheParams::new().with("city", "Dubai").with("beds", 2).with("ready", true);
        let b = CacheParams::new().with("ready", true).with("city", "Dubai").with("beds", 2);

        assert_eq!(
            build_key("tc:", DataKind::MarketStats, &a).unwrap(),
            build_key("tc:", DataKind::MarketStats, &b).unwrap()
        );
    }

    #[test]
    fn test_key_layout() {
        let params = CacheParams::new().with("b", 1).with("a", "x");
        let key = build_key("tc:", DataKind::StatusCounts, &params).unwrap();
        assert_eq!(key, r#"tc:statusCounts:{"a":"x","b":1}"#);

        let empty = build_key("tc:", DataKind::AreaBenchmarks, &CacheParams::new()).unwrap();
        assert_eq!(empty, "tc:areaBenchmarks:{}");
    }

    #[test]
    fn test_kinds_never_share_keys() {
        let params = CacheParams::new().with("x", 1);
        let a = build_key("", DataKind::ListingCounts, &params).unwrap();
        let b = build_key("", DataKind::StatusCounts, &params).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_non_finite_float_is_rejected() {
        let params = CacheParams::new().with("price", f64::NAN);
        let result = build_key("tc:", DataKind::MarketStats, &params);
        assert!(matches!(result, Err(CacheError::Validation(_))));
    }

    #[test]
    fn test_from_json() {
        let params = CacheParams::from_json(json!({"city": "Dubai", "beds": 3, "min": 1.5, "x": null}))
            .unwrap();
        assert_eq!(params.len(), 4);
        assert_eq!(
            params,
            CacheParams::new()
                .with("x", Option::<i64>::None)
                .with("min", 1.5)
                .with("beds", 3)
                .with("city", "Dubai")
        );

        assert!(CacheParams::from_json(Value::Null).unwrap().is_empty());
        assert!(CacheParams::from_json(json!([1, 2])).is_err());
        assert!(CacheParams::from_json(json!({"nested": {"a": 1}})).is_err());
    }
}
