//! Design parameter schema, validation and the validated configuration.
//!
//! A [`Schema`] declares every parameter a coronagraph class recognizes,
//! grouped into named categories, each with a kind and an optional default.
//! [`Schema::validate`] turns an arbitrary caller-supplied nested mapping into
//! a [`DesignConfig`] whose key set is exactly the schema's, dropping unknown
//! or ill-typed entries with a warning and filling the gaps from the defaults.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::diagnostics::{Diagnostics, Warning};

#[derive(Debug, thiserror::Error)]
pub enum ParamsError {
    #[error("parameter {category:?}/{param:?} is not declared in the schema")]
    Undeclared { category: String, param: String },
    #[error("parameter {category:?}/{param:?} has no value")]
    Unset { category: String, param: String },
    #[error("parameter {category:?}/{param:?} holds a {got}, expected a {expected}")]
    Kind {
        category: String,
        param: String,
        expected: ParamKind,
        got: ParamKind,
    },
}
pub type Result<T> = std::result::Result<T, ParamsError>;

/// The scalar kinds a design parameter can take
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Bool,
    Int,
    Float,
    Str,
}
impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "boolean"),
            Self::Int => write!(f, "integer"),
            Self::Float => write!(f, "float"),
            Self::Str => write!(f, "string"),
        }
    }
}

/// One design parameter value
///
/// Deserialization is untagged: a bare scalar in the survey file maps onto the
/// first matching variant, so `50` is an integer and `50.0` a float. The two
/// are never interchangeable, an integer supplied for a float parameter is a
/// type mismatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            Self::Bool(_) => ParamKind::Bool,
            Self::Int(_) => ParamKind::Int,
            Self::Float(_) => ParamKind::Float,
            Self::Str(_) => ParamKind::Str,
        }
    }
}
impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Str(value) => write!(f, "{value}"),
        }
    }
}
impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}
impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}
impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}
impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

/// Declaration of one recognized parameter
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub default: Option<ParamValue>,
    /// computed at design construction, never user-settable
    pub derived: bool,
}

impl ParamSpec {
    pub fn new(name: &'static str, kind: ParamKind, default: Option<ParamValue>) -> Self {
        Self {
            name,
            kind,
            default,
            derived: false,
        }
    }
    pub fn derived(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            default: None,
            derived: true,
        }
    }
}

/// A named group of parameter declarations
#[derive(Debug, Clone)]
pub struct CategorySpec {
    pub name: &'static str,
    pub params: Vec<ParamSpec>,
}

impl CategorySpec {
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|spec| spec.name == name)
    }
}

/// The recognized categories and parameters of one coronagraph class
///
/// Declaration order is the canonical parameter order, every ordered
/// enumeration of a configuration or a survey follows it.
#[derive(Debug, Clone)]
pub struct Schema(Vec<CategorySpec>);

impl Schema {
    pub fn new(categories: Vec<CategorySpec>) -> Self {
        Self(categories)
    }

    /// The mask-side categories shared by every Lyot coronagraph class
    pub fn lyot() -> Self {
        Self(vec![
            CategorySpec {
                name: "Pupil",
                params: vec![
                    ParamSpec::new("N", ParamKind::Int, Some(ParamValue::Int(1000))),
                    ParamSpec::new("ap", ParamKind::Str, Some(ParamValue::Str("hex1".into()))),
                    ParamSpec::new("obsc", ParamKind::Bool, Some(ParamValue::Bool(true))),
                    ParamSpec::new("edge", ParamKind::Str, Some(ParamValue::Str("gray".into()))),
                ],
            },
            CategorySpec {
                name: "FPM",
                params: vec![
                    ParamSpec::new("rad", ParamKind::Float, Some(ParamValue::Float(4.0))),
                    ParamSpec::new("M", ParamKind::Int, Some(ParamValue::Int(50))),
                ],
            },
            CategorySpec {
                name: "LS",
                params: vec![
                    ParamSpec::new("id", ParamKind::Int, Some(ParamValue::Int(25))),
                    ParamSpec::new("od", ParamKind::Int, Some(ParamValue::Int(85))),
                    ParamSpec::new("pad", ParamKind::Int, Some(ParamValue::Int(0))),
                ],
            },
        ])
    }

    /// The image-plane category appended by the apodizer optimization classes
    pub fn image_category() -> CategorySpec {
        CategorySpec {
            name: "Image",
            params: vec![
                ParamSpec::new("c", ParamKind::Float, Some(ParamValue::Float(10.0))),
                ParamSpec::new("ica", ParamKind::Float, Some(ParamValue::Float(3.5))),
                ParamSpec::new("oca", ParamKind::Float, Some(ParamValue::Float(10.0))),
                ParamSpec::new("bw", ParamKind::Float, Some(ParamValue::Float(0.10))),
                ParamSpec::new("nlam", ParamKind::Int, Some(ParamValue::Int(3))),
                ParamSpec::new("fpres", ParamKind::Int, Some(ParamValue::Int(2))),
                ParamSpec::derived("Nimg", ParamKind::Int),
            ],
        }
    }

    pub fn extend(mut self, category: CategorySpec) -> Self {
        self.0.push(category);
        self
    }

    pub fn categories(&self) -> impl Iterator<Item = &CategorySpec> {
        self.0.iter()
    }
    pub fn category(&self, name: &str) -> Option<&CategorySpec> {
        self.0.iter().find(|category| category.name == name)
    }
    pub fn param(&self, category: &str, param: &str) -> Option<&ParamSpec> {
        self.category(category)?.param(param)
    }
    /// Every declaration, in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (&CategorySpec, &ParamSpec)> {
        self.0
            .iter()
            .flat_map(|category| category.params.iter().map(move |spec| (category, spec)))
    }
    /// Total number of declared parameters
    pub fn len(&self) -> usize {
        self.0.iter().map(|category| category.params.len()).sum()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Validate a caller-supplied nested mapping against this schema
    ///
    /// Unknown categories, unknown parameters, derived parameters and type
    /// mismatches are dropped with a warning. A null stands only where the
    /// schema default is itself null, otherwise the default takes over. The
    /// returned configuration carries exactly the schema's key set.
    pub fn validate(&self, raw: &RawConfig, diag: &mut Diagnostics) -> DesignConfig {
        let mut values: BTreeMap<String, BTreeMap<String, Option<ParamValue>>> = BTreeMap::new();
        for (category, params) in raw {
            let Some(category_spec) = self.category(category) else {
                diag.warn(Warning::UnknownCategory {
                    category: category.clone(),
                });
                continue;
            };
            for (param, value) in params {
                let Some(spec) = category_spec.param(param) else {
                    diag.warn(Warning::UnknownParam {
                        category: category.clone(),
                        param: param.clone(),
                    });
                    continue;
                };
                if spec.derived {
                    diag.warn(Warning::DerivedParam {
                        category: category.clone(),
                        param: param.clone(),
                    });
                    continue;
                }
                match value {
                    None => {
                        if spec.default.is_none() {
                            values
                                .entry(category.clone())
                                .or_default()
                                .insert(param.clone(), None);
                        }
                    }
                    Some(value) if value.kind() == spec.kind => {
                        values
                            .entry(category.clone())
                            .or_default()
                            .insert(param.clone(), Some(value.clone()));
                    }
                    Some(value) => {
                        diag.warn(Warning::TypeMismatch {
                            category: category.clone(),
                            param: param.clone(),
                            expected: spec.kind,
                            got: value.kind(),
                        });
                    }
                }
            }
        }
        for (category, spec) in self.iter() {
            let entry = values.entry(category.name.to_string()).or_default();
            if !entry.contains_key(spec.name) {
                entry.insert(spec.name.to_string(), spec.default.clone());
            }
        }
        DesignConfig(values)
    }
}

/// Caller-supplied nested configuration, prior to validation
pub type RawConfig = BTreeMap<String, BTreeMap<String, Option<ParamValue>>>;

/// A validated design configuration
///
/// Every parameter the schema declares has an entry, possibly null, and no
/// other entry exists. Typed getters fail on a null or mismatched entry
/// instead of guessing.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignConfig(BTreeMap<String, BTreeMap<String, Option<ParamValue>>>);

impl DesignConfig {
    pub(crate) fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, String, Option<ParamValue>)>,
    {
        let mut values: BTreeMap<String, BTreeMap<String, Option<ParamValue>>> = BTreeMap::new();
        for (category, param, value) in entries {
            values.entry(category).or_default().insert(param, value);
        }
        Self(values)
    }

    fn lookup(&self, category: &str, param: &str) -> Result<&Option<ParamValue>> {
        self.0
            .get(category)
            .and_then(|params| params.get(param))
            .ok_or_else(|| ParamsError::Undeclared {
                category: category.to_string(),
                param: param.to_string(),
            })
    }

    /// The value of an entry, flattening an explicit null into `None`
    pub fn value(&self, category: &str, param: &str) -> Option<&ParamValue> {
        self.0.get(category)?.get(param)?.as_ref()
    }

    pub fn int(&self, category: &str, param: &str) -> Result<i64> {
        match self.lookup(category, param)? {
            Some(ParamValue::Int(value)) => Ok(*value),
            other => Err(self.kind_error(category, param, ParamKind::Int, other)),
        }
    }
    pub fn float(&self, category: &str, param: &str) -> Result<f64> {
        match self.lookup(category, param)? {
            Some(ParamValue::Float(value)) => Ok(*value),
            other => Err(self.kind_error(category, param, ParamKind::Float, other)),
        }
    }
    pub fn text(&self, category: &str, param: &str) -> Result<&str> {
        match self.lookup(category, param)? {
            Some(ParamValue::Str(value)) => Ok(value),
            other => Err(self.kind_error(category, param, ParamKind::Str, other)),
        }
    }
    pub fn flag(&self, category: &str, param: &str) -> Result<bool> {
        match self.lookup(category, param)? {
            Some(ParamValue::Bool(value)) => Ok(*value),
            other => Err(self.kind_error(category, param, ParamKind::Bool, other)),
        }
    }

    fn kind_error(
        &self,
        category: &str,
        param: &str,
        expected: ParamKind,
        found: &Option<ParamValue>,
    ) -> ParamsError {
        match found {
            Some(value) => ParamsError::Kind {
                category: category.to_string(),
                param: param.to_string(),
                expected,
                got: value.kind(),
            },
            None => ParamsError::Unset {
                category: category.to_string(),
                param: param.to_string(),
            },
        }
    }

    pub(crate) fn set(&mut self, category: &str, param: &str, value: ParamValue) {
        self.0
            .entry(category.to_string())
            .or_default()
            .insert(param.to_string(), Some(value));
    }

    /// Every entry, in lexical category then parameter order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, Option<&ParamValue>)> {
        self.0.iter().flat_map(|(category, params)| {
            params
                .iter()
                .map(move |(param, value)| (category.as_str(), param.as_str(), value.as_ref()))
        })
    }

    pub fn len(&self) -> usize {
        self.0.values().map(BTreeMap::len).sum()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn aplc_schema() -> Schema {
        Schema::lyot().extend(Schema::image_category())
    }

    fn raw(entries: &[(&str, &str, Option<ParamValue>)]) -> RawConfig {
        let mut config = RawConfig::new();
        for (category, param, value) in entries {
            config
                .entry(category.to_string())
                .or_default()
                .insert(param.to_string(), value.clone());
        }
        config
    }

    #[test]
    fn empty_input_yields_all_defaults() {
        let mut diag = Diagnostics::new();
        let config = aplc_schema().validate(&RawConfig::new(), &mut diag);
        assert!(diag.is_empty());
        assert_eq!(config.len(), aplc_schema().len());
        assert_eq!(config.int("Pupil", "N").unwrap(), 1000);
        assert_eq!(config.text("Pupil", "ap").unwrap(), "hex1");
        assert!(config.flag("Pupil", "obsc").unwrap());
        assert_eq!(config.float("FPM", "rad").unwrap(), 4.0);
        assert_eq!(config.int("LS", "od").unwrap(), 85);
        assert_eq!(config.float("Image", "bw").unwrap(), 0.10);
    }

    #[test]
    fn supplied_values_override_defaults() {
        let mut diag = Diagnostics::new();
        let config = aplc_schema().validate(
            &raw(&[
                ("FPM", "rad", Some(3.5.into())),
                ("LS", "id", Some(20.into())),
            ]),
            &mut diag,
        );
        assert!(diag.is_empty());
        assert_eq!(config.float("FPM", "rad").unwrap(), 3.5);
        assert_eq!(config.int("LS", "id").unwrap(), 20);
        // untouched parameters keep their defaults
        assert_eq!(config.int("FPM", "M").unwrap(), 50);
    }

    #[test]
    fn unknown_entries_are_dropped_with_a_warning() {
        let schema = aplc_schema();
        let mut diag = Diagnostics::new();
        let config = schema.validate(
            &raw(&[
                ("Telescope", "diameter", Some(12.into())),
                ("FPM", "radius", Some(3.5.into())),
            ]),
            &mut diag,
        );
        assert_eq!(diag.len(), 2);
        assert!(matches!(
            &diag.warnings()[0],
            Warning::UnknownParam { category, param } if category == "FPM" && param == "radius"
        ));
        assert!(matches!(
            &diag.warnings()[1],
            Warning::UnknownCategory { category } if category == "Telescope"
        ));
        // the key set is exactly the schema's
        assert_eq!(config.len(), schema.len());
        let kept: BTreeSet<_> = config
            .iter()
            .map(|(category, param, _)| (category, param))
            .collect();
        let declared: BTreeSet<_> = schema
            .iter()
            .map(|(category, spec)| (category.name, spec.name))
            .collect();
        assert_eq!(kept, declared);
        assert!(config.value("Telescope", "diameter").is_none());
    }

    #[test]
    fn integers_do_not_pass_as_floats() {
        let mut diag = Diagnostics::new();
        let config = aplc_schema().validate(&raw(&[("FPM", "rad", Some(4.into()))]), &mut diag);
        assert_eq!(diag.len(), 1);
        assert!(matches!(
            diag.warnings()[0],
            Warning::TypeMismatch {
                expected: ParamKind::Float,
                got: ParamKind::Int,
                ..
            }
        ));
        // the default stands in for the dropped entry
        assert_eq!(config.float("FPM", "rad").unwrap(), 4.0);
    }

    #[test]
    fn derived_parameters_cannot_be_set() {
        let mut diag = Diagnostics::new();
        let config = aplc_schema().validate(&raw(&[("Image", "Nimg", Some(99.into()))]), &mut diag);
        assert!(matches!(diag.warnings()[0], Warning::DerivedParam { .. }));
        assert!(config.value("Image", "Nimg").is_none());
        assert!(matches!(
            config.int("Image", "Nimg"),
            Err(ParamsError::Unset { .. })
        ));
    }

    #[test]
    fn null_defers_to_a_non_null_default() {
        let mut diag = Diagnostics::new();
        let config = aplc_schema().validate(&raw(&[("Pupil", "N", None)]), &mut diag);
        assert!(diag.is_empty());
        assert_eq!(config.int("Pupil", "N").unwrap(), 1000);
    }

    #[test]
    fn null_stands_where_the_default_is_null() {
        let schema = Schema::new(vec![CategorySpec {
            name: "Pupil",
            params: vec![ParamSpec::new("spiders", ParamKind::Int, None)],
        }]);
        let mut diag = Diagnostics::new();
        let config = schema.validate(&raw(&[("Pupil", "spiders", None)]), &mut diag);
        assert!(diag.is_empty());
        assert!(config.value("Pupil", "spiders").is_none());
        assert!(matches!(
            config.int("Pupil", "spiders"),
            Err(ParamsError::Unset { .. })
        ));
    }

    #[test]
    fn validation_is_idempotent() {
        let schema = aplc_schema();
        let input = raw(&[
            ("FPM", "rad", Some(6.5.into())),
            ("Pupil", "edge", Some("bin".into())),
        ]);
        let mut diag = Diagnostics::new();
        let first = schema.validate(&input, &mut diag);
        let second = schema.validate(&input, &mut diag);
        assert_eq!(first, second);
        assert!(diag.is_empty());
    }

    #[test]
    fn canonical_order_follows_the_declaration() {
        let schema = aplc_schema();
        let names: Vec<_> = schema
            .iter()
            .map(|(category, spec)| format!("{}/{}", category.name, spec.name))
            .collect();
        assert_eq!(names[0], "Pupil/N");
        assert_eq!(names[4], "FPM/rad");
        assert_eq!(*names.last().unwrap(), "Image/Nimg");
        assert_eq!(names.len(), schema.len());
    }

    #[test]
    fn untagged_values_deserialize_by_shape() {
        let values: BTreeMap<String, ParamValue> =
            toml::from_str("a = 50\nb = 50.0\nc = true\nd = \"gray\"").unwrap();
        assert_eq!(values["a"], ParamValue::Int(50));
        assert_eq!(values["b"], ParamValue::Float(50.0));
        assert_eq!(values["c"], ParamValue::Bool(true));
        assert_eq!(values["d"], ParamValue::Str("gray".into()));
    }
}
