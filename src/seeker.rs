//! Dynamic filter/sort DSL and its compiler
//!
//! A [`Seeker`] is the caller-facing search request: an ordered list of
//! [`Probe`]s (one field-level predicate each), a sorter list, and a page
//! request. [`SeekerCompiler::compile`] folds the probes left to right into a
//! [`Criteria`] expression, resolves sorter fields into column order terms,
//! and compiles the page request into its window; nothing here touches the
//! persistence engine.
//!
//! Probes carry three orthogonal knobs: the [`Rule`] (comparison operator),
//! the [`Synapse`] (how the predicate attaches to what came before), and the
//! [`Extend`] (value preprocessing such as date-bound alignment or enum-code
//! translation).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::criteria::{Criteria, CriteriaStep};
use crate::datetime::{align_to_begin, align_to_end};
use crate::error::{MappingError, Result};
use crate::naming::{quote_identifier, snake_case};
use crate::page::{PageRequest, PageWindow};
use crate::policy::PolicyResolver;

/// Comparison rule of one probe
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rule {
    #[default]
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    In,
    NotIn,
    Like,
    Between,
    NotBetween,
}

impl Rule {
    /// Apply this rule to a column step with the probe's value
    ///
    /// A null value falls back to `IS NULL` / `IS NOT NULL` for `Eq` / `Ne`
    /// and is an error for every other rule.
    pub fn apply(self, step: CriteriaStep, value: Option<Value>) -> Result<Criteria> {
        let value = value.filter(|v| !v.is_null());
        match (self, value) {
            (Rule::Eq, None) => Ok(step.is_null()),
            (Rule::Ne, None) => Ok(step.is_not_null()),
            (rule, None) => Err(MappingError::null_argument(format!(
                "rule {:?} requires a value",
                rule
            ))),
            (Rule::Eq, Some(v)) => Ok(step.is(v)),
            (Rule::Ne, Some(v)) => Ok(step.not(v)),
            (Rule::Gt, Some(v)) => Ok(step.greater_than(v)),
            (Rule::Ge, Some(v)) => Ok(step.greater_than_or_equals(v)),
            (Rule::Lt, Some(v)) => Ok(step.less_than(v)),
            (Rule::Le, Some(v)) => Ok(step.less_than_or_equals(v)),
            (Rule::In, Some(Value::Array(values))) => Ok(step.in_list(values)),
            (Rule::In, Some(v)) => Ok(step.in_list(vec![v])),
            (Rule::NotIn, Some(Value::Array(values))) => Ok(step.not_in_list(values)),
            (Rule::NotIn, Some(v)) => Ok(step.not_in_list(vec![v])),
            (Rule::Like, Some(v)) => {
                let text = scalar_text(&v).ok_or_else(|| {
                    MappingError::invalid_predicate("LIKE requires a scalar value")
                })?;
                Ok(step.like(format!("%{}%", text)))
            }
            (Rule::Between, Some(v)) => {
                let (begin, end) = range_bounds(v)?;
                Ok(step.between(begin, end))
            }
            (Rule::NotBetween, Some(v)) => {
                let (begin, end) = range_bounds(v)?;
                Ok(step.not_between(begin, end))
            }
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn range_bounds(value: Value) -> Result<(Value, Value)> {
    match value {
        Value::Array(mut bounds) if bounds.len() == 2 => {
            let end = bounds.pop().unwrap_or(Value::Null);
            let begin = bounds.pop().unwrap_or(Value::Null);
            Ok((begin, end))
        }
        other => Err(MappingError::invalid_predicate(format!(
            "BETWEEN requires a two-element array, got {}",
            other
        ))),
    }
}

/// How a probe attaches to the criteria accumulated before it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Synapse {
    #[default]
    And,
    Or,
}

/// Value preprocessing applied before the rule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Extend {
    /// No preprocessing
    #[default]
    None,
    /// Drop the probe entirely
    Skip,
    /// No preprocessing, and downstream rewrites must leave it alone
    DoNotOverride,
    /// Align date strings to day bounds matching the rule
    Date,
    /// Translate enum variant names to their registered codes
    Enum,
}

fn default_true() -> bool {
    true
}

/// One field-level predicate of a search request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Probe {
    pub field: String,
    /// When set, the predicate addresses a member inside a JSON column
    #[serde(rename = "jsonKey", skip_serializing_if = "Option::is_none")]
    pub json_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default)]
    pub rule: Rule,
    #[serde(default)]
    pub extend: Extend,
    #[serde(default)]
    pub synapse: Synapse,
    /// Convert the field name to snake_case when it has no declared mapping
    #[serde(rename = "snakeCase", default = "default_true")]
    pub snake_case: bool,
}

impl Probe {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            json_key: None,
            value: None,
            rule: Rule::Eq,
            extend: Extend::None,
            synapse: Synapse::And,
            snake_case: true,
        }
    }

    pub fn value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rule = rule;
        self
    }

    pub fn extend(mut self, extend: Extend) -> Self {
        self.extend = extend;
        self
    }

    pub fn synapse(mut self, synapse: Synapse) -> Self {
        self.synapse = synapse;
        self
    }

    pub fn json_key(mut self, key: impl Into<String>) -> Self {
        self.json_key = Some(key.into());
        self
    }

    /// Use the field name exactly as given
    pub fn exact_field(mut self) -> Self {
        self.snake_case = false;
        self
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Caller-facing sort term, keyed by field name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sorter {
    pub field: String,
    pub direction: SortDirection,
}

impl Sorter {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Compiled sort term, keyed by resolved column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortOrder {
    pub column: String,
    pub direction: SortDirection,
}

/// A dynamic search request: ordered probes, sorters, and a page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Seeker {
    #[serde(default)]
    probes: Vec<Probe>,
    #[serde(default)]
    sorters: Vec<Sorter>,
    #[serde(default)]
    page: PageRequest,
}

impl Seeker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an equality probe
    pub fn eq(self, field: impl Into<String>, value: Value) -> Self {
        self.add_probe(Probe::new(field).value(value))
    }

    /// Append a greater-than probe
    pub fn gt(self, field: impl Into<String>, value: Value) -> Self {
        self.add_probe(Probe::new(field).value(value).rule(Rule::Gt))
    }

    pub fn add_probe(mut self, probe: Probe) -> Self {
        self.probes.push(probe);
        self
    }

    pub fn get_probe(&self, field: &str) -> Option<&Probe> {
        self.probes.iter().find(|p| p.field == field)
    }

    /// Remove every probe on the field
    pub fn remove_probe(mut self, field: &str) -> Self {
        self.probes.retain(|p| p.field != field);
        self
    }

    /// Set the sort on a field, replacing its direction when already present
    pub fn set_sorter(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        let field = field.into();
        if let Some(existing) = self.sorters.iter_mut().find(|s| s.field == field) {
            existing.direction = direction;
        } else {
            self.sorters.push(Sorter { field, direction });
        }
        self
    }

    pub fn add_sorter(mut self, sorter: Sorter) -> Self {
        self.sorters.push(sorter);
        self
    }

    pub fn remove_sorter(mut self, field: &str) -> Self {
        self.sorters.retain(|s| s.field != field);
        self
    }

    pub fn with_page(mut self, page: PageRequest) -> Self {
        self.page = page;
        self
    }

    pub fn probes(&self) -> &[Probe] {
        &self.probes
    }

    pub fn sorters(&self) -> &[Sorter] {
        &self.sorters
    }

    pub fn page(&self) -> PageRequest {
        self.page
    }
}

/// Output of a compiled search request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledQuery {
    pub criteria: Criteria,
    pub sort: Vec<SortOrder>,
    pub page: PageWindow,
}

/// Compiles [`Seeker`]s into criteria, sort, and page windows
///
/// Pure over its inputs: compiling the same seeker twice yields equal output,
/// and one compiler serves concurrent callers.
pub struct SeekerCompiler {
    resolver: Arc<PolicyResolver>,
}

impl SeekerCompiler {
    pub fn new(resolver: Arc<PolicyResolver>) -> Self {
        Self { resolver }
    }

    /// Compile a search request against a registered entity
    ///
    /// Probes are folded left to right, preserving caller order. A probe is
    /// dropped only when it is marked [`Extend::Skip`] or its field is blank;
    /// a null value is the rule's concern (`Eq`/`Ne` fall back to their null
    /// comparators). An empty sorter list defaults to the identifier column,
    /// descending.
    pub fn compile(&self, entity: &str, seeker: &Seeker) -> Result<CompiledQuery> {
        let metadata = self.resolver.registry().require(entity)?;

        let mut criteria = Criteria::empty();
        for probe in seeker.probes() {
            if probe.extend == Extend::Skip || probe.field.trim().is_empty() {
                continue;
            }

            let (rule, value) = self.preprocess(entity, probe)?;
            let step = if criteria.is_empty() {
                Criteria::column(self.probe_column(entity, probe))
            } else {
                match probe.synapse {
                    Synapse::And => criteria.and(self.probe_column(entity, probe)),
                    Synapse::Or => criteria.or(self.probe_column(entity, probe)),
                }
            };
            criteria = rule.apply(step, value)?;
        }

        let mut sort: Vec<SortOrder> = seeker
            .sorters()
            .iter()
            .map(|sorter| SortOrder {
                column: self.sort_column(entity, &sorter.field),
                direction: sorter.direction,
            })
            .collect();
        if sort.is_empty() {
            if let Some(id) = metadata.id_field() {
                sort.push(SortOrder {
                    column: self.resolver.resolve_column(entity, &id.name),
                    direction: SortDirection::Desc,
                });
            }
        }

        tracing::debug!(entity, conditions = criteria.len(), "compiled seeker");
        Ok(CompiledQuery {
            criteria,
            sort,
            page: seeker.page().window(),
        })
    }

    /// Apply the probe's extension to its rule and value
    fn preprocess(&self, entity: &str, probe: &Probe) -> Result<(Rule, Option<Value>)> {
        let value = probe.value.clone();
        match probe.extend {
            Extend::None | Extend::Skip | Extend::DoNotOverride => Ok((probe.rule, value)),
            Extend::Date => self.preprocess_date(probe.rule, value),
            Extend::Enum => Ok((probe.rule, self.preprocess_enum(entity, probe, value))),
        }
    }

    /// Date-bound alignment per rule
    ///
    /// Equality on a date means the whole day, so it widens into a BETWEEN
    /// over the day's bounds. Range rules keep an explicitly supplied
    /// time-of-day on the lower side and replace it on the upper side, so a
    /// bare date still covers its full last day.
    fn preprocess_date(&self, rule: Rule, value: Option<Value>) -> Result<(Rule, Option<Value>)> {
        let Some(value) = value.filter(|v| !v.is_null()) else {
            return Ok((rule, None));
        };

        let text_of = |v: &Value| -> Result<String> {
            match v {
                Value::String(s) => Ok(s.clone()),
                other => Err(MappingError::invalid_predicate(format!(
                    "DATE extension requires a string value, got {}",
                    other
                ))),
            }
        };

        match rule {
            Rule::Eq => {
                let text = text_of(&value)?;
                let begin = align_to_begin(&text, true)?;
                let end = align_to_end(&text, true)?;
                Ok((Rule::Between, Some(json!([begin, end]))))
            }
            Rule::Between | Rule::NotBetween => {
                let Value::Array(bounds) = &value else {
                    return Err(MappingError::invalid_predicate(
                        "BETWEEN requires a two-element array",
                    ));
                };
                if bounds.len() != 2 {
                    return Err(MappingError::invalid_predicate(
                        "BETWEEN requires a two-element array",
                    ));
                }
                let begin = align_to_begin(&text_of(&bounds[0])?, false)?;
                let end = align_to_end(&text_of(&bounds[1])?, false)?;
                Ok((rule, Some(json!([begin, end]))))
            }
            Rule::Gt | Rule::Ge => {
                let begin = align_to_begin(&text_of(&value)?, false)?;
                Ok((rule, Some(Value::String(begin))))
            }
            Rule::Lt | Rule::Le => {
                let end = align_to_end(&text_of(&value)?, true)?;
                Ok((rule, Some(Value::String(end))))
            }
            _ => Ok((rule, Some(value))),
        }
    }

    /// Enum variant names become registered codes; unknown names degrade to
    /// the UNKNOWN/0 sentinel code, never an error
    fn preprocess_enum(&self, entity: &str, probe: &Probe, value: Option<Value>) -> Option<Value> {
        let enum_type = self
            .resolver
            .registry()
            .get(entity)
            .and_then(|m| m.field(&probe.field).and_then(|d| d.enum_type.clone()));
        // A field without a declared enum type keeps its value untouched
        let Some(enum_type) = enum_type else {
            return value;
        };
        let value = value?;

        let code_of = |v: &Value| -> Value {
            match v {
                Value::String(name) => {
                    json!(self.resolver.registry().enum_code(&enum_type, name))
                }
                other => other.clone(),
            }
        };

        Some(match &value {
            Value::Array(names) => Value::Array(names.iter().map(code_of).collect()),
            single => code_of(single),
        })
    }

    /// Column for a probe: declared mapping wins; otherwise the probe's own
    /// snake_case flag decides. A JSON key addresses a member of the column.
    fn probe_column(&self, entity: &str, probe: &Probe) -> String {
        let column = self.sort_column_for(entity, &probe.field, probe.snake_case);
        match &probe.json_key {
            Some(key) => format!("{}->>'{}'", column, key),
            None => column,
        }
    }

    fn sort_column(&self, entity: &str, field: &str) -> String {
        self.sort_column_for(entity, field, true)
    }

    fn sort_column_for(&self, entity: &str, field: &str, to_snake: bool) -> String {
        let declared = self
            .resolver
            .registry()
            .get(entity)
            .is_some_and(|m| m.field(field).is_some());
        if declared {
            return self.resolver.resolve_column(entity, field);
        }
        let column = if to_snake {
            snake_case(field)
        } else {
            field.to_string()
        };
        if self.resolver.config().force_quote {
            quote_identifier(&column)
        } else {
            column
        }
    }
}
