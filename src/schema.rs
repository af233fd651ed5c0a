//! Tagged-variant schema descriptions and the validator that interprets them.
//!
//! Every collection validates its entries' data through a [`Schema`]. A schema
//! is plain data: it can be built in Rust with the constructor and modifier
//! methods, or declared in `folio.toml` where each node is a table tagged by
//! `kind`:
//!
//! ```toml
//! [collections.post.schema]
//! kind = "object"
//!
//! [collections.post.schema.fields.title]
//! kind = "string"
//! max = 60
//!
//! [collections.post.schema.fields.tags]
//! kind = "default"
//! value = []
//! inner = { kind = "array", items = { kind = "string" } }
//! ```
//!
//! ## Validation
//!
//! A schema is compiled to a JSON Schema document ([`Schema::to_json_schema`])
//! and values are checked against it with `jsonschema`. Values that pass go
//! through a rewrite pass that produces the output.
//!
//! ## Output
//!
//! Validation is not only a yes/no check. Some kinds rewrite their input:
//!
//! - `date` coerces strings and epoch milliseconds into an RFC 3339 UTC string
//! - `default` fills in a missing key
//! - `object` strips unknown keys (unless `strict` or `passthrough`)
//! - `image` turns a relative path into `{src, width, height, format}`
//! - `reference` turns an identifier into `{collection, slug}` or `{collection, id}`
//!
//! Every rewrite accepts its own output, so validating already-validated data
//! yields the same value.
//!
//! ## Errors
//!
//! All problems in a value are collected, each with the path of the offending
//! field (taken from the validator's instance path), and returned together as
//! a [`ValidationError`].

use crate::collection::CollectionType;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use jsonschema::error::ValidationErrorKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Image formats accepted by the `image` schema kind.
pub const IMAGE_FORMATS: &[&str] = &["png", "jpg", "jpeg", "tiff", "webp", "gif", "svg"];

/// What an `object` schema does with keys it does not declare.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownKeys {
    /// Drop undeclared keys from the output.
    #[default]
    Strip,
    /// Reject undeclared keys.
    Strict,
    /// Copy undeclared keys to the output unchanged.
    Passthrough,
}

/// A predicate attached to a schema with [`Schema::refine`].
#[derive(Clone)]
pub struct Check(Arc<dyn Fn(&Value) -> bool + Send + Sync>);

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Check(..)")
    }
}

/// A post-validation rewrite attached with [`Schema::transform`].
#[derive(Clone)]
pub struct Mapper(Arc<dyn Fn(Value) -> Value + Send + Sync>);

impl fmt::Debug for Mapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Mapper(..)")
    }
}

/// Shape of a collection entry's data.
///
/// `Refine` and `Transform` carry closures and can only be built in code;
/// all other kinds round-trip through TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum Schema {
    String {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<usize>,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        url: bool,
    },
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        int: bool,
    },
    Boolean,
    Date,
    Literal {
        value: Value,
    },
    Enum {
        values: Vec<String>,
    },
    Array {
        items: Box<Schema>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<usize>,
    },
    Object {
        #[serde(default)]
        fields: BTreeMap<String, Schema>,
        #[serde(default)]
        unknown_keys: UnknownKeys,
    },
    Union {
        options: Vec<Schema>,
    },
    DiscriminatedUnion {
        discriminator: String,
        options: Vec<Schema>,
    },
    Intersection {
        left: Box<Schema>,
        right: Box<Schema>,
    },
    Optional {
        inner: Box<Schema>,
    },
    Default {
        inner: Box<Schema>,
        value: Value,
    },
    Nullable {
        inner: Box<Schema>,
    },
    Image,
    Reference {
        collection: String,
    },
    Any,
    #[serde(skip)]
    Refine {
        inner: Box<Schema>,
        check: Check,
        message: String,
    },
    #[serde(skip)]
    Transform {
        inner: Box<Schema>,
        map: Mapper,
    },
}

// =============================================================================
// Construction
// =============================================================================

impl Schema {
    pub fn string() -> Self {
        Schema::String {
            min: None,
            max: None,
            url: false,
        }
    }

    pub fn number() -> Self {
        Schema::Number {
            min: None,
            max: None,
            int: false,
        }
    }

    pub fn boolean() -> Self {
        Schema::Boolean
    }

    /// A coercing date: accepts RFC 3339, `YYYY-MM-DD`, or epoch milliseconds.
    pub fn date() -> Self {
        Schema::Date
    }

    pub fn any() -> Self {
        Schema::Any
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Schema::Literal {
            value: value.into(),
        }
    }

    pub fn enumeration<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Schema::Enum {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn array(items: Schema) -> Self {
        Schema::Array {
            items: Box::new(items),
            min: None,
            max: None,
        }
    }

    pub fn object<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Schema)>,
        K: Into<String>,
    {
        Schema::Object {
            fields: fields.into_iter().map(|(k, s)| (k.into(), s)).collect(),
            unknown_keys: UnknownKeys::Strip,
        }
    }

    pub fn union(options: Vec<Schema>) -> Self {
        Schema::Union { options }
    }

    /// Union of object schemas selected by the literal value of `discriminator`.
    pub fn discriminated_union(discriminator: impl Into<String>, options: Vec<Schema>) -> Self {
        Schema::DiscriminatedUnion {
            discriminator: discriminator.into(),
            options,
        }
    }

    pub fn intersection(left: Schema, right: Schema) -> Self {
        Schema::Intersection {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Metadata of an image stored next to the entry.
    ///
    /// Usually obtained through [`SchemaContext::image`](crate::collection::SchemaContext::image).
    pub fn image() -> Self {
        Schema::Image
    }

    /// Pointer to an entry of `collection`.
    ///
    /// The collection name is checked when the content config is assembled;
    /// use [`ContentConfig::reference`](crate::collection::ContentConfig::reference)
    /// to check it immediately.
    pub fn reference(collection: impl Into<String>) -> Self {
        Schema::Reference {
            collection: collection.into(),
        }
    }

    // -------------------------------------------------------------------------
    // Modifiers
    // -------------------------------------------------------------------------

    pub fn optional(self) -> Self {
        Schema::Optional {
            inner: Box::new(self),
        }
    }

    pub fn nullable(self) -> Self {
        Schema::Nullable {
            inner: Box::new(self),
        }
    }

    pub fn default_value(self, value: impl Into<Value>) -> Self {
        Schema::Default {
            inner: Box::new(self),
            value: value.into(),
        }
    }

    pub fn and(self, other: Schema) -> Self {
        Schema::intersection(self, other)
    }

    /// Lower bound: character count for strings, length for arrays, value for numbers.
    /// Ignored by other kinds.
    pub fn min(mut self, bound: f64) -> Self {
        match &mut self {
            Schema::String { min, .. } | Schema::Array { min, .. } => *min = Some(bound as usize),
            Schema::Number { min, .. } => *min = Some(bound),
            _ => {}
        }
        self
    }

    /// Upper bound, see [`Schema::min`].
    pub fn max(mut self, bound: f64) -> Self {
        match &mut self {
            Schema::String { max, .. } | Schema::Array { max, .. } => *max = Some(bound as usize),
            Schema::Number { max, .. } => *max = Some(bound),
            _ => {}
        }
        self
    }

    pub fn url(mut self) -> Self {
        if let Schema::String { url, .. } = &mut self {
            *url = true;
        }
        self
    }

    pub fn int(mut self) -> Self {
        if let Schema::Number { int, .. } = &mut self {
            *int = true;
        }
        self
    }

    pub fn strict(self) -> Self {
        self.with_unknown_keys(UnknownKeys::Strict)
    }

    pub fn passthrough(self) -> Self {
        self.with_unknown_keys(UnknownKeys::Passthrough)
    }

    fn with_unknown_keys(mut self, policy: UnknownKeys) -> Self {
        if let Schema::Object { unknown_keys, .. } = &mut self {
            *unknown_keys = policy;
        }
        self
    }

    pub fn refine<F>(self, check: F, message: impl Into<String>) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Schema::Refine {
            inner: Box::new(self),
            check: Check(Arc::new(check)),
            message: message.into(),
        }
    }

    pub fn transform<F>(self, map: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        Schema::Transform {
            inner: Box::new(self),
            map: Mapper(Arc::new(map)),
        }
    }

    /// Names of every collection this schema points at through `reference`.
    pub fn referenced_collections(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Schema::Reference { collection } => out.push(collection),
            Schema::Array { items, .. } => items.collect_references(out),
            Schema::Object { fields, .. } => {
                for field in fields.values() {
                    field.collect_references(out);
                }
            }
            Schema::Union { options } | Schema::DiscriminatedUnion { options, .. } => {
                for option in options {
                    option.collect_references(out);
                }
            }
            Schema::Intersection { left, right } => {
                left.collect_references(out);
                right.collect_references(out);
            }
            Schema::Optional { inner }
            | Schema::Default { inner, .. }
            | Schema::Nullable { inner }
            | Schema::Refine { inner, .. }
            | Schema::Transform { inner, .. } => inner.collect_references(out),
            _ => {}
        }
    }

    /// Value of `discriminator` when this is an object schema that pins it to a literal.
    fn discriminator_literal(&self, discriminator: &str) -> Option<&Value> {
        match self {
            Schema::Object { fields, .. } => match fields.get(discriminator) {
                Some(Schema::Literal { value }) => Some(value),
                _ => None,
            },
            _ => None,
        }
    }

    /// Whether an object may leave this field out.
    fn accepts_missing(&self) -> bool {
        match self {
            Schema::Optional { .. } | Schema::Default { .. } | Schema::Any => true,
            Schema::Refine { inner, .. } | Schema::Transform { inner, .. } => inner.accepts_missing(),
            _ => false,
        }
    }

    /// Validate `value`, returning the rewritten output or every issue found.
    pub fn validate(&self, value: &Value, ctx: &ParseContext<'_>) -> Result<Value, ValidationError> {
        let validator = build_validator(&self.to_json_schema(ctx))?;
        let mut issues: Vec<Issue> = validator
            .iter_errors(value)
            .map(|error| issue_from(&error, value))
            .collect();

        if issues.is_empty() {
            let mut rewriter = Rewriter::new(ctx);
            let out = rewriter.rewrite(self, value);
            if rewriter.issues.is_empty() {
                return Ok(out);
            }
            issues = rewriter.issues;
        }

        issues.sort_by(|a, b| {
            a.path_string()
                .cmp(&b.path_string())
                .then_with(|| a.message.cmp(&b.message))
        });
        issues.dedup();
        Err(ValidationError { issues })
    }

    /// The JSON Schema (draft 2020-12) document this schema is checked against.
    ///
    /// It accepts both raw input and the output of a previous validation, so
    /// dates may be strings or epoch milliseconds, images may be paths or
    /// metadata objects, and references may be identifiers or
    /// `{collection, slug|id}` objects.
    pub fn to_json_schema(&self, ctx: &ParseContext<'_>) -> Value {
        match self {
            Schema::String { min, max, url } => {
                let mut node = typed("string");
                if let Some(min) = min {
                    node.insert("minLength".into(), json!(min));
                }
                if let Some(max) = max {
                    node.insert("maxLength".into(), json!(max));
                }
                if *url {
                    node.insert("format".into(), json!(URL_FORMAT));
                }
                Value::Object(node)
            }
            Schema::Number { min, max, int } => {
                let mut node = typed(if *int { "integer" } else { "number" });
                if let Some(min) = min {
                    node.insert("minimum".into(), json!(min));
                }
                if let Some(max) = max {
                    node.insert("maximum".into(), json!(max));
                }
                Value::Object(node)
            }
            Schema::Boolean => json!({"type": "boolean"}),
            Schema::Date => json!({
                "anyOf": [
                    {"type": "string", "format": DATE_FORMAT},
                    {"type": "number"},
                ]
            }),
            Schema::Literal { value } => json!({"const": value}),
            Schema::Enum { values } => json!({"type": "string", "enum": values}),
            Schema::Array { items, min, max } => {
                let mut node = typed("array");
                node.insert("items".into(), items.to_json_schema(ctx));
                if let Some(min) = min {
                    node.insert("minItems".into(), json!(min));
                }
                if let Some(max) = max {
                    node.insert("maxItems".into(), json!(max));
                }
                Value::Object(node)
            }
            Schema::Object {
                fields,
                unknown_keys,
            } => {
                let properties: Map<String, Value> = fields
                    .iter()
                    .map(|(key, field)| (key.clone(), field.to_json_schema(ctx)))
                    .collect();
                let required: Vec<&String> = fields
                    .iter()
                    .filter(|(_, field)| !field.accepts_missing())
                    .map(|(key, _)| key)
                    .collect();

                let mut node = typed("object");
                node.insert("properties".into(), Value::Object(properties));
                node.insert("required".into(), json!(required));
                if *unknown_keys == UnknownKeys::Strict {
                    node.insert("additionalProperties".into(), Value::Bool(false));
                }
                Value::Object(node)
            }
            Schema::Union { options } => json!({
                "anyOf": options.iter().map(|o| o.to_json_schema(ctx)).collect::<Vec<_>>()
            }),
            Schema::DiscriminatedUnion {
                discriminator,
                options,
            } => discriminated_json_schema(discriminator, options, ctx),
            Schema::Intersection { left, right } => json!({
                "allOf": [left.to_json_schema(ctx), right.to_json_schema(ctx)]
            }),
            Schema::Optional { inner }
            | Schema::Default { inner, .. }
            | Schema::Refine { inner, .. }
            | Schema::Transform { inner, .. } => inner.to_json_schema(ctx),
            Schema::Nullable { inner } => json!({
                "anyOf": [{"type": "null"}, inner.to_json_schema(ctx)]
            }),
            Schema::Image => json!({
                "anyOf": [
                    {"type": "string"},
                    {
                        "type": "object",
                        "required": ["src", "width", "height", "format"],
                        "properties": {
                            "src": {"type": "string"},
                            "width": {"type": "integer", "minimum": 0},
                            "height": {"type": "integer", "minimum": 0},
                            "format": {"enum": IMAGE_FORMATS},
                        },
                    },
                ]
            }),
            Schema::Reference { collection } => match ctx.collections.get(collection) {
                Some(kind) => {
                    let key = reference_key(*kind);
                    let mut properties = Map::new();
                    properties.insert("collection".into(), json!({"const": collection}));
                    properties.insert(key.into(), json!({"type": "string"}));
                    json!({
                        "anyOf": [
                            {"type": "string"},
                            {
                                "type": "object",
                                "required": ["collection", key],
                                "properties": properties,
                            },
                        ]
                    })
                }
                // Reported by the rewrite pass.
                None => json!({"type": "string"}),
            },
            Schema::Any => Value::Bool(true),
        }
    }
}

fn typed(name: &str) -> Map<String, Value> {
    let mut node = Map::new();
    node.insert("type".into(), json!(name));
    node
}

/// Pin the discriminator to the known tags, then apply the matching option
/// through `if`/`then`, so issues point into the selected option.
fn discriminated_json_schema(discriminator: &str, options: &[Schema], ctx: &ParseContext<'_>) -> Value {
    let mut tags = Vec::new();
    let mut branches = Vec::new();
    for option in options {
        let Some(tag) = option.discriminator_literal(discriminator) else {
            continue;
        };
        let mut tag_properties = Map::new();
        tag_properties.insert(discriminator.to_string(), json!({"const": tag}));
        branches.push(json!({
            "if": {"properties": tag_properties, "required": [discriminator]},
            "then": option.to_json_schema(ctx),
        }));
        tags.push(tag.clone());
    }

    let mut properties = Map::new();
    properties.insert(discriminator.to_string(), json!({"enum": tags}));
    let mut node = typed("object");
    node.insert("properties".into(), Value::Object(properties));
    node.insert("required".into(), json!([discriminator]));
    if !branches.is_empty() {
        node.insert("allOf".into(), Value::Array(branches));
    }
    Value::Object(node)
}

fn reference_key(kind: CollectionType) -> &'static str {
    match kind {
        CollectionType::Content => "slug",
        CollectionType::Data => "id",
    }
}

// =============================================================================
// JSON Schema validation
// =============================================================================

/// Custom `format` for `url()` strings: an absolute URL with a host.
const URL_FORMAT: &str = "folio-url";
/// Custom `format` for date strings accepted by [`coerce_date`].
const DATE_FORMAT: &str = "folio-date";

fn build_validator(document: &Value) -> Result<jsonschema::Validator, ValidationError> {
    jsonschema::options()
        .with_draft(jsonschema::Draft::Draft202012)
        .should_validate_formats(true)
        .with_format(URL_FORMAT, is_url)
        .with_format(DATE_FORMAT, |s: &str| parse_date(s).is_some())
        .build(document)
        .map_err(|e| ValidationError {
            issues: vec![Issue {
                path: Vec::new(),
                message: format!("Invalid schema: {e}"),
            }],
        })
}

/// Turn a `jsonschema` error into an [`Issue`] located in `root`.
fn issue_from(error: &jsonschema::ValidationError<'_>, root: &Value) -> Issue {
    let mut path = pointer_path(&error.instance_path.to_string(), root);
    let message = match &error.kind {
        ValidationErrorKind::Required { property } => {
            let key = property
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| property.to_string());
            path.push(PathSegment::Key(key));
            "Required".to_string()
        }
        ValidationErrorKind::AdditionalProperties { unexpected } => {
            let names = unexpected
                .iter()
                .map(|k| format!("'{k}'"))
                .collect::<Vec<_>>()
                .join(", ");
            format!("Unrecognized key(s) in object: {names}")
        }
        _ => error.to_string(),
    };
    Issue { path, message }
}

/// Split a JSON pointer into path segments, using `root` to tell array
/// indices from object keys that happen to be numeric.
fn pointer_path(pointer: &str, root: &Value) -> Vec<PathSegment> {
    let mut path = Vec::new();
    let mut current = Some(root);
    for raw in pointer.split('/').skip(1) {
        let token = raw.replace("~1", "/").replace("~0", "~");
        let segment = match (current, token.parse::<usize>()) {
            (Some(Value::Array(_)), Ok(index)) => PathSegment::Index(index),
            _ => PathSegment::Key(token),
        };
        current = current.and_then(|value| match &segment {
            PathSegment::Index(i) => value.get(*i),
            PathSegment::Key(k) => value.get(k.as_str()),
        });
        path.push(segment);
    }
    path
}

// =============================================================================
// Parse context and errors
// =============================================================================

/// Everything the validator needs beyond the value itself.
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    /// Type of every registered collection, for resolving references.
    pub collections: &'a BTreeMap<String, CollectionType>,
    /// Directory of the entry's source file; relative image paths resolve here.
    pub entry_dir: Option<&'a Path>,
    /// Project root; resolved image `src` values are relative to it.
    pub root: Option<&'a Path>,
}

impl<'a> ParseContext<'a> {
    pub fn new(collections: &'a BTreeMap<String, CollectionType>) -> Self {
        Self {
            collections,
            entry_dir: None,
            root: None,
        }
    }

    pub fn with_entry_dir(mut self, entry_dir: &'a Path, root: &'a Path) -> Self {
        self.entry_dir = Some(entry_dir);
        self.root = Some(root);
        self
    }
}

/// One step in the path to an offending value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(k) => f.write_str(k),
            PathSegment::Index(i) => write!(f, "{i}"),
        }
    }
}

/// A single validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub path: Vec<PathSegment>,
    pub message: String,
}

impl Issue {
    /// Dotted path, e.g. `tags.2`; empty for the root value.
    pub fn path_string(&self) -> String {
        self.path
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.path_string(), self.message)
        }
    }
}

/// All issues found while validating one value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub issues: Vec<Issue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self.issues.iter().map(ToString::to_string).collect();
        f.write_str(&lines.join("; "))
    }
}

impl std::error::Error for ValidationError {}

/// Resolved output of the `image` kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub src: String,
    pub width: u32,
    pub height: u32,
    pub format: String,
}


// =============================================================================
// Rewrite pass
// =============================================================================

/// Produces the output of a value that already passed the JSON Schema check:
/// fills defaults, normalises dates, strips unknown keys, resolves images,
/// and canonicalises references. Records the few failures only it can see.
struct Rewriter<'c, 'a> {
    ctx: &'c ParseContext<'a>,
    path: Vec<PathSegment>,
    issues: Vec<Issue>,
}

impl<'c, 'a> Rewriter<'c, 'a> {
    fn new(ctx: &'c ParseContext<'a>) -> Self {
        Self {
            ctx,
            path: Vec::new(),
            issues: Vec::new(),
        }
    }

    fn issue(&mut self, message: impl Into<String>) {
        self.issues.push(Issue {
            path: self.path.clone(),
            message: message.into(),
        });
    }

    /// Whether `value` passes `schema`'s JSON Schema check on its own.
    fn accepts(&self, schema: &Schema, value: &Value) -> bool {
        build_validator(&schema.to_json_schema(self.ctx)).is_ok_and(|v| v.is_valid(value))
    }

    fn rewrite(&mut self, schema: &Schema, value: &Value) -> Value {
        match schema {
            Schema::Date => match coerce_date(value) {
                Some(date) => Value::String(date.to_rfc3339_opts(SecondsFormat::Millis, true)),
                None => {
                    self.issue("Invalid date");
                    value.clone()
                }
            },
            Schema::Array { items, .. } => {
                let Value::Array(elements) = value else {
                    return value.clone();
                };
                let mut out = Vec::with_capacity(elements.len());
                for (i, element) in elements.iter().enumerate() {
                    self.path.push(PathSegment::Index(i));
                    out.push(self.rewrite(items, element));
                    self.path.pop();
                }
                Value::Array(out)
            }
            Schema::Object {
                fields,
                unknown_keys,
            } => self.rewrite_object(fields, *unknown_keys, value),
            Schema::Union { options } => {
                match options.iter().find(|option| self.accepts(option, value)) {
                    Some(option) => self.rewrite(option, value),
                    None => value.clone(),
                }
            }
            Schema::DiscriminatedUnion {
                discriminator,
                options,
            } => {
                let tag = value.get(discriminator.as_str());
                let selected = options
                    .iter()
                    .find(|option| option.discriminator_literal(discriminator).is_some_and(|l| Some(l) == tag));
                match selected {
                    Some(option) => self.rewrite(option, value),
                    None => value.clone(),
                }
            }
            Schema::Intersection { left, right } => {
                let l = self.rewrite(left, value);
                let r = self.rewrite(right, value);
                match merge_values(l, r) {
                    Some(merged) => merged,
                    None => {
                        self.issue("Intersection results could not be merged");
                        value.clone()
                    }
                }
            }
            Schema::Optional { inner } | Schema::Default { inner, .. } => self.rewrite(inner, value),
            Schema::Nullable { inner } => match value {
                Value::Null => Value::Null,
                _ => self.rewrite(inner, value),
            },
            Schema::Image => self.rewrite_image(value),
            Schema::Reference { collection } => self.rewrite_reference(collection, value),
            Schema::Refine {
                inner,
                check,
                message,
            } => {
                let before = self.issues.len();
                let out = self.rewrite(inner, value);
                if self.issues.len() == before && !(check.0)(&out) {
                    self.issue(message.clone());
                }
                out
            }
            Schema::Transform { inner, map } => {
                let out = self.rewrite(inner, value);
                (map.0)(out)
            }
            Schema::String { .. }
            | Schema::Number { .. }
            | Schema::Boolean
            | Schema::Literal { .. }
            | Schema::Enum { .. }
            | Schema::Any => value.clone(),
        }
    }

    /// Output for a key that is absent from its object, `None` to leave it out.
    fn rewrite_missing(&mut self, schema: &Schema) -> Option<Value> {
        match schema {
            Schema::Default { inner, value } => {
                if !self.accepts(inner, value) {
                    self.issue(format!("Invalid default value {value}"));
                }
                Some(self.rewrite(inner, value))
            }
            Schema::Refine {
                inner,
                check,
                message,
            } => {
                let out = self.rewrite_missing(inner);
                if let Some(v) = &out {
                    if !(check.0)(v) {
                        self.issue(message.clone());
                    }
                }
                out
            }
            Schema::Transform { inner, map } => self.rewrite_missing(inner).map(|v| (map.0)(v)),
            _ => None,
        }
    }

    fn rewrite_object(
        &mut self,
        fields: &BTreeMap<String, Schema>,
        unknown_keys: UnknownKeys,
        value: &Value,
    ) -> Value {
        let Value::Object(input) = value else {
            return value.clone();
        };

        let mut out = Map::new();
        for (key, field) in fields {
            self.path.push(PathSegment::Key(key.clone()));
            let rewritten = match input.get(key) {
                Some(v) => Some(self.rewrite(field, v)),
                None => self.rewrite_missing(field),
            };
            self.path.pop();
            if let Some(v) = rewritten {
                out.insert(key.clone(), v);
            }
        }

        // Strict objects never get here with unknown keys.
        if unknown_keys == UnknownKeys::Passthrough {
            for (key, v) in input {
                if !fields.contains_key(key) {
                    out.insert(key.clone(), v.clone());
                }
            }
        }
        Value::Object(out)
    }

    fn rewrite_image(&mut self, value: &Value) -> Value {
        let Value::String(raw) = value else {
            return value.clone();
        };
        match self.resolve_image(raw).map(serde_json::to_value) {
            Ok(Ok(meta)) => meta,
            Ok(Err(e)) => {
                self.issue(e.to_string());
                value.clone()
            }
            Err(message) => {
                self.issue(message);
                value.clone()
            }
        }
    }

    fn resolve_image(&self, raw: &str) -> Result<ImageMetadata, String> {
        let entry_dir = self
            .ctx
            .entry_dir
            .ok_or_else(|| format!("Image {raw} cannot be resolved outside a content file"))?;

        let path = entry_dir.join(raw);
        let format = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if !IMAGE_FORMATS.contains(&format.as_str()) {
            return Err(format!("Unsupported image format for {raw}"));
        }
        if !path.is_file() {
            return Err(format!("Image {raw} does not exist. Is the path correct?"));
        }

        let (width, height) = read_dimensions(&path, &format)
            .map_err(|e| format!("Could not read dimensions of {raw}: {e}"))?;

        let src = self
            .ctx
            .root
            .and_then(|root| path.strip_prefix(root).ok())
            .unwrap_or(path.as_path())
            .components()
            .filter(|c| !matches!(c, std::path::Component::CurDir))
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");

        Ok(ImageMetadata {
            src,
            width,
            height,
            format,
        })
    }

    /// Always `{collection, slug}` or `{collection, id}`, whatever the input carried.
    fn rewrite_reference(&mut self, collection: &str, value: &Value) -> Value {
        let Some(kind) = self.ctx.collections.get(collection) else {
            self.issue(format!("Unknown collection '{collection}'"));
            return value.clone();
        };
        let key = reference_key(*kind);

        let target = match value {
            Value::String(target) => Some(target.as_str()),
            Value::Object(obj) => obj.get(key).and_then(Value::as_str),
            _ => None,
        };
        let Some(target) = target else {
            self.issue(format!("Expected {key} of '{collection}'"));
            return value.clone();
        };

        let mut out = Map::new();
        out.insert("collection".into(), Value::String(collection.to_string()));
        out.insert(key.into(), Value::String(target.to_string()));
        Value::Object(out)
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn is_url(s: &str) -> bool {
    let Some((scheme, rest)) = s.split_once("://") else {
        return false;
    };
    !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        && !rest.is_empty()
        && !rest.starts_with('/')
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Parse a date from RFC 3339, `YYYY-MM-DD`, or epoch milliseconds.
pub fn coerce_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_date(s),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

/// Merge the outputs of both sides of an intersection.
fn merge_values(left: Value, right: Value) -> Option<Value> {
    match (left, right) {
        (Value::Object(mut l), Value::Object(r)) => {
            for (key, rv) in r {
                let merged = match l.remove(&key) {
                    Some(lv) => merge_values(lv, rv)?,
                    None => rv,
                };
                l.insert(key, merged);
            }
            Some(Value::Object(l))
        }
        (l, r) if l == r => Some(l),
        _ => None,
    }
}

fn read_dimensions(path: &Path, format: &str) -> Result<(u32, u32), String> {
    if format == "svg" {
        let text = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
        svg_dimensions(&text).ok_or_else(|| "svg has no width/height or viewBox".to_string())
    } else {
        image::image_dimensions(path).map_err(|e| e.to_string())
    }
}

/// Read `width`/`height` from the root `<svg>` tag, falling back to `viewBox`.
fn svg_dimensions(text: &str) -> Option<(u32, u32)> {
    let start = text.find("<svg")?;
    let tag = &text[start..start + text[start..].find('>')?];

    fn attr<'t>(tag: &'t str, name: &str) -> Option<&'t str> {
        ['"', '\''].into_iter().find_map(|quote| {
            let needle = format!(" {name}={quote}");
            let at = tag.find(&needle)? + needle.len();
            Some(&tag[at..at + tag[at..].find(quote)?])
        })
    }
    let number = |raw: &str| -> Option<u32> {
        let digits: String = raw
            .trim()
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        digits.parse::<f64>().ok().map(|f| f.round() as u32)
    };

    if let (Some(w), Some(h)) = (
        attr(tag, "width").and_then(number),
        attr(tag, "height").and_then(number),
    ) {
        return Some((w, h));
    }
    let view_box: Vec<u32> = attr(tag, "viewBox")?
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|p| !p.is_empty())
        .filter_map(number)
        .collect();
    match view_box.as_slice() {
        [_, _, w, h] => Some((*w, *h)),
        _ => None,
    }
}
