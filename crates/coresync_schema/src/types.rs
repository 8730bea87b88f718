//! Entity type and field definitions.

use crate::registry::LONG_TEXT_FIELDS;
use coresync_value::{to_json, Value};

/// Name of the remote identity field on a record.
pub const ID_FIELD: &str = "id";

/// Name of the geometry-bearing field in remote records.
pub const GEOMETRY_FIELD: &str = "geometry";

/// Fallback field consulted when [`GEOMETRY_FIELD`] is absent; some
/// listings carry a point under this name instead.
pub const GEOMETRY_FALLBACK_FIELD: &str = "location";

/// Largest float magnitude at which integer conversion is exact.
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

/// Declared type of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Free text.
    String,
    /// Signed integer.
    Integer,
    /// Double-precision float.
    Double,
    /// Boolean flag.
    Boolean,
    /// Calendar date, carried as text.
    Date,
    /// Date and time, carried as text.
    DateTime,
}

impl FieldType {
    /// Infers a field type from a literal transport value.
    ///
    /// Boolean is checked before integer: many transports represent
    /// booleans as 0/1, so the reverse order would misclassify every
    /// flag column.
    pub fn infer(value: &Value) -> FieldType {
        match value {
            Value::Bool(_) => FieldType::Boolean,
            Value::Int(_) => FieldType::Integer,
            Value::Float(_) => FieldType::Double,
            _ => FieldType::String,
        }
    }

    /// Coerces a value into this type's local representation.
    ///
    /// Nulls stay null for every type. Returns `None` when the value
    /// cannot represent the declared type (for example the string
    /// `"abc"` in an integer field); the caller decides whether that
    /// skips the record or just the field.
    pub fn coerce(&self, value: &Value) -> Option<Value> {
        if value.is_null() {
            return Some(Value::Null);
        }
        match self {
            FieldType::String | FieldType::Date | FieldType::DateTime => {
                Some(coerce_string(value))
            }
            FieldType::Integer => coerce_integer(value),
            FieldType::Double => coerce_double(value),
            FieldType::Boolean => coerce_boolean(value),
        }
    }
}

fn coerce_string(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::Str(s) => Value::Str(s.clone()),
        Value::Bool(b) => Value::Str(if *b { "true" } else { "false" }.to_string()),
        Value::Int(n) => Value::Str(n.to_string()),
        Value::Float(x) => Value::Str(x.to_string()),
        Value::Geometry(g) => Value::Str(g.ewkt()),
        nested @ (Value::List(_) | Value::Map(_)) => Value::Str(to_json(nested).to_string()),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn coerce_integer(value: &Value) -> Option<Value> {
    match value {
        Value::Int(n) => Some(Value::Int(*n)),
        Value::Bool(b) => Some(Value::Int(i64::from(*b))),
        Value::Float(x) if x.fract() == 0.0 && x.abs() <= MAX_EXACT_INT => {
            Some(Value::Int(*x as i64))
        }
        Value::Str(s) => {
            let text = s.trim();
            if let Ok(n) = text.parse::<i64>() {
                return Some(Value::Int(n));
            }
            let x: f64 = text.parse().ok()?;
            if x.fract() == 0.0 && x.abs() <= MAX_EXACT_INT {
                Some(Value::Int(x as i64))
            } else {
                None
            }
        }
        _ => None,
    }
}

#[allow(clippy::cast_precision_loss)]
fn coerce_double(value: &Value) -> Option<Value> {
    match value {
        Value::Float(x) => Some(Value::Float(*x)),
        Value::Int(n) => Some(Value::Float(*n as f64)),
        Value::Str(s) => {
            let x: f64 = s.trim().parse().ok()?;
            x.is_finite().then_some(Value::Float(x))
        }
        _ => None,
    }
}

fn coerce_boolean(value: &Value) -> Option<Value> {
    match value {
        Value::Bool(b) => Some(Value::Bool(*b)),
        Value::Int(0) => Some(Value::Bool(false)),
        Value::Int(1) => Some(Value::Bool(true)),
        Value::Str(s) => match s.trim() {
            "1" => Some(Value::Bool(true)),
            "0" => Some(Value::Bool(false)),
            other if other.eq_ignore_ascii_case("true") => Some(Value::Bool(true)),
            other if other.eq_ignore_ascii_case("false") => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}

/// Geometry kind a local collection stores for an entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeometryKind {
    /// No geometry.
    #[default]
    None,
    /// Single point.
    Point,
    /// Single line string.
    Line,
    /// Single polygon.
    Polygon,
    /// Multiple points.
    MultiPoint,
    /// Multiple line strings.
    MultiLine,
    /// Multiple polygons.
    MultiPolygon,
}

impl GeometryKind {
    /// Returns true if the entity type has no geometry at all.
    pub fn is_none(&self) -> bool {
        matches!(self, GeometryKind::None)
    }

    /// Returns true for area kinds, where an incoming lone point must
    /// be expanded into a small polygon before insert.
    pub fn requires_area(&self) -> bool {
        matches!(self, GeometryKind::Polygon | GeometryKind::MultiPolygon)
    }

    /// The WKT keyword for this kind, when it has one.
    pub fn wkt_keyword(&self) -> Option<&'static str> {
        match self {
            GeometryKind::None => None,
            GeometryKind::Point => Some("POINT"),
            GeometryKind::Line => Some("LINESTRING"),
            GeometryKind::Polygon => Some("POLYGON"),
            GeometryKind::MultiPoint => Some("MULTIPOINT"),
            GeometryKind::MultiLine => Some("MULTILINESTRING"),
            GeometryKind::MultiPolygon => Some("MULTIPOLYGON"),
        }
    }
}

/// Definition of one field within an entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    name: String,
    field_type: FieldType,
    length: i32,
    required: bool,
    readonly: bool,
    default: Option<Value>,
    description: Option<String>,
}

impl FieldSchema {
    /// Creates a field definition with unlimited length, writable and
    /// optional.
    #[must_use]
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            length: 0,
            required: false,
            readonly: false,
            default: None,
            description: None,
        }
    }

    /// Infers a definition from a field's first observed value.
    ///
    /// String fields default to a 255-character limit; a longer value
    /// or a known long-text name lifts the limit.
    #[must_use]
    pub fn inferred(name: &str, value: &Value) -> Self {
        let field_type = FieldType::infer(value);
        let mut field = Self::new(name, field_type);
        if field_type == FieldType::String {
            let over_limit = matches!(value, Value::Str(s) if s.chars().count() > 255);
            let long_text = LONG_TEXT_FIELDS.contains(&name);
            field.length = if over_limit || long_text { 0 } else { 255 };
        }
        field
    }

    /// Sets the maximum length (≤ 0 means unlimited).
    #[must_use]
    pub fn with_length(mut self, length: i32) -> Self {
        self.length = length;
        self
    }

    /// Marks the field required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Marks the field read-only (server-computed, never pushed).
    #[must_use]
    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    /// Sets a default value.
    #[must_use]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Sets a human-readable description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type.
    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Maximum length; ≤ 0 means unlimited.
    pub fn length(&self) -> i32 {
        self.length
    }

    /// Returns true when no length limit applies.
    pub fn is_unlimited(&self) -> bool {
        self.length <= 0
    }

    /// Whether the field must be present on push.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Whether the field is server-computed and never pushed.
    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    /// Default value, when declared.
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Description, when declared.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// A named category of records with its schema and sync capabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityType {
    name: String,
    remote_path: String,
    fields: Vec<FieldSchema>,
    geometry_kind: GeometryKind,
    natural_key_fields: Vec<String>,
    supports_push: bool,
    supports_pull: bool,
}

impl EntityType {
    /// Creates an entity type with no fields, no geometry, and both
    /// sync directions enabled. The remote path defaults to the
    /// lowercased name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let remote_path = name.to_lowercase();
        Self {
            name,
            remote_path,
            fields: Vec::new(),
            geometry_kind: GeometryKind::None,
            natural_key_fields: Vec::new(),
            supports_push: true,
            supports_pull: true,
        }
    }

    /// Appends a field definition.
    #[must_use]
    pub fn with_field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    /// Replaces the field list.
    #[must_use]
    pub fn with_fields(mut self, fields: Vec<FieldSchema>) -> Self {
        self.fields = fields;
        self
    }

    /// Sets the geometry kind.
    #[must_use]
    pub fn with_geometry(mut self, kind: GeometryKind) -> Self {
        self.geometry_kind = kind;
        self
    }

    /// Sets the natural-key field names, in significance order.
    #[must_use]
    pub fn with_natural_key<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.natural_key_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Overrides the remote URL path segment.
    #[must_use]
    pub fn with_remote_path(mut self, path: impl Into<String>) -> Self {
        self.remote_path = path.into();
        self
    }

    /// Disables push for this entity type.
    #[must_use]
    pub fn pull_only(mut self) -> Self {
        self.supports_push = false;
        self
    }

    /// Disables pull for this entity type.
    #[must_use]
    pub fn push_only(mut self) -> Self {
        self.supports_pull = false;
        self
    }

    /// Entity type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Remote URL path segment.
    pub fn remote_path(&self) -> &str {
        &self.remote_path
    }

    /// All field definitions, in declaration order.
    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|field| field.name() == name)
    }

    /// Geometry kind.
    pub fn geometry_kind(&self) -> GeometryKind {
        self.geometry_kind
    }

    /// Returns true when the entity type carries geometry.
    pub fn has_geometry(&self) -> bool {
        !self.geometry_kind.is_none()
    }

    /// Natural-key field names; empty when the type has none.
    pub fn natural_key_fields(&self) -> &[String] {
        &self.natural_key_fields
    }

    /// Whether local changes may be pushed.
    pub fn supports_push(&self) -> bool {
        self.supports_push
    }

    /// Whether remote records may be pulled.
    pub fn supports_pull(&self) -> bool {
        self.supports_pull
    }

    /// All non-readonly fields, in declaration order.
    pub fn writable_fields(&self) -> Vec<&FieldSchema> {
        self.fields.iter().filter(|f| !f.is_readonly()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infer_prefers_boolean_over_integer() {
        assert_eq!(FieldType::infer(&Value::Bool(true)), FieldType::Boolean);
        assert_eq!(FieldType::infer(&Value::Int(1)), FieldType::Integer);
        assert_eq!(FieldType::infer(&Value::Float(1.5)), FieldType::Double);
        assert_eq!(FieldType::infer(&Value::Str("x".into())), FieldType::String);
        assert_eq!(FieldType::infer(&Value::Null), FieldType::String);
    }

    #[test]
    fn coerce_integer_accepts_numeric_forms() {
        let t = FieldType::Integer;
        assert_eq!(t.coerce(&Value::Int(7)), Some(Value::Int(7)));
        assert_eq!(t.coerce(&Value::Float(7.0)), Some(Value::Int(7)));
        assert_eq!(t.coerce(&Value::Str("7".into())), Some(Value::Int(7)));
        assert_eq!(t.coerce(&Value::Str(" 7.0 ".into())), Some(Value::Int(7)));
        assert_eq!(t.coerce(&Value::Bool(true)), Some(Value::Int(1)));
        assert_eq!(t.coerce(&Value::Float(7.5)), None);
        assert_eq!(t.coerce(&Value::Str("abc".into())), None);
    }

    #[test]
    fn coerce_double() {
        let t = FieldType::Double;
        assert_eq!(t.coerce(&Value::Float(1.5)), Some(Value::Float(1.5)));
        assert_eq!(t.coerce(&Value::Int(2)), Some(Value::Float(2.0)));
        assert_eq!(t.coerce(&Value::Str("1.25".into())), Some(Value::Float(1.25)));
        assert_eq!(t.coerce(&Value::Bool(true)), None);
    }

    #[test]
    fn coerce_boolean_forms() {
        let t = FieldType::Boolean;
        assert_eq!(t.coerce(&Value::Bool(false)), Some(Value::Bool(false)));
        assert_eq!(t.coerce(&Value::Int(1)), Some(Value::Bool(true)));
        assert_eq!(t.coerce(&Value::Int(2)), None);
        assert_eq!(t.coerce(&Value::Str("TRUE".into())), Some(Value::Bool(true)));
        assert_eq!(t.coerce(&Value::Str("0".into())), Some(Value::Bool(false)));
        assert_eq!(t.coerce(&Value::Str("yes".into())), None);
    }

    #[test]
    fn coerce_null_stays_null_for_every_type() {
        for t in [
            FieldType::String,
            FieldType::Integer,
            FieldType::Double,
            FieldType::Boolean,
            FieldType::Date,
            FieldType::DateTime,
        ] {
            assert_eq!(t.coerce(&Value::Null), Some(Value::Null));
        }
    }

    #[test]
    fn coerce_string_renders_nested_as_json() {
        let nested = Value::Map(vec![("a".into(), Value::Int(1))]);
        assert_eq!(
            FieldType::String.coerce(&nested),
            Some(Value::Str(r#"{"a":1}"#.into()))
        );
    }

    #[test]
    fn inferred_string_length_triggers() {
        let short = FieldSchema::inferred("name", &Value::Str("A".into()));
        assert_eq!(short.length(), 255);
        assert!(!short.is_unlimited());

        let long_value = FieldSchema::inferred("name", &Value::Str("x".repeat(300)));
        assert!(long_value.is_unlimited());

        let long_name = FieldSchema::inferred("description", &Value::Str("short".into()));
        assert!(long_name.is_unlimited());

        let numeric = FieldSchema::inferred("value", &Value::Float(1.0));
        assert_eq!(numeric.field_type(), FieldType::Double);
    }

    #[test]
    fn writable_fields_exclude_readonly() {
        let entity = EntityType::new("Sample")
            .with_field(FieldSchema::new("name", FieldType::String))
            .with_field(FieldSchema::new("computed", FieldType::Double).readonly())
            .with_field(FieldSchema::new("value", FieldType::Double));

        let writable: Vec<&str> = entity.writable_fields().iter().map(|f| f.name()).collect();
        assert_eq!(writable, vec!["name", "value"]);
    }

    #[test]
    fn entity_defaults() {
        let entity = EntityType::new("DrillHole");
        assert_eq!(entity.remote_path(), "drillhole");
        assert!(entity.supports_pull());
        assert!(entity.supports_push());
        assert!(!entity.has_geometry());
        assert!(entity.natural_key_fields().is_empty());
    }

    #[test]
    fn area_kinds() {
        assert!(GeometryKind::Polygon.requires_area());
        assert!(GeometryKind::MultiPolygon.requires_area());
        assert!(!GeometryKind::Point.requires_area());
        assert!(!GeometryKind::None.requires_area());
        assert_eq!(GeometryKind::Line.wkt_keyword(), Some("LINESTRING"));
        assert_eq!(GeometryKind::None.wkt_keyword(), None);
    }
}
