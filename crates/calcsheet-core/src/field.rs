//! Field definitions
//!
//! A calculation sheet template is an ordered list of [`FieldDefinition`]s.
//! Each field has a kind, and the kind carries its own properties: a formula
//! field holds expression text, a number field its default and bounds, a frame
//! its nested children.

use crate::error::{Error, Result};
use crate::value::Value;
use std::collections::HashSet;

/// Layout geometry of a field on the rendered form
///
/// The calculation core never reads this; it is carried through for the
/// rendering collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Geometry {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Field kind with its kind-specific properties
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum FieldKind {
    /// Static text
    Label {
        #[cfg_attr(feature = "serde", serde(default))]
        text: String,
    },
    /// Single-line text input
    Text {
        #[cfg_attr(feature = "serde", serde(default))]
        default: Option<String>,
        /// Regular expression the whole value must match
        #[cfg_attr(feature = "serde", serde(default))]
        pattern: Option<String>,
        #[cfg_attr(feature = "serde", serde(default))]
        max_length: Option<usize>,
    },
    /// Multi-line text input
    MultilineText {
        #[cfg_attr(feature = "serde", serde(default))]
        default: Option<String>,
        #[cfg_attr(feature = "serde", serde(default))]
        max_length: Option<usize>,
    },
    /// Numeric input
    Number {
        #[cfg_attr(feature = "serde", serde(default))]
        default: Option<f64>,
        #[cfg_attr(feature = "serde", serde(default))]
        min: Option<f64>,
        #[cfg_attr(feature = "serde", serde(default))]
        max: Option<f64>,
    },
    /// Computed field
    Formula { expression: String },
    /// Group of nested fields
    Frame {
        #[cfg_attr(feature = "serde", serde(default))]
        children: Vec<FieldDefinition>,
    },
    /// File attachment
    File {
        #[cfg_attr(feature = "serde", serde(default))]
        accept: Option<String>,
    },
    /// Hyperlink
    Link {
        #[cfg_attr(feature = "serde", serde(default))]
        url: String,
    },
}

impl FieldKind {
    /// Short kind name, as used in serialized templates
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Label { .. } => "label",
            FieldKind::Text { .. } => "text",
            FieldKind::MultilineText { .. } => "multiline_text",
            FieldKind::Number { .. } => "number",
            FieldKind::Formula { .. } => "formula",
            FieldKind::Frame { .. } => "frame",
            FieldKind::File { .. } => "file",
            FieldKind::Link { .. } => "link",
        }
    }
}

/// One field of a sheet template
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldDefinition {
    /// Identifier assigned by the template store
    pub id: String,
    /// Unique reference name other formulas use to read this field
    #[cfg_attr(feature = "serde", serde(default, alias = "ref"))]
    pub reference: Option<String>,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub kind: FieldKind,
    #[cfg_attr(feature = "serde", serde(default))]
    pub geometry: Geometry,
    #[cfg_attr(feature = "serde", serde(default = "default_visible"))]
    pub visible: bool,
}

#[cfg(feature = "serde")]
fn default_visible() -> bool {
    true
}

impl FieldDefinition {
    /// Create a visible field with default geometry
    pub fn new(id: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            id: id.into(),
            reference: None,
            kind,
            geometry: Geometry::default(),
            visible: true,
        }
    }

    /// Create a formula field whose reference name equals its id
    pub fn formula(reference: impl Into<String>, expression: impl Into<String>) -> Self {
        let reference = reference.into();
        Self::new(
            reference.clone(),
            FieldKind::Formula {
                expression: expression.into(),
            },
        )
        .with_reference(reference)
    }

    /// Create a number field whose reference name equals its id
    pub fn number(reference: impl Into<String>, default: Option<f64>) -> Self {
        let reference = reference.into();
        Self::new(
            reference.clone(),
            FieldKind::Number {
                default,
                min: None,
                max: None,
            },
        )
        .with_reference(reference)
    }

    /// Create a text field whose reference name equals its id
    pub fn text(reference: impl Into<String>, default: Option<&str>) -> Self {
        let reference = reference.into();
        Self::new(
            reference.clone(),
            FieldKind::Text {
                default: default.map(str::to_string),
                pattern: None,
                max_length: None,
            },
        )
        .with_reference(reference)
    }

    /// Create a frame grouping `children`
    pub fn frame(id: impl Into<String>, children: Vec<FieldDefinition>) -> Self {
        Self::new(id, FieldKind::Frame { children })
    }

    /// Set the reference name
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Set the visibility flag
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Set the layout geometry
    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = geometry;
        self
    }

    /// Expression text if this is a formula field
    pub fn expression(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::Formula { expression } => Some(expression),
            _ => None,
        }
    }

    /// Check if the field is computed
    pub fn is_formula(&self) -> bool {
        matches!(self.kind, FieldKind::Formula { .. })
    }

    /// Nested children (empty unless this is a frame)
    pub fn children(&self) -> &[FieldDefinition] {
        match &self.kind {
            FieldKind::Frame { children } => children,
            _ => &[],
        }
    }

    /// Declared default used to seed a plain value field
    ///
    /// Formula fields have no default and return `None`.
    pub fn default_value(&self) -> Option<Value> {
        let value = match &self.kind {
            FieldKind::Formula { .. } => return None,
            FieldKind::Number { default, .. } => default.map(Value::Number).unwrap_or(Value::Null),
            FieldKind::Text { default, .. } | FieldKind::MultilineText { default, .. } => default
                .as_ref()
                .map(|s| Value::String(s.clone()))
                .unwrap_or(Value::Null),
            FieldKind::Label { text } => Value::String(text.clone()),
            FieldKind::Link { url } => Value::String(url.clone()),
            FieldKind::File { .. } | FieldKind::Frame { .. } => Value::Null,
        };
        Some(value)
    }
}

/// Flatten nested frames into a single pre-order list
pub fn flatten_fields(fields: &[FieldDefinition]) -> Vec<&FieldDefinition> {
    let mut out = Vec::with_capacity(fields.len());
    let mut stack: Vec<&FieldDefinition> = fields.iter().rev().collect();

    while let Some(field) = stack.pop() {
        out.push(field);
        stack.extend(field.children().iter().rev());
    }

    out
}

/// Check that no two fields (at any nesting level) share a reference name
pub fn validate_fields(fields: &[FieldDefinition]) -> Result<()> {
    let mut seen = HashSet::new();
    for field in flatten_fields(fields) {
        if let Some(reference) = &field.reference {
            if !seen.insert(reference.as_str()) {
                return Err(Error::DuplicateReference(reference.clone()));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_flatten_preorder() {
        let fields = vec![
            FieldDefinition::number("a", None),
            FieldDefinition::frame(
                "group",
                vec![
                    FieldDefinition::number("b", None),
                    FieldDefinition::frame("inner", vec![FieldDefinition::formula("c", "a+b")]),
                ],
            ),
            FieldDefinition::number("d", None),
        ];

        let ids: Vec<&str> = flatten_fields(&fields).iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "group", "b", "inner", "c", "d"]);
    }

    #[test]
    fn test_default_values() {
        assert_eq!(
            FieldDefinition::number("n", Some(3.0)).default_value(),
            Some(Value::Number(3.0))
        );
        assert_eq!(FieldDefinition::number("n", None).default_value(), Some(Value::Null));
        assert_eq!(
            FieldDefinition::text("t", Some("hi")).default_value(),
            Some(Value::string("hi"))
        );
        assert_eq!(FieldDefinition::formula("f", "1").default_value(), None);
    }

    #[test]
    fn test_duplicate_reference() {
        let fields = vec![
            FieldDefinition::number("a", None),
            FieldDefinition::frame("g", vec![FieldDefinition::number("a", None)]),
        ];
        assert_eq!(
            validate_fields(&fields),
            Err(Error::DuplicateReference("a".into()))
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_deserialize_field() {
        let json = r#"{
            "id": "f1",
            "ref": "total",
            "kind": "formula",
            "expression": "a + b",
            "geometry": {"x": 1, "y": 2, "width": 100, "height": 20}
        }"#;
        let field: FieldDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(field.reference.as_deref(), Some("total"));
        assert_eq!(field.expression(), Some("a + b"));
        assert!(field.visible);
        assert_eq!(field.geometry.width, 100.0);
    }
}
