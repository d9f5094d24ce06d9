//! Manifest payload parser for the two supported serialization formats.
//!
//! Both formats decode into the same [`ManifestDocument`] so callers never
//! branch on the format after parsing. Shape checks beyond "top level is a
//! mapping" belong to [`super::validate`].

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};
use thiserror::Error;

/// Serialization format the model is asked to answer in.
///
/// Chosen once per pipeline by configuration; responses are never sniffed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Json,
    Yaml,
}

impl Format {
    /// Fence info-strings that mark a block as this format.
    pub fn fence_tags(self) -> &'static [&'static str] {
        match self {
            Self::Json => &["json"],
            Self::Yaml => &["yaml", "yml"],
        }
    }

    /// Outer delimiters of a bare payload, if the format has any.
    pub fn outer_delimiters(self) -> Option<(char, char)> {
        match self {
            Self::Json => Some(('{', '}')),
            Self::Yaml => None,
        }
    }

    /// Exact response shape, written in this format, for inclusion in prompts.
    pub fn schema(self) -> &'static str {
        match self {
            Self::Json => JSON_SCHEMA,
            Self::Yaml => YAML_SCHEMA,
        }
    }

    /// Human-readable name used in prompt text ("JSON", "YAML").
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Json => "JSON",
            Self::Yaml => "YAML",
        }
    }
}

const JSON_SCHEMA: &str = r#"{
  "files":[{"path":"string","content":"string"}],
  "notes":"string"
}"#;

const YAML_SCHEMA: &str = r#"files:
  - path: "string"
    content: |
      string
notes: "string""#;

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        };
        f.write_str(s)
    }
}

impl FromStr for Format {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            _ => Err(UnknownFormat(s.to_owned())),
        }
    }
}

/// Returned when a format name is not `json`, `yaml` or `yml`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown manifest format {0:?} (expected json or yaml)")]
pub struct UnknownFormat(pub String);

/// Errors produced while decoding an extracted payload.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("top-level value is {found}, expected a mapping")]
    NotAMapping { found: &'static str },
}

/// A decoded payload whose top level is known to be a mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestDocument(Map<String, Value>);

impl ManifestDocument {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

/// Decode `payload` in the given format.
pub fn parse(payload: &str, format: Format) -> Result<ManifestDocument, ParseError> {
    let value: Value = match format {
        Format::Json => serde_json::from_str(payload)?,
        Format::Yaml => serde_yaml::from_str(payload)?,
    };

    match value {
        Value::Object(map) => Ok(ManifestDocument(map)),
        other => Err(ParseError::NotAMapping {
            found: kind_of(&other),
        }),
    }
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_object() {
        let doc = parse(r#"{"files":[],"notes":"n"}"#, Format::Json).expect("should parse");
        assert!(doc.get("files").is_some());
        assert_eq!(doc.get("notes"), Some(&Value::String("n".into())));
    }

    #[test]
    fn parses_yaml_mapping() {
        let yaml = "files:\n  - path: a.txt\n    content: |\n      hello\nnotes: done\n";
        let doc = parse(yaml, Format::Yaml).expect("should parse");
        let files = doc.get("files").and_then(Value::as_array).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0]["content"], "hello\n");
    }

    #[test]
    fn rejects_malformed_json() {
        let err = parse("this is not json {{{", Format::Json).unwrap_err();
        assert!(matches!(err, ParseError::Json(_)), "got: {err}");
    }

    #[test]
    fn rejects_malformed_yaml() {
        let err = parse("files: [unterminated", Format::Yaml).unwrap_err();
        assert!(matches!(err, ParseError::Yaml(_)), "got: {err}");
    }

    #[test]
    fn rejects_top_level_array() {
        let err = parse(r#"[{"path":"a"}]"#, Format::Json).unwrap_err();
        assert!(
            matches!(err, ParseError::NotAMapping { found: "a sequence" }),
            "got: {err}"
        );
    }

    #[test]
    fn yaml_prose_is_not_a_mapping() {
        let err = parse("Sure! Here are your files.", Format::Yaml).unwrap_err();
        assert!(matches!(err, ParseError::NotAMapping { found: "a string" }));
    }

    #[test]
    fn format_from_str() {
        assert_eq!("json".parse::<Format>().unwrap(), Format::Json);
        assert_eq!("YAML".parse::<Format>().unwrap(), Format::Yaml);
        assert_eq!("yml".parse::<Format>().unwrap(), Format::Yaml);
        assert!("toml".parse::<Format>().is_err());
    }

    #[test]
    fn schemas_parse_in_their_own_format() {
        for format in [Format::Json, Format::Yaml] {
            let doc = parse(format.schema(), format)
                .unwrap_or_else(|e| panic!("{format} schema should parse: {e}"));
            assert!(doc.get("files").is_some());
            assert!(doc.get("notes").is_some());
        }
    }
}
