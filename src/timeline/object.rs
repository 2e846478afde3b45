// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Timeline objects and the timing-expression micro-format.
//!
//! A timing field is either a literal number (an offset or an epoch), or a
//! textual reference of the form `#<objectId>.start|.end [+|- <n>]`, or the
//! literal `"1"` meaning "always" for a `while` field. The playout device
//! parses these strings, so their exact spelling is part of the contract.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single timing value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeValue {
    /// Absolute offset or epoch in milliseconds
    Number(i64),
    /// Textual expression referencing another object
    Expr(String),
}

impl TimeValue {
    /// Always-true `while` value
    pub fn always() -> Self {
        TimeValue::Expr("1".to_string())
    }

    /// Reference to the start of another object
    pub fn start_of(id: &str) -> Self {
        TimeValue::Expr(format!("#{}.start", id))
    }

    /// Reference to the end of another object
    pub fn end_of(id: &str) -> Self {
        TimeValue::Expr(format!("#{}.end", id))
    }

    /// Epoch value in milliseconds
    pub fn epoch(millis: u64) -> Self {
        TimeValue::Number(millis as i64)
    }

    /// Shift by `delta` milliseconds.
    ///
    /// Numbers are folded; expressions get a trailing ` + n` / ` - n`
    /// term. A zero delta leaves the value untouched.
    pub fn offset(self, delta: i64) -> Self {
        match self {
            TimeValue::Number(n) => TimeValue::Number(n + delta),
            TimeValue::Expr(expr) => {
                if delta == 0 {
                    TimeValue::Expr(expr)
                } else if delta > 0 {
                    TimeValue::Expr(format!("{} + {}", expr, delta))
                } else {
                    TimeValue::Expr(format!("{} - {}", expr, -delta))
                }
            }
        }
    }

    /// Check if this is literally the number zero
    pub fn is_zero(&self) -> bool {
        matches!(self, TimeValue::Number(0))
    }

    /// Numeric value, if any
    pub fn as_number(&self) -> Option<i64> {
        match self {
            TimeValue::Number(n) => Some(*n),
            TimeValue::Expr(_) => None,
        }
    }
}

impl fmt::Display for TimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeValue::Number(n) => write!(f, "{}", n),
            TimeValue::Expr(expr) => f.write_str(expr),
        }
    }
}

impl From<u64> for TimeValue {
    fn from(value: u64) -> Self {
        TimeValue::Number(value as i64)
    }
}

/// When an object is enabled
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimelineEnable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<TimeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<TimeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<TimeValue>,
    #[serde(rename = "while", default, skip_serializing_if = "Option::is_none")]
    pub while_: Option<TimeValue>,
}

impl TimelineEnable {
    /// Enabled for as long as the parent is
    pub fn always() -> Self {
        Self {
            while_: Some(TimeValue::always()),
            ..Default::default()
        }
    }

    /// Starting at the given value
    pub fn starting(start: TimeValue) -> Self {
        Self {
            start: Some(start),
            ..Default::default()
        }
    }

    /// Builder: set end
    pub fn with_end(mut self, end: TimeValue) -> Self {
        self.end = Some(end);
        self
    }

    /// Builder: set duration
    pub fn with_duration(mut self, duration: TimeValue) -> Self {
        self.duration = Some(duration);
        self
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// A timeline object or group.
///
/// Groups carry children; leaf objects carry a content payload for the
/// playout device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineObject {
    pub id: String,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_group: Option<String>,
    #[serde(default)]
    pub priority: f64,
    #[serde(default)]
    pub layer: String,
    #[serde(default)]
    pub enable: TimelineEnable,
    #[serde(default)]
    pub content: serde_yaml::Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TimelineObject>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_lookahead: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookahead_for_layer: Option<String>,
}

impl TimelineObject {
    /// Create a leaf object on a layer
    pub fn new(id: impl Into<String>, layer: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_group: false,
            in_group: None,
            priority: 0.0,
            layer: layer.into(),
            enable: TimelineEnable::default(),
            content: serde_yaml::Value::Null,
            children: Vec::new(),
            is_lookahead: false,
            lookahead_for_layer: None,
        }
    }

    /// Create a group
    pub fn group(id: impl Into<String>) -> Self {
        Self {
            is_group: true,
            ..Self::new(id, "")
        }
    }

    /// Clone under a new id, keeping everything else
    pub fn rekeyed(&self, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..self.clone()
        }
    }

    /// Builder: set enable
    pub fn with_enable(mut self, enable: TimelineEnable) -> Self {
        self.enable = enable;
        self
    }

    /// Builder: set priority
    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = priority;
        self
    }

    /// Builder: set parent group
    pub fn in_group(mut self, parent: impl Into<String>) -> Self {
        self.in_group = Some(parent.into());
        self
    }

    /// Builder: set content payload
    pub fn with_content(mut self, content: serde_yaml::Value) -> Self {
        self.content = content;
        self
    }

    /// Builder: add child
    pub fn with_child(mut self, child: TimelineObject) -> Self {
        self.children.push(child);
        self
    }

    /// Find an object by id in this subtree
    pub fn find(&self, id: &str) -> Option<&TimelineObject> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_expressions() {
        assert_eq!(TimeValue::start_of("g").to_string(), "#g.start");
        assert_eq!(TimeValue::end_of("g").to_string(), "#g.end");
        assert_eq!(TimeValue::always().to_string(), "1");
    }

    #[test]
    fn test_offset() {
        assert_eq!(TimeValue::start_of("a").offset(10).to_string(), "#a.start + 10");
        assert_eq!(TimeValue::end_of("a").offset(-4).to_string(), "#a.end - 4");
        assert_eq!(TimeValue::end_of("a").offset(0).to_string(), "#a.end");
        assert_eq!(TimeValue::Number(5).offset(3), TimeValue::Number(8));
        assert_eq!(
            TimeValue::end_of("a").offset(-4).offset(-2).to_string(),
            "#a.end - 4 - 2"
        );
    }

    #[test]
    fn test_is_zero() {
        assert!(TimeValue::Number(0).is_zero());
        assert!(!TimeValue::Number(1).is_zero());
        assert!(!TimeValue::Expr("0".into()).is_zero());
    }

    #[test]
    fn test_find_nested() {
        let group = TimelineObject::group("g")
            .with_child(TimelineObject::group("inner").with_child(TimelineObject::new("leaf", "L")));
        assert_eq!(group.find("leaf").map(|o| o.layer.as_str()), Some("L"));
        assert!(group.find("missing").is_none());
    }

    #[test]
    fn test_yaml_field_names() {
        let obj = TimelineObject::group("g")
            .in_group("parent")
            .with_enable(TimelineEnable::always());
        let yaml = serde_yaml::to_string(&obj).unwrap();
        assert!(yaml.contains("isGroup: true"));
        assert!(yaml.contains("inGroup: parent"));
        assert!(yaml.contains("while:"));
        assert!(!yaml.contains("isLookahead"));

        let parsed: TimelineObject = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.enable.while_, Some(TimeValue::always()));
    }
}
