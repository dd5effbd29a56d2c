//! Flat, null-safe records of controller state.
//!
//! Every optional field carries an explicit `is_null` flag so that "not set"
//! and "set to an empty value" survive a round trip through formats that
//! cannot tell them apart. Lists are always stored in array form.

use serde::{Deserialize, Serialize};

/// Optional text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NullableText {
    pub is_null: bool,
    #[serde(default)]
    pub value: String,
}

impl NullableText {
    pub fn null() -> Self {
        Self {
            is_null: true,
            value: String::new(),
        }
    }

    /// `None` becomes null; `Some("")` stays an empty, non-null value.
    pub fn from_option(value: Option<&str>) -> Self {
        match value {
            Some(value) => Self {
                is_null: false,
                value: value.to_string(),
            },
            None => Self::null(),
        }
    }

    /// Inverse of [`from_option`](Self::from_option).
    pub fn into_option(self) -> Option<String> {
        (!self.is_null).then_some(self.value)
    }
}

impl Default for NullableText {
    fn default() -> Self {
        Self::null()
    }
}

/// Optional list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NullableList {
    pub is_null: bool,
    #[serde(default)]
    pub items: Vec<String>,
}

impl NullableList {
    pub fn null() -> Self {
        Self {
            is_null: true,
            items: Vec::new(),
        }
    }

    /// `None` becomes null; an empty slice stays an empty, non-null list.
    pub fn from_option(items: Option<&[String]>) -> Self {
        match items {
            Some(items) => Self {
                is_null: false,
                items: items.to_vec(),
            },
            None => Self::null(),
        }
    }

    /// Inverse of [`from_option`](Self::from_option).
    pub fn into_option(self) -> Option<Vec<String>> {
        (!self.is_null).then_some(self.items)
    }
}

impl Default for NullableList {
    fn default() -> Self {
        Self::null()
    }
}

/// State of a [`ScalarFunctionController`](crate::ScalarFunctionController).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalarFunctionState {
    pub dimension: usize,
    pub name: NullableText,
    pub description: NullableText,
    pub parameter_names: NullableList,
    pub value_expression: NullableText,
    pub gradient_expressions: NullableList,
}

impl Default for ScalarFunctionState {
    fn default() -> Self {
        Self {
            dimension: 1,
            name: NullableText::null(),
            description: NullableText::null(),
            parameter_names: NullableList::null(),
            value_expression: NullableText::null(),
            gradient_expressions: NullableList::null(),
        }
    }
}

/// One slot of a vector function; `function` is ignored when `is_null` is set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementState {
    pub is_null: bool,
    pub function: ScalarFunctionState,
}

impl ElementState {
    pub fn null() -> Self {
        Self {
            is_null: true,
            function: ScalarFunctionState::default(),
        }
    }
}

/// State of a [`VectorFunctionController`](crate::VectorFunctionController).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorFunctionState {
    pub num_parameters: usize,
    pub num_values: usize,
    pub name: NullableText,
    pub description: NullableText,
    pub parameter_names: NullableList,
    pub function_names: NullableList,
    pub elements: Vec<ElementState>,
}

impl Default for VectorFunctionState {
    fn default() -> Self {
        Self {
            num_parameters: 1,
            num_values: 1,
            name: NullableText::null(),
            description: NullableText::null(),
            parameter_names: NullableList::null(),
            function_names: NullableList::null(),
            elements: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_is_distinct_from_empty() {
        let empty = NullableText::from_option(Some(""));
        let null = NullableText::from_option(None);
        assert_ne!(empty, null);
        assert_eq!(empty.into_option(), Some(String::new()));
        assert_eq!(null.into_option(), None);

        let empty = NullableList::from_option(Some(&[][..]));
        assert_eq!(empty.into_option(), Some(vec![]));
        assert_eq!(NullableList::null().into_option(), None);
    }

    #[test]
    fn test_json_shape() {
        let state = ScalarFunctionState {
            dimension: 2,
            value_expression: NullableText::from_option(Some("x+y")),
            ..Default::default()
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["dimension"], 2);
        assert_eq!(json["value_expression"]["is_null"], false);
        assert_eq!(json["value_expression"]["value"], "x+y");
        assert_eq!(json["name"]["is_null"], true);
        assert_eq!(json["gradient_expressions"]["items"], serde_json::json!([]));
    }

    #[test]
    fn test_missing_fields_default_to_null() {
        let state: VectorFunctionState =
            serde_json::from_str(r#"{ "num_parameters": 3, "num_values": 2 }"#).unwrap();
        assert_eq!(state.num_parameters, 3);
        assert!(state.parameter_names.is_null);
        assert!(state.elements.is_empty());
    }
}
