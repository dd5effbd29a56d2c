//! Conversion between delimited name strings and ordered name lists.
//!
//! Parameter names, function names and gradient expressions can all be given
//! either as one delimited string (`"x; y; z"`) or as an explicit list. The
//! functions here convert between the two forms and generate default names
//! such as `x0, x1, ...`.
//!
//! # Example
//!
//! ```
//! use scriptfn::names::{format_names, parse_names};
//!
//! let names = parse_names(" x ;; y; z ", ";", true).unwrap().unwrap();
//! assert_eq!(names, vec!["x", "y", "z"]);
//!
//! let text = format_names(&names, ";", true, false).unwrap().unwrap();
//! assert_eq!(text, "x; y; z");
//! ```

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

/// Splits `text` on `separator` and returns the non-empty tokens.
///
/// Tokens are trimmed first when `trim_whitespace` is set. Returns `Ok(None)`
/// if no non-empty token remains; malformed text never fails. The only error is
/// an empty separator.
pub fn parse_names(
    text: &str,
    separator: &str,
    trim_whitespace: bool,
) -> Result<Option<Vec<String>>, ValidationError> {
    if separator.is_empty() {
        return Err(ValidationError::EmptySeparator);
    }
    Ok(split_tokens(text, separator, trim_whitespace))
}

/// Joins `names` with `separator`, optionally followed by a space and/or a newline.
///
/// Returns `Ok(None)` for an empty list.
pub fn format_names<S: AsRef<str>>(
    names: &[S],
    separator: &str,
    space_after_separator: bool,
    newline_after_separator: bool,
) -> Result<Option<String>, ValidationError> {
    if separator.is_empty() {
        return Err(ValidationError::EmptySeparator);
    }
    Ok(join_tokens(
        names,
        separator,
        space_after_separator,
        newline_after_separator,
    ))
}

fn split_tokens(text: &str, separator: &str, trim_whitespace: bool) -> Option<Vec<String>> {
    let names: Vec<String> = text
        .split(separator)
        .map(|token| if trim_whitespace { token.trim() } else { token })
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect();
    (!names.is_empty()).then_some(names)
}

fn join_tokens<S: AsRef<str>>(
    names: &[S],
    separator: &str,
    space_after_separator: bool,
    newline_after_separator: bool,
) -> Option<String> {
    if names.is_empty() {
        return None;
    }
    let mut glue = separator.to_string();
    if newline_after_separator {
        glue.push('\n');
    } else if space_after_separator {
        glue.push(' ');
    }
    Some(names.iter().map(AsRef::as_ref).join(&glue))
}

/// Returns `base` followed by `start_index + index` zero-padded to `width` digits.
///
/// ```
/// # use scriptfn::names::generated_name;
/// assert_eq!(generated_name(1, "x", 0, 2), "x01");
/// assert_eq!(generated_name(3, "f", 1, 1), "f4");
/// ```
pub fn generated_name(index: usize, base: &str, start_index: usize, width: usize) -> String {
    format!("{base}{:0width$}", start_index + index)
}

/// Validated settings for the string form of a name list.
///
/// The separator is guaranteed to be non-empty, so [`parse`](Self::parse) and
/// [`format`](Self::format) cannot fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawNameListFormat", into = "RawNameListFormat")]
pub struct NameListFormat {
    separator: String,
    trim_whitespace: bool,
    space_after_separator: bool,
    newline_after_separator: bool,
}

impl NameListFormat {
    /// Creates a format with `separator`, trimming on parse and a space after
    /// each separator when formatting.
    ///
    /// # Errors
    /// Returns `ValidationError::EmptySeparator` if `separator` is empty.
    pub fn new(separator: impl Into<String>) -> Result<Self, ValidationError> {
        let separator = separator.into();
        if separator.is_empty() {
            return Err(ValidationError::EmptySeparator);
        }
        Ok(Self {
            separator,
            trim_whitespace: true,
            space_after_separator: true,
            newline_after_separator: false,
        })
    }

    /// Whether parsed tokens are trimmed before empty ones are dropped.
    pub fn with_trim_whitespace(mut self, trim: bool) -> Self {
        self.trim_whitespace = trim;
        self
    }

    /// Whether formatting inserts a space after each separator.
    pub fn with_space_after_separator(mut self, space: bool) -> Self {
        self.space_after_separator = space;
        self
    }

    /// Whether formatting inserts a newline after each separator.
    pub fn with_newline_after_separator(mut self, newline: bool) -> Self {
        self.newline_after_separator = newline;
        self
    }

    /// The separator, never empty.
    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Splits `text` into names, `None` if no non-empty token remains.
    ///
    /// See [`parse_names`].
    pub fn parse(&self, text: &str) -> Option<Vec<String>> {
        split_tokens(text, &self.separator, self.trim_whitespace)
    }

    /// Joins `names` into one string, `None` if `names` is empty.
    ///
    /// See [`format_names`].
    pub fn format<S: AsRef<str>>(&self, names: &[S]) -> Option<String> {
        join_tokens(
            names,
            &self.separator,
            self.space_after_separator,
            self.newline_after_separator,
        )
    }
}

impl Default for NameListFormat {
    fn default() -> Self {
        Self {
            separator: ";".to_string(),
            trim_whitespace: true,
            space_after_separator: true,
            newline_after_separator: false,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(default)]
struct RawNameListFormat {
    separator: String,
    trim_whitespace: bool,
    space_after_separator: bool,
    newline_after_separator: bool,
}

impl Default for RawNameListFormat {
    fn default() -> Self {
        NameListFormat::default().into()
    }
}

impl TryFrom<RawNameListFormat> for NameListFormat {
    type Error = ValidationError;

    fn try_from(raw: RawNameListFormat) -> Result<Self, Self::Error> {
        Ok(Self::new(raw.separator)?
            .with_trim_whitespace(raw.trim_whitespace)
            .with_space_after_separator(raw.space_after_separator)
            .with_newline_after_separator(raw.newline_after_separator))
    }
}

impl From<NameListFormat> for RawNameListFormat {
    fn from(format: NameListFormat) -> Self {
        Self {
            separator: format.separator,
            trim_whitespace: format.trim_whitespace,
            space_after_separator: format.space_after_separator,
            newline_after_separator: format.newline_after_separator,
        }
    }
}

/// How default names are generated for unnamed parameters or functions.
///
/// With `width: None` the width is the number of digits of the largest
/// generated index, so two names give `x0, x1` and twelve give `x00 .. x11`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConvention {
    pub base: String,
    pub start_index: usize,
    pub width: Option<usize>,
}

impl NamingConvention {
    /// Names `base0, base1, ...` with a width fitted to the count.
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            start_index: 0,
            width: None,
        }
    }

    /// Default parameter names: `x0, x1, ...`
    pub fn parameters() -> Self {
        Self::new("x")
    }

    /// Default function names: `f0, f1, ...`
    pub fn functions() -> Self {
        Self::new("f")
    }

    fn width_for(&self, count: usize) -> usize {
        self.width.unwrap_or_else(|| {
            let largest = self.start_index + count.saturating_sub(1);
            largest.to_string().len()
        })
    }

    /// Generates `count` default names.
    pub fn generate(&self, count: usize) -> Vec<String> {
        self.fill(count, &[])
    }

    /// Generates `count` names, keeping non-empty entries of `existing` at
    /// matching indices.
    pub fn fill(&self, count: usize, existing: &[String]) -> Vec<String> {
        let width = self.width_for(count);
        (0..count)
            .map(|i| match existing.get(i) {
                Some(name) if !name.trim().is_empty() => name.clone(),
                _ => generated_name(i, &self.base, self.start_index, width),
            })
            .collect()
    }
}

impl Default for NamingConvention {
    fn default() -> Self {
        Self::parameters()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_drops_empty_tokens() {
        let names = parse_names("a;; b ;  ;c", ";", true).unwrap();
        assert_eq!(names, Some(vec!["a".into(), "b".into(), "c".into()]));
    }

    #[test]
    fn test_parse_without_trim_keeps_whitespace() {
        let names = parse_names("a; b", ";", false).unwrap();
        assert_eq!(names, Some(vec!["a".into(), " b".into()]));
    }

    #[test]
    fn test_parse_blank_is_none() {
        assert_eq!(parse_names("  ; ;", ";", true).unwrap(), None);
        assert_eq!(parse_names("", ";", true).unwrap(), None);
    }

    #[test]
    fn test_empty_separator_is_rejected() {
        assert_eq!(
            parse_names("a", "", true),
            Err(ValidationError::EmptySeparator)
        );
        assert_eq!(
            format_names(&["a"], "", false, false),
            Err(ValidationError::EmptySeparator)
        );
        assert!(NameListFormat::new("").is_err());
    }

    #[test]
    fn test_format_spacing() {
        let names = ["x", "y"];
        assert_eq!(format_names(&names, ",", false, false).unwrap().unwrap(), "x,y");
        assert_eq!(format_names(&names, ",", true, false).unwrap().unwrap(), "x, y");
        assert_eq!(format_names(&names, ",", true, true).unwrap().unwrap(), "x,\ny");
        assert_eq!(format_names::<&str>(&[], ",", true, true).unwrap(), None);
    }

    #[test]
    fn test_round_trip() {
        let format = NameListFormat::default();
        for names in [
            vec!["x"],
            vec!["alpha", "beta", "gamma"],
            vec!["sin(x)*y", "2*x + 1"],
        ] {
            let text = format.format(&names).unwrap();
            assert_eq!(format.parse(&text).unwrap(), names);
        }

        let multiline = NameListFormat::new("|").unwrap().with_newline_after_separator(true);
        let text = multiline.format(&["a", "b"]).unwrap();
        assert_eq!(text, "a|\nb");
        assert_eq!(multiline.parse(&text).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_generated_name() {
        assert_eq!(generated_name(0, "x", 0, 2), "x00");
        assert_eq!(generated_name(1, "x", 0, 2), "x01");
        assert_eq!(generated_name(0, "p", 1, 0), "p1");
        assert_eq!(generated_name(11, "x", 0, 1), "x11");
    }

    #[test]
    fn test_convention_width() {
        assert_eq!(NamingConvention::parameters().generate(2), vec!["x0", "x1"]);
        let twelve = NamingConvention::functions().generate(12);
        assert_eq!(twelve[0], "f00");
        assert_eq!(twelve[11], "f11");

        let fixed = NamingConvention {
            base: "p".into(),
            start_index: 1,
            width: Some(3),
        };
        assert_eq!(fixed.generate(2), vec!["p001", "p002"]);
        assert!(fixed.generate(0).is_empty());
    }

    #[test]
    fn test_fill_keeps_existing() {
        let existing = vec!["a".to_string(), " ".to_string()];
        let names = NamingConvention::parameters().fill(3, &existing);
        assert_eq!(names, vec!["a", "x1", "x2"]);
    }

    #[test]
    fn test_format_deserialization_validates() {
        let format: NameListFormat =
            serde_json::from_str(r#"{"separator": ",", "space_after_separator": false}"#).unwrap();
        assert_eq!(format.separator(), ",");
        assert_eq!(format.format(&["a", "b"]).unwrap(), "a,b");

        let err = serde_json::from_str::<NameListFormat>(r#"{"separator": ""}"#);
        assert!(err.is_err());
    }
}
