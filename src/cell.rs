use polars::prelude::{DataType, NamedFrom, PlSmallStr, Series};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tokens read as a missing value when loading a CSV file.
pub const NULL_TOKENS: [&str; 10] = [
    "", "NA", "N/A", "n/a", "NaN", "nan", "null", "NULL", "None", "<NA>",
];

/// A single typed value of a table cell
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum CellValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Null,
}

/// Inferred scalar type of a column
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum DType {
    Int,
    Float,
    Bool,
    Str,
}

impl DType {
    /// The label shown in summaries, matching the usual dataframe names.
    pub fn label(&self) -> &'static str {
        match self {
            DType::Int => "int64",
            DType::Float => "float64",
            DType::Bool => "bool",
            DType::Str => "object",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, DType::Int | DType::Float)
    }

    /// Infer the type of a column from its raw text fields.
    ///
    /// Nulls are ignored. A column of nothing but nulls is `Float`. Numeric
    /// types are those the whole column casts to without losing a value.
    pub fn infer<'a>(fields: impl IntoIterator<Item = &'a str>) -> DType {
        let present: Vec<&str> = fields
            .into_iter()
            .filter(|f| !is_null_token(f))
            .map(str::trim)
            .collect();

        if present.is_empty() {
            return DType::Float;
        }
        if present.iter().all(|f| parse_bool(f).is_some()) {
            return DType::Bool;
        }
        let raw = Series::new(PlSmallStr::EMPTY, present);
        if raw.strict_cast(&DataType::Int64).is_ok() {
            DType::Int
        } else if raw.strict_cast(&DataType::Float64).is_ok() {
            DType::Float
        } else {
            DType::Str
        }
    }

    /// Infer the type of a column from already typed values.
    ///
    /// Integers mixed with floats widen to `Float`; any other mix is `Str`.
    pub fn from_values<'a>(values: impl IntoIterator<Item = &'a CellValue>) -> DType {
        let mut current: Option<DType> = None;
        for value in values {
            let dtype = match value {
                CellValue::Null => continue,
                CellValue::Int(_) => DType::Int,
                CellValue::Float(_) => DType::Float,
                CellValue::Bool(_) => DType::Bool,
                CellValue::Str(_) => DType::Str,
            };
            current = Some(match (current, dtype) {
                (None, d) => d,
                (Some(a), b) if a == b => a,
                (Some(DType::Int), DType::Float) | (Some(DType::Float), DType::Int) => {
                    DType::Float
                }
                _ => return DType::Str,
            });
        }
        current.unwrap_or(DType::Float)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub fn is_null_token(field: &str) -> bool {
    NULL_TOKENS.contains(&field.trim())
}

/// Case-insensitive `true` / `false`.
pub fn parse_bool(text: &str) -> Option<bool> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("true") {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

impl CellValue {
    /// Parse a raw CSV field into a value of the column's type.
    ///
    /// Used on load, where the type was inferred from the same fields and
    /// therefore always fits.
    pub fn from_field(field: &str, dtype: DType) -> CellValue {
        if is_null_token(field) {
            return CellValue::Null;
        }
        let trimmed = field.trim();
        match dtype {
            DType::Int => trimmed
                .parse()
                .map(CellValue::Int)
                .unwrap_or_else(|_| CellValue::Str(field.to_string())),
            DType::Float => trimmed
                .parse()
                .map(CellValue::Float)
                .unwrap_or_else(|_| CellValue::Str(field.to_string())),
            DType::Bool => parse_bool(trimmed)
                .map(CellValue::Bool)
                .unwrap_or_else(|| CellValue::Str(field.to_string())),
            DType::Str => CellValue::Str(field.to_string()),
        }
    }

    /// Parse user text opportunistically: boolean, integer, float, then the
    /// literal string.
    pub fn guess(text: &str) -> CellValue {
        let trimmed = text.trim();
        if let Some(b) = parse_bool(trimmed) {
            CellValue::Bool(b)
        } else if let Ok(i) = trimmed.parse::<i64>() {
            CellValue::Int(i)
        } else if let Ok(f) = trimmed.parse::<f64>() {
            CellValue::Float(f)
        } else {
            CellValue::Str(text.to_string())
        }
    }

    /// Coerce user text to a value of `dtype`, or `None` when the text does not
    /// fit. Integer columns accept float literals; the caller decides whether to
    /// widen the column.
    pub fn coerce(text: &str, dtype: DType) -> Option<CellValue> {
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
            return Some(CellValue::Null);
        }
        match dtype {
            DType::Int => trimmed
                .parse::<i64>()
                .map(CellValue::Int)
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().map(CellValue::Float)),
            DType::Float => trimmed.parse::<f64>().ok().map(CellValue::Float),
            DType::Bool => parse_bool(trimmed).map(CellValue::Bool),
            DType::Str => Some(CellValue::Str(text.to_string())),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Numeric view of the value; booleans and strings are not numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Int(i) => Some(*i as f64),
            CellValue::Float(f) if !f.is_nan() => Some(*f),
            _ => None,
        }
    }

    /// Equality used by value replacement: integers and floats compare
    /// numerically, everything else structurally. Null never matches.
    pub fn matches(&self, other: &CellValue) -> bool {
        match (self, other) {
            (CellValue::Int(a), CellValue::Float(b)) | (CellValue::Float(b), CellValue::Int(a)) => {
                (*a as f64) == *b
            }
            (CellValue::Null, _) | (_, CellValue::Null) => false,
            (a, b) => a == b,
        }
    }

    /// Text written back to CSV. Nulls are empty fields.
    pub fn to_field(&self) -> String {
        match self {
            CellValue::Int(i) => i.to_string(),
            CellValue::Float(f) => {
                if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
                    format!("{:.1}", f)
                } else {
                    f.to_string()
                }
            }
            CellValue::Bool(b) => if *b { "True" } else { "False" }.to_string(),
            CellValue::Str(s) => s.clone(),
            CellValue::Null => String::new(),
        }
    }

    /// Text shown in the table view.
    pub fn display(&self) -> String {
        match self {
            CellValue::Float(f) if f.is_finite() => {
                let text = format!("{:.4}", f);
                let text = text.trim_end_matches('0');
                if text.ends_with('.') {
                    format!("{}0", text)
                } else {
                    text.to_string()
                }
            }
            other => other.to_field(),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_column_types() {
        assert_eq!(DType::infer(["1", "2", ""]), DType::Int);
        assert_eq!(DType::infer(["1", "2.5"]), DType::Float);
        assert_eq!(DType::infer(["True", "false", "NA"]), DType::Bool);
        assert_eq!(DType::infer(["1", "x"]), DType::Str);
        assert_eq!(DType::infer(["", "nan"]), DType::Float);
    }

    #[test]
    fn guess_prefers_bool_then_int_then_float() {
        assert_eq!(CellValue::guess("TRUE"), CellValue::Bool(true));
        assert_eq!(CellValue::guess("3"), CellValue::Int(3));
        assert_eq!(CellValue::guess("3.5"), CellValue::Float(3.5));
        assert_eq!(CellValue::guess("abc"), CellValue::Str("abc".into()));
    }

    #[test]
    fn coerce_rejects_text_in_numeric_columns() {
        assert_eq!(CellValue::coerce("abc", DType::Float), None);
        assert_eq!(CellValue::coerce("abc", DType::Int), None);
        assert_eq!(CellValue::coerce("2.5", DType::Int), Some(CellValue::Float(2.5)));
        assert_eq!(CellValue::coerce("False", DType::Bool), Some(CellValue::Bool(false)));
        assert_eq!(CellValue::coerce("maybe", DType::Bool), None);
        assert_eq!(CellValue::coerce("", DType::Int), Some(CellValue::Null));
    }

    #[test]
    fn numeric_match_crosses_int_and_float() {
        assert!(CellValue::Int(2).matches(&CellValue::Float(2.0)));
        assert!(!CellValue::Null.matches(&CellValue::Null));
        assert!(!CellValue::Str("2".into()).matches(&CellValue::Int(2)));
    }

    #[test]
    fn display_trims_float_noise() {
        assert_eq!(CellValue::Float(2.0).display(), "2.0");
        assert_eq!(CellValue::Float(1.23456).display(), "1.2346");
        assert_eq!(CellValue::Float(0.5).display(), "0.5");
        assert_eq!(CellValue::Bool(true).display(), "True");
        assert_eq!(CellValue::Null.display(), "");
    }
}
