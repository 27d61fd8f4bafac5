//! Schema model and the structural equivalence check

use crate::error::{CompareError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Column type tag as reported by the execution engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    HugeInt,
    UTinyInt,
    USmallInt,
    UInteger,
    UBigInt,
    Float,
    Double,
    Decimal { precision: u8, scale: u8 },
    Varchar,
    Blob,
    Date,
    Time,
    Timestamp(String),
    Interval,
    Uuid,
    List(Box<DataType>),
    Struct(String),
    Map(String),
    Other(String),
}

impl DataType {
    /// Parse an engine type name such as `DOUBLE`, `DECIMAL(18,3)` or `INTEGER[]`
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let upper = trimmed.to_uppercase();

        if let Some(inner) = upper.strip_suffix("[]") {
            return Self::List(Box::new(Self::parse(inner)));
        }
        if let Some(fields) = strip_keyword(trimmed, "STRUCT") {
            return Self::Struct(fields.to_string());
        }
        if let Some(entries) = strip_keyword(trimmed, "MAP") {
            return Self::Map(entries.to_string());
        }
        if let Some(args) = upper
            .strip_prefix("DECIMAL(")
            .or_else(|| upper.strip_prefix("NUMERIC("))
            .and_then(|s| s.strip_suffix(')'))
        {
            let mut parts = args.split(',').map(|p| p.trim().parse::<u8>());
            if let (Some(Ok(precision)), Some(Ok(scale))) = (parts.next(), parts.next()) {
                return Self::Decimal { precision, scale };
            }
        }

        match upper.as_str() {
            "BOOLEAN" | "BOOL" => Self::Boolean,
            "TINYINT" => Self::TinyInt,
            "SMALLINT" => Self::SmallInt,
            "INTEGER" | "INT" => Self::Integer,
            "BIGINT" | "LONG" => Self::BigInt,
            "HUGEINT" => Self::HugeInt,
            "UTINYINT" => Self::UTinyInt,
            "USMALLINT" => Self::USmallInt,
            "UINTEGER" => Self::UInteger,
            "UBIGINT" => Self::UBigInt,
            "FLOAT" | "REAL" => Self::Float,
            "DOUBLE" => Self::Double,
            "DECIMAL" | "NUMERIC" => Self::Decimal {
                precision: 18,
                scale: 3,
            },
            "VARCHAR" | "TEXT" | "STRING" => Self::Varchar,
            "BLOB" => Self::Blob,
            "DATE" => Self::Date,
            "TIME" => Self::Time,
            "INTERVAL" => Self::Interval,
            "UUID" => Self::Uuid,
            s if s.starts_with("TIMESTAMP") => Self::Timestamp(upper),
            _ => Self::Other(trimmed.to_string()),
        }
    }

    /// Types whose values carry a fractional part and are subject to rounding
    pub fn is_fractional(&self) -> bool {
        matches!(self, Self::Float | Self::Double | Self::Decimal { .. })
    }

    pub fn is_nested(&self) -> bool {
        matches!(self, Self::List(_) | Self::Struct(_) | Self::Map(_))
    }

    /// True if this type, or any type nested inside a list, is a map
    pub fn contains_map(&self) -> bool {
        match self {
            Self::Map(_) => true,
            Self::List(inner) => inner.contains_map(),
            Self::Struct(fields) => fields.to_uppercase().contains("MAP("),
            _ => false,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean => write!(f, "BOOLEAN"),
            Self::TinyInt => write!(f, "TINYINT"),
            Self::SmallInt => write!(f, "SMALLINT"),
            Self::Integer => write!(f, "INTEGER"),
            Self::BigInt => write!(f, "BIGINT"),
            Self::HugeInt => write!(f, "HUGEINT"),
            Self::UTinyInt => write!(f, "UTINYINT"),
            Self::USmallInt => write!(f, "USMALLINT"),
            Self::UInteger => write!(f, "UINTEGER"),
            Self::UBigInt => write!(f, "UBIGINT"),
            Self::Float => write!(f, "FLOAT"),
            Self::Double => write!(f, "DOUBLE"),
            Self::Decimal { precision, scale } => write!(f, "DECIMAL({},{})", precision, scale),
            Self::Varchar => write!(f, "VARCHAR"),
            Self::Blob => write!(f, "BLOB"),
            Self::Date => write!(f, "DATE"),
            Self::Time => write!(f, "TIME"),
            Self::Timestamp(raw) => write!(f, "{}", raw),
            Self::Interval => write!(f, "INTERVAL"),
            Self::Uuid => write!(f, "UUID"),
            Self::List(inner) => write!(f, "{}[]", inner),
            Self::Struct(fields) => write!(f, "STRUCT{}", fields),
            Self::Map(entries) => write!(f, "MAP{}", entries),
            Self::Other(raw) => write!(f, "{}", raw),
        }
    }
}

/// A named, typed column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Ordered sequence of columns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Names of the columns that the precision normalizer rounds
    pub fn fractional_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.data_type.is_fractional())
            .map(|c| c.name.clone())
            .collect()
    }

    /// First free name among `base`, `base_1`, `base_2`, ...
    pub fn unique_column_name(&self, base: &str) -> String {
        if !self.contains(base) {
            return base.to_string();
        }
        (1..)
            .map(|i| format!("{}_{}", base, i))
            .find(|candidate| !self.contains(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    /// Tree rendering in the style of a dataframe `printSchema`
    pub fn describe(&self) -> String {
        let mut out = String::from("root\n");
        for column in &self.columns {
            out.push_str(&format!(" |-- {}: {}\n", column.name, column.data_type));
        }
        out
    }
}

/// Fail unless both schemas have the same column names, order and types
pub fn validate_schemas(control: &Schema, target: &Schema) -> Result<()> {
    if control != target {
        return Err(CompareError::SchemaMismatch {
            control: control.clone(),
            target: target.clone(),
        });
    }
    Ok(())
}

/// `STRUCT(a INTEGER)` with keyword `STRUCT` yields `(a INTEGER)`, matching ASCII case-insensitively
fn strip_keyword<'a>(raw: &'a str, keyword: &str) -> Option<&'a str> {
    let head = raw.get(..keyword.len())?;
    let rest = &raw[keyword.len()..];
    (head.eq_ignore_ascii_case(keyword) && rest.starts_with('(')).then_some(rest)
}
