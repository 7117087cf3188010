//! Semantic type tags and the schema descriptor derived from a cleaned table.
//!
//! The descriptor is a pure function of the table's column storage: it never
//! looks at raw input and never coerces, so it can be regenerated at any time
//! from a persisted [`CanonicalTable`].

use std::{fmt, str::FromStr};

use anyhow::anyhow;
use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{self, MapAccess, Visitor},
};

use crate::table::{CanonicalTable, ColumnData};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    Integer,
    Float,
    DateTime,
    Boolean,
    String,
}

impl SemanticType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticType::Integer => "integer",
            SemanticType::Float => "float",
            SemanticType::DateTime => "datetime",
            SemanticType::Boolean => "boolean",
            SemanticType::String => "string",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &["integer", "float", "datetime", "boolean", "string"]
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SemanticType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "integer" | "int" => Ok(SemanticType::Integer),
            "float" | "double" => Ok(SemanticType::Float),
            "datetime" | "timestamp" => Ok(SemanticType::DateTime),
            "boolean" | "bool" => Ok(SemanticType::Boolean),
            "string" => Ok(SemanticType::String),
            _ => Err(anyhow!(
                "Unknown semantic type '{value}'. Supported types: {}",
                SemanticType::variants().join(", ")
            )),
        }
    }
}

/// Ordered mapping from column identifier to semantic type. Serializes as a
/// plain map, e.g. `{"name": "string", "val": "integer"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDescriptor {
    entries: Vec<(String, SemanticType)>,
}

impl SchemaDescriptor {
    pub fn get(&self, column: &str) -> Option<SemanticType> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, ty)| *ty)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, SemanticType)> {
        self.entries.iter().map(|(name, ty)| (name.as_str(), *ty))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, name: String, ty: SemanticType) {
        if let Some(existing) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            existing.1 = ty;
        } else {
            self.entries.push((name, ty));
        }
    }
}

impl FromIterator<(String, SemanticType)> for SchemaDescriptor {
    fn from_iter<I: IntoIterator<Item = (String, SemanticType)>>(iter: I) -> Self {
        let mut schema = SchemaDescriptor::default();
        for (name, ty) in iter {
            schema.push(name, ty);
        }
        schema
    }
}

impl Serialize for SchemaDescriptor {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(self.entries.iter().map(|(name, ty)| (name, ty)))
    }
}

impl<'de> Deserialize<'de> for SchemaDescriptor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DescriptorVisitor;

        impl<'de> Visitor<'de> for DescriptorVisitor {
            type Value = SchemaDescriptor;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of column identifiers to semantic types")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut schema = SchemaDescriptor::default();
                while let Some((name, token)) = map.next_entry::<String, String>()? {
                    let ty = SemanticType::from_str(&token).map_err(de::Error::custom)?;
                    schema.push(name, ty);
                }
                Ok(schema)
            }
        }

        deserializer.deserialize_map(DescriptorVisitor)
    }
}

/// Reads the type of every column from its storage variant.
pub fn detect_schema(table: &CanonicalTable) -> SchemaDescriptor {
    table
        .columns()
        .iter()
        .map(|column| {
            let ty = match &column.data {
                ColumnData::Integer(_) => SemanticType::Integer,
                ColumnData::Float(_) => SemanticType::Float,
                ColumnData::DateTime(_) => SemanticType::DateTime,
                ColumnData::Boolean(_) => SemanticType::Boolean,
                ColumnData::String(_) => SemanticType::String,
            };
            (column.name.clone(), ty)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;

    fn table() -> CanonicalTable {
        CanonicalTable::new(vec![
            Column::new("qty", ColumnData::Integer(vec![Some(1)])),
            Column::new("price", ColumnData::Float(vec![Some(1.5)])),
            Column::new("flag", ColumnData::Boolean(vec![None])),
            Column::new("label", ColumnData::String(vec!["x".into()])),
            Column::new("at", ColumnData::DateTime(vec![None])),
        ])
        .unwrap()
    }

    #[test]
    fn detect_schema_maps_each_storage_type() {
        let schema = detect_schema(&table());
        let pairs: Vec<_> = schema.iter().map(|(n, t)| (n.to_string(), t)).collect();
        assert_eq!(
            pairs,
            vec![
                ("qty".to_string(), SemanticType::Integer),
                ("price".to_string(), SemanticType::Float),
                ("flag".to_string(), SemanticType::Boolean),
                ("label".to_string(), SemanticType::String),
                ("at".to_string(), SemanticType::DateTime),
            ]
        );
    }

    #[test]
    fn descriptor_serializes_as_ordered_map() {
        let schema = detect_schema(&table());
        let json = serde_json::to_string(&schema).unwrap();
        assert_eq!(
            json,
            r#"{"qty":"integer","price":"float","flag":"boolean","label":"string","at":"datetime"}"#
        );
        let back: SchemaDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, schema);
    }

    #[test]
    fn unknown_type_token_is_rejected() {
        assert!(serde_json::from_str::<SchemaDescriptor>(r#"{"a":"decimal"}"#).is_err());
        assert_eq!(
            SemanticType::from_str(" Timestamp ").unwrap(),
            SemanticType::DateTime
        );
    }
}
