//! Serde helpers for the column formats PostgREST hands back.
//!
//! Timestamps arrive either with an offset (`timestamptz`) or without one
//! (`timestamp`), genre lists are stored as a comma-separated string, and
//! optional text columns are often empty strings rather than null.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Deserialize an optional string, treating empty strings as None.
pub fn deserialize_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    Ok(s.filter(|s| !s.trim().is_empty()))
}

/// Parses a timestamp with or without offset. Naive values are taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .map(|naive| naive.and_utc())
}

/// `DateTime<Utc>` column accepting both `timestamp` and `timestamptz` text.
pub mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::parse_timestamp(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {s}")))
    }
}

/// Optional variant of [`timestamp`]; empty strings become None.
pub mod optional_timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_str(&dt.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: Option<String> = Option::deserialize(deserializer)?;
        match s {
            Some(s) if !s.trim().is_empty() => super::parse_timestamp(&s)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {s}"))),
            _ => Ok(None),
        }
    }
}

/// `Vec<String>` stored as a comma-separated text column.
pub mod comma_list {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        List(Vec<String>),
    }

    pub fn serialize<S>(value: &[String], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.join(", "))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<Raw> = Option::deserialize(deserializer)?;
        let items = match raw {
            Some(Raw::Text(text)) => text.split(',').map(str::to_string).collect(),
            Some(Raw::List(list)) => list,
            None => Vec::new(),
        };
        Ok(items
            .into_iter()
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};
    use serde::Serialize;

    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    struct TestStruct {
        #[serde(default, deserialize_with = "deserialize_optional_string")]
        string_field: Option<String>,
        #[serde(with = "timestamp")]
        at: DateTime<Utc>,
        #[serde(default, with = "optional_timestamp")]
        maybe_at: Option<DateTime<Utc>>,
        #[serde(default, with = "comma_list")]
        genres: Vec<String>,
    }

    #[test]
    fn test_deserialize_optional_string_empty() {
        let json = r#"{"string_field": "  ", "at": "2024-01-15T10:00:00Z"}"#;
        let result: TestStruct = serde_json::from_str(json).unwrap();
        assert_eq!(result.string_field, None);
    }

    #[test]
    fn test_timestamp_with_offset() {
        let json = r#"{"at": "2024-01-15T10:00:00+02:00"}"#;
        let result: TestStruct = serde_json::from_str(json).unwrap();
        assert_eq!(result.at, Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap());
    }

    #[test]
    fn test_timestamp_postgres_text_form() {
        let parsed = parse_timestamp("2024-01-15 10:30:00+00").unwrap();
        assert_eq!(parsed.hour(), 10);
        assert_eq!(parsed.minute(), 30);
    }

    #[test]
    fn test_timestamp_without_offset_is_utc() {
        let json = r#"{"at": "2024-01-15T10:00:00"}"#;
        let result: TestStruct = serde_json::from_str(json).unwrap();
        assert_eq!(result.at, Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_invalid_timestamp() {
        let json = r#"{"at": "yesterday"}"#;
        assert!(serde_json::from_str::<TestStruct>(json).is_err());
    }

    #[test]
    fn test_optional_timestamp_empty() {
        let json = r#"{"at": "2024-01-15T10:00:00Z", "maybe_at": ""}"#;
        let result: TestStruct = serde_json::from_str(json).unwrap();
        assert_eq!(result.maybe_at, None);
    }

    #[test]
    fn test_comma_list_round_trip() {
        let json = r#"{"at": "2024-01-15T10:00:00Z", "genres": "Acción, Drama,,  Comedia "}"#;
        let result: TestStruct = serde_json::from_str(json).unwrap();
        assert_eq!(result.genres, vec!["Acción", "Drama", "Comedia"]);

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["genres"], "Acción, Drama, Comedia");
    }

    #[test]
    fn test_comma_list_accepts_array_and_null() {
        let json = r#"{"at": "2024-01-15T10:00:00Z", "genres": ["Terror"]}"#;
        let result: TestStruct = serde_json::from_str(json).unwrap();
        assert_eq!(result.genres, vec!["Terror"]);

        let json = r#"{"at": "2024-01-15T10:00:00Z", "genres": null}"#;
        let result: TestStruct = serde_json::from_str(json).unwrap();
        assert!(result.genres.is_empty());
    }
}
