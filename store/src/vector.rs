//! Vector literal serialization for pgvector parameters.

use crate::error::{Result, StoreError};

/// Serialize an embedding as the bracketed numeric-literal form
/// pgvector accepts, e.g. `[0.1,0.2,0.3]`.
pub fn vector_to_pg(vector: &[f32]) -> String {
    let mut out = String::with_capacity(vector.len() * 10 + 2);
    out.push('[');
    for (i, value) in vector.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&value.to_string());
    }
    out.push(']');
    out
}

/// Parse a pgvector literal back into components.
pub fn parse_pg_vector(text: &str) -> Result<Vec<f32>> {
    let inner = text
        .trim()
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| StoreError::MalformedVector(text.to_string()))?;

    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }

    inner
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f32>()
                .map_err(|_| StoreError::MalformedVector(text.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn round_trips_components() {
        let vector = vec![0.25, -1.5, 3.0];
        let literal = vector_to_pg(&vector);
        assert_eq!(literal, "[0.25,-1.5,3]");
        assert_eq!(parse_pg_vector(&literal).unwrap(), vector);
    }

    #[test]
    fn parses_spaced_literals() {
        assert_eq!(
            parse_pg_vector(" [0.1, 0.2, 0.3] ").unwrap(),
            vec![0.1, 0.2, 0.3]
        );
    }

    #[test]
    fn empty_literal_is_empty_vector() {
        assert_eq!(parse_pg_vector("[]").unwrap(), Vec::<f32>::new());
    }

    #[test]
    fn rejects_unbracketed_and_junk_input() {
        assert!(parse_pg_vector("0.1,0.2").is_err());
        assert!(parse_pg_vector("[0.1,zebra]").is_err());
    }
}
