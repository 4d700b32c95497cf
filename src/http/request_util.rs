use std::collections::HashMap;

use futures::future::BoxFuture;
use futures::prelude::*;
use hyper::Body;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::ControllerError;

pub type ControllerFuture = BoxFuture<'static, Result<String, ControllerError>>;

pub async fn read_body(body: Body) -> Result<Vec<u8>, ControllerError> {
    hyper::body::to_bytes(body)
        .await
        .map(|bytes| bytes.to_vec())
        .map_err(|e| ControllerError::UnprocessableEntity(e.into()))
}

pub async fn parse_body<T: DeserializeOwned>(body: Body) -> Result<T, ControllerError> {
    let bytes = read_body(body).await?;
    serde_json::from_slice(&bytes).map_err(|e| ControllerError::UnprocessableEntity(e.into()))
}

/// Runs the service future to completion and serializes its result into the
/// response body.
pub fn serialize_future<T, E, F>(fut: F) -> ControllerFuture
where
    T: Serialize + Send + 'static,
    E: Into<ControllerError> + Send + 'static,
    F: Future<Output = Result<T, E>> + Send + 'static,
{
    Box::pin(async move {
        let value = fut.await.map_err(Into::into)?;
        serde_json::to_string(&value).map_err(|e| ControllerError::InternalServerError(e.into()))
    })
}

/// Splits a query string into decoded key/value pairs.
pub fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.find('=') {
            Some(idx) => (
                percent_decode(&pair[..idx]),
                percent_decode(&pair[idx + 1..]),
            ),
            None => (percent_decode(pair), String::new()),
        })
        .collect()
}

fn percent_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => {
                match (hex_val(bytes.get(i + 1)), hex_val(bytes.get(i + 2))) {
                    (Some(hi), Some(lo)) => {
                        out.push(hi * 16 + lo);
                        i += 3;
                    }
                    _ => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_val(byte: Option<&u8>) -> Option<u8> {
    match byte {
        Some(b @ b'0'..=b'9') => Some(b - b'0'),
        Some(b @ b'a'..=b'f') => Some(b - b'a' + 10),
        Some(b @ b'A'..=b'F') => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_pairs() {
        let parsed = parse_query("state=paid&customer=42");
        assert_eq!(parsed.get("state").map(String::as_str), Some("paid"));
        assert_eq!(parsed.get("customer").map(String::as_str), Some("42"));
    }

    #[test]
    fn decodes_percent_sequences_and_plus() {
        let parsed = parse_query("state=En%20attente&city=Aix+en+Provence");
        assert_eq!(parsed.get("state").map(String::as_str), Some("En attente"));
        assert_eq!(
            parsed.get("city").map(String::as_str),
            Some("Aix en Provence")
        );
    }

    #[test]
    fn decodes_utf8_sequences() {
        let parsed = parse_query("state=Pay%C3%A9");
        assert_eq!(parsed.get("state").map(String::as_str), Some("Payé"));
    }

    #[test]
    fn tolerates_dangling_percent() {
        let parsed = parse_query("q=100%");
        assert_eq!(parsed.get("q").map(String::as_str), Some("100%"));
    }
}
