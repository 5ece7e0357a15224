use std::{collections::BTreeMap, time::Duration};

use reqwest::blocking::Client as HttpClient;
use serde::Deserialize;

use crate::error::Result;

const API_URL: &str = "https://en.wikipedia.org/w/api.php";
const USER_AGENT: &str =
    concat!("chatbert/", env!("CARGO_PKG_VERSION"), " (passage splitting demo)");

#[derive(Debug, Deserialize)]
struct ApiResponse {
    query: QueryBody,
}

#[derive(Debug, Deserialize)]
struct QueryBody {
    #[serde(default)]
    pages: BTreeMap<String, Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    extract: Option<String>,
}

/// Plain-text extract of a Wikipedia page, empty if the page has none.
pub fn fetch_page(title: &str) -> Result<String> {
    let client = HttpClient::builder()
        .timeout(Duration::from_secs(30))
        .user_agent(USER_AGENT)
        .build()?;

    tracing::debug!(title, "fetching wikipedia page");
    let body = client
        .get(API_URL)
        .query(&[
            ("action", "query"),
            ("format", "json"),
            ("titles", title),
            ("prop", "extracts"),
            ("explaintext", "1"),
        ])
        .send()?
        .error_for_status()?
        .text()?;

    parse_extract(&body)
}

fn parse_extract(body: &str) -> Result<String> {
    let response: ApiResponse = serde_json::from_str(body)?;
    Ok(response
        .query
        .pages
        .into_values()
        .next()
        .and_then(|page| page.extract)
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn takes_first_page_extract() {
        let body = r#"{
            "batchcomplete": "",
            "query": {
                "pages": {
                    "60741": {
                        "pageid": 60741,
                        "ns": 0,
                        "title": "Hayao Miyazaki",
                        "extract": "Hayao Miyazaki is a Japanese animator."
                    }
                }
            }
        }"#;
        assert_eq!(
            parse_extract(body).unwrap(),
            "Hayao Miyazaki is a Japanese animator."
        );
    }

    #[test]
    fn missing_page_has_empty_extract() {
        let body = r#"{"query":{"pages":{"-1":{"ns":0,"title":"Nope","missing":""}}}}"#;
        assert_eq!(parse_extract(body).unwrap(), "");
    }

    #[test]
    fn malformed_body_is_an_error() {
        assert!(parse_extract("<html>").is_err());
    }
}
