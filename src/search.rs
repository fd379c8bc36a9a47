use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::header::USER_AGENT;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::agent::Tool;

pub const DUCKDUCKGO_API_URL: &str = "https://api.duckduckgo.com";
const DEFAULT_MAX_RESULTS: usize = 5;

/// Web search over the DuckDuckGo Instant Answer API.
pub struct DuckDuckGo {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub title: String,
    pub href: String,
    pub body: String,
}

#[derive(Debug, Default, Deserialize)]
struct InstantAnswer {
    #[serde(rename = "Heading", default)]
    heading: String,
    #[serde(rename = "AbstractText", default)]
    abstract_text: String,
    #[serde(rename = "AbstractURL", default)]
    abstract_url: String,
    #[serde(rename = "Answer", default)]
    answer: Value,
    #[serde(rename = "Results", default)]
    results: Vec<Topic>,
    #[serde(rename = "RelatedTopics", default)]
    related_topics: Vec<RelatedTopic>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RelatedTopic {
    Group {
        #[serde(rename = "Topics")]
        topics: Vec<Topic>,
    },
    Single(Topic),
}

#[derive(Debug, Deserialize)]
struct Topic {
    #[serde(rename = "Text", default)]
    text: String,
    #[serde(rename = "FirstURL", default)]
    first_url: String,
}

impl Topic {
    fn into_result(self) -> Option<SearchResult> {
        if self.text.is_empty() {
            return None;
        }
        let title = self
            .text
            .split_once(" - ")
            .map(|(title, _)| title.to_string())
            .unwrap_or_else(|| self.text.clone());
        Some(SearchResult {
            title,
            href: self.first_url,
            body: self.text,
        })
    }
}

impl InstantAnswer {
    fn into_results(self, max_results: usize) -> Vec<SearchResult> {
        let mut results = Vec::new();

        if !self.abstract_text.is_empty() {
            results.push(SearchResult {
                title: self.heading.clone(),
                href: self.abstract_url,
                body: self.abstract_text,
            });
        }

        // Answer is a string for most queries but an object for some widgets.
        if let Some(answer) = self.answer.as_str().filter(|a| !a.is_empty()) {
            results.push(SearchResult {
                title: self.heading,
                href: String::new(),
                body: answer.to_string(),
            });
        }

        let topics = self
            .related_topics
            .into_iter()
            .flat_map(|related| match related {
                RelatedTopic::Group { topics } => topics,
                RelatedTopic::Single(topic) => vec![topic],
            });

        results.extend(
            self.results
                .into_iter()
                .chain(topics)
                .filter_map(Topic::into_result),
        );
        results.truncate(max_results);
        results
    }
}

impl DuckDuckGo {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DUCKDUCKGO_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        debug!("Searching DuckDuckGo for {:?}", query);

        let response = self
            .http
            .get(format!("{}/", self.base_url))
            .header(USER_AGENT, concat!("video_summarizer/", env!("CARGO_PKG_VERSION")))
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(anyhow!("DuckDuckGo error ({}): {}", status, error_text));
        }

        // The API answers with a javascript content type, so parse the text.
        let body = response.text().await?;
        let answer: InstantAnswer = serde_json::from_str(&body)?;
        Ok(answer.into_results(max_results))
    }
}

impl Default for DuckDuckGo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for DuckDuckGo {
    fn name(&self) -> &str {
        "duckduckgo_search"
    }

    fn description(&self) -> &str {
        "Search the web with DuckDuckGo. Returns titles, links and snippets for the query."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "The query to search for." },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of results to return (default 5)."
                }
            },
            "required": ["query"]
        })
    }

    async fn call(&self, args: Value) -> Result<Value> {
        let query = args["query"]
            .as_str()
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| anyhow!("missing 'query' argument"))?;
        let max_results = args["max_results"]
            .as_u64()
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_MAX_RESULTS);

        let results = self.search(query, max_results).await?;
        Ok(serde_json::to_value(results)?)
    }
}
