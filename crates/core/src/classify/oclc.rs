//! OCLC Classify API client.
//!
//! Classify answers with XML and a numeric response code:
//! - 0 / 2: single work, recommendations carry the DDC and LCC
//! - 4: several works, each referenced by a work index (`wi`)
//! - 100 / 101: missing or invalid input
//! - 102: nothing found
//! - 200: unexpected server error
//!
//! The client performs no throttling of its own. Every call is expected to go
//! through the lookup adapter, which owns the shared rate limiter.

use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::types::{Candidate, LookupQuery, MatchType};
use super::{ClassificationService, ClassifyError};

/// Classify API client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyConfig {
    /// Endpoint URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// User-Agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Maximum works the service should list in a multi-work response.
    #[serde(default = "default_max_records")]
    pub max_records: u32,
}

fn default_base_url() -> String {
    "http://classify.oclc.org/classify2/Classify".to_string()
}

fn default_user_agent() -> String {
    format!("subjectify/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_records() -> u32 {
    25
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            max_records: default_max_records(),
        }
    }
}

/// Classify API client.
pub struct ClassifyClient {
    client: Client,
    base_url: String,
    max_records: u32,
}

impl ClassifyClient {
    /// Create a new Classify client.
    pub fn new(config: ClassifyConfig) -> Result<Self, ClassifyError> {
        if config.base_url.trim().is_empty() {
            return Err(ClassifyError::NotConfigured(
                "service base_url is empty".to_string(),
            ));
        }

        let client = Client::builder().user_agent(&config.user_agent).build()?;

        Ok(Self {
            client,
            base_url: config.base_url,
            max_records: config.max_records.max(1),
        })
    }

    /// Build the query parameters for a lookup.
    fn build_params(&self, query: &LookupQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("summary", "true".to_string()),
            ("maxRecs", self.max_records.to_string()),
        ];

        match query {
            LookupQuery::Isbn(isbn) => params.push(("isbn", isbn.clone())),
            LookupQuery::Issn(issn) => params.push(("issn", issn.clone())),
            LookupQuery::AuthorTitle { author, title } => {
                params.push(("author", format!("\"{}\"", author)));
                params.push(("title", format!("\"{}\"", title)));
            }
            LookupQuery::Work(wi) => params.push(("wi", wi.clone())),
        }

        params
    }

    async fn get(&self, params: &[(&'static str, String)]) -> Result<String, ClassifyError> {
        let response = self.client.get(&self.base_url).query(params).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status == 429 {
                warn!("Classify rate limit exceeded");
            }
            return Err(ClassifyError::from_status(status.as_u16(), body));
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl ClassificationService for ClassifyClient {
    fn name(&self) -> &str {
        "oclc-classify"
    }

    async fn query(&self, query: &LookupQuery) -> Result<Vec<Candidate>, ClassifyError> {
        debug!("Classify query: {}", query);

        let params = self.build_params(query);
        let body = self.get(&params).await?;
        let candidates = parse_response(&body, query.match_type())?;

        debug!("Classify query {} returned {} candidates", query, candidates.len());
        Ok(candidates)
    }

    async fn probe(&self) -> Result<(), ClassifyError> {
        let params = [("summary", "true".to_string())];
        let body = self.get(&params).await?;

        // A bare request is answered with "no input"; any code proves the
        // service understood us.
        let parsed = ParsedResponse::parse(&body)?;
        match parsed.code {
            Some(code) => {
                debug!("Classify probe answered with code {}", code);
                Ok(())
            }
            None => Err(ClassifyError::ParseError(
                "probe response has no response code".to_string(),
            )),
        }
    }
}

/// A work listed in a multi-work response.
#[derive(Debug, Default)]
struct WorkEntry {
    wi: Option<String>,
    title: Option<String>,
    author: Option<String>,
    holdings: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Ddc,
    Lcc,
}

/// Fields extracted from a Classify XML document.
#[derive(Debug, Default)]
struct ParsedResponse {
    code: Option<u32>,
    ddc: Option<String>,
    lcc: Option<String>,
    work: Option<WorkEntry>,
    works: Vec<WorkEntry>,
}

impl ParsedResponse {
    fn parse(xml: &str) -> Result<Self, ClassifyError> {
        let mut parsed = ParsedResponse::default();
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();

        let mut in_works = false;
        let mut in_single_work = false;
        let mut section: Option<Section> = None;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    match e.local_name().as_ref() {
                        b"works" => in_works = true,
                        b"work" if !in_works => in_single_work = true,
                        b"ddc" => section = Some(Section::Ddc),
                        b"lcc" => section = Some(Section::Lcc),
                        _ => {}
                    }
                    parsed.visit(e, in_works, section);
                }
                Ok(Event::Empty(ref e)) => parsed.visit(e, in_works, section),
                // The single work carries its work index as text content
                Ok(Event::Text(ref t)) if in_single_work => {
                    let text = t.unescape().map_err(|e| {
                        ClassifyError::ParseError(format!("invalid work index: {}", e))
                    })?;
                    let text = text.trim();
                    if let Some(work) = parsed.work.as_mut().filter(|_| !text.is_empty()) {
                        work.wi = Some(text.to_string());
                    }
                }
                Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                    b"works" => in_works = false,
                    b"work" => in_single_work = false,
                    b"ddc" | b"lcc" => section = None,
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(ClassifyError::ParseError(format!(
                        "malformed XML at position {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
                _ => {}
            }
            buf.clear();
        }

        Ok(parsed)
    }

    fn visit(&mut self, e: &BytesStart<'_>, in_works: bool, section: Option<Section>) {
        match e.local_name().as_ref() {
            b"response" => {
                self.code = attr_value(e, b"code").and_then(|c| c.trim().parse().ok());
            }
            b"work" => {
                let entry = WorkEntry {
                    wi: attr_value(e, b"wi"),
                    title: attr_value(e, b"title"),
                    author: attr_value(e, b"author"),
                    holdings: attr_value(e, b"holdings")
                        .and_then(|h| h.trim().parse().ok())
                        .unwrap_or(0),
                };
                if in_works {
                    self.works.push(entry);
                } else if self.work.is_none() {
                    self.work = Some(entry);
                }
            }
            b"mostPopular" => {
                let value = attr_value(e, b"nsfa").or_else(|| attr_value(e, b"sfa"));
                let slot = match section {
                    Some(Section::Ddc) => &mut self.ddc,
                    Some(Section::Lcc) => &mut self.lcc,
                    None => return,
                };
                if slot.is_none() {
                    *slot = value;
                }
            }
            _ => {}
        }
    }
}

fn attr_value(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == name)
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
        .filter(|v| !v.trim().is_empty())
}

/// Turn a Classify XML document into candidates.
///
/// Single-work responses yield one classified candidate with score 1.0.
/// Multi-work responses yield one unclassified candidate per work, carrying
/// its work id and its share of the total holdings as score.
pub(crate) fn parse_response(
    xml: &str,
    match_type: MatchType,
) -> Result<Vec<Candidate>, ClassifyError> {
    let parsed = ParsedResponse::parse(xml)?;

    let code = parsed
        .code
        .ok_or_else(|| ClassifyError::ParseError("missing response code".to_string()))?;

    match code {
        0 | 2 => {
            let work = parsed.work.unwrap_or_default();
            let mut candidate = Candidate::new(
                parsed.ddc.as_deref(),
                parsed.lcc.as_deref(),
                1.0,
                match_type,
            );
            candidate.work_id = work.wi;
            candidate.title = work.title;
            candidate.author = work.author;
            Ok(vec![candidate])
        }
        4 => {
            let works: Vec<WorkEntry> = parsed.works.into_iter().filter(|w| w.wi.is_some()).collect();
            let total: u64 = works.iter().map(|w| w.holdings).sum();
            let count = works.len();

            Ok(works
                .into_iter()
                .map(|w| {
                    let score = if total > 0 {
                        w.holdings as f64 / total as f64
                    } else {
                        1.0 / count as f64
                    };
                    Candidate {
                        ddc: None,
                        lcc: None,
                        score,
                        match_type,
                        work_id: w.wi,
                        title: w.title,
                        author: w.author,
                    }
                })
                .collect())
        }
        102 => Ok(Vec::new()),
        100 => Err(ClassifyError::InvalidInput("no input".to_string())),
        101 => Err(ClassifyError::InvalidInput(
            "invalid standard number".to_string(),
        )),
        200 => Err(ClassifyError::ServiceError {
            status: 200,
            message: "unexpected error reported by service".to_string(),
        }),
        other => Err(ClassifyError::ParseError(format!(
            "unexpected response code {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SINGLE_WORK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<classify xmlns="http://classify.oclc.org">
  <response code="0"/>
  <work author="Dickens, Charles" editions="2500" format="Book" holdings="16000" owi="1234" title="Great expectations">1234567</work>
  <recommendations>
    <ddc>
      <mostPopular holdings="9000" nsfa="823.8" sfa="823.8"/>
      <mostPopular holdings="10" nsfa="823.89" sfa="823.89"/>
    </ddc>
    <lcc>
      <mostPopular holdings="8000" nsfa="PR4560" sfa="PR4560.A1"/>
    </lcc>
  </recommendations>
</classify>"#;

    const MULTI_WORK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<classify xmlns="http://classify.oclc.org">
  <response code="4"/>
  <works>
    <work author="Dickens, Charles" holdings="300" title="Great expectations" wi="111"/>
    <work author="Dickens, Charles" holdings="100" title="Great expectations (abridged)" wi="222"/>
    <work author="Anon" holdings="50" title="No work index"/>
  </works>
</classify>"#;

    fn response_with_code(code: u32) -> String {
        format!(
            r#"<classify xmlns="http://classify.oclc.org"><response code="{}"/></classify>"#,
            code
        )
    }

    #[test]
    fn test_parse_single_work() {
        let candidates = parse_response(SINGLE_WORK, MatchType::Identifier).unwrap();
        assert_eq!(candidates.len(), 1);

        let c = &candidates[0];
        assert_eq!(c.ddc.as_deref(), Some("823.8"));
        assert_eq!(c.lcc.as_deref(), Some("PR4560"));
        assert_eq!(c.score, 1.0);
        assert_eq!(c.match_type, MatchType::Identifier);
        assert_eq!(c.title.as_deref(), Some("Great expectations"));
        // The text content, not the owi attribute
        assert_eq!(c.work_id.as_deref(), Some("1234567"));
    }

    #[test]
    fn test_parse_single_work_without_work_index() {
        let xml = r#"<classify xmlns="http://classify.oclc.org">
  <response code="2"/>
  <work owi="99" title="Emma"/>
  <recommendations><ddc><mostPopular nsfa="823.7"/></ddc></recommendations>
</classify>"#;
        let candidates = parse_response(xml, MatchType::Identifier).unwrap();
        assert_eq!(candidates[0].ddc.as_deref(), Some("823.7"));
        assert!(candidates[0].work_id.is_none());
    }

    #[test]
    fn test_parse_multi_work_scores_by_holdings_share() {
        let candidates = parse_response(MULTI_WORK, MatchType::Heuristic).unwrap();
        // The work without a work index cannot be followed up.
        assert_eq!(candidates.len(), 2);

        assert_eq!(candidates[0].work_id.as_deref(), Some("111"));
        assert!((candidates[0].score - 0.75).abs() < 1e-9);
        assert!((candidates[1].score - 0.25).abs() < 1e-9);
        assert!(candidates.iter().all(|c| c.needs_detail()));
        assert!(candidates
            .iter()
            .all(|c| c.match_type == MatchType::Heuristic));
    }

    #[test]
    fn test_parse_not_found_is_empty() {
        let candidates = parse_response(&response_with_code(102), MatchType::Identifier).unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_parse_invalid_input_is_not_retryable() {
        for code in [100, 101] {
            let err = parse_response(&response_with_code(code), MatchType::Identifier).unwrap_err();
            assert!(matches!(err, ClassifyError::InvalidInput(_)));
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn test_parse_unexpected_error_is_retryable() {
        let err = parse_response(&response_with_code(200), MatchType::Identifier).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_parse_malformed_xml() {
        let err = parse_response("<classify><response code=", MatchType::Identifier).unwrap_err();
        assert!(matches!(err, ClassifyError::ParseError(_)));

        let err = parse_response("<classify/>", MatchType::Identifier).unwrap_err();
        assert!(matches!(err, ClassifyError::ParseError(_)));
    }

    #[test]
    fn test_build_params() {
        let client = ClassifyClient::new(ClassifyConfig::default()).unwrap();

        let params = client.build_params(&LookupQuery::Isbn("9780140449266".to_string()));
        assert!(params.contains(&("isbn", "9780140449266".to_string())));
        assert!(params.contains(&("summary", "true".to_string())));

        let params = client.build_params(&LookupQuery::AuthorTitle {
            author: "Dickens, Charles".to_string(),
            title: "Great Expectations".to_string(),
        });
        assert!(params.contains(&("author", "\"Dickens, Charles\"".to_string())));
        assert!(params.contains(&("title", "\"Great Expectations\"".to_string())));
    }

    #[test]
    fn test_new_rejects_empty_base_url() {
        let config = ClassifyConfig {
            base_url: " ".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            ClassifyClient::new(config),
            Err(ClassifyError::NotConfigured(_))
        ));
    }
}
