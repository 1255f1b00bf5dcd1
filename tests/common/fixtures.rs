//! Synthetic job offer service served by wiremock
//!
//! Answers token requests with a fixed token and search requests the way the
//! real service does: 204 when nothing matches, 200 when the requested window
//! holds every match, 206 with a `Content-Range` total otherwise.

use chrono::{DateTime, NaiveDateTime};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// Timestamp format of the search filters
pub const API_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// 2023-01-01T00:00:00Z
pub const JAN_1_2023: i64 = 1_672_531_200;

/// One offer held by the synthetic service
#[derive(Clone, Debug)]
pub struct Offer {
    pub id: String,
    pub created: i64,
}

impl Offer {
    /// Search result entry, with text fields that need cleaning
    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "intitule": "Développeur  Rust (H/F)",
            "description": format!("DÃ©veloppeur\r\n\r\n\r\n*** RÃ©f. {} ***", self.id),
            "dateCreation": format_api(self.created),
            "salaire": { "libelle": "Mensuel de 2500 Euros sur 12 mois" },
        })
    }
}

/// `count` offers, `step` seconds apart from `start`, with ids `{prefix}-{n}`
pub fn spread_offers(prefix: &str, start: i64, step: i64, count: usize) -> Vec<Offer> {
    (0..count)
        .map(|n| Offer {
            id: format!("{prefix}-{n:05}"),
            created: start + n as i64 * step,
        })
        .collect()
}

/// Behaviour knobs of the synthetic service
#[derive(Clone, Copy, Debug)]
pub struct ServiceOptions {
    /// `expires_in` of every issued token
    pub token_validity: u64,
    /// Answer every n-th search request with 429
    pub throttle_every: Option<usize>,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            token_validity: 1499,
            throttle_every: None,
        }
    }
}

/// A search request as received by the service
#[derive(Clone, Debug)]
pub struct SearchRequest {
    pub range: String,
    pub min_creation_date: String,
    pub max_creation_date: String,
    pub authorization: Option<String>,
}

impl SearchRequest {
    /// One-item query used to learn a span's match count
    pub fn is_probe(&self) -> bool {
        self.range == "0-0"
    }
}

pub struct SyntheticService {
    pub server: MockServer,
}

impl SyntheticService {
    pub async fn start(offers: Vec<Offer>) -> Self {
        Self::start_with(offers, ServiceOptions::default()).await
    }

    pub async fn start_with(mut offers: Vec<Offer>, options: ServiceOptions) -> Self {
        offers.sort_by_key(|offer| offer.created);
        let offers = Arc::new(offers);
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "synthetic-token",
                "token_type": "Bearer",
                "expires_in": options.token_validity,
            })))
            .mount(&server)
            .await;

        let searches = Arc::new(AtomicUsize::new(0));
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(move |request: &Request| {
                let n = searches.fetch_add(1, Ordering::SeqCst) + 1;
                if options.throttle_every.is_some_and(|every| n % every == 0) {
                    return ResponseTemplate::new(429);
                }
                search_response(&offers, request)
            })
            .mount(&server)
            .await;

        Self { server }
    }

    /// Search requests in arrival order
    pub async fn search_requests(&self) -> Vec<SearchRequest> {
        let received = self.server.received_requests().await.unwrap_or_default();
        received
            .iter()
            .filter(|request| request.url.path() == "/search")
            .map(|request| SearchRequest {
                range: query_param(request, "range").unwrap_or_default(),
                min_creation_date: query_param(request, "minCreationDate").unwrap_or_default(),
                max_creation_date: query_param(request, "maxCreationDate").unwrap_or_default(),
                authorization: request
                    .headers
                    .get("authorization")
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string),
            })
            .collect()
    }

    /// Number of token requests received
    pub async fn token_requests(&self) -> usize {
        let received = self.server.received_requests().await.unwrap_or_default();
        received
            .iter()
            .filter(|request| request.url.path() == "/token")
            .count()
    }
}

fn search_response(offers: &[Offer], request: &Request) -> ResponseTemplate {
    let (Some(range), Some(min), Some(max)) = (
        query_param(request, "range"),
        query_param(request, "minCreationDate"),
        query_param(request, "maxCreationDate"),
    ) else {
        return ResponseTemplate::new(400).set_body_string("missing search parameter");
    };
    let Some((first, last)) = range
        .split_once('-')
        .and_then(|(a, b)| Some((a.parse::<usize>().ok()?, b.parse::<usize>().ok()?)))
    else {
        return ResponseTemplate::new(400).set_body_string("bad range");
    };
    if last < first || last - first >= 150 {
        return ResponseTemplate::new(400).set_body_string("range wider than 150");
    }
    let (Some(min), Some(max)) = (parse_api(&min), parse_api(&max)) else {
        return ResponseTemplate::new(400).set_body_string("bad creation date");
    };

    let start = offers.partition_point(|offer| offer.created < min);
    let end = offers.partition_point(|offer| offer.created <= max);
    let total = end - start;
    if total == 0 || first >= total {
        return ResponseTemplate::new(204);
    }

    let stop = (last + 1).min(total);
    let results: Vec<Value> = offers[start + first..start + stop]
        .iter()
        .map(Offer::to_json)
        .collect();
    let body = json!({ "resultats": results, "filtresPossibles": [] });
    if first == 0 && stop == total {
        ResponseTemplate::new(200).set_body_json(body)
    } else {
        ResponseTemplate::new(206)
            .insert_header("Content-Range", format!("offres {first}-{}/{total}", stop - 1).as_str())
            .set_body_json(body)
    }
}

fn query_param(request: &Request, name: &str) -> Option<String> {
    request
        .url
        .query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

fn parse_api(value: &str) -> Option<i64> {
    NaiveDateTime::parse_from_str(value, API_FORMAT)
        .ok()
        .map(|naive| naive.and_utc().timestamp())
}

pub fn format_api(seconds: i64) -> String {
    DateTime::from_timestamp(seconds, 0)
        .map(|dt| dt.format(API_FORMAT).to_string())
        .unwrap_or_default()
}
