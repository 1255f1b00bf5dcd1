//! Search request parameters and response interpretation

use reqwest::StatusCode;
use reqwest::header::{CONTENT_RANGE, HeaderMap};

use super::{MAX_ITEMS_PER_PAGE, MAX_PAGES, Page};
use crate::error::{Error, Result};
use crate::span::Span;

/// Sort indicator sent with every search (by creation date)
const SORT_BY_CREATION_DATE: &str = "1";

/// Query string for one page of results within `span`
pub(crate) fn search_query(
    span: Span,
    page: u32,
    item_count: u32,
) -> Result<Vec<(&'static str, String)>> {
    if page >= MAX_PAGES {
        return Err(Error::Integrity(format!(
            "page index {page} beyond the {MAX_PAGES} pages a query can reach"
        )));
    }
    if item_count == 0 || item_count > MAX_ITEMS_PER_PAGE {
        return Err(Error::Integrity(format!(
            "item count {item_count} outside 1..={MAX_ITEMS_PER_PAGE}"
        )));
    }
    let first = MAX_ITEMS_PER_PAGE * page;
    let last = first + item_count - 1;
    Ok(vec![
        ("range", format!("{first}-{last}")),
        ("sort", SORT_BY_CREATION_DATE.to_string()),
        ("minCreationDate", span.api_min()),
        ("maxCreationDate", span.api_max()),
    ])
}

/// Total match count from a `Content-Range: first-last/total` header
pub(crate) fn parse_total(headers: &HeaderMap) -> Result<u64> {
    let value = headers
        .get(CONTENT_RANGE)
        .ok_or_else(|| Error::InvalidResponse("partial content without Content-Range".into()))?
        .to_str()
        .map_err(|e| Error::InvalidResponse(format!("unreadable Content-Range: {e}")))?;
    let (_, total) = value
        .rsplit_once('/')
        .ok_or_else(|| Error::InvalidResponse(format!("Content-Range without total: {value:?}")))?;
    total
        .trim()
        .parse()
        .map_err(|e| Error::InvalidResponse(format!("Content-Range total {total:?}: {e}")))
}

/// How a search response status is handled
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// 204: no match at all
    Empty,
    /// 200: every match fits in this page
    Complete,
    /// 206: more matches exist; total is in the headers
    Partial,
}

pub(crate) fn classify(status: StatusCode) -> Result<Outcome> {
    match status {
        StatusCode::NO_CONTENT => Ok(Outcome::Empty),
        StatusCode::OK => Ok(Outcome::Complete),
        StatusCode::PARTIAL_CONTENT => Ok(Outcome::Partial),
        StatusCode::TOO_MANY_REQUESTS => Err(Error::RateLimited),
        other => Err(Error::UnexpectedStatus {
            status: other.as_u16(),
        }),
    }
}

impl Page {
    pub(crate) fn empty() -> Self {
        Self {
            body: Vec::new(),
            remaining: 0,
        }
    }
}
