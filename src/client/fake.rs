//! In-memory search service for unit tests

use async_trait::async_trait;
use std::sync::Mutex;

use super::{MAX_ITEMS_PER_PAGE, Page, SearchApi, search};
use crate::error::{Error, Result};
use crate::span::Span;

/// One `fetch_page` call as seen by the fake
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Call {
    pub(crate) span: Span,
    pub(crate) page: u32,
    pub(crate) item_count: u32,
}

impl Call {
    pub(crate) fn is_probe(&self) -> bool {
        self.page == 0 && self.item_count == 1
    }
}

/// Serves records with the given creation timestamps, answering like the real service
///
/// Record `i` (in timestamp order) has id `offer-{i}`.
pub(crate) struct FakeSearch {
    timestamps: Vec<i64>,
    fail_pages: bool,
    calls: Mutex<Vec<Call>>,
}

impl FakeSearch {
    pub(crate) fn new(mut timestamps: Vec<i64>) -> Self {
        timestamps.sort_unstable();
        Self {
            timestamps,
            fail_pages: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every non-probe fetch answers with a 500
    pub(crate) fn failing_pages(mut self) -> Self {
        self.fail_pages = true;
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn probes(&self) -> usize {
        self.calls().iter().filter(|c| c.is_probe()).count()
    }

    pub(crate) fn count_in(&self, span: Span) -> usize {
        let (start, end) = self.bounds(span);
        end - start
    }

    fn bounds(&self, span: Span) -> (usize, usize) {
        let start = self.timestamps.partition_point(|&t| t < span.min());
        let end = self.timestamps.partition_point(|&t| t <= span.max());
        (start, end)
    }
}

#[async_trait]
impl SearchApi for FakeSearch {
    async fn fetch_page(&self, span: Span, page: u32, item_count: u32) -> Result<Page> {
        let call = Call {
            span,
            page,
            item_count,
        };
        self.calls.lock().unwrap().push(call);
        search::search_query(span, page, item_count)?;
        if self.fail_pages && !call.is_probe() {
            return Err(Error::UnexpectedStatus { status: 500 });
        }

        let (start, end) = self.bounds(span);
        let total = end - start;
        let first = start + (MAX_ITEMS_PER_PAGE * page) as usize;
        if total == 0 || first >= end {
            return Ok(Page::empty());
        }
        let last = (first + item_count as usize).min(end);
        let results: Vec<String> = (first..last)
            .map(|i| {
                format!(
                    r#"{{"id":"offer-{i}","intitule":"Poste  (H/F)","description":"Mission\r\n\r\n\r\nLieu","dateCreation":{}}}"#,
                    self.timestamps[i]
                )
            })
            .collect();
        let body = format!(r#"{{"resultats":[{}]}}"#, results.join(",")).into_bytes();
        // 200 when the whole match set fits the requested window, 206 otherwise
        let remaining = if page == 0 && total <= item_count as usize {
            0
        } else {
            total as u64
        };
        Ok(Page { body, remaining })
    }

    fn requests(&self) -> u64 {
        self.calls.lock().unwrap().len() as u64
    }
}
