//! Page accumulation for listing APIs
//!
//! The listing APIs return one page per call together with the total item
//! count and the page size the service actually applied. The page count is
//! derived from the first response and every page is fetched in order.
//!
//! A failed page contributes zero items and is counted in
//! [`Collected::failed_pages`]; it never aborts the listing.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{debug, warn};

/// One page request (1-based page number)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Page number, starting at 1
    pub number: u32,
    /// Requested page size
    pub size: u32,
}

impl PageRequest {
    /// Request for the first page
    pub fn first(size: u32) -> Self {
        Self { number: 1, size }
    }

    /// Request for page `number` with the same size
    pub fn at(self, number: u32) -> Self {
        Self { number, ..self }
    }
}

/// One page of results as returned by a listing API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Items on this page
    pub items: Vec<T>,
    /// Total items across all pages
    pub total_count: u64,
    /// Page number the service answered for
    pub page_number: u32,
    /// Page size the service applied
    pub page_size: u32,
}

/// Result of walking every page of a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collected<T> {
    /// Accumulated items in listing order
    pub items: Vec<T>,
    /// Pages that failed and contributed nothing
    pub failed_pages: u32,
}

impl<T> Collected<T> {
    fn empty_after_failure() -> Self {
        Self {
            items: Vec::new(),
            failed_pages: 1,
        }
    }
}

/// Number of pages needed to list `total` items at `page_size` per page
///
/// Ceiling division: 120 items at 50 per page is 3 pages. A page size of
/// zero is treated as "everything fits on the first page".
pub fn page_count(total: u64, page_size: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    if page_size == 0 {
        return 1;
    }
    let pages = total.div_ceil(u64::from(page_size));
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Fetch and concatenate every page of a listing
///
/// `fetch` is called once per page. The first page determines the total and
/// the effective page size; pages `2..=n` are then fetched in order.
///
/// # Parameters
///
/// - `label`: What is being listed, for logs
/// - `request`: Size of each page; the number is ignored
/// - `fetch`: Single-page fetch
pub async fn collect_pages<T, F, Fut>(
    label: &str,
    request: PageRequest,
    mut fetch: F,
) -> Collected<T>
where
    F: FnMut(PageRequest) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let first_request = request.at(1);
    let first = match fetch(first_request).await {
        Ok(page) => page,
        Err(e) => {
            warn!("Listing {}: page 1 failed, treating as empty: {}", label, e);
            return Collected::empty_after_failure();
        }
    };

    let page_size = if first.page_size > 0 {
        first.page_size
    } else {
        request.size
    };
    let pages = page_count(first.total_count, page_size);

    debug!(
        "Listing {}: {} item(s) over {} page(s) of {}",
        label, first.total_count, pages, page_size
    );

    let mut items = first.items;
    let mut failed_pages = 0;

    for number in 2..=pages {
        match fetch(first_request.at(number)).await {
            Ok(page) => {
                debug!(
                    "Listing {}: page {} returned {} item(s)",
                    label,
                    number,
                    page.items.len()
                );
                items.extend(page.items);
            }
            Err(e) => {
                warn!(
                    "Listing {}: page {}/{} failed, treating as empty: {}",
                    label, number, pages, e
                );
                failed_pages += 1;
            }
        }
    }

    Collected {
        items,
        failed_pages,
    }
}
