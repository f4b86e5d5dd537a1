//! Paginated listing.

use std::future::Future;

/// Page size and continuation token for a list call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub page_size: Option<u32>,
    pub page_token: Option<String>,
}

impl PageRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    pub fn page_token(mut self, token: impl Into<String>) -> Self {
        self.page_token = Some(token.into());
        self
    }

    pub(crate) fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(size) = self.page_size {
            query.push(("pageSize", size.to_string()));
        }
        if let Some(token) = self.page_token.as_deref().filter(|t| !t.is_empty()) {
            query.push(("pageToken", token.to_string()));
        }
        query
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_page_token: Option<String>) -> Self {
        // The API sends "" on the last page.
        let next_page_token = next_page_token.filter(|t| !t.is_empty());
        Self {
            items,
            next_page_token,
        }
    }

    pub fn has_next(&self) -> bool {
        self.next_page_token.is_some()
    }

    /// Request for the page after this one, keeping the page size.
    pub fn next_request(&self, previous: &PageRequest) -> Option<PageRequest> {
        self.next_page_token.as_ref().map(|token| PageRequest {
            page_size: previous.page_size,
            page_token: Some(token.clone()),
        })
    }
}

/// Follow page tokens until the listing is exhausted or `max` items are held.
pub async fn collect_all<T, E, F, Fut>(
    mut fetch: F,
    first: PageRequest,
    max: Option<usize>,
) -> Result<Vec<T>, E>
where
    F: FnMut(PageRequest) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    let mut items = Vec::new();
    let mut request = Some(first);

    while let Some(current) = request.take() {
        let page = fetch(current.clone()).await?;
        request = page.next_request(&current);
        items.extend(page.items);

        if let Some(max) = max {
            if items.len() >= max {
                items.truncate(max);
                break;
            }
        }
    }

    Ok(items)
}
