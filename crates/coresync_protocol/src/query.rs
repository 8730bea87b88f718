//! Pull query: filter parameters for a remote listing.

/// Query parameter name carrying the page token.
pub const PAGE_PARAM: &str = "page";

/// Query parameter name carrying the page size.
pub const PAGE_SIZE_PARAM: &str = "page_size";

/// Filters and paging hints for one pull.
///
/// A query is built once per pull and reused for every page; only the
/// page token varies between requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullQuery {
    filters: Vec<(String, String)>,
    page_size: Option<u32>,
}

impl PullQuery {
    /// Creates an empty query: no filters, server-default page size.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a filter parameter.
    #[must_use]
    pub fn with_filter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((name.into(), value.into()));
        self
    }

    /// Requests a specific page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// The filter parameters, in the order they were added.
    pub fn filters(&self) -> &[(String, String)] {
        &self.filters
    }

    /// The requested page size, when one was set.
    pub fn page_size(&self) -> Option<u32> {
        self.page_size
    }

    /// Renders the full parameter list for one page request.
    pub fn query_params(&self, page_token: Option<&str>) -> Vec<(String, String)> {
        let mut params = self.filters.clone();
        if let Some(size) = self.page_size {
            params.push((PAGE_SIZE_PARAM.to_string(), size.to_string()));
        }
        if let Some(token) = page_token {
            params.push((PAGE_PARAM.to_string(), token.to_string()));
        }
        params
    }
}
