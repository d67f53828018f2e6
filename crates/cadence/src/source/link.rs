//! Parsing of the `Link` pagination header.

/// Pagination information extracted from a `Link` header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkPagination {
    /// The last page number (from `rel="last"`).
    pub last_page: Option<u32>,
    /// The next page number (from `rel="next"`).
    pub next_page: Option<u32>,
}

impl LinkPagination {
    /// Returns the total number of pages if the header advertised one.
    pub fn total_pages(&self) -> Option<u32> {
        self.last_page
    }
}

/// Parse the Link header to extract pagination info.
///
/// GitHub Link headers look like:
/// `<https://api.github.com/repositories/1/events?per_page=100&page=2>; rel="next", <...&page=3>; rel="last"`
pub fn parse_link_header(link_header: &str) -> LinkPagination {
    let mut info = LinkPagination::default();

    for part in link_header.split(',') {
        let mut url = None;
        let mut rel = None;

        for segment in part.split(';').map(str::trim) {
            if let Some(inner) = segment.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
                url = Some(inner);
            } else if let Some(value) = segment.strip_prefix("rel=") {
                rel = Some(value.trim_matches('"'));
            }
        }

        let (Some(url), Some(rel)) = (url, rel) else {
            continue;
        };

        if let Some(page) = page_param(url) {
            match rel {
                "last" => info.last_page = Some(page),
                "next" => info.next_page = Some(page),
                _ => {}
            }
        }
    }

    info
}

/// Extract the `page` query parameter from a URL.
fn page_param(url: &str) -> Option<u32> {
    let (_, query) = url.split_once('?')?;
    query
        .split('&')
        .find_map(|param| param.strip_prefix("page="))
        .and_then(|value| value.parse().ok())
}
