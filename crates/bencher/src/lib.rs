/// A header list benchmarked as one HPACK block.
#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    fields: &'static [(&'static str, &'static str)],
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, fields: &'static [(&'static str, &'static str)]) -> Self {
        Self { name, group, fields }
    }

    pub fn small(name: &'static str, fields: &'static [(&'static str, &'static str)]) -> Self {
        Self::new(name, TestGroup::Small, fields)
    }

    pub fn normal(name: &'static str, fields: &'static [(&'static str, &'static str)]) -> Self {
        Self::new(name, TestGroup::Normal, fields)
    }

    pub fn large(name: &'static str, fields: &'static [(&'static str, &'static str)]) -> Self {
        Self::new(name, TestGroup::Large, fields)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn fields(&self) -> &'static [(&'static str, &'static str)] {
        self.fields
    }

    /// Octets of the uncompressed header list, names and values only.
    pub fn plain_len(&self) -> usize {
        self.fields.iter().map(|(name, value)| name.len() + value.len()).sum()
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Small,
    Normal,
    Large,
}

pub static SMALL_REQUEST: &[(&str, &str)] =
    &[(":method", "GET"), (":scheme", "https"), (":authority", "localhost"), (":path", "/")];

pub static BROWSER_REQUEST: &[(&str, &str)] = &[
    (":method", "GET"),
    (":scheme", "https"),
    (":authority", "www.example.com"),
    (":path", "/assets/css/site.min.css?v=2024.10.18"),
    ("user-agent", "Mozilla/5.0 (X11; Linux x86_64; rv:131.0) Gecko/20100101 Firefox/131.0"),
    ("accept", "text/css,*/*;q=0.1"),
    ("accept-language", "en-US,en;q=0.5"),
    ("accept-encoding", "gzip, deflate, br, zstd"),
    ("referer", "https://www.example.com/blog/2024/10/http2-header-compression"),
    ("cookie", "session=8f14e45fceea167a5a36dedd4bea2543; theme=dark; consent=analytics%3Dfalse%26ads%3Dfalse"),
    ("sec-fetch-dest", "style"),
    ("sec-fetch-mode", "no-cors"),
    ("sec-fetch-site", "same-origin"),
    ("priority", "u=2"),
    ("te", "trailers"),
];

pub static API_RESPONSE: &[(&str, &str)] = &[
    (":status", "200"),
    ("content-type", "application/json"),
    ("content-length", "1432"),
    ("cache-control", "private, max-age=0, must-revalidate"),
    ("date", "Sat, 18 Oct 2026 10:15:00 GMT"),
    ("etag", "\"5d8c72a5edda8d6a\""),
    ("vary", "accept-encoding"),
    ("x-request-id", "b0c3a6e2-7d4f-4b8e-9b1a-3f5e2d7c9a10"),
];
