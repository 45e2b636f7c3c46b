pub const DEFAULT_BASE_URL: &str = "https://ads-serve.brave.com";

#[derive(Clone, Debug)]
pub struct Config {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 60,
        }
    }
}

impl Config {
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}
