use std::time::Duration;

pub const USER_AGENT_PREFIX: &str = "opsdeck";

pub fn get_user_agent() -> String {
    format!("{USER_AGENT_PREFIX}/{}", env!("CARGO_PKG_VERSION"))
}

/// Shared HTTP client factory. The cookie store is what carries the backend
/// session cookie across `/login`, `/auth-status` and the run endpoints
/// (requests are made "with credentials").
pub fn create_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(get_user_agent())
        .cookie_store(true)
        .connect_timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_includes_version() {
        let ua = get_user_agent();
        assert!(ua.starts_with("opsdeck/"));
        assert!(ua.len() > "opsdeck/".len());
    }
}
