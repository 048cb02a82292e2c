//! User-Agent selection.
//!
//! Several gazettes serve an error page to unknown clients, so besides the
//! crate's own identifier a run can present itself as a desktop browser.

use std::sync::atomic::{AtomicUsize, Ordering};

pub const USER_AGENT: &str = "lexacquire/0.1 (legal research archive)";

/// Desktop browser identifiers used by `user_agent = "impersonate"`.
pub const BROWSER_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (X11; Linux x86_64; rv:133.0) Gecko/20100101 Firefox/133.0",
];

static NEXT_BROWSER: AtomicUsize = AtomicUsize::new(0);

/// Browser identifiers in turn, one per client built.
fn next_browser_agent() -> &'static str {
    let i = NEXT_BROWSER.fetch_add(1, Ordering::Relaxed);
    BROWSER_USER_AGENTS[i % BROWSER_USER_AGENTS.len()]
}

/// `None` keeps the crate identifier, `"impersonate"` borrows a browser's,
/// anything else is sent as given.
pub fn resolve_user_agent(config: Option<&str>) -> String {
    match config.map(str::trim) {
        None | Some("") => USER_AGENT.to_string(),
        Some("impersonate") => next_browser_agent().to_string(),
        Some(custom) => custom.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_and_blank() {
        assert_eq!(resolve_user_agent(None), USER_AGENT);
        assert_eq!(resolve_user_agent(Some("  ")), USER_AGENT);
    }

    #[test]
    fn test_impersonate_picks_a_browser() {
        let ua = resolve_user_agent(Some("impersonate"));
        assert!(BROWSER_USER_AGENTS.contains(&ua.as_str()));
    }

    #[test]
    fn test_custom_is_kept() {
        assert_eq!(resolve_user_agent(Some("LawBot/2.0")), "LawBot/2.0");
    }
}
