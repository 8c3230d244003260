use url::Url;

use crate::config::ShareConfig;

const SHARE_ENDPOINT: &str = "https://twitter.com/intent/tweet";

/// Pre-filled social-post URL for a finished session. Opened by the client
/// in a secondary window; no response is ever consumed.
pub fn share_url(config: &ShareConfig, score: u32, total: usize, accuracy: u32) -> String {
    let text = format!(
        "I got {score} of {total} clips right ({accuracy}% accuracy)! {}",
        config.hashtag
    );

    let mut params = vec![("text", text)];
    if !config.page_url.is_empty() {
        params.push(("url", config.page_url.clone()));
    }

    Url::parse_with_params(SHARE_ENDPOINT, params)
        .expect("share endpoint URL is valid")
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(page_url: &str) -> ShareConfig {
        ShareConfig {
            page_url: page_url.to_string(),
            hashtag: "#clipquiz".to_string(),
        }
    }

    #[test]
    fn embeds_score_total_and_accuracy() {
        let url = share_url(&config("https://quiz.example.com"), 3, 5, 60);

        assert!(url.starts_with(SHARE_ENDPOINT));
        // Query pairs are form-encoded: spaces become '+'.
        assert!(url.contains("3+of+5"));
        assert!(url.contains("60%25"));
        assert!(url.contains("url=https%3A%2F%2Fquiz.example.com"));
    }

    #[test]
    fn omits_url_parameter_when_no_page_is_configured() {
        let url = share_url(&config(""), 5, 5, 100);
        assert!(!url.contains("url="));
        assert!(url.contains("100%25"));
    }
}
