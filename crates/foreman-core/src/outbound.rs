//! Outbound publishing for the COO pipeline: email via Resend, posts via the
//! Twitter v2 API.

use crate::error::{ForemanError, Result};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

pub const RESEND_API_KEY_ENV: &str = "RESEND_API_KEY";
pub const RESEND_FROM_ENV: &str = "RESEND_FROM";
pub const TWITTER_TOKEN_ENV: &str = "TWITTER_ACCESS_TOKEN";

#[derive(Debug, Clone)]
pub struct OutgoingEmail<'a> {
    pub to: &'a str,
    pub subject: &'a str,
    pub body: &'a str,
}

pub trait Outbound {
    /// Send one email; returns the provider's message id.
    fn send_email(&self, email: &OutgoingEmail<'_>) -> Result<String>;
    /// Publish one post; returns the provider's post id.
    fn post_tweet(&self, text: &str) -> Result<String>;
}

// ---------------------------------------------------------------------------
// HttpOutbound
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct HttpOutbound {
    pub resend_url: String,
    pub resend_api_key: Option<String>,
    pub from: Option<String>,
    pub twitter_url: String,
    pub twitter_token: Option<String>,
}

#[derive(Deserialize)]
struct ResendResponse {
    id: String,
}

#[derive(Deserialize)]
struct TweetResponse {
    data: TweetData,
}

#[derive(Deserialize)]
struct TweetData {
    id: String,
}

impl HttpOutbound {
    /// Credentials from the environment; `default_from` is used when
    /// `RESEND_FROM` is unset.
    pub fn from_env(default_from: Option<String>) -> Self {
        let var = |k: &str| std::env::var(k).ok().filter(|v| !v.trim().is_empty());
        Self {
            resend_url: "https://api.resend.com".to_string(),
            resend_api_key: var(RESEND_API_KEY_ENV),
            from: var(RESEND_FROM_ENV).or(default_from),
            twitter_url: "https://api.twitter.com".to_string(),
            twitter_token: var(TWITTER_TOKEN_ENV),
        }
    }

    fn client() -> Result<reqwest::blocking::Client> {
        Ok(reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()?)
    }
}

fn check(resp: reqwest::blocking::Response, what: &str) -> Result<reqwest::blocking::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    Err(ForemanError::Http(format!("{what} returned {status}: {}", body.trim())))
}

impl Outbound for HttpOutbound {
    fn send_email(&self, email: &OutgoingEmail<'_>) -> Result<String> {
        let key = self
            .resend_api_key
            .as_deref()
            .ok_or_else(|| ForemanError::MissingEnv(RESEND_API_KEY_ENV.into()))?;
        let from = self
            .from
            .as_deref()
            .ok_or_else(|| ForemanError::MissingEnv(RESEND_FROM_ENV.into()))?;
        let resp = Self::client()?
            .post(format!("{}/emails", self.resend_url.trim_end_matches('/')))
            .bearer_auth(key)
            .json(&json!({
                "from": from,
                "to": [email.to],
                "subject": email.subject,
                "text": email.body,
            }))
            .send()?;
        let parsed: ResendResponse = check(resp, "resend")?.json()?;
        tracing::info!(to = email.to, id = %parsed.id, "email sent");
        Ok(parsed.id)
    }

    fn post_tweet(&self, text: &str) -> Result<String> {
        let token = self
            .twitter_token
            .as_deref()
            .ok_or_else(|| ForemanError::MissingEnv(TWITTER_TOKEN_ENV.into()))?;
        let resp = Self::client()?
            .post(format!("{}/2/tweets", self.twitter_url.trim_end_matches('/')))
            .bearer_auth(token)
            .json(&json!({ "text": text }))
            .send()?;
        let parsed: TweetResponse = check(resp, "twitter")?.json()?;
        tracing::info!(id = %parsed.data.id, "tweet posted");
        Ok(parsed.data.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn outbound(url: &str) -> HttpOutbound {
        HttpOutbound {
            resend_url: url.to_string(),
            resend_api_key: Some("re_test".into()),
            from: Some("ops@example.com".into()),
            twitter_url: url.to_string(),
            twitter_token: Some("tw_test".into()),
        }
    }

    #[test]
    fn resend_request_shape() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/emails")
            .match_header("authorization", "Bearer re_test")
            .match_body(Matcher::Json(json!({
                "from": "ops@example.com",
                "to": ["ana@acme.io"],
                "subject": "Hello",
                "text": "Hi Ana",
            })))
            .with_status(200)
            .with_body(r#"{"id":"em_1"}"#)
            .create();
        let id = outbound(&server.url())
            .send_email(&OutgoingEmail { to: "ana@acme.io", subject: "Hello", body: "Hi Ana" })
            .unwrap();
        assert_eq!(id, "em_1");
        mock.assert();
    }

    #[test]
    fn tweet_request_shape() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/2/tweets")
            .match_header("authorization", "Bearer tw_test")
            .match_body(Matcher::Json(json!({ "text": "shipping today" })))
            .with_status(201)
            .with_body(r#"{"data":{"id":"123","text":"shipping today"}}"#)
            .create();
        let id = outbound(&server.url()).post_tweet("shipping today").unwrap();
        assert_eq!(id, "123");
        mock.assert();
    }

    #[test]
    fn provider_error_carries_status() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", "/emails")
            .with_status(422)
            .with_body(r#"{"message":"invalid to"}"#)
            .create();
        let err = outbound(&server.url())
            .send_email(&OutgoingEmail { to: "x", subject: "s", body: "b" })
            .unwrap_err();
        assert!(matches!(err, ForemanError::Http(ref m) if m.contains("422") && m.contains("invalid to")));
    }

    #[test]
    fn missing_credentials_fail_before_network() {
        let mut ob = outbound("http://127.0.0.1:9");
        ob.twitter_token = None;
        assert!(matches!(
            ob.post_tweet("hi"),
            Err(ForemanError::MissingEnv(ref k)) if k == TWITTER_TOKEN_ENV
        ));
    }
}
