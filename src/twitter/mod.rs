//! Twitter API v2 source: tweets, liked tweets and owned lists.
//!
//! Listings are token paginated and never report a total. Tweets arrive
//! complete in the listing, so fetching the detail of a listed tweet costs no
//! request.

use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use std::fmt;
use tracing::debug;

use crate::config;
use crate::error::{self, Result, SyncError};
use crate::model::{NewRecord, Service};
use crate::source::{CollectionInfo, Listing, OwnerKey, Page, PageCursor, Source};

pub mod convert;
pub mod model;

use convert::{with_authors, AuthoredTweet};
use model::{ApiProblem, ListResp, OwnedListsResp, TweetListResp, TweetResp, UserResp};

const TWITTER_API_BASE: &str = "https://api.twitter.com/2/";

pub const MAX_PAGE_SIZE: u32 = 100;
/// liked_tweets rejects `max_results` below 10.
const MIN_PAGE_SIZE: u32 = 10;

const TWEET_FIELDS: &str = "created_at,author_id,lang,conversation_id,public_metrics";
const USER_FIELDS: &str = "username,name,description,location,url,profile_image_url";

#[derive(Clone)]
pub struct TwitterClient {
    http: Client,
    base_url: Url,
    bearer_token: String,
}

impl fmt::Debug for TwitterClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwitterClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl TwitterClient {
    pub fn new(bearer_token: String) -> Result<Self> {
        let base_url = Url::parse(TWITTER_API_BASE).expect("valid default Twitter URL");
        Self::with_base_url(bearer_token, base_url)
    }

    pub fn with_base_url(bearer_token: String, base_url: Url) -> Result<Self> {
        if base_url.cannot_be_a_base() {
            return Err(SyncError::InvalidInput(format!(
                "twitter base_url is not a base: {base_url}"
            )));
        }
        let http = Client::builder()
            .user_agent(concat!("syncr/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url,
            bearer_token,
        })
    }

    pub fn from_config(cfg: &config::Twitter) -> Result<Self> {
        match cfg.base_url.as_deref() {
            Some(raw) => {
                let base_url = Url::parse(raw)
                    .map_err(|e| SyncError::InvalidInput(format!("twitter base_url: {e}")))?;
                Self::with_base_url(cfg.bearer_token.clone(), base_url)
            }
            None => Self::new(cfg.bearer_token.clone()),
        }
    }

    /// GET `{base}/{segments...}?{params}` with the bearer token. Segments
    /// are percent-encoded individually.
    pub fn build_request(&self, segments: &[&str], params: &[(&str, String)]) -> Result<reqwest::Request> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::InvalidInput("twitter base_url is not a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(self
            .http
            .get(url)
            .bearer_auth(&self.bearer_token)
            .query(params)
            .build()?)
    }

    async fn call<T: DeserializeOwned>(&self, segments: &[&str], params: &[(&str, String)]) -> Result<T> {
        let request = self.build_request(segments, params)?;
        let context = segments.join("/");
        debug!(url = %request.url(), "twitter request");
        let res = self.http.execute(request).await?;
        let status = res.status();
        let body = res.text().await?;
        if !status.is_success() {
            return Err(error::from_status(status, &context, &body));
        }
        serde_json::from_str(&body)
            .map_err(|e| SyncError::api(format!("{context}: malformed response: {e}")))
    }

    fn tweet_params(per_page: Option<u32>, token: Option<&str>) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("tweet.fields", TWEET_FIELDS.to_string()),
            ("expansions", "author_id".to_string()),
            ("user.fields", USER_FIELDS.to_string()),
        ];
        if let Some(n) = per_page {
            params.push(("max_results", n.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE).to_string()));
        }
        if let Some(token) = token {
            params.push(("pagination_token", token.to_string()));
        }
        params
    }
}

/// Turn the `errors` array of a response without data into an error.
fn problem(context: &str, errors: &[ApiProblem]) -> SyncError {
    match errors.first() {
        Some(p) if p.is_not_found() => SyncError::not_found(format!("{context}: {}", p.detail)),
        Some(p) => SyncError::api(format!("{context}: {}: {}", p.title, p.detail)),
        None => SyncError::api(format!("{context}: empty response")),
    }
}

#[async_trait]
impl Source for TwitterClient {
    type Summary = AuthoredTweet;
    type Detail = AuthoredTweet;

    fn service(&self) -> Service {
        Service::Twitter
    }

    fn max_page_size(&self) -> u32 {
        MAX_PAGE_SIZE
    }

    fn summary_id<'a>(&self, summary: &'a AuthoredTweet) -> &'a str {
        &summary.tweet.id
    }

    async fn resolve_owner(&self, handle: &str) -> Result<OwnerKey> {
        let resp: UserResp = self.call(&["users", "by", "username", handle], &[]).await?;
        let user = resp
            .data
            .ok_or_else(|| problem(&format!("user {handle}"), &resp.errors))?;
        Ok(OwnerKey {
            handle: handle.to_string(),
            key: user.id,
        })
    }

    async fn list_page(
        &self,
        listing: &Listing,
        cursor: &PageCursor,
        per_page: u32,
    ) -> Result<Page<AuthoredTweet>> {
        let mut params = Self::tweet_params(Some(per_page), cursor.token.as_deref());
        let resp: TweetListResp = match listing {
            Listing::Owner(owner) => self.call(&["users", owner.key.as_str(), "tweets"], &params).await?,
            Listing::OwnerSince(owner, since) => {
                params.push((
                    "start_time",
                    since.to_rfc3339_opts(SecondsFormat::Secs, true),
                ));
                self.call(&["users", owner.key.as_str(), "tweets"], &params).await?
            }
            Listing::Favorites(owner) => {
                self.call(&["users", owner.key.as_str(), "liked_tweets"], &params)
                    .await?
            }
            Listing::Collection(id) => self.call(&["lists", id.as_str(), "tweets"], &params).await?,
        };
        if resp.data.is_empty() && !resp.errors.is_empty() {
            return Err(problem("listing", &resp.errors));
        }
        Ok(Page {
            items: with_authors(resp.data, &resp.includes),
            total: None,
            next_token: resp.meta.next_token,
        })
    }

    async fn fetch_detail(&self, summary: &AuthoredTweet) -> Result<AuthoredTweet> {
        Ok(summary.clone())
    }

    async fn fetch_detail_by_id(&self, remote_id: &str) -> Result<AuthoredTweet> {
        let resp: TweetResp = self
            .call(&["tweets", remote_id], &Self::tweet_params(None, None))
            .await?;
        let tweet = resp
            .data
            .ok_or_else(|| problem(&format!("tweet {remote_id}"), &resp.errors))?;
        Ok(with_authors(vec![tweet], &resp.includes)
            .pop()
            .unwrap_or_default())
    }

    fn map(&self, detail: &AuthoredTweet) -> NewRecord {
        convert::tweet_record(detail)
    }

    async fn collection(&self, collection_id: &str) -> Result<CollectionInfo> {
        let params = [
            ("list.fields", "owner_id,description".to_string()),
            ("expansions", "owner_id".to_string()),
            ("user.fields", "username".to_string()),
        ];
        let resp: ListResp = self.call(&["lists", collection_id], &params).await?;
        let list = resp
            .data
            .ok_or_else(|| problem(&format!("list {collection_id}"), &resp.errors))?;
        let owner = resp
            .includes
            .users
            .iter()
            .find(|u| u.id == list.owner_id)
            .map(|u| u.username.clone())
            .unwrap_or(list.owner_id);
        Ok(CollectionInfo {
            id: list.id,
            owner,
            title: list.name,
            description: list.description,
        })
    }

    async fn list_collections(&self, owner: &OwnerKey) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let mut params = vec![("max_results", MAX_PAGE_SIZE.to_string())];
            if let Some(t) = token.take() {
                params.push(("pagination_token", t));
            }
            let resp: OwnedListsResp = self
                .call(&["users", owner.key.as_str(), "owned_lists"], &params)
                .await?;
            if resp.data.is_empty() && !resp.errors.is_empty() {
                return Err(problem("owned lists", &resp.errors));
            }
            let got = resp.data.len();
            ids.extend(resp.data.into_iter().map(|l| l.id));
            match resp.meta.next_token {
                Some(next) if got > 0 => token = Some(next),
                _ => break,
            }
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> TwitterClient {
        TwitterClient::with_base_url(
            "s3cret".to_string(),
            Url::parse("http://localhost:9/2/").unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn builds_authorised_request() {
        let params = TwitterClient::tweet_params(Some(500), Some("tok"));
        let req = client()
            .build_request(&["users", "42", "liked_tweets"], &params)
            .unwrap();
        assert_eq!(req.url().path(), "/2/users/42/liked_tweets");
        assert_eq!(
            req.headers()
                .get(reqwest::header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok()),
            Some("Bearer s3cret")
        );
        let query = req.url().query().unwrap_or_default();
        assert!(query.contains("max_results=100"));
        assert!(query.contains("pagination_token=tok"));
        assert!(query.contains("expansions=author_id"));
    }

    #[test]
    fn small_pages_are_raised_to_minimum() {
        let params = TwitterClient::tweet_params(Some(3), None);
        assert!(params.contains(&("max_results", "10".to_string())));
        assert!(!params.iter().any(|(k, _)| *k == "pagination_token"));
    }

    #[test]
    fn segments_are_escaped() {
        let req = client().build_request(&["users", "by", "username", "a/b"], &[]).unwrap();
        assert_eq!(req.url().path(), "/2/users/by/username/a%2Fb");
    }

    #[test]
    fn debug_hides_token() {
        assert!(!format!("{:?}", client()).contains("s3cret"));
    }

    #[test]
    fn problems_map_to_errors() {
        let resp: UserResp = serde_json::from_str(
            r#"{"errors":[{"value":"nobody","detail":"Could not find user with username: [nobody].",
               "title":"Not Found Error","type":"https://api.twitter.com/2/problems/resource-not-found"}]}"#,
        )
        .unwrap();
        assert!(resp.data.is_none());
        assert!(problem("user nobody", &resp.errors).is_not_found());

        let forbidden = ApiProblem {
            title: "Forbidden".into(),
            detail: "suspended".into(),
            kind: "https://api.twitter.com/2/problems/user-suspended".into(),
        };
        assert!(matches!(
            problem("user x", &[forbidden]),
            SyncError::RemoteApi(_)
        ));
        assert!(matches!(problem("x", &[]), SyncError::RemoteApi(_)));
    }
}
