//! Twitter API v2 payloads. Only the fields requested through `tweet.fields`,
//! `user.fields` and `list.fields` are modelled.

use serde::Deserialize;

/// Entry of the top-level `errors` array. v2 reports missing users and
/// tweets this way with HTTP 200.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ApiProblem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub detail: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl ApiProblem {
    pub fn is_not_found(&self) -> bool {
        self.kind.ends_with("/resource-not-found") || self.title == "Not Found Error"
    }
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub profile_image_url: String,
}

#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublicMetrics {
    #[serde(default)]
    pub retweet_count: u64,
    #[serde(default)]
    pub reply_count: u64,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub quote_count: u64,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Tweet {
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub author_id: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub lang: String,
    #[serde(default)]
    pub conversation_id: String,
    #[serde(default)]
    pub public_metrics: PublicMetrics,
}

#[derive(Deserialize, Debug, Default)]
pub struct Includes {
    #[serde(default)]
    pub users: Vec<User>,
}

#[derive(Deserialize, Debug, Default)]
pub struct Meta {
    #[serde(default)]
    pub next_token: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct UserResp {
    #[serde(default)]
    pub data: Option<User>,
    #[serde(default)]
    pub errors: Vec<ApiProblem>,
}

#[derive(Deserialize, Debug)]
pub struct TweetResp {
    #[serde(default)]
    pub data: Option<Tweet>,
    #[serde(default)]
    pub includes: Includes,
    #[serde(default)]
    pub errors: Vec<ApiProblem>,
}

/// Timelines, liked tweets and list tweets.
#[derive(Deserialize, Debug)]
pub struct TweetListResp {
    #[serde(default)]
    pub data: Vec<Tweet>,
    #[serde(default)]
    pub includes: Includes,
    #[serde(default)]
    pub meta: Meta,
    #[serde(default)]
    pub errors: Vec<ApiProblem>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct TwitterList {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub owner_id: String,
}

#[derive(Deserialize, Debug)]
pub struct ListResp {
    #[serde(default)]
    pub data: Option<TwitterList>,
    #[serde(default)]
    pub includes: Includes,
    #[serde(default)]
    pub errors: Vec<ApiProblem>,
}

#[derive(Deserialize, Debug)]
pub struct OwnedListsResp {
    #[serde(default)]
    pub data: Vec<TwitterList>,
    #[serde(default)]
    pub meta: Meta,
    #[serde(default)]
    pub errors: Vec<ApiProblem>,
}
