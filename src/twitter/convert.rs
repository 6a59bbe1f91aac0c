use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::model::{Includes, Tweet, User};
use crate::model::{NewRecord, Service};

static HASHTAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#([A-Za-z0-9_]+)").expect("valid hashtag regex"));

/// A tweet together with its author, as joined from `includes.users`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthoredTweet {
    pub tweet: Tweet,
    pub author: Option<User>,
}

/// Attach each tweet's author from the `includes` block.
pub fn with_authors(tweets: Vec<Tweet>, includes: &Includes) -> Vec<AuthoredTweet> {
    tweets
        .into_iter()
        .map(|tweet| {
            let author = includes
                .users
                .iter()
                .find(|u| u.id == tweet.author_id)
                .cloned();
            AuthoredTweet { tweet, author }
        })
        .collect()
}

/// Hashtags in order of first appearance, without the `#`, deduplicated.
pub fn hashtags(text: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for cap in HASHTAG.captures_iter(text) {
        let tag = cap[1].to_string();
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

#[derive(Debug, Serialize)]
struct TweetAttributes<'a> {
    lang: &'a str,
    conversation_id: &'a str,
    retweet_count: u64,
    reply_count: u64,
    like_count: u64,
    quote_count: u64,
    author_name: &'a str,
    author_description: &'a str,
    author_location: &'a str,
    author_url: &'a str,
    author_thumbnail_url: &'a str,
}

pub fn tweet_record(item: &AuthoredTweet) -> NewRecord {
    let tweet = &item.tweet;
    let author = item.author.clone().unwrap_or_default();
    let handle = if author.username.is_empty() {
        "i/web"
    } else {
        author.username.as_str()
    };
    let metrics = tweet.public_metrics;
    let attributes = TweetAttributes {
        lang: &tweet.lang,
        conversation_id: &tweet.conversation_id,
        retweet_count: metrics.retweet_count,
        reply_count: metrics.reply_count,
        like_count: metrics.like_count,
        quote_count: metrics.quote_count,
        author_name: &author.name,
        author_description: &author.description,
        author_location: &author.location,
        author_url: &author.url,
        author_thumbnail_url: &author.profile_image_url,
    };

    NewRecord {
        service: Service::Twitter,
        remote_id: tweet.id.clone(),
        owner: author.username.clone(),
        owner_key: tweet.author_id.clone(),
        title: String::new(),
        body: tweet.text.clone(),
        url: format!("https://twitter.com/{handle}/status/{}", tweet.id),
        occurred_at: tweet
            .created_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc)),
        tags: hashtags(&tweet.text),
        attributes: serde_json::to_value(attributes).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::twitter::model::TweetListResp;
    use serde_json::json;

    #[test]
    fn extracts_hashtags() {
        assert_eq!(
            hashtags("Fog over the #harbour again. #Maine #harbour #"),
            vec!["harbour".to_string(), "Maine".to_string()]
        );
        assert!(hashtags("no tags, just a # sign").is_empty());
    }

    #[test]
    fn maps_tweet_with_author() {
        let resp: TweetListResp = serde_json::from_value(json!({
            "data": [{
                "id": "1460323737035677698",
                "text": "Sunrise #photography",
                "author_id": "2244994945",
                "created_at": "2021-11-15T19:08:05.000Z",
                "lang": "en",
                "public_metrics": { "retweet_count": 3, "reply_count": 1, "like_count": 20, "quote_count": 0 }
            }],
            "includes": { "users": [{
                "id": "2244994945",
                "username": "alice",
                "name": "Alice",
                "location": "Portland"
            }] },
            "meta": { "result_count": 1 }
        }))
        .unwrap();
        let items = with_authors(resp.data, &resp.includes);
        let rec = tweet_record(&items[0]);

        assert_eq!(rec.service, Service::Twitter);
        assert_eq!(rec.remote_id, "1460323737035677698");
        assert_eq!(rec.owner, "alice");
        assert_eq!(rec.owner_key, "2244994945");
        assert_eq!(rec.body, "Sunrise #photography");
        assert_eq!(
            rec.url,
            "https://twitter.com/alice/status/1460323737035677698"
        );
        assert_eq!(rec.tags, vec!["photography".to_string()]);
        assert_eq!(
            rec.occurred_at.unwrap().to_rfc3339(),
            "2021-11-15T19:08:05+00:00"
        );
        assert_eq!(rec.attributes["like_count"], 20);
        assert_eq!(rec.attributes["author_location"], "Portland");
        assert_eq!(rec.attributes["author_description"], "");
    }

    #[test]
    fn missing_author_and_date_degrade() {
        let rec = tweet_record(&AuthoredTweet {
            tweet: Tweet {
                id: "9".into(),
                text: "plain".into(),
                created_at: Some("yesterday".into()),
                ..Default::default()
            },
            author: None,
        });
        assert_eq!(rec.owner, "");
        assert_eq!(rec.url, "https://twitter.com/i/web/status/9");
        assert!(rec.occurred_at.is_none());
        assert!(rec.tags.is_empty());
        assert_eq!(rec.attributes["author_name"], "");
    }
}
