use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use tracing::debug;

use crate::config;
use crate::error::{self, Result, SyncError};
use crate::model::{NewRecord, Service};
use crate::source::{CollectionInfo, Listing, OwnerKey, Page, PageCursor, Source};

pub mod convert;
pub mod model;

use convert::{exif_from_tags, sizes_by_label, GeoLocation, PhotoDetail};
use model::{
    ExifResp, FindByUsernameResp, GeoResp, PersonResp, PhotoInfoResp, PhotoListResp, PhotoPage,
    PhotoRef, PhotoSetInfoResp, PhotoSetListResp, PhotoSetPhotosResp, SizesResp,
};

const FLICKR_API_BASE: &str = "https://api.flickr.com/services/rest/";

/// Flickr caps `per_page` at 500 for every listing method we use.
pub const MAX_PAGE_SIZE: u32 = 500;

#[derive(Clone)]
pub struct FlickrClient {
    http: Client,
    base_url: Url,
    api_key: String,
}

impl fmt::Debug for FlickrClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlickrClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl FlickrClient {
    pub fn new(api_key: String) -> Result<Self> {
        let base_url = Url::parse(FLICKR_API_BASE).expect("valid default Flickr URL");
        Self::with_base_url(api_key, base_url)
    }

    pub fn with_base_url(api_key: String, base_url: Url) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("syncr/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    pub fn from_config(cfg: &config::Flickr) -> Result<Self> {
        match cfg.base_url.as_deref() {
            Some(raw) => {
                let base_url = Url::parse(raw)
                    .map_err(|e| SyncError::InvalidInput(format!("flickr base_url: {e}")))?;
                Self::with_base_url(cfg.api_key.clone(), base_url)
            }
            None => Self::new(cfg.api_key.clone()),
        }
    }

    /// Every Flickr call is a GET on the REST endpoint with the method name
    /// and key in the query string.
    pub fn build_request(&self, method: &str, params: &[(&str, String)]) -> Result<reqwest::Request> {
        let mut query: Vec<(&str, &str)> = vec![
            ("method", method),
            ("api_key", self.api_key.as_str()),
            ("format", "json"),
            ("nojsoncallback", "1"),
        ];
        query.extend(params.iter().map(|(k, v)| (*k, v.as_str())));
        Ok(self.http.get(self.base_url.clone()).query(&query).build()?)
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: &[(&str, String)]) -> Result<T> {
        let request = self.build_request(method, params)?;
        debug!(method, ?params, "flickr request");
        let res = self.http.execute(request).await?;
        let status = res.status();
        let body = res.text().await?;
        if !status.is_success() {
            return Err(error::from_status(status, method, &body));
        }
        parse_response(method, &body)
    }

    async fn photo_page(
        &self,
        method: &str,
        mut params: Vec<(&str, String)>,
        cursor: &PageCursor,
        per_page: u32,
    ) -> Result<PhotoPage> {
        params.push(("per_page", per_page.to_string()));
        params.push(("page", cursor.number.to_string()));
        if method == "flickr.photosets.getPhotos" {
            let resp: PhotoSetPhotosResp = self.call(method, &params).await?;
            Ok(resp.photoset)
        } else {
            let resp: PhotoListResp = self.call(method, &params).await?;
            Ok(resp.photos)
        }
    }

    async fn username_for(&self, nsid: &str) -> Result<String> {
        let resp: PersonResp = self
            .call("flickr.people.getInfo", &[("user_id", nsid.to_string())])
            .await?;
        Ok(resp.person.username.content)
    }
}

/// Decode a Flickr JSON body. `stat: fail` carries a numeric code: 1 means
/// the object does not exist, 0, 105 and 106 are service-side outages.
pub fn parse_response<T: DeserializeOwned>(method: &str, body: &str) -> Result<T> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| SyncError::api(format!("{method}: malformed response: {e}")))?;
    if value.get("stat").and_then(Value::as_str) == Some("fail") {
        let code = value.get("code").and_then(Value::as_i64).unwrap_or(-1);
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let text = format!("{method}: code {code}: {message}");
        return Err(match code {
            1 => SyncError::RemoteNotFound(text),
            0 | 105 | 106 => SyncError::RemoteTransient(text),
            _ => SyncError::RemoteApi(text),
        });
    }
    serde_json::from_value(value)
        .map_err(|e| SyncError::api(format!("{method}: malformed response: {e}")))
}

/// A sub-resource failure leaves the detail with defaults, but a transient
/// one aborts the detail fetch so it is retried as a whole.
fn optional<T: Default>(method: &str, photo_id: &str, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(err) if err.is_retryable() => Err(err),
        Err(err) => {
            debug!(method, photo_id, error = %err, "sub-resource unavailable; using defaults");
            Ok(T::default())
        }
    }
}

/// Flickr sometimes reports `pages` without `total`.
fn page_total(page: &PhotoPage, per_page: u32) -> Option<u64> {
    page.total
        .or_else(|| page.pages.map(|p| p * u64::from(per_page)))
}

#[async_trait]
impl Source for FlickrClient {
    type Summary = PhotoRef;
    type Detail = PhotoDetail;

    fn service(&self) -> Service {
        Service::Flickr
    }

    fn max_page_size(&self) -> u32 {
        MAX_PAGE_SIZE
    }

    fn summary_id<'a>(&self, summary: &'a PhotoRef) -> &'a str {
        &summary.id
    }

    async fn resolve_owner(&self, handle: &str) -> Result<OwnerKey> {
        let resp: FindByUsernameResp = self
            .call("flickr.people.findByUsername", &[("username", handle.to_string())])
            .await?;
        Ok(OwnerKey {
            handle: handle.to_string(),
            key: resp.user.nsid,
        })
    }

    async fn list_page(
        &self,
        listing: &Listing,
        cursor: &PageCursor,
        per_page: u32,
    ) -> Result<Page<PhotoRef>> {
        let (method, params) = match listing {
            Listing::Owner(owner) => (
                "flickr.people.getPublicPhotos",
                vec![("user_id", owner.key.clone())],
            ),
            Listing::OwnerSince(owner, since) => (
                "flickr.photos.search",
                vec![
                    ("user_id", owner.key.clone()),
                    ("min_upload_date", since.timestamp().to_string()),
                ],
            ),
            Listing::Favorites(owner) => (
                "flickr.favorites.getPublicList",
                vec![("user_id", owner.key.clone())],
            ),
            Listing::Collection(id) => (
                "flickr.photosets.getPhotos",
                vec![("photoset_id", id.clone())],
            ),
        };
        let page = self.photo_page(method, params, cursor, per_page).await?;
        Ok(Page {
            total: page_total(&page, per_page),
            items: page.photo,
            next_token: None,
        })
    }

    async fn fetch_detail(&self, summary: &PhotoRef) -> Result<PhotoDetail> {
        self.fetch_detail_by_id(&summary.id).await
    }

    async fn fetch_detail_by_id(&self, remote_id: &str) -> Result<PhotoDetail> {
        let id = [("photo_id", remote_id.to_string())];
        let info: PhotoInfoResp = self.call("flickr.photos.getInfo", &id).await?;

        let sizes = optional(
            "flickr.photos.getSizes",
            remote_id,
            self.call::<SizesResp>("flickr.photos.getSizes", &id)
                .await
                .map(|r| sizes_by_label(r.sizes.size)),
        )?;
        let exif = optional(
            "flickr.photos.getExif",
            remote_id,
            self.call::<ExifResp>("flickr.photos.getExif", &id)
                .await
                .map(|r| exif_from_tags(&r.photo.exif)),
        )?;
        let geo = optional(
            "flickr.photos.geo.getLocation",
            remote_id,
            self.call::<GeoResp>("flickr.photos.geo.getLocation", &id)
                .await
                .map(|r| GeoLocation::from(r.photo.location)),
        )?;

        Ok(PhotoDetail {
            info: info.photo,
            sizes,
            exif,
            geo,
        })
    }

    fn map(&self, detail: &PhotoDetail) -> NewRecord {
        convert::photo_record(detail)
    }

    async fn collection(&self, collection_id: &str) -> Result<CollectionInfo> {
        let resp: PhotoSetInfoResp = self
            .call(
                "flickr.photosets.getInfo",
                &[("photoset_id", collection_id.to_string())],
            )
            .await?;
        let set = resp.photoset;
        let owner = if set.username.is_empty() {
            self.username_for(&set.owner).await?
        } else {
            set.username
        };
        Ok(CollectionInfo {
            id: set.id,
            owner,
            title: set.title.content,
            description: set.description.content,
        })
    }

    async fn list_collections(&self, owner: &OwnerKey) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut page = 1u64;
        loop {
            let resp: PhotoSetListResp = self
                .call(
                    "flickr.photosets.getList",
                    &[
                        ("user_id", owner.key.clone()),
                        ("per_page", MAX_PAGE_SIZE.to_string()),
                        ("page", page.to_string()),
                    ],
                )
                .await?;
            let list = resp.photosets;
            if list.photoset.is_empty() {
                break;
            }
            ids.extend(list.photoset.into_iter().map(|s| s.id));
            if page >= list.pages.unwrap_or(1) {
                break;
            }
            page += 1;
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> FlickrClient {
        FlickrClient::with_base_url(
            "k3y".to_string(),
            Url::parse("http://localhost:9/rest/").unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn builds_rest_request() {
        let req = client()
            .build_request(
                "flickr.people.getPublicPhotos",
                &[("user_id", "12@N01".into()), ("page", "2".into())],
            )
            .unwrap();
        assert_eq!(req.method(), reqwest::Method::GET);
        let url = req.url();
        assert_eq!(url.path(), "/rest/");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let get = |k: &str| pairs.iter().find(|(n, _)| n == k).map(|(_, v)| v.as_str());
        assert_eq!(get("method"), Some("flickr.people.getPublicPhotos"));
        assert_eq!(get("api_key"), Some("k3y"));
        assert_eq!(get("format"), Some("json"));
        assert_eq!(get("nojsoncallback"), Some("1"));
        assert_eq!(get("user_id"), Some("12@N01"));
        assert_eq!(get("page"), Some("2"));
    }

    #[test]
    fn debug_hides_api_key() {
        let out = format!("{:?}", client());
        assert!(!out.contains("k3y"));
    }

    #[test]
    fn parse_response_classifies_failures() {
        let err = parse_response::<Value>(
            "flickr.people.findByUsername",
            r#"{"stat":"fail","code":1,"message":"User not found"}"#,
        )
        .unwrap_err();
        assert!(err.is_not_found());

        let err = parse_response::<Value>(
            "flickr.photos.getInfo",
            r#"{"stat":"fail","code":105,"message":"Service currently unavailable"}"#,
        )
        .unwrap_err();
        assert!(err.is_retryable());

        let err = parse_response::<Value>(
            "flickr.photos.getInfo",
            r#"{"stat":"fail","code":100,"message":"Invalid API Key"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::RemoteApi(ref m) if m.contains("Invalid API Key")));

        let err = parse_response::<Value>("flickr.photos.getInfo", "<html>").unwrap_err();
        assert!(matches!(err, SyncError::RemoteApi(_)));
    }

    #[test]
    fn parses_counted_page() {
        let page: PhotoListResp = parse_response(
            "flickr.favorites.getPublicList",
            r#"{"photos":{"page":1,"pages":"2","perpage":500,"total":"537",
               "photo":[{"id":"1"},{"id":2}]},"stat":"ok"}"#,
        )
        .unwrap();
        assert_eq!(page.photos.total, Some(537));
        assert_eq!(page.photos.photo.len(), 2);
        assert_eq!(page.photos.photo[1].id, "2");
        assert_eq!(page_total(&page.photos, 500), Some(537));
    }

    #[test]
    fn total_falls_back_to_pages() {
        let page = PhotoPage {
            pages: Some(3),
            total: None,
            photo: Vec::new(),
        };
        assert_eq!(page_total(&page, 100), Some(300));
        assert_eq!(page_total(&PhotoPage::default(), 100), None);
    }

    #[test]
    fn sub_resource_errors() {
        let ok: Result<String> = optional("m", "1", Err(SyncError::api("no exif")));
        assert_eq!(ok.unwrap(), "");
        let ok: Result<String> = optional("m", "1", Err(SyncError::not_found("no geo")));
        assert_eq!(ok.unwrap(), "");
        let err: Result<String> = optional("m", "1", Err(SyncError::transient("503")));
        assert!(err.unwrap_err().is_retryable());
    }
}
