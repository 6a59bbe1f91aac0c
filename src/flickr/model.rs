//! Response shapes of the Flickr REST API (`format=json&nojsoncallback=1`).
//!
//! Flickr is loose with scalar types: counts and ids arrive as numbers in some
//! methods and strings in others, and text nodes are wrapped in `_content`.
//! Every field used for mapping defaults when absent.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Accept a string, a number or null and hand back a string.
pub fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    })
}

/// Accept `537`, `"537"` or nothing.
pub fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// A `{"_content": ...}` text node.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Content {
    #[serde(rename = "_content", default, deserialize_with = "lenient_string")]
    pub content: String,
}

#[derive(Deserialize, Debug)]
pub struct FindByUsernameResp {
    pub user: FoundUser,
}

#[derive(Deserialize, Debug)]
pub struct FoundUser {
    #[serde(deserialize_with = "lenient_string")]
    pub nsid: String,
    #[serde(default)]
    pub username: Content,
}

#[derive(Deserialize, Debug)]
pub struct PersonResp {
    pub person: Person,
}

#[derive(Deserialize, Debug)]
pub struct Person {
    #[serde(deserialize_with = "lenient_string")]
    pub nsid: String,
    #[serde(default)]
    pub username: Content,
}

/// Page of photo references, as returned by the people, search and
/// favorites listings (under `photos`) and by photo sets (under `photoset`).
#[derive(Deserialize, Debug, Default)]
pub struct PhotoPage {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub pages: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub total: Option<u64>,
    #[serde(default)]
    pub photo: Vec<PhotoRef>,
}

#[derive(Deserialize, Debug)]
pub struct PhotoListResp {
    pub photos: PhotoPage,
}

#[derive(Deserialize, Debug)]
pub struct PhotoSetPhotosResp {
    pub photoset: PhotoPage,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PhotoRef {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
}

#[derive(Deserialize, Debug)]
pub struct PhotoInfoResp {
    pub photo: PhotoInfo,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct PhotoInfo {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub license: String,
    #[serde(default)]
    pub owner: PhotoOwner,
    #[serde(default)]
    pub title: Content,
    #[serde(default)]
    pub description: Content,
    #[serde(default)]
    pub dates: PhotoDates,
    #[serde(default)]
    pub tags: PhotoTags,
    #[serde(default)]
    pub urls: PhotoUrls,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PhotoOwner {
    #[serde(default, deserialize_with = "lenient_string")]
    pub nsid: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub username: String,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PhotoDates {
    #[serde(default)]
    pub taken: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PhotoTags {
    #[serde(default)]
    pub tag: Vec<PhotoTag>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PhotoTag {
    #[serde(rename = "_content", default)]
    pub content: String,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PhotoUrls {
    #[serde(default)]
    pub url: Vec<PhotoUrl>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PhotoUrl {
    #[serde(rename = "type", default)]
    pub typ: String,
    #[serde(rename = "_content", default)]
    pub content: String,
}

#[derive(Deserialize, Debug)]
pub struct SizesResp {
    pub sizes: Sizes,
}

#[derive(Deserialize, Debug, Default)]
pub struct Sizes {
    #[serde(default)]
    pub size: Vec<Size>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Size {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub source: String,
}

#[derive(Deserialize, Debug)]
pub struct ExifResp {
    pub photo: ExifPhoto,
}

#[derive(Deserialize, Debug, Default)]
pub struct ExifPhoto {
    #[serde(default)]
    pub exif: Vec<ExifTag>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ExifTag {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub raw: Option<Content>,
    #[serde(default)]
    pub clean: Option<Content>,
}

#[derive(Deserialize, Debug)]
pub struct GeoResp {
    pub photo: GeoPhoto,
}

#[derive(Deserialize, Debug)]
pub struct GeoPhoto {
    pub location: Location,
}

fn unknown() -> String {
    super::convert::UNKNOWN.to_string()
}

/// Coordinates missing from an otherwise successful answer read as `Unknown`,
/// the same as a photo without any location.
#[derive(Deserialize, Debug)]
pub struct Location {
    #[serde(default = "unknown", deserialize_with = "lenient_string")]
    pub latitude: String,
    #[serde(default = "unknown", deserialize_with = "lenient_string")]
    pub longitude: String,
    #[serde(default = "unknown", deserialize_with = "lenient_string")]
    pub accuracy: String,
}

#[derive(Deserialize, Debug)]
pub struct PhotoSetInfoResp {
    pub photoset: PhotoSetInfo,
}

#[derive(Deserialize, Debug)]
pub struct PhotoSetInfo {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub owner: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub username: String,
    #[serde(default)]
    pub title: Content,
    #[serde(default)]
    pub description: Content,
}

#[derive(Deserialize, Debug)]
pub struct PhotoSetListResp {
    pub photosets: PhotoSetList,
}

#[derive(Deserialize, Debug, Default)]
pub struct PhotoSetList {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub pages: Option<u64>,
    #[serde(default)]
    pub photoset: Vec<PhotoSetRef>,
}

#[derive(Deserialize, Debug)]
pub struct PhotoSetRef {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
}
