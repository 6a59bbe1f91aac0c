//! Field mapping from Flickr payloads to [`NewRecord`].
//!
//! Everything here is pure. Sub-resources that could not be fetched arrive as
//! their `Default` values, so the mapping itself never fails.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use super::model::{ExifTag, Location, PhotoInfo, Size};
use crate::model::{NewRecord, Service};

/// Everything fetched for one photo.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhotoDetail {
    pub info: PhotoInfo,
    /// Size label (`Square`, `Small`, ...) to image URL.
    pub sizes: HashMap<String, String>,
    pub exif: Exif,
    pub geo: GeoLocation,
}

/// EXIF fields kept per photo. Absent values are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Exif {
    pub make: String,
    pub model: String,
    pub orientation: String,
    pub exposure: String,
    pub software: String,
    pub aperture: String,
    pub iso: String,
    pub metering_mode: String,
    pub flash: String,
    pub focal_length: String,
    pub color_space: String,
}

pub const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeoLocation {
    pub latitude: String,
    pub longitude: String,
    pub accuracy: String,
}

impl Default for GeoLocation {
    fn default() -> Self {
        Self {
            latitude: UNKNOWN.to_string(),
            longitude: UNKNOWN.to_string(),
            accuracy: UNKNOWN.to_string(),
        }
    }
}

impl From<Location> for GeoLocation {
    fn from(location: Location) -> Self {
        let or_unknown = |v: String| if v.is_empty() { UNKNOWN.to_string() } else { v };
        Self {
            latitude: or_unknown(location.latitude),
            longitude: or_unknown(location.longitude),
            accuracy: or_unknown(location.accuracy),
        }
    }
}

/// Flickr licence ids and their names.
pub const LICENSES: [(&str, &str); 7] = [
    ("0", "All Rights Reserved"),
    ("1", "Attribution-NonCommercial-ShareAlike License"),
    ("2", "Attribution-NonCommercial License"),
    ("3", "Attribution-NonCommercial-NoDerivs License"),
    ("4", "Attribution License"),
    ("5", "Attribution-ShareAlike License"),
    ("6", "Attribution-NoDerivs License"),
];

pub fn license_name(code: &str) -> &'static str {
    LICENSES
        .iter()
        .find(|(id, _)| *id == code)
        .map(|(_, name)| *name)
        .unwrap_or(UNKNOWN)
}

/// Photo-specific columns stored in the record's `attributes`.
#[derive(Debug, Clone, Serialize)]
struct PhotoAttributes<'a> {
    square_url: &'a str,
    small_url: &'a str,
    medium_url: &'a str,
    thumbnail_url: &'a str,
    license: &'a str,
    license_name: &'static str,
    geo_latitude: &'a str,
    geo_longitude: &'a str,
    geo_accuracy: &'a str,
    exif_make: &'a str,
    exif_model: &'a str,
    exif_orientation: &'a str,
    exif_exposure: &'a str,
    exif_software: &'a str,
    exif_aperture: &'a str,
    exif_iso: &'a str,
    exif_metering_mode: &'a str,
    exif_flash: &'a str,
    exif_focal_length: &'a str,
    exif_color_space: &'a str,
}

/// Pick the labels we keep out of a `photos.getExif` payload. The cleaned
/// value wins over the raw one; empty values never overwrite.
pub fn exif_from_tags(tags: &[ExifTag]) -> Exif {
    let mut exif = Exif::default();
    for tag in tags {
        let value = tag
            .clean
            .as_ref()
            .map(|c| c.content.as_str())
            .filter(|v| !v.is_empty())
            .or_else(|| tag.raw.as_ref().map(|c| c.content.as_str()))
            .unwrap_or_default();
        if value.is_empty() {
            continue;
        }
        let slot = match tag.label.as_str() {
            "Make" => &mut exif.make,
            "Model" => &mut exif.model,
            "Orientation" => &mut exif.orientation,
            "Exposure" => &mut exif.exposure,
            "Software" => &mut exif.software,
            "Aperture" => &mut exif.aperture,
            "ISO" | "ISO Speed" => &mut exif.iso,
            "Metering Mode" => &mut exif.metering_mode,
            "Flash" => &mut exif.flash,
            "Focal Length" => &mut exif.focal_length,
            "Color Space" => &mut exif.color_space,
            _ => continue,
        };
        *slot = value.to_string();
    }
    exif
}

pub fn sizes_by_label(sizes: Vec<Size>) -> HashMap<String, String> {
    sizes.into_iter().map(|s| (s.label, s.source)).collect()
}

/// Flickr reports the taken date as local wall time without a zone; it is
/// stored as if it were UTC.
pub fn parse_taken(taken: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(taken.trim(), "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

pub fn photo_page_url(info: &PhotoInfo) -> String {
    info.urls
        .url
        .iter()
        .find(|u| u.typ == "photopage" && !u.content.is_empty())
        .map(|u| u.content.clone())
        .unwrap_or_else(|| {
            format!(
                "https://www.flickr.com/photos/{}/{}/",
                info.owner.nsid, info.id
            )
        })
}

pub fn photo_record(detail: &PhotoDetail) -> NewRecord {
    let info = &detail.info;
    let size = |label: &str| detail.sizes.get(label).map(String::as_str).unwrap_or_default();
    let attributes = PhotoAttributes {
        square_url: size("Square"),
        small_url: size("Small"),
        medium_url: size("Medium"),
        thumbnail_url: size("Thumbnail"),
        license: &info.license,
        license_name: license_name(&info.license),
        geo_latitude: &detail.geo.latitude,
        geo_longitude: &detail.geo.longitude,
        geo_accuracy: &detail.geo.accuracy,
        exif_make: &detail.exif.make,
        exif_model: &detail.exif.model,
        exif_orientation: &detail.exif.orientation,
        exif_exposure: &detail.exif.exposure,
        exif_software: &detail.exif.software,
        exif_aperture: &detail.exif.aperture,
        exif_iso: &detail.exif.iso,
        exif_metering_mode: &detail.exif.metering_mode,
        exif_flash: &detail.exif.flash,
        exif_focal_length: &detail.exif.focal_length,
        exif_color_space: &detail.exif.color_space,
    };

    NewRecord {
        service: Service::Flickr,
        remote_id: info.id.clone(),
        owner: info.owner.username.clone(),
        owner_key: info.owner.nsid.clone(),
        title: info.title.content.clone(),
        body: info.description.content.clone(),
        url: photo_page_url(info),
        occurred_at: info.dates.taken.as_deref().and_then(parse_taken),
        tags: info
            .tags
            .tag
            .iter()
            .map(|t| t.content.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
        attributes: serde_json::to_value(attributes).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flickr::model::{ExifResp, GeoResp, PhotoInfoResp, SizesResp};
    use serde_json::json;

    fn info_json() -> serde_json::Value {
        json!({
            "photo": {
                "id": "2733",
                "license": "4",
                "owner": { "nsid": "12037949754@N01", "username": "alice" },
                "title": { "_content": "Harbour" },
                "description": { "_content": "Morning fog" },
                "dates": { "taken": "2008-06-01 07:30:00" },
                "tags": { "tag": [ { "raw": "Sea", "_content": "sea" }, { "raw": "Fog", "_content": "fog" } ] },
                "urls": { "url": [ { "type": "photopage", "_content": "https://www.flickr.com/photos/alice/2733/" } ] }
            },
            "stat": "ok"
        })
    }

    #[test]
    fn maps_full_photo() {
        let info: PhotoInfoResp = serde_json::from_value(info_json()).unwrap();
        let sizes: SizesResp = serde_json::from_value(json!({
            "sizes": { "size": [
                { "label": "Square", "source": "https://live.staticflickr.com/s.jpg" },
                { "label": "Small", "source": "https://live.staticflickr.com/m.jpg" },
                { "label": "Medium", "source": "https://live.staticflickr.com/z.jpg" },
                { "label": "Thumbnail", "source": "https://live.staticflickr.com/t.jpg" }
            ] }
        }))
        .unwrap();
        let exif: ExifResp = serde_json::from_value(json!({
            "photo": { "exif": [
                { "label": "Make", "raw": { "_content": "Canon" } },
                { "label": "Aperture", "raw": { "_content": "28/10" }, "clean": { "_content": "f/2.8" } },
                { "label": "ISO Speed", "raw": { "_content": 200 } },
                { "label": "Lens", "raw": { "_content": "EF50" } }
            ] }
        }))
        .unwrap();
        let detail = PhotoDetail {
            info: info.photo,
            sizes: sizes_by_label(sizes.sizes.size),
            exif: exif_from_tags(&exif.photo.exif),
            geo: GeoLocation {
                latitude: "43.65".into(),
                longitude: "-70.25".into(),
                accuracy: "16".into(),
            },
        };

        let rec = photo_record(&detail);
        assert_eq!(rec.service, Service::Flickr);
        assert_eq!(rec.remote_id, "2733");
        assert_eq!(rec.owner, "alice");
        assert_eq!(rec.owner_key, "12037949754@N01");
        assert_eq!(rec.title, "Harbour");
        assert_eq!(rec.body, "Morning fog");
        assert_eq!(rec.url, "https://www.flickr.com/photos/alice/2733/");
        assert_eq!(rec.tag_list(), "sea fog");
        assert_eq!(
            rec.occurred_at.unwrap().to_rfc3339(),
            "2008-06-01T07:30:00+00:00"
        );
        let a = &rec.attributes;
        assert_eq!(a["square_url"], "https://live.staticflickr.com/s.jpg");
        assert_eq!(a["thumbnail_url"], "https://live.staticflickr.com/t.jpg");
        assert_eq!(a["license_name"], "Attribution License");
        assert_eq!(a["exif_make"], "Canon");
        assert_eq!(a["exif_aperture"], "f/2.8");
        assert_eq!(a["exif_iso"], "200");
        assert_eq!(a["geo_latitude"], "43.65");
    }

    #[test]
    fn missing_sub_resources_degrade_to_defaults() {
        let info: PhotoInfoResp = serde_json::from_value(json!({
            "photo": { "id": 77, "owner": { "nsid": "9@N00" } }
        }))
        .unwrap();
        let rec = photo_record(&PhotoDetail {
            info: info.photo,
            ..Default::default()
        });
        assert_eq!(rec.remote_id, "77");
        assert_eq!(rec.title, "");
        assert_eq!(rec.body, "");
        assert!(rec.tags.is_empty());
        assert!(rec.occurred_at.is_none());
        assert_eq!(rec.url, "https://www.flickr.com/photos/9@N00/77/");
        let a = &rec.attributes;
        assert_eq!(a["exif_aperture"], "");
        assert_eq!(a["medium_url"], "");
        assert_eq!(a["geo_latitude"], "Unknown");
        assert_eq!(a["geo_accuracy"], "Unknown");
        assert_eq!(a["license_name"], "Unknown");
    }

    #[test]
    fn exif_without_values_stays_empty() {
        let exif: ExifResp = serde_json::from_value(json!({
            "photo": { "exif": [
                { "label": "Aperture" },
                { "label": "Model", "raw": { "_content": "" }, "clean": { "_content": "" } }
            ] }
        }))
        .unwrap();
        assert_eq!(exif_from_tags(&exif.photo.exif), Exif::default());
    }

    #[test]
    fn partial_location_fills_unknown() {
        let geo: GeoResp = serde_json::from_value(json!({
            "photo": { "id": "2733", "location": { "latitude": 43.65, "longitude": "-70.25" } },
            "stat": "ok"
        }))
        .unwrap();
        let geo = GeoLocation::from(geo.photo.location);
        assert_eq!(geo.latitude, "43.65");
        assert_eq!(geo.longitude, "-70.25");
        assert_eq!(geo.accuracy, "Unknown");

        let blank: GeoResp = serde_json::from_value(json!({
            "photo": { "location": { "latitude": null, "longitude": "", "accuracy": 16 } }
        }))
        .unwrap();
        let blank = GeoLocation::from(blank.photo.location);
        assert_eq!(blank.latitude, "Unknown");
        assert_eq!(blank.longitude, "Unknown");
        assert_eq!(blank.accuracy, "16");
    }

    #[test]
    fn taken_date_parsing() {
        assert!(parse_taken("2008-06-01 07:30:00").is_some());
        assert!(parse_taken("0000-00-00 00:00:00").is_none());
        assert!(parse_taken("").is_none());
    }
}
