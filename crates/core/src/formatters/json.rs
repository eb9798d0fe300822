use serde::Serialize;
use time::OffsetDateTime;

use crate::Result;
use crate::analytics::AnalyticsSnapshot;
use crate::model::Dataset;
use crate::normalize::format_canonical;

/// Version stamped into every export.
pub const EXPORT_VERSION: &str = "1.0.0";

/// Complete JSON export
#[derive(Debug, Clone, Serialize)]
pub struct JsonExport<'a> {
    pub metadata: ExportMetadata,
    pub analytics: &'a AnalyticsSnapshot,
    pub data: &'a Dataset,
}

/// Header of a JSON export
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    pub export_date: String,
    pub version: String,
    pub total_posts: usize,
    pub total_comments: usize,
    pub total_profiles: usize,
}

impl ExportMetadata {
    pub fn new(dataset: &Dataset, exported_at: OffsetDateTime) -> Self {
        Self {
            export_date: format_canonical(exported_at).unwrap_or_default(),
            version: EXPORT_VERSION.to_string(),
            total_posts: dataset.posts.len(),
            total_comments: dataset.comments.len(),
            total_profiles: dataset.profiles.len(),
        }
    }
}

/// Serializes the dataset with its analytics as pretty-printed JSON.
pub fn export_json(dataset: &Dataset, analytics: &AnalyticsSnapshot) -> Result<String> {
    let export =
        JsonExport { metadata: ExportMetadata::new(dataset, OffsetDateTime::now_utc()), analytics, data: dataset };
    Ok(serde_json::to_string_pretty(&export)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::compute;
    use crate::model::Post;

    #[test]
    fn test_export_layout() {
        let dataset = Dataset {
            posts: vec![Post { id: "1".to_string(), text: "Hello".to_string(), ..Default::default() }],
            ..Default::default()
        };
        let analytics = compute(&dataset);

        let json = export_json(&dataset, &analytics).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["metadata"]["version"], "1.0.0");
        assert_eq!(value["metadata"]["totalPosts"], 1);
        assert_eq!(value["metadata"]["totalComments"], 0);
        assert!(value["metadata"]["exportDate"].as_str().unwrap().ends_with('Z'));
        assert_eq!(value["analytics"]["totalPosts"], 1);
        assert_eq!(value["data"]["posts"][0]["text"], "Hello");
    }
}
