use chrono::{DateTime, Utc};
use serde::Deserialize;

// https://learn.microsoft.com/en-us/graph/api/site-getbypath
#[derive(Debug, Deserialize)]
pub(super) struct GraphSite {
    pub(super) id: String,
}

// https://learn.microsoft.com/en-us/graph/api/drive-list
#[derive(Debug, Deserialize)]
pub(super) struct DrivesResponse {
    pub(super) value: Vec<GraphDrive>,
}

#[derive(Debug, Deserialize)]
pub(super) struct GraphDrive {
    pub(super) id: String,
    pub(super) name: String,
}

// https://learn.microsoft.com/en-us/graph/api/driveitem-list-children
#[derive(Debug, Deserialize)]
pub(super) struct ChildrenResponse {
    pub(super) value: Vec<GraphDriveItem>,
}

// https://learn.microsoft.com/en-us/graph/api/resources/driveitem
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDriveItem {
    pub id: String,
    pub name: String,
    pub created_date_time: DateTime<Utc>,
    pub web_url: Option<String>,
    // Facets: present (possibly empty objects) only for the matching item type
    pub folder: Option<serde_json::Value>,
    pub file: Option<serde_json::Value>,
    #[serde(rename = "@microsoft.graph.downloadUrl")]
    pub download_url: Option<String>,
}
