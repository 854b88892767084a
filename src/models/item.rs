use crate::graph::types::GraphDriveItem;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ItemKind {
    Folder,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DriveItem {
    pub id: String,
    pub name: String,
    pub kind: ItemKind,
    pub created: DateTime<Utc>,
    pub web_url: Option<String>,
    pub download_url: Option<String>,
}

impl DriveItem {
    /// Convert a Graph item, dropping anything that is neither file nor folder
    /// (notebooks, packages, remote items).
    pub(crate) fn from_graph(item: GraphDriveItem) -> Option<Self> {
        let kind = match (&item.folder, &item.file) {
            (Some(_), _) => ItemKind::Folder,
            (None, Some(_)) => ItemKind::File,
            (None, None) => return None,
        };
        Some(DriveItem {
            id: item.id,
            name: item.name,
            kind,
            created: item.created_date_time,
            web_url: item.web_url,
            download_url: item.download_url,
        })
    }
}

/// Contents of a folder, split by item kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Listing {
    pub folders: Vec<DriveItem>,
    pub files: Vec<DriveItem>,
}

impl Listing {
    pub fn from_items(items: impl IntoIterator<Item = DriveItem>) -> Self {
        let mut listing = Listing::default();
        for item in items {
            match item.kind {
                ItemKind::Folder => listing.folders.push(item),
                ItemKind::File => listing.files.push(item),
            }
        }
        listing
    }

    pub fn most_recent_file(&self) -> Option<&DriveItem> {
        most_recent(&self.files)
    }

    pub fn most_recent_folder(&self) -> Option<&DriveItem> {
        most_recent(&self.folders)
    }
}

fn most_recent(items: &[DriveItem]) -> Option<&DriveItem> {
    // max_by_key keeps the last of equal maxima
    items.iter().max_by_key(|item| item.created)
}

#[cfg(test)]
pub(crate) mod test_helpers {
    use super::*;
    use chrono::TimeZone;

    pub(crate) fn mock_datetime(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 10, 0, 0).unwrap()
    }

    pub(crate) fn mock_item(name: &str, kind: ItemKind, created: DateTime<Utc>) -> DriveItem {
        DriveItem {
            id: format!("id-{name}"),
            name: name.to_string(),
            kind,
            created,
            web_url: None,
            download_url: None,
        }
    }
}
