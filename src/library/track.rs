use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A resolved, locally available media file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// Upstream content id. `None` for legacy files indexed by title only.
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    pub title_san: String,
    pub file_path: PathBuf,
    #[serde(default)]
    pub url: Option<String>,
}

impl Track {
    /// Merges `incoming` into `self`. Incoming values win; an incoming
    /// `None` keeps whatever was already known.
    pub fn merge_from(&mut self, incoming: Track) {
        if incoming.id.is_some() {
            self.id = incoming.id;
        }
        if incoming.url.is_some() {
            self.url = incoming.url;
        }
        self.title = incoming.title;
        self.title_san = incoming.title_san;
        self.file_path = incoming.file_path;
    }

    /// `title` followed by the source link on its own line, when known.
    pub fn describe(&self) -> String {
        match &self.url {
            Some(url) => format!("**{}**\n🔗 {url}", self.title),
            None => format!("**{}**", self.title),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_prefers_incoming_but_keeps_known_optionals() {
        let mut stored = Track {
            id: Some("abcdef123".into()),
            title: "Old".into(),
            title_san: "Old".into(),
            file_path: "/music/abcdef123_Old.mp3".into(),
            url: Some("https://www.youtube.com/watch?v=abcdef123".into()),
        };
        stored.merge_from(Track {
            id: None,
            title: "New".into(),
            title_san: "New".into(),
            file_path: "/music/abcdef123_New.mp3".into(),
            url: None,
        });

        assert_eq!(stored.id.as_deref(), Some("abcdef123"));
        assert_eq!(stored.title, "New");
        assert_eq!(stored.file_path, PathBuf::from("/music/abcdef123_New.mp3"));
        assert!(stored.url.is_some());
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let track = Track {
            id: None,
            title: "A".into(),
            title_san: "A".into(),
            file_path: "/m/A.mp3".into(),
            url: None,
        };
        let json = serde_json::to_value(&track).unwrap();
        assert_eq!(json["titleSan"], "A");
        assert_eq!(json["filePath"], "/m/A.mp3");
        assert!(json["id"].is_null());
    }
}
