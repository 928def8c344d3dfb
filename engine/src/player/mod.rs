use serde::{ser::SerializeMap, Serialize, Serializer};

pub mod output;
pub mod palette;
pub mod playlist;
pub mod resolver;
pub mod sequencer;
pub mod song;

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    pub color: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SongView {
    pub title: String,
    pub url: String,
    pub length: u64,
    pub score: i64,
    pub has_voted: i8,
    pub tags: Vec<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CurrentSongView {
    #[serde(flatten)]
    pub song: SongView,
    pub current_time: u64,
    pub playing: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PlaylistView {
    pub theme: String,
    pub authorized_tags: Vec<Tag>,
    /// Serialized as `{}` when nothing is loaded.
    #[serde(serialize_with = "serialize_first_song")]
    pub first_song: Option<CurrentSongView>,
    pub playlist: Vec<SongView>,
}

fn serialize_first_song<S: Serializer>(
    first_song: &Option<CurrentSongView>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match first_song {
        Some(song) => song.serialize(serializer),
        None => serializer.serialize_map(Some(0))?.end(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn song_view(title: &str) -> SongView {
        SongView {
            title: title.to_owned(),
            url: format!("file:///music/{title}.ogg"),
            length: 180,
            score: 2,
            has_voted: 1,
            tags: vec!["rock".to_owned()],
        }
    }

    #[test]
    fn empty_playlist_serializes_first_song_as_empty_object() {
        let view = PlaylistView {
            theme: "Anything".to_owned(),
            authorized_tags: Vec::new(),
            first_song: None,
            playlist: Vec::new(),
        };

        assert_eq!(
            serde_json::to_value(&view).unwrap(),
            json!({
                "theme": "Anything",
                "authorized_tags": [],
                "first_song": {},
                "playlist": [],
            })
        );
    }

    #[test]
    fn current_song_carries_playback_fields() {
        let view = PlaylistView {
            theme: "80s".to_owned(),
            authorized_tags: vec![Tag {
                name: "rock".to_owned(),
                color: "#e57373".to_owned(),
            }],
            first_song: Some(CurrentSongView {
                song: song_view("A"),
                current_time: 42,
                playing: true,
            }),
            playlist: vec![song_view("B")],
        };

        assert_eq!(
            serde_json::to_value(&view).unwrap(),
            json!({
                "theme": "80s",
                "authorized_tags": [{"name": "rock", "color": "#e57373"}],
                "first_song": {
                    "title": "A",
                    "url": "file:///music/A.ogg",
                    "length": 180,
                    "score": 2,
                    "has_voted": 1,
                    "tags": ["rock"],
                    "current_time": 42,
                    "playing": true,
                },
                "playlist": [{
                    "title": "B",
                    "url": "file:///music/B.ogg",
                    "length": 180,
                    "score": 2,
                    "has_voted": 1,
                    "tags": ["rock"],
                }],
            })
        );
    }
}
