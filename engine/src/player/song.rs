use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{
    output::{
        CompletionNotifier, PlaybackError, PlaybackEvent, PlaybackHandle, PlaybackId,
        PlayerController,
    },
    resolver::{MediaResolver, ResolvedMedia},
    SongView,
};

#[derive(Debug, Error)]
pub enum SongError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("blacklisted song: {0}")]
    BlackListed(String),
}

/// A single voter's opinion of a song.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Vote {
    Down,
    #[default]
    Neutral,
    Up,
}

impl Vote {
    pub fn value(self) -> i64 {
        match self {
            Vote::Down => -1,
            Vote::Neutral => 0,
            Vote::Up => 1,
        }
    }
}

impl From<Vote> for i8 {
    fn from(vote: Vote) -> i8 {
        vote.value() as i8
    }
}

struct Playback {
    id: PlaybackId,
    handle: Box<dyn PlaybackHandle>,
}

pub struct Song {
    title: String,
    url: String,
    length: u64,
    stream_uri: String,

    score: i64,
    voters: HashMap<String, Vote>,
    tags: Vec<String>,

    playback: Option<Playback>,
}

impl Song {
    pub fn new(media: ResolvedMedia, tags: Vec<String>) -> Song {
        Song {
            title: media.title,
            url: media.url,
            length: media.duration_seconds,
            stream_uri: media.stream_uri,

            score: 0,
            voters: HashMap::new(),
            tags,

            playback: None,
        }
    }

    /// Resolves `url` and builds a song from it, refusing titles that contain
    /// any blacklisted term (case-insensitive).
    pub async fn resolve(
        resolver: &dyn MediaResolver,
        url: &str,
        blacklist: &[String],
        tags: Vec<String>,
    ) -> Result<Song, SongError> {
        let media = match resolver.resolve(url).await {
            Ok(media) => media,
            Err(e) => {
                warn!("{e}");

                return Err(SongError::InvalidUrl(url.to_owned()));
            }
        };

        let lowered_title = media.title.to_lowercase();

        if let Some(term) = blacklist
            .iter()
            .find(|term| !term.is_empty() && lowered_title.contains(&term.to_lowercase()))
        {
            warn!("Refusing {:?}: matches blacklisted term {term:?}", media.title);

            return Err(SongError::BlackListed(media.title));
        }

        Ok(Song::new(media, tags))
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn score(&self) -> i64 {
        self.score + self.voters.values().map(|vote| vote.value()).sum::<i64>()
    }

    pub fn upvote(&mut self, voter: Option<&str>) {
        self.cast(voter, Vote::Up);
    }

    pub fn downvote(&mut self, voter: Option<&str>) {
        self.cast(voter, Vote::Down);
    }

    // Anonymous votes go straight to the base score. Named voters hold one
    // vote each, and repeating it takes it back.
    fn cast(&mut self, voter: Option<&str>, vote: Vote) {
        match voter.filter(|voter| !voter.is_empty()) {
            None => self.score += vote.value(),
            Some(voter) => {
                let recorded = self.voters.entry(voter.to_owned()).or_default();

                *recorded = if *recorded == vote { Vote::Neutral } else { vote };

                debug!("{voter} now votes {:?} on {:?}", recorded, self.title);
            }
        }
    }

    pub fn has_voted(&self, voter: Option<&str>) -> Vote {
        voter
            .and_then(|voter| self.voters.get(voter))
            .copied()
            .unwrap_or_default()
    }

    pub fn view(&self, voter: Option<&str>) -> SongView {
        SongView {
            title: self.title.clone(),
            url: self.url.clone(),
            length: self.length,
            score: self.score(),
            has_voted: self.has_voted(voter).into(),
            tags: self.tags.clone(),
        }
    }

    pub fn current_time(&self) -> u64 {
        self.playback
            .as_ref()
            .map(|playback| playback.handle.elapsed_seconds())
            .unwrap_or(0)
    }

    pub fn playback_id(&self) -> Option<PlaybackId> {
        self.playback.as_ref().map(|playback| playback.id)
    }

    pub fn is_playback(&self, id: PlaybackId) -> bool {
        self.playback_id() == Some(id)
    }

    /// Opens the stream once. Later calls reuse the open handle.
    pub fn open(
        &mut self,
        controller: &dyn PlayerController,
        events: &mpsc::UnboundedSender<PlaybackEvent>,
    ) -> Result<(), PlaybackError> {
        if self.playback.is_some() {
            return Ok(());
        }

        let id = Uuid::new_v4();
        let handle = controller.open(&self.stream_uri, CompletionNotifier::new(id, events.clone()))?;

        self.playback = Some(Playback { id, handle });

        Ok(())
    }

    pub fn play(&mut self) {
        if let Some(playback) = self.playback.as_mut() {
            playback.handle.play();
        }
    }

    pub fn pause(&mut self) {
        if let Some(playback) = self.playback.as_mut() {
            playback.handle.pause();
        }
    }

    pub fn stop(&mut self) {
        if let Some(mut playback) = self.playback.take() {
            playback.handle.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::player::resolver::ResolveError;

    fn song(title: &str) -> Song {
        Song::new(
            ResolvedMedia {
                title: title.to_owned(),
                url: format!("https://example.org/{title}"),
                duration_seconds: 200,
                stream_uri: format!("/tmp/{title}.ogg"),
            },
            Vec::new(),
        )
    }

    struct StaticResolver(Option<&'static str>);

    #[async_trait]
    impl MediaResolver for StaticResolver {
        async fn resolve(&self, url: &str) -> Result<ResolvedMedia, ResolveError> {
            match self.0 {
                Some(title) => Ok(ResolvedMedia {
                    title: title.to_owned(),
                    url: url.to_owned(),
                    duration_seconds: 10,
                    stream_uri: url.to_owned(),
                }),
                None => Err(ResolveError::unresolvable(url, "no such video")),
            }
        }
    }

    #[test]
    fn repeated_vote_cancels_itself() {
        let mut song = song("A");

        song.upvote(Some("10.0.0.1"));
        assert_eq!(song.has_voted(Some("10.0.0.1")), Vote::Up);
        assert_eq!(song.score(), 1);

        song.upvote(Some("10.0.0.1"));
        assert_eq!(song.has_voted(Some("10.0.0.1")), Vote::Neutral);
        assert_eq!(song.score(), 0);
    }

    #[test]
    fn opposite_vote_replaces_the_previous_one() {
        let mut song = song("A");

        song.upvote(Some("x"));
        song.downvote(Some("x"));

        assert_eq!(song.has_voted(Some("x")), Vote::Down);
        assert_eq!(song.score(), -1);

        song.downvote(Some("x"));

        assert_eq!(song.has_voted(Some("x")), Vote::Neutral);
    }

    #[test]
    fn anonymous_votes_move_the_base_score_only() {
        let mut song = song("A");

        song.upvote(None);
        song.upvote(None);
        song.downvote(Some(""));

        assert_eq!(song.score(), 1);
        assert_eq!(song.has_voted(None), Vote::Neutral);
        assert_eq!(song.has_voted(Some("")), Vote::Neutral);
    }

    #[test]
    fn score_sums_every_voter() {
        let mut song = song("A");

        song.upvote(None);
        song.upvote(Some("a"));
        song.upvote(Some("b"));
        song.downvote(Some("c"));

        assert_eq!(song.score(), 2);
        assert_eq!(song.view(Some("c")).has_voted, -1);
    }

    #[tokio::test]
    async fn unresolvable_urls_are_invalid() {
        let result = Song::resolve(&StaticResolver(None), "nope", &[], Vec::new()).await;

        assert!(matches!(result, Err(SongError::InvalidUrl(url)) if url == "nope"));
    }

    #[tokio::test]
    async fn blacklist_matches_title_ignoring_case() {
        let blacklist = vec!["rickroll".to_owned()];

        let result = Song::resolve(
            &StaticResolver(Some("Never Gonna Give You Up (RickRoll)")),
            "https://example.org/v",
            &blacklist,
            Vec::new(),
        )
        .await;

        assert!(matches!(result, Err(SongError::BlackListed(_))));
    }

    #[tokio::test]
    async fn clean_titles_pass_the_blacklist() {
        let blacklist = vec!["rickroll".to_owned()];

        let song = Song::resolve(
            &StaticResolver(Some("Around the World")),
            "https://example.org/v",
            &blacklist,
            vec!["house".to_owned()],
        )
        .await
        .unwrap();

        assert_eq!(song.title(), "Around the World");
        assert_eq!(song.score(), 0);
        assert_eq!(song.view(None).tags, vec!["house".to_owned()]);
    }
}
