use std::{cmp::Reverse, sync::Arc};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{
    output::{PlaybackEvent, PlayerController},
    palette::TagPalette,
    song::{Song, Vote},
    CurrentSongView, PlaylistView, Tag,
};

/// The jukebox state: the song being played, the songs waiting behind it,
/// and the theme and tag vocabulary shown to clients.
///
/// The queue never contains the current song and is kept sorted by
/// descending score after anything that changes a score. Ties keep their
/// previous order.
pub struct Playlist {
    theme: String,
    tags: Vec<Tag>,
    palette: TagPalette,

    current: Option<Song>,
    queue: Vec<Song>,
    playing: bool,

    default_theme: String,
    default_tags: Vec<String>,

    controller: Arc<dyn PlayerController>,
    events: mpsc::UnboundedSender<PlaybackEvent>,
}

impl Playlist {
    pub fn new(
        theme: &str,
        tags: &[String],
        controller: Arc<dyn PlayerController>,
        events: mpsc::UnboundedSender<PlaybackEvent>,
    ) -> Playlist {
        let mut playlist = Playlist {
            theme: theme.to_owned(),
            tags: Vec::new(),
            palette: TagPalette::new(),

            current: None,
            queue: Vec::new(),
            playing: false,

            default_theme: theme.to_owned(),
            default_tags: tags.to_vec(),

            controller,
            events,
        };

        playlist.add_tags(tags);

        playlist
    }

    /// Stops playback, drops every song and restores the initial theme and
    /// tag vocabulary.
    pub fn reset(&mut self) {
        if let Some(current) = self.current.as_mut() {
            current.stop();
        }

        self.current = None;
        self.queue.clear();
        self.playing = false;

        self.theme = self.default_theme.clone();
        self.tags.clear();
        self.palette = TagPalette::new();

        let default_tags = self.default_tags.clone();
        self.add_tags(&default_tags);

        info!("Playlist reset");
    }

    pub fn theme(&self) -> &str {
        &self.theme
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn current_title(&self) -> Option<&str> {
        self.current.as_ref().map(Song::title)
    }

    pub fn queued_titles(&self) -> Vec<&str> {
        self.queue.iter().map(Song::title).collect()
    }

    /// Loads the song right away when nothing is loaded. Otherwise queues it
    /// behind the others, which each get one point so a newcomer does not
    /// overtake songs that have been waiting.
    pub fn add_song(&mut self, song: Song) {
        if self.current.is_none() {
            info!("Loaded {:?}", song.title());

            self.current = Some(song);

            return;
        }

        for queued in self.queue.iter_mut() {
            queued.upvote(None);
        }

        info!("Queued {:?}", song.title());

        self.queue.push(song);
        self.sort_queue();
    }

    /// Starts the current song unless it is already playing. A song whose
    /// stream cannot be opened is dropped and the next one is tried.
    pub fn play_song(&mut self) {
        while let Some(current) = self.current.as_mut() {
            if self.playing {
                return;
            }

            match current.open(self.controller.as_ref(), &self.events) {
                Ok(()) => {
                    current.play();
                    self.playing = true;

                    info!("Playing {:?}", current.title());

                    return;
                }
                Err(e) => {
                    warn!("Skipping {:?}: {e}", current.title());

                    self.promote();
                }
            }
        }
    }

    pub fn play(&mut self) {
        self.play_song();
    }

    pub fn pause(&mut self) {
        let Some(current) = self.current.as_mut() else {
            return;
        };

        if !self.playing {
            return;
        }

        current.pause();
        self.playing = false;

        info!("Paused {:?}", current.title());
    }

    pub fn toggle_pause(&mut self) {
        if self.playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Stops the current song, loads the best queued one (or nothing) and
    /// starts it.
    pub fn advance(&mut self) {
        let Some(current) = self.current.as_mut() else {
            return;
        };

        current.stop();
        self.playing = false;

        info!("Skipping {:?}", current.title());

        self.promote();
        self.play_song();
    }

    pub fn on_playback_event(&mut self, event: PlaybackEvent) {
        match event {
            PlaybackEvent::Completed(playback) => {
                let finished = self
                    .current
                    .as_ref()
                    .is_some_and(|current| current.is_playback(playback));

                if !finished {
                    debug!("Ignoring completion of stale playback {playback}");

                    return;
                }

                if let Some(title) = self.current_title() {
                    info!("Finished {title:?}");
                }

                self.playing = false;
                self.promote();
                self.play_song();
            }
        }
    }

    fn promote(&mut self) {
        self.sort_queue();

        self.current = if self.queue.is_empty() {
            None
        } else {
            Some(self.queue.remove(0))
        };
        self.playing = false;
    }

    fn sort_queue(&mut self) {
        self.queue.sort_by_key(|song| Reverse(song.score()));
    }

    /// Deleting the current song skips it. Otherwise the first queued song
    /// with that title is removed.
    pub fn delete_song(&mut self, title: &str) {
        if self.current_title() == Some(title) {
            self.advance();

            return;
        }

        if let Some(index) = self.queue.iter().position(|song| song.title() == title) {
            self.queue.remove(index);

            info!("Deleted {title:?}");
        }
    }

    pub fn upvote(&mut self, title: &str, voter: Option<&str>) {
        if let Some(song) = self.find_mut(title) {
            song.upvote(voter);
            self.sort_queue();
        }
    }

    pub fn downvote(&mut self, title: &str, voter: Option<&str>) {
        if let Some(song) = self.find_mut(title) {
            song.downvote(voter);
            self.sort_queue();
        }
    }

    pub fn has_voted(&self, title: &str, voter: &str) -> Vote {
        self.current
            .iter()
            .chain(self.queue.iter())
            .find(|song| song.title() == title)
            .map(|song| song.has_voted(Some(voter)))
            .unwrap_or_default()
    }

    fn find_mut(&mut self, title: &str) -> Option<&mut Song> {
        self.current
            .iter_mut()
            .chain(self.queue.iter_mut())
            .find(|song| song.title() == title)
    }

    pub fn view(&self, voter: Option<&str>) -> PlaylistView {
        PlaylistView {
            theme: self.theme.clone(),
            authorized_tags: self.tags.clone(),
            first_song: self.current.as_ref().map(|current| CurrentSongView {
                song: current.view(voter),
                current_time: current.current_time(),
                playing: self.playing,
            }),
            playlist: self.queue.iter().map(|song| song.view(voter)).collect(),
        }
    }

    pub fn set_theme(&mut self, theme: &str) {
        if theme.is_empty() {
            return;
        }

        self.theme = theme.to_owned();

        info!("Theme is now {theme:?}");
    }

    pub fn add_tags(&mut self, names: &[String]) {
        for name in names {
            if name.is_empty() || self.tags.iter().any(|tag| &tag.name == name) {
                continue;
            }

            self.tags.push(Tag {
                name: name.clone(),
                color: self.palette.next_color().to_owned(),
            });
        }
    }

    pub fn remove_tags(&mut self, names: &[String]) {
        self.tags.retain(|tag| !names.contains(&tag.name));
    }
}
