use std::sync::Arc;

use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use tracing::debug;

use super::{
    output::{PlaybackEvent, PlayerController},
    playlist::Playlist,
    resolver::MediaResolver,
    song::{Song, SongError, Vote},
    PlaylistView,
};
use crate::config::JukeboxConfig;

/// Shared handle on the jukebox. Every request and every playback completion
/// goes through the same lock, so a view never sees a half-done promotion
/// or a queue in the middle of a sort.
#[derive(Clone)]
pub struct Sequencer {
    playlist: Arc<Mutex<Playlist>>,
    resolver: Arc<dyn MediaResolver>,
    blacklist: Arc<Vec<String>>,
}

impl Sequencer {
    /// Builds the playlist and spawns the task that feeds playback
    /// completions back into it.
    pub fn new(
        config: &JukeboxConfig,
        resolver: Arc<dyn MediaResolver>,
        controller: Arc<dyn PlayerController>,
    ) -> (Sequencer, JoinHandle<()>) {
        let (event_sender, mut event_receiver) = mpsc::unbounded_channel::<PlaybackEvent>();

        let playlist = Arc::new(Mutex::new(Playlist::new(
            &config.theme,
            &config.tags,
            controller,
            event_sender,
        )));

        let listener_playlist = playlist.clone();

        let completion_listener = tokio::spawn(async move {
            while let Some(event) = event_receiver.recv().await {
                debug!("Playback event: {event:?}");

                listener_playlist.lock().await.on_playback_event(event);
            }
        });

        (
            Sequencer {
                playlist,
                resolver,
                blacklist: Arc::new(config.blacklist.clone()),
            },
            completion_listener,
        )
    }

    pub async fn view(&self, voter: Option<&str>) -> PlaylistView {
        self.playlist.lock().await.view(voter)
    }

    /// Resolves the url outside the lock, then queues the song and starts
    /// playback if nothing is playing yet.
    pub async fn add_song(&self, url: &str, tags: Vec<String>) -> Result<String, SongError> {
        let song = Song::resolve(self.resolver.as_ref(), url, &self.blacklist, tags).await?;
        let title = song.title().to_owned();

        let mut playlist = self.playlist.lock().await;
        playlist.add_song(song);
        playlist.play_song();

        Ok(title)
    }

    pub async fn delete_song(&self, title: &str) {
        self.playlist.lock().await.delete_song(title);
    }

    pub async fn upvote(&self, title: &str, voter: Option<&str>) {
        self.playlist.lock().await.upvote(title, voter);
    }

    pub async fn downvote(&self, title: &str, voter: Option<&str>) {
        self.playlist.lock().await.downvote(title, voter);
    }

    pub async fn has_voted(&self, title: &str, voter: &str) -> Vote {
        self.playlist.lock().await.has_voted(title, voter)
    }

    pub async fn play(&self) {
        self.playlist.lock().await.play();
    }

    pub async fn pause(&self) {
        self.playlist.lock().await.pause();
    }

    pub async fn toggle_pause(&self) {
        self.playlist.lock().await.toggle_pause();
    }

    pub async fn advance(&self) {
        self.playlist.lock().await.advance();
    }

    pub async fn set_theme(&self, theme: &str) {
        self.playlist.lock().await.set_theme(theme);
    }

    pub async fn add_tags(&self, names: &[String]) {
        self.playlist.lock().await.add_tags(names);
    }

    pub async fn remove_tags(&self, names: &[String]) {
        self.playlist.lock().await.remove_tags(names);
    }

    pub async fn reset(&self) {
        self.playlist.lock().await.reset();
    }
}
