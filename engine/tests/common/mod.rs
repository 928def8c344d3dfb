#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use kingjuke_engine::{
    config::JukeboxConfig,
    player::{
        output::{CompletionNotifier, PlaybackError, PlaybackHandle, PlayerController},
        resolver::{MediaResolver, ResolveError, ResolvedMedia},
        sequencer::Sequencer,
        PlaylistView,
    },
};

/// Resolves any url to a song titled after it, except `bad://` urls.
pub struct FakeResolver;

#[async_trait]
impl MediaResolver for FakeResolver {
    async fn resolve(&self, url: &str) -> Result<ResolvedMedia, ResolveError> {
        if url.starts_with("bad://") {
            return Err(ResolveError::unresolvable(url, "not a video"));
        }

        Ok(ResolvedMedia {
            title: url.to_owned(),
            url: format!("https://example.org/watch?v={url}"),
            duration_seconds: 240,
            stream_uri: url.to_owned(),
        })
    }
}

/// Keeps the completion notifier of every opened stream so tests can end
/// songs on demand.
#[derive(Default)]
pub struct FakeController {
    notifiers: Arc<Mutex<HashMap<String, CompletionNotifier>>>,
}

impl FakeController {
    pub fn finish(&self, stream_uri: &str) {
        let notifier = self.notifiers.lock().unwrap().remove(stream_uri);

        if let Some(notifier) = notifier {
            notifier.notify();
        }
    }
}

struct FakeHandle;

impl PlaybackHandle for FakeHandle {
    fn play(&mut self) {}

    fn pause(&mut self) {}

    fn stop(&mut self) {}

    fn elapsed_seconds(&self) -> u64 {
        12
    }
}

impl PlayerController for FakeController {
    fn open(
        &self,
        stream_uri: &str,
        on_complete: CompletionNotifier,
    ) -> Result<Box<dyn PlaybackHandle>, PlaybackError> {
        self.notifiers
            .lock()
            .unwrap()
            .insert(stream_uri.to_owned(), on_complete);

        Ok(Box::new(FakeHandle))
    }
}

pub fn config() -> JukeboxConfig {
    JukeboxConfig {
        blacklist: vec!["karaoke".to_owned()],
        tags: vec!["rock".to_owned()],
        ..JukeboxConfig::default()
    }
}

pub fn sequencer() -> (Sequencer, Arc<FakeController>) {
    let controller = Arc::new(FakeController::default());

    let (sequencer, _) = Sequencer::new(&config(), Arc::new(FakeResolver), controller.clone());

    (sequencer, controller)
}

pub fn current(view: &PlaylistView) -> Option<&str> {
    view.first_song.as_ref().map(|song| song.song.title.as_str())
}

pub fn queued(view: &PlaylistView) -> Vec<&str> {
    view.playlist.iter().map(|song| song.title.as_str()).collect()
}

/// Waits for the completion listener to catch up.
pub async fn wait_for_current(sequencer: &Sequencer, title: Option<&str>) -> PlaylistView {
    for _ in 0..100 {
        let view = sequencer.view(None).await;

        if current(&view) == title {
            return view;
        }

        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    panic!("current song never became {title:?}");
}
