use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use auth::{AdminCredentials, AuthError};
use config::JukeboxConfig;
use ipc::server::{IPCServer, IPCServerError};
use player::{
    output::PlayerController, resolver::MediaResolver, sequencer::Sequencer, song::SongError,
    PlaylistView,
};

pub mod auth;
pub mod config;
pub mod ipc;
pub mod player;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum EngineCommand {
    None,
    Goodbye,

    View {
        #[serde(default)]
        voter: Option<String>,
    },

    AddSong {
        url: String,
        #[serde(default)]
        tags: Option<Value>,
    },

    Upvote {
        title: String,
        #[serde(default)]
        voter: Option<String>,
    },
    Downvote {
        title: String,
        #[serde(default)]
        voter: Option<String>,
    },
    HasVoted {
        title: String,
        voter: String,
    },

    Login {
        user: String,
        password: String,
    },
    Admin {
        user: String,
        password: String,
        action: AdminCommand,
    },
}

/// Transport and curation commands that need the admin login.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum AdminCommand {
    Play,
    Pause,
    TogglePause,
    Next,

    Delete { title: String },

    SetTheme { name: String },
    AddTags { tags: Value },
    RemoveTags { tags: Value },

    Reset,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    InvalidUrl,
    BlackListed,
    Unauthorized,
    BadRequest,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum EngineResponse {
    Ok,
    Nope { reason: Rejection, message: String },

    View(PlaylistView),
    Accepted { title: String },
    Vote { title: String, vote: i8 },
}

impl EngineResponse {
    pub fn nope(reason: Rejection, message: impl Into<String>) -> EngineResponse {
        EngineResponse::Nope {
            reason,
            message: message.into(),
        }
    }
}

impl From<SongError> for EngineResponse {
    fn from(error: SongError) -> EngineResponse {
        let reason = match error {
            SongError::InvalidUrl(_) => Rejection::InvalidUrl,
            SongError::BlackListed(_) => Rejection::BlackListed,
        };

        EngineResponse::nope(reason, error.to_string())
    }
}

impl From<AuthError> for EngineResponse {
    fn from(error: AuthError) -> EngineResponse {
        EngineResponse::nope(Rejection::Unauthorized, error.to_string())
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Ipc(#[from] IPCServerError),
}

/// Turns commands into calls on the shared sequencer.
#[derive(Clone)]
pub struct Engine {
    sequencer: Sequencer,
    credentials: AdminCredentials,
}

/// A running engine: the socket server plus the tasks feeding the sequencer.
/// Dropping it stops everything.
pub struct EngineService {
    engine: Engine,

    _ipc_server: IPCServer,
    command_processor: JoinHandle<()>,
    completion_listener: JoinHandle<()>,
}

impl Engine {
    /// Must be called from inside a tokio runtime.
    pub fn create(
        config: &JukeboxConfig,
        resolver: Arc<dyn MediaResolver>,
        controller: Arc<dyn PlayerController>,
    ) -> (Engine, JoinHandle<()>) {
        let (sequencer, completion_listener) = Sequencer::new(config, resolver, controller);

        let engine = Engine {
            sequencer,
            credentials: AdminCredentials::new(&config.admin_user, &config.admin_password),
        };

        (engine, completion_listener)
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    pub async fn process(&self, command: EngineCommand) -> EngineResponse {
        match command {
            EngineCommand::None | EngineCommand::Goodbye => EngineResponse::Ok,
            EngineCommand::View { voter } => {
                EngineResponse::View(self.sequencer.view(voter.as_deref()).await)
            }
            EngineCommand::AddSong { url, tags } => {
                match self.sequencer.add_song(&url, coerce_tags(tags)).await {
                    Ok(title) => EngineResponse::Accepted { title },
                    Err(e) => e.into(),
                }
            }
            EngineCommand::Upvote { title, voter } => {
                self.sequencer.upvote(&title, voter.as_deref()).await;

                EngineResponse::Ok
            }
            EngineCommand::Downvote { title, voter } => {
                self.sequencer.downvote(&title, voter.as_deref()).await;

                EngineResponse::Ok
            }
            EngineCommand::HasVoted { title, voter } => {
                let vote = self.sequencer.has_voted(&title, &voter).await;

                EngineResponse::Vote {
                    title,
                    vote: vote.into(),
                }
            }
            EngineCommand::Login { user, password } => {
                match self.credentials.verify(&user, &password) {
                    Ok(()) => EngineResponse::Ok,
                    Err(e) => e.into(),
                }
            }
            EngineCommand::Admin {
                user,
                password,
                action,
            } => {
                if let Err(e) = self.credentials.verify(&user, &password) {
                    return e.into();
                }

                self.process_admin(action).await;

                EngineResponse::Ok
            }
        }
    }

    async fn process_admin(&self, action: AdminCommand) {
        debug!("Admin command: {action:?}");

        match action {
            AdminCommand::Play => self.sequencer.play().await,
            AdminCommand::Pause => self.sequencer.pause().await,
            AdminCommand::TogglePause => self.sequencer.toggle_pause().await,
            AdminCommand::Next => self.sequencer.advance().await,
            AdminCommand::Delete { title } => self.sequencer.delete_song(&title).await,
            AdminCommand::SetTheme { name } => self.sequencer.set_theme(&name).await,
            AdminCommand::AddTags { tags } => {
                self.sequencer.add_tags(&coerce_tags(Some(tags))).await
            }
            AdminCommand::RemoveTags { tags } => {
                self.sequencer.remove_tags(&coerce_tags(Some(tags))).await
            }
            AdminCommand::Reset => self.sequencer.reset().await,
        }
    }

    /// Opens the command socket and starts answering on it.
    pub fn serve(
        self,
        socket_name: &str,
        completion_listener: JoinHandle<()>,
    ) -> Result<EngineService, EngineError> {
        let (ipc_server, receiver, sender) = IPCServer::create(socket_name)?;

        let command_processor = self.start_command_processor(receiver, sender);

        Ok(EngineService {
            engine: self,
            _ipc_server: ipc_server,
            command_processor,
            completion_listener,
        })
    }

    fn start_command_processor(
        &self,
        mut command_receiver: mpsc::Receiver<(EngineCommand, Uuid)>,
        response_sender: broadcast::Sender<(EngineResponse, Uuid)>,
    ) -> JoinHandle<()> {
        let engine = self.clone();

        tokio::spawn(async move {
            while let Some((command, uuid)) = command_receiver.recv().await {
                let engine = engine.clone();
                let response_sender = response_sender.clone();

                // The playlist lock orders the commands; a slow resolve must
                // not hold up everyone else's.
                tokio::spawn(async move {
                    let response = engine.process(command).await;

                    if let EngineResponse::Nope { reason, message } = &response {
                        warn!("Refused command from {uuid}: {reason:?} ({message})");
                    }

                    let _ = response_sender.send((response, uuid));
                });
            }

            info!("Command processor stopped");
        })
    }
}

impl EngineService {
    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}

impl Drop for EngineService {
    fn drop(&mut self) {
        self.command_processor.abort();
        self.completion_listener.abort();

        info!("Engine stopped");
    }
}

/// Tag lists arrive as loosely as clients send them: an array of names, a
/// string holding such an array, or garbage. Anything unusable becomes an
/// empty list.
pub fn coerce_tags(tags: Option<Value>) -> Vec<String> {
    match tags {
        Some(Value::Array(values)) => values
            .into_iter()
            .filter_map(|value| match value {
                Value::String(name) => Some(name),
                _ => None,
            })
            .collect(),
        Some(Value::String(encoded)) => match serde_json::from_str::<Value>(&encoded) {
            Ok(decoded @ Value::Array(_)) => coerce_tags(Some(decoded)),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}
