use std::io;

use interprocess::local_socket::{tokio::prelude::*, GenericNamespaced, ListenerOptions};
use thiserror::Error;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, BufWriter},
    sync::{
        broadcast::{self, error::RecvError},
        mpsc::{self},
    },
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{EngineCommand, EngineResponse, Rejection};

/// Longest command line a connection may send before it is dropped.
pub const MAX_LINE_LENGTH: u64 = 64 * 1024;

#[derive(Debug, Error)]
pub enum IPCServerError {
    #[error("invalid socket name {0:?}")]
    InvalidAddress(String),
    #[error("socket {0:?} is already in use")]
    AddressInUse(String),
    #[error("could not listen on socket: {0}")]
    Listen(#[from] io::Error),
}

/// Accepts local-socket connections and speaks JSON lines on them. Every
/// connection gets its own id; commands are forwarded tagged with it and
/// only responses carrying that id are written back.
pub struct IPCServer {
    socket_listener: JoinHandle<()>,
}

impl IPCServer {
    pub fn create(
        socket_name: &str,
    ) -> Result<
        (
            IPCServer,
            mpsc::Receiver<(EngineCommand, Uuid)>,
            broadcast::Sender<(EngineResponse, Uuid)>,
        ),
        IPCServerError,
    > {
        let Ok(socket_ns_name) = socket_name.to_ns_name::<GenericNamespaced>() else {
            return Err(IPCServerError::InvalidAddress(socket_name.to_owned()));
        };

        let listener_options = ListenerOptions::new().name(socket_ns_name);

        let listener = match listener_options.create_tokio() {
            Ok(listener) => listener,
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                return Err(IPCServerError::AddressInUse(socket_name.to_owned()));
            }
            Err(e) => return Err(e.into()),
        };

        info!("Listening on {socket_name}");

        let (response_sender, _) = broadcast::channel::<(EngineResponse, Uuid)>(64);
        let (command_sender, command_receiver) = mpsc::channel::<(EngineCommand, Uuid)>(64);

        let external_response_sender = response_sender.clone();

        let socket_listener = tokio::spawn(async move {
            loop {
                let connection = match listener.accept().await {
                    Ok(x) => x,
                    Err(e) => {
                        warn!("Failed to accept a connection: {e}");

                        continue;
                    }
                };

                let connection_id = Uuid::new_v4();

                debug!("Connection {connection_id} opened");

                let new_command_sender = command_sender.clone();
                let rejection_sender = response_sender.clone();
                let mut new_response_receiver = response_sender.subscribe();

                let (receiver, sender) = connection.split();

                let connection_writer = tokio::spawn(async move {
                    let mut sender = BufWriter::new(sender);

                    loop {
                        let (response, uuid) = match new_response_receiver.recv().await {
                            Ok(message) => message,
                            Err(RecvError::Lagged(skipped)) => {
                                warn!("Connection {connection_id} missed {skipped} responses");

                                continue;
                            }
                            Err(RecvError::Closed) => break,
                        };

                        if uuid != connection_id {
                            continue;
                        }

                        let Ok(mut message) = serde_json::to_string(&response) else {
                            continue;
                        };
                        message.push('\n');

                        if sender.write_all(message.as_bytes()).await.is_err()
                            || sender.flush().await.is_err()
                        {
                            break;
                        }
                    }
                });

                tokio::spawn(async move {
                    let mut receiver = BufReader::new(receiver);

                    loop {
                        let mut buffer: Vec<u8> = Vec::new();

                        let read = (&mut receiver)
                            .take(MAX_LINE_LENGTH)
                            .read_until(b'\n', &mut buffer)
                            .await;

                        match read {
                            Ok(0) => break,
                            Ok(_) => {}
                            Err(e) => {
                                debug!("Connection {connection_id} read failed: {e}");

                                break;
                            }
                        }

                        let truncated = buffer.last() != Some(&b'\n')
                            && buffer.len() as u64 >= MAX_LINE_LENGTH;

                        if truncated {
                            warn!("Connection {connection_id} sent an overlong line");

                            let _ = rejection_sender.send((
                                EngineResponse::nope(Rejection::BadRequest, "line too long"),
                                connection_id,
                            ));

                            if !skip_line(&mut receiver).await {
                                break;
                            }

                            continue;
                        }

                        if buffer.trim_ascii().is_empty() {
                            continue;
                        }

                        let message = match serde_json::from_slice::<EngineCommand>(&buffer) {
                            Ok(message) => message,
                            Err(e) => {
                                let _ = rejection_sender.send((
                                    EngineResponse::nope(Rejection::BadRequest, e.to_string()),
                                    connection_id,
                                ));

                                continue;
                            }
                        };

                        match message {
                            EngineCommand::Goodbye => {
                                break;
                            }
                            other_command => {
                                if new_command_sender
                                    .send((other_command, connection_id))
                                    .await
                                    .is_err()
                                {
                                    break;
                                }
                            }
                        };
                    }

                    debug!("Connection {connection_id} closed");

                    connection_writer.abort();
                });
            }
        });

        Ok((
            IPCServer { socket_listener },
            command_receiver,
            external_response_sender,
        ))
    }
}

/// Discards input up to the next newline. Returns false once the connection
/// is gone.
async fn skip_line<R: AsyncBufRead + Unpin>(receiver: &mut R) -> bool {
    let mut discarded = Vec::new();

    loop {
        discarded.clear();

        match (&mut *receiver)
            .take(MAX_LINE_LENGTH)
            .read_until(b'\n', &mut discarded)
            .await
        {
            Ok(0) | Err(_) => return false,
            Ok(_) if discarded.last() == Some(&b'\n') => return true,
            Ok(_) => {}
        }
    }
}

impl Drop for IPCServer {
    fn drop(&mut self) {
        self.socket_listener.abort();
    }
}
