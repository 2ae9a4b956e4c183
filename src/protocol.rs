//! Протокол фоновой генерации
//!
//! Хост отправляет [`WorkerRequest`], фоновый поток отвечает [`WorkerMessage`].
//! Запрос переезжает в поток, готовый [`World`] переезжает обратно целиком,
//! без копирования. Сообщения сериализуемы (`serde`, тег `type`), так что тот
//! же протокол годится и для межпроцессной передачи.
//!
//! Новый `Generate` отменяет незавершённую генерацию: поток проверяет входящую
//! очередь на границе каждого этапа.

use std::ops::ControlFlow;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::GenerationRequest;
use crate::error::GenerationError;
use crate::world::{Stage, World, generate_with_progress};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerRequest {
    Generate { id: u64, request: GenerationRequest },
    Shutdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    Progress { id: u64, stage: Stage, percent: u8 },
    Complete { id: u64, world: Box<World> },
    Error { id: u64, cause: String },
}

impl WorkerMessage {
    /// Идентификатор запроса, к которому относится сообщение
    #[must_use]
    pub fn id(&self) -> u64 {
        match self {
            WorkerMessage::Progress { id, .. }
            | WorkerMessage::Complete { id, .. }
            | WorkerMessage::Error { id, .. } => *id,
        }
    }
}

/// Фоновый поток генерации
pub struct Worker {
    requests: Sender<WorkerRequest>,
    messages: Receiver<WorkerMessage>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    #[must_use]
    pub fn spawn() -> Self {
        let (request_tx, request_rx) = mpsc::channel();
        let (message_tx, message_rx) = mpsc::channel();
        let handle = thread::spawn(move || serve(&request_rx, &message_tx));
        Self {
            requests: request_tx,
            messages: message_rx,
            handle: Some(handle),
        }
    }

    /// Ставит запрос в очередь; `false`, если поток уже завершён.
    pub fn send(&self, request: WorkerRequest) -> bool {
        self.requests.send(request).is_ok()
    }

    /// Запускает генерацию с идентификатором `id`.
    pub fn generate(&self, id: u64, request: GenerationRequest) -> bool {
        self.send(WorkerRequest::Generate { id, request })
    }

    /// Ждёт следующее сообщение; `None`, если поток завершён.
    #[must_use]
    pub fn recv(&self) -> Option<WorkerMessage> {
        self.messages.recv().ok()
    }

    /// Ждёт следующее сообщение не дольше `timeout`.
    #[must_use]
    pub fn recv_timeout(&self, timeout: Duration) -> Option<WorkerMessage> {
        match self.messages.recv_timeout(timeout) {
            Ok(message) => Some(message),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Сообщение, если оно уже пришло
    #[must_use]
    pub fn try_recv(&self) -> Option<WorkerMessage> {
        self.messages.try_recv().ok()
    }

    /// Останавливает поток и дожидается его завершения.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.requests.send(WorkerRequest::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("поток генерации завершился паникой");
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn serve(requests: &Receiver<WorkerRequest>, messages: &Sender<WorkerMessage>) {
    let mut pending: Option<WorkerRequest> = None;
    loop {
        let next = match pending.take() {
            Some(request) => request,
            None => match requests.recv() {
                Ok(request) => request,
                Err(_) => break,
            },
        };
        let (id, request) = match next {
            WorkerRequest::Shutdown => break,
            WorkerRequest::Generate { id, request } => (id, request),
        };

        let mut host_gone = false;
        let result = generate_with_progress(&request, |stage, percent| {
            if let Some(newer) = drain_latest(requests) {
                pending = Some(newer);
                return ControlFlow::Break(());
            }
            if messages
                .send(WorkerMessage::Progress { id, stage, percent })
                .is_err()
            {
                host_gone = true;
                return ControlFlow::Break(());
            }
            ControlFlow::Continue(())
        });
        if host_gone {
            break;
        }

        let reply = match result {
            Ok(world) => WorkerMessage::Complete {
                id,
                world: Box::new(world),
            },
            Err(GenerationError::Cancelled) => {
                tracing::debug!(id, "генерация вытеснена новым запросом");
                continue;
            }
            Err(err) => WorkerMessage::Error {
                id,
                cause: err.to_string(),
            },
        };
        if messages.send(reply).is_err() {
            break;
        }
    }
    tracing::debug!("поток генерации остановлен");
}

/// Самый свежий запрос из очереди; `Shutdown` имеет приоритет над остальными.
fn drain_latest(requests: &Receiver<WorkerRequest>) -> Option<WorkerRequest> {
    let mut latest = None;
    loop {
        match requests.try_recv() {
            Ok(WorkerRequest::Shutdown) => return Some(WorkerRequest::Shutdown),
            Ok(request) => latest = Some(request),
            Err(TryRecvError::Empty) => return latest,
            Err(TryRecvError::Disconnected) => return Some(WorkerRequest::Shutdown),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_tagged() {
        let message = WorkerMessage::Progress {
            id: 3,
            stage: Stage::Hydrology,
            percent: 30,
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["id"], 3);

        let request: WorkerRequest = serde_json::from_str(r#"{"type":"shutdown"}"#).unwrap();
        assert!(matches!(request, WorkerRequest::Shutdown));
    }

    #[test]
    fn shutdown_wins_over_queued_work() {
        let (tx, rx) = mpsc::channel();
        tx.send(WorkerRequest::Generate {
            id: 1,
            request: GenerationRequest::default(),
        })
        .unwrap();
        tx.send(WorkerRequest::Shutdown).unwrap();
        assert!(matches!(drain_latest(&rx), Some(WorkerRequest::Shutdown)));
        assert!(drain_latest(&rx).is_none());
    }
}
