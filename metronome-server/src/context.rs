use std::sync::Arc;

use axum::extract::FromRef;
use metronome_core::{MemoryCatalog, Metronome};

use crate::{directory::Directory, sse::SseBroadcaster};

/// Shared state available to all route handlers.
#[derive(Clone, FromRef)]
pub struct ServerContext {
    pub metronome: Arc<Metronome>,
    pub catalog: Arc<MemoryCatalog>,
    pub directory: Arc<Directory>,
    pub sse: Arc<SseBroadcaster>,
}
