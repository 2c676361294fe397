use crate::domain::entities::OptimisticUpdate;
use crate::domain::value_objects::OfflinePayload;

/// What to keep when the server's copy differs from the speculative one.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    KeepClient,
    AcceptServer,
    Custom(OfflinePayload),
}

pub struct ConflictContext<'a> {
    pub update: &'a OptimisticUpdate,
    pub client: &'a OfflinePayload,
    pub server: &'a OfflinePayload,
}

pub trait ConflictResolver: Send + Sync {
    fn resolve(&self, conflict: &ConflictContext<'_>) -> Resolution;
}

impl<F> ConflictResolver for F
where
    F: Fn(&ConflictContext<'_>) -> Resolution + Send + Sync,
{
    fn resolve(&self, conflict: &ConflictContext<'_>) -> Resolution {
        self(conflict)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PreferServer;

impl ConflictResolver for PreferServer {
    fn resolve(&self, _conflict: &ConflictContext<'_>) -> Resolution {
        Resolution::AcceptServer
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PreferClient;

impl ConflictResolver for PreferClient {
    fn resolve(&self, _conflict: &ConflictContext<'_>) -> Resolution {
        Resolution::KeepClient
    }
}

impl Resolution {
    pub(crate) fn apply(self, client: &OfflinePayload, server: &OfflinePayload) -> OfflinePayload {
        match self {
            Resolution::KeepClient => client.clone(),
            Resolution::AcceptServer => server.clone(),
            Resolution::Custom(merged) => merged,
        }
    }
}
