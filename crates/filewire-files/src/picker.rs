use filewire_rpc::{Resolver, Token};
use tracing::warn;

/// Metadata of a file chosen through the host's selection UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentInfo {
    /// Opaque locator the bridge can open later.
    pub uri: String,
    /// Human-readable name.
    pub display_name: String,
    /// MIME type reported by the host.
    pub mime_type: String,
    /// Size in bytes.
    pub size: u64,
}

/// External collaborator that lets a human pick a file.
///
/// `begin_selection` must not block: the selection result is produced on
/// the host's own time (a dialog, a broadcast) and delivered through the
/// resolver whenever it arrives. The token ties that delivery back to the
/// request that asked for it.
pub trait FilePicker: Send + Sync {
    /// Whether a selection UI is attached. Routers answer requests with an
    /// error result instead of calling `begin_selection` when this is false.
    fn available(&self) -> bool {
        true
    }

    /// Kick off an out-of-band selection for the given pending request.
    fn begin_selection(&self, token: Token, resolver: Resolver);
}

/// Picker for unattended deployments: reports itself unavailable.
#[derive(Debug, Default)]
pub struct NoPicker;

impl FilePicker for NoPicker {
    fn available(&self) -> bool {
        false
    }

    fn begin_selection(&self, token: Token, resolver: Resolver) {
        // Routers check available() first; reclaim the slot if one reaches
        // us anyway.
        warn!(
            rid = token.correlation_id(),
            "selection started without a picker; discarding"
        );
        resolver.discard(token);
    }
}
