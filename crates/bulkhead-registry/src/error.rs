//! Error types for registry operations.

/// Errors surfaced by [`crate::PropagationRegistry`] lifecycle operations.
///
/// Fault propagation itself never returns an error: an undeliverable fault
/// is recorded with the unhandled sink instead.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The registry worker has stopped and can no longer serve commands.
    #[error("registry channel closed")]
    ChannelClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_terse() {
        assert_eq!(RegistryError::ChannelClosed.to_string(), "registry channel closed");
    }
}
