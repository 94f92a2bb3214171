use std::fmt;

/// Why a map operation did not produce a reply.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapError {
    /// The owner is no longer running. Either the map was closed, every handle was dropped, or the
    /// runtime hosting the owner shut down.
    Unavailable,
    /// The configured timeout elapsed before the owner replied.
    TimedOut,
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unavailable => "the map owner is not running",
            Self::TimedOut => "timed out waiting for the map owner",
        })
    }
}

impl std::error::Error for MapError {}
