//! Session preconditions checked before any payload is read.

/// Where a session sits in the connect/join lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Unauthenticated,
    /// Handshake done, character not placed in a map
    NoMap,
    InMap,
}

/// The state a route needs before its handler may run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Requirement {
    /// Only valid before the handshake completes
    Unauthenticated,
    /// Any authenticated session, placed or not
    Authenticated,
    InMap,
}

impl Requirement {
    /// Whether a session in `state` may run a handler with this requirement
    pub fn admits(self, state: SessionState) -> bool {
        match self {
            Requirement::Unauthenticated => state == SessionState::Unauthenticated,
            Requirement::Authenticated => state != SessionState::Unauthenticated,
            Requirement::InMap => state == SessionState::InMap,
        }
    }
}
