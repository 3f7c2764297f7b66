//! Session state machine.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::channel::ChannelKind;
use crate::error::IpcError;

/// Operation requested against a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Init,
    Write,
    Read,
    Cleanup,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Write => "write",
            Self::Read => "read",
            Self::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = IpcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "init" => Ok(Self::Init),
            "write" => Ok(Self::Write),
            "read" => Ok(Self::Read),
            "cleanup" => Ok(Self::Cleanup),
            other => Err(IpcError::InvalidAction(format!("unknown action '{}'", other))),
        }
    }
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No channel exists.
    #[default]
    Uninitialized,
    /// Channel created, nothing written yet.
    Initialized,
    /// At least one message has been written.
    MessageWritten,
}

impl SessionState {
    /// Resolve the state reached by applying `action`.
    ///
    /// Transition table:
    /// - Uninitialized: init -> Initialized, write/read fail, cleanup is a no-op
    /// - Initialized / MessageWritten: init fails, write -> MessageWritten,
    ///   read keeps the state, cleanup -> Uninitialized
    pub fn next(&self, action: Action, kind: ChannelKind) -> crate::Result<SessionState> {
        use SessionState::*;
        match (*self, action) {
            (_, Action::Cleanup) => Ok(Uninitialized),
            (Uninitialized, Action::Init) => Ok(Initialized),
            (Uninitialized, Action::Write | Action::Read) => Err(IpcError::NotInitialized(kind)),
            (Initialized | MessageWritten, Action::Init) => Err(IpcError::AlreadyInitialized(kind)),
            (Initialized | MessageWritten, Action::Write) => Ok(MessageWritten),
            (state, Action::Read) => Ok(state),
        }
    }

    /// Whether a channel exists in this state.
    pub fn has_channel(&self) -> bool {
        !matches!(self, SessionState::Uninitialized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KIND: ChannelKind = ChannelKind::SharedMemory;

    #[test]
    fn test_valid_lifecycle() {
        let state = SessionState::Uninitialized;

        let state = state.next(Action::Init, KIND).unwrap();
        assert_eq!(state, SessionState::Initialized);

        // Read keeps state
        assert_eq!(state.next(Action::Read, KIND).unwrap(), SessionState::Initialized);

        let state = state.next(Action::Write, KIND).unwrap();
        assert_eq!(state, SessionState::MessageWritten);

        // Overwrite
        let state = state.next(Action::Write, KIND).unwrap();
        assert_eq!(state, SessionState::MessageWritten);
        assert_eq!(state.next(Action::Read, KIND).unwrap(), SessionState::MessageWritten);

        let state = state.next(Action::Cleanup, KIND).unwrap();
        assert_eq!(state, SessionState::Uninitialized);
    }

    #[test]
    fn test_uninitialized_rejects_io() {
        let state = SessionState::Uninitialized;
        assert!(matches!(
            state.next(Action::Write, KIND),
            Err(IpcError::NotInitialized(ChannelKind::SharedMemory))
        ));
        assert!(matches!(
            state.next(Action::Read, ChannelKind::Pipe),
            Err(IpcError::NotInitialized(ChannelKind::Pipe))
        ));
    }

    #[test]
    fn test_double_init() {
        for state in [SessionState::Initialized, SessionState::MessageWritten] {
            assert!(matches!(
                state.next(Action::Init, KIND),
                Err(IpcError::AlreadyInitialized(_))
            ));
        }
    }

    #[test]
    fn test_cleanup_always_legal() {
        for state in [
            SessionState::Uninitialized,
            SessionState::Initialized,
            SessionState::MessageWritten,
        ] {
            assert_eq!(
                state.next(Action::Cleanup, KIND).unwrap(),
                SessionState::Uninitialized
            );
        }
    }

    #[test]
    fn test_has_channel() {
        assert!(!SessionState::Uninitialized.has_channel());
        assert!(SessionState::Initialized.has_channel());
        assert!(SessionState::MessageWritten.has_channel());
    }

    #[test]
    fn test_default() {
        assert_eq!(SessionState::default(), SessionState::Uninitialized);
    }

    #[test]
    fn test_action_parse() {
        assert_eq!("init".parse::<Action>().unwrap(), Action::Init);
        assert_eq!("cleanup".parse::<Action>().unwrap(), Action::Cleanup);
        assert!(matches!(
            "delete".parse::<Action>(),
            Err(IpcError::InvalidAction(_))
        ));
        assert!("".parse::<Action>().is_err());
    }
}
