use crate::metrics::recorder::record_session_failed;
use crate::session::error::{SessionError, SessionResult};
use crate::session::types::SessionState;
use uuid::Uuid;

/// State tracking shared by every session type
#[derive(Debug)]
pub(crate) struct Lifecycle {
    id: Uuid,
    kind: &'static str,
    state: SessionState,
}

impl Lifecycle {
    pub(crate) fn new(kind: &'static str) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            state: SessionState::Idle,
        }
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn state(&self) -> &SessionState {
        &self.state
    }

    fn invalid(&self, operation: &'static str) -> SessionError {
        SessionError::InvalidState {
            operation,
            state: self.state.clone(),
        }
    }

    /// Idle -> Active
    pub(crate) fn start(&mut self) -> SessionResult<()> {
        if !self.state.is_idle() {
            return Err(self.invalid("start"));
        }
        self.state = SessionState::Active;
        tracing::debug!(session = %self.id, kind = self.kind, "session started");
        Ok(())
    }

    pub(crate) fn ensure_active(&self, operation: &'static str) -> SessionResult<()> {
        if self.state.is_active() {
            Ok(())
        } else {
            Err(self.invalid(operation))
        }
    }

    /// Active -> Finished
    pub(crate) fn finish(&mut self) {
        self.state = SessionState::Finished;
        tracing::debug!(session = %self.id, kind = self.kind, "session finished");
    }

    /// Active -> Failed, unless the error is caller misuse
    pub(crate) fn fail(&mut self, err: impl Into<SessionError>) -> SessionError {
        let err = err.into();
        if !err.is_usage_error() {
            tracing::warn!(session = %self.id, kind = self.kind, error = %err, "session failed");
            record_session_failed(self.kind, err.kind());
            self.state = SessionState::Failed(err.to_string());
        }
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::WireError;

    #[test]
    fn test_transitions() {
        let mut lifecycle = Lifecycle::new("test");
        assert!(lifecycle.ensure_active("update").is_err());
        lifecycle.start().unwrap();
        assert!(lifecycle.start().unwrap_err().is_usage_error());
        lifecycle.ensure_active("update").unwrap();
        lifecycle.finish();
        assert!(lifecycle.state().is_finished());
    }

    #[test]
    fn test_data_error_fails_session() {
        let mut lifecycle = Lifecycle::new("test");
        lifecycle.start().unwrap();
        let err = lifecycle.fail(WireError::UnexpectedEndOfStream {
            offset: 4,
            buffered: 2,
        });
        assert_eq!(err.kind(), "unexpected_end");
        assert!(lifecycle.state().is_failed());
    }

    #[test]
    fn test_usage_error_keeps_state() {
        let mut lifecycle = Lifecycle::new("test");
        lifecycle.start().unwrap();
        let misuse = SessionError::InvalidState {
            operation: "start",
            state: SessionState::Active,
        };
        lifecycle.fail(misuse);
        assert!(lifecycle.state().is_active());
    }
}
