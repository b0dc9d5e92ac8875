use thiserror::Error;

use crate::dao::models::CourtId;

/// Presence phases of a client session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PresencePhase {
    /// Not checked in anywhere.
    #[default]
    Unchecked,
    /// Checked in at the given court.
    CheckedIn(CourtId),
}

impl PresencePhase {
    /// Court the session is checked in at, if any.
    pub fn court(&self) -> Option<CourtId> {
        match self {
            PresencePhase::Unchecked => None,
            PresencePhase::CheckedIn(id) => Some(*id),
        }
    }
}

/// Events that can be applied to the presence machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceEvent {
    /// Entered the check-in radius of a court.
    Enter(CourtId),
    /// Left the check-out radius of the current court.
    Exit,
    /// Authoritative state adopted from the server or a confirmed manual action.
    Reconciled(Option<CourtId>),
    /// Local logout; no request is made.
    Reset,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    pub from: PresencePhase,
    pub event: PresenceEvent,
}

/// Two-state presence machine.
///
/// A direct court-to-court jump is only possible through `Reconciled`; geofence
/// driven changes must pass through `Unchecked`.
#[derive(Debug, Clone, Default)]
pub struct PresenceMachine {
    phase: PresencePhase,
    version: usize,
}

impl PresenceMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> PresencePhase {
        self.phase
    }

    /// Incremented on every transition that changes the phase.
    pub fn version(&self) -> usize {
        self.version
    }

    /// Apply an event, returning the new phase.
    pub fn apply(&mut self, event: PresenceEvent) -> Result<PresencePhase, InvalidTransition> {
        let next = self.compute_transition(event)?;
        if next != self.phase {
            self.phase = next;
            self.version += 1;
        }
        Ok(self.phase)
    }

    fn compute_transition(&self, event: PresenceEvent) -> Result<PresencePhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (PresencePhase::Unchecked, PresenceEvent::Enter(court)) => PresencePhase::CheckedIn(court),
            (PresencePhase::CheckedIn(_), PresenceEvent::Exit) => PresencePhase::Unchecked,
            (_, PresenceEvent::Reconciled(Some(court))) => PresencePhase::CheckedIn(court),
            (_, PresenceEvent::Reconciled(None)) | (_, PresenceEvent::Reset) => {
                PresencePhase::Unchecked
            }
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_unchecked() {
        let machine = PresenceMachine::new();
        assert_eq!(machine.phase(), PresencePhase::Unchecked);
        assert_eq!(machine.version(), 0);
    }

    #[test]
    fn enter_then_exit() {
        let mut machine = PresenceMachine::new();
        assert_eq!(
            machine.apply(PresenceEvent::Enter(7)).unwrap(),
            PresencePhase::CheckedIn(7)
        );
        assert_eq!(machine.apply(PresenceEvent::Exit).unwrap(), PresencePhase::Unchecked);
        assert_eq!(machine.version(), 2);
    }

    #[test]
    fn court_to_court_requires_exit_first() {
        let mut machine = PresenceMachine::new();
        machine.apply(PresenceEvent::Enter(1)).unwrap();
        let err = machine.apply(PresenceEvent::Enter(2)).unwrap_err();
        assert_eq!(err.from, PresencePhase::CheckedIn(1));
        assert_eq!(machine.phase(), PresencePhase::CheckedIn(1));
    }

    #[test]
    fn exit_while_unchecked_is_invalid() {
        let mut machine = PresenceMachine::new();
        assert!(machine.apply(PresenceEvent::Exit).is_err());
    }

    #[test]
    fn reconcile_and_reset_apply_from_any_phase() {
        let mut machine = PresenceMachine::new();
        machine.apply(PresenceEvent::Enter(1)).unwrap();
        assert_eq!(
            machine.apply(PresenceEvent::Reconciled(Some(4))).unwrap(),
            PresencePhase::CheckedIn(4)
        );
        assert_eq!(machine.apply(PresenceEvent::Reset).unwrap(), PresencePhase::Unchecked);
        let version = machine.version();
        machine.apply(PresenceEvent::Reset).unwrap();
        assert_eq!(machine.version(), version);
    }
}
