//! Execution state machine.

/// Lifecycle state of a single command execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecState {
    /// Command has been configured but not started.
    #[default]
    Idle,
    /// Process is running and being supervised.
    Running,
    /// Process exited before any deadline fired.
    Completed,
    /// The fixed timeout fired and the process was killed.
    TimedOut,
    /// The fixed timeout fired but the kill could not be confirmed.
    KilledUnconfirmed,
    /// A caller-supplied context fired.
    Cancelled,
    /// Process exited but capturing its output or reaping it failed.
    Failed,
}

impl ExecState {
    /// Check if transition to target state is valid.
    ///
    /// Valid transitions:
    /// - Idle -> Running
    /// - Running -> Completed
    /// - Running -> TimedOut
    /// - Running -> Cancelled
    /// - Running -> Failed
    /// - TimedOut -> KilledUnconfirmed
    pub fn can_transition_to(&self, target: ExecState) -> bool {
        use ExecState::*;
        matches!(
            (*self, target),
            (Idle, Running)
                | (Running, Completed)
                | (Running, TimedOut)
                | (Running, Cancelled)
                | (Running, Failed)
                | (TimedOut, KilledUnconfirmed)
        )
    }

    /// Attempt to transition to a new state.
    ///
    /// Returns `Ok(())` if the transition is valid, or an error otherwise.
    pub fn transition_to(&mut self, target: ExecState) -> crate::Result<()> {
        if self.can_transition_to(target) {
            *self = target;
            Ok(())
        } else {
            Err(crate::error::CmdError::InvalidStateTransition {
                from: *self,
                to: target,
            })
        }
    }

    /// Check if this is a terminal state.
    ///
    /// `TimedOut` counts as terminal even though it may still be refined
    /// into `KilledUnconfirmed`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecState::Idle | ExecState::Running)
    }

    /// Check if the deadline (fixed or external) ended the execution.
    pub fn is_interrupted(&self) -> bool {
        matches!(
            self,
            ExecState::TimedOut | ExecState::KilledUnconfirmed | ExecState::Cancelled
        )
    }
}
