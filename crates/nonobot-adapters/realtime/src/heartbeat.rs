//! Heartbeat generations.
//!
//! Each tick is issued a ticket; any outgoing traffic advances the
//! generation, so a tick whose ticket is stale knows the connection was
//! recently active and skips its ping. Ticks always advance the generation
//! for the next one. The task driving the ticks is bound to the
//! connection's cancellation token.

/// Generation counter shared by heartbeat ticks and outgoing writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeartbeatClock {
    generation: u64,
}

impl HeartbeatClock {
    /// Creates a clock at generation zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// The ticket for a tick scheduled now.
    pub fn issue(&self) -> u64 {
        self.generation
    }

    /// Advances the generation, returning the new ticket.
    pub fn bump(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Whether nothing happened since `ticket` was issued.
    pub fn is_current(&self, ticket: u64) -> bool {
        self.generation == ticket
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_ticket() {
        let mut clock = HeartbeatClock::new();
        let ticket = clock.issue();
        assert!(clock.is_current(ticket));

        clock.bump();
        assert!(!clock.is_current(ticket));

        let next = clock.bump();
        assert!(clock.is_current(next));
        assert_eq!(next, 2);
    }
}
