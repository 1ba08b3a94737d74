//! Monotonic port allocation for workers.

use crate::{HarnessError, Result};

/// Ports handed to one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortPair {
    pub bit_port: u16,
    pub user_port: u16,
}

/// Two counters seeded from the base configuration.
///
/// Each allocation returns the current values and then increments both, so
/// a harness never hands out the same pair twice. Counters are wider than a
/// port to detect exhaustion instead of wrapping.
#[derive(Debug, Clone)]
pub struct PortAllocator {
    next_bit: u32,
    next_user: u32,
}

impl PortAllocator {
    pub fn new(initial_bit_port: u16, initial_user_port: u16) -> Self {
        Self {
            next_bit: u32::from(initial_bit_port),
            next_user: u32::from(initial_user_port),
        }
    }

    /// The pair the next allocation would return.
    pub fn peek(&self) -> Option<PortPair> {
        Some(PortPair {
            bit_port: u16::try_from(self.next_bit).ok()?,
            user_port: u16::try_from(self.next_user).ok()?,
        })
    }

    pub fn allocate(&mut self) -> Result<PortPair> {
        let pair = self.peek().ok_or(HarnessError::PortsExhausted {
            next_bit: self.next_bit,
            next_user: self.next_user,
        })?;

        self.next_bit += 1;
        self.next_user += 1;
        Ok(pair)
    }
}
