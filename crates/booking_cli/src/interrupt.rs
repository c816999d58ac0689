use std::sync::{Arc, Mutex};

use booking_engine::{StopHandle, StopSignal, stop_channel};

/// Routes Ctrl-C to whichever command is currently running.
///
/// Every command gets its own stop channel from [`Interrupts::arm`], so an
/// interrupt only stops the command it arrived during.
#[derive(Clone, Default)]
pub struct Interrupts {
    current: Arc<Mutex<Option<StopHandle>>>,
}

impl Interrupts {
    /// No command armed
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh stop signal for the next command, replacing any earlier one
    pub fn arm(&self) -> StopSignal {
        let (handle, signal) = stop_channel();
        if let Ok(mut current) = self.current.lock() {
            *current = Some(handle);
        }
        signal
    }

    /// Forgets the running command; its signal never fires afterwards
    pub fn disarm(&self) {
        if let Ok(mut current) = self.current.lock() {
            *current = None;
        }
    }

    /// Stops the running command.
    ///
    /// Returns false when nothing was left to stop: no command is armed, or
    /// the armed one was already interrupted.
    pub fn interrupt(&self) -> bool {
        let Ok(current) = self.current.lock() else {
            return false;
        };
        match current.as_ref() {
            Some(handle) if !handle.is_stopped() => {
                handle.stop();
                true
            }
            _ => false,
        }
    }
}
