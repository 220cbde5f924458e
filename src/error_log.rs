//! Bounded log of fault codes.
//!
//! Faults the driver detects on its own (as opposed to bus errors, which are
//! returned to the caller) are recorded here as opaque 32-bit codes. The log
//! holds the most recent `N` codes; older ones are overwritten silently. The
//! caller learns about the loss only when [`ErrorLog::drain`] reports more
//! records than the log can hold.

/// Capacity of the driver's built-in error log.
pub const MAX_NUM_ERRORS: usize = 10;

/// Faults recorded by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fault {
    /// The clock held a non-real time (zero month or day) and was reset to
    /// the fallback time
    NonRealTime,
    /// The clock reads a time before the trusted year floor
    AncientTime,
    /// The battery backup enable bit was clear, so all power was lost
    PowerLoss,
}

impl Fault {
    /// The 32-bit code stored in the log.
    pub const fn code(self) -> u32 {
        match self {
            Fault::NonRealTime => 0x5001_01F5,
            Fault::AncientTime => 0x5002_01F5,
            Fault::PowerLoss => 0x5003_01F5,
        }
    }

    /// Looks a stored code up in the catalogue.
    pub fn from_code(code: u32) -> Option<Self> {
        [Fault::NonRealTime, Fault::AncientTime, Fault::PowerLoss]
            .into_iter()
            .find(|f| f.code() == code)
    }
}

impl From<Fault> for u32 {
    fn from(f: Fault) -> Self {
        f.code()
    }
}

/// Fixed-capacity ring buffer of fault codes.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorLog<const N: usize> {
    entries: [u32; N],
    cursor: usize,
    pending: u32,
}

impl<const N: usize> Default for ErrorLog<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> ErrorLog<N> {
    /// Creates an empty log.
    pub const fn new() -> Self {
        Self {
            entries: [0; N],
            cursor: 0,
            pending: 0,
        }
    }

    /// Number of entries the log can hold.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Records written since the last drain. May exceed the capacity.
    pub fn pending(&self) -> u32 {
        self.pending
    }

    /// `true` if nothing was recorded since the last drain.
    pub fn is_empty(&self) -> bool {
        self.pending == 0
    }

    /// `true` if undrained records have been overwritten.
    pub fn is_overrun(&self) -> bool {
        self.pending as usize > N
    }

    /// Appends `code`, overwriting the oldest entry when full. Returns the
    /// number of records pending.
    pub fn record(&mut self, code: impl Into<u32>) -> u32 {
        if N == 0 {
            self.pending = self.pending.saturating_add(1);
            return self.pending;
        }
        let code = code.into();
        self.entries[self.cursor] = code;
        self.cursor = (self.cursor + 1) % N;
        self.pending = self.pending.saturating_add(1);
        if self.is_overrun() {
            warn!("error log overrun: {} records pending", self.pending);
        }
        self.pending
    }

    /// Copies the still-valid entries into `out`, oldest first, and empties
    /// the log.
    ///
    /// At most `N` entries are copied. The return value is the number of
    /// records written since the previous drain; a value above `N` means
    /// `value - N` records were lost.
    pub fn drain(&mut self, out: &mut [u32; N]) -> u32 {
        let pending = self.pending;
        let valid = (pending as usize).min(N);
        // oldest valid entry sits `valid` slots behind the cursor
        let start = (self.cursor + N - valid) % N.max(1);
        for (i, slot) in out.iter_mut().take(valid).enumerate() {
            let index = (start + i) % N;
            *slot = self.entries[index];
            self.entries[index] = 0;
        }
        self.cursor = 0;
        self.pending = 0;
        debug!("error log drained: {} pending, {} copied", pending, valid);
        pending
    }
}
