/// Number of recent samples the vibration envelope is taken over.
pub const WINDOW_SIZE: usize = 9;

/// Fixed-size ring of the most recent preprocessed vibration samples.
///
/// Until `WINDOW_SIZE` samples have been pushed the ring only holds what it has
/// seen; afterwards every push evicts the oldest sample.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvelopeWindow {
    slots: [u32; WINDOW_SIZE],
    /// Index the next sample is written to.
    head: usize,
    len: usize,
}

impl EnvelopeWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `sample`, returning the sample it displaced once the ring is full.
    pub fn push(&mut self, sample: u32) -> Option<u32> {
        let evicted = (self.len == WINDOW_SIZE).then_some(self.slots[self.head]);
        self.slots[self.head] = sample;
        self.head = (self.head + 1) % WINDOW_SIZE;
        self.len = (self.len + 1).min(WINDOW_SIZE);
        evicted
    }

    /// Envelope value: the largest sample currently held, 0 when empty.
    pub fn max(&self) -> u32 {
        self.iter().max().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Held samples, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        let start = (self.head + WINDOW_SIZE - self.len) % WINDOW_SIZE;
        (0..self.len).map(move |i| self.slots[(start + i) % WINDOW_SIZE])
    }
}
