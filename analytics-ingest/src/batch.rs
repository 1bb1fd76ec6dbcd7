pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Append-only staging buffer. The caller checks [`Batch::is_full`] after each
/// append and drains it into a write.
#[derive(Debug)]
pub struct Batch<T> {
    rows: Vec<T>,
    capacity: usize,
}

impl<T> Batch<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            rows: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn append(&mut self, row: T) {
        self.rows.push(row);
    }

    pub fn is_full(&self) -> bool {
        self.rows.len() >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Take every buffered row, leaving the batch empty.
    pub fn drain(&mut self) -> Vec<T> {
        std::mem::replace(&mut self.rows, Vec::with_capacity(self.capacity))
    }
}
