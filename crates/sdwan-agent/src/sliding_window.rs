//! Fixed-capacity FIFO buffer used to smooth probe samples over time.

use std::collections::VecDeque;

use sdwan_common::SdwanError;

/// A ring buffer of floats with a fixed maximum length. Appending past
/// capacity evicts the oldest sample.
#[derive(Debug, Clone)]
pub struct SlidingWindowBuffer {
    capacity: usize,
    samples: VecDeque<f64>,
}

impl SlidingWindowBuffer {
    pub fn new(capacity: usize) -> Result<Self, SdwanError> {
        if capacity == 0 {
            return Err(SdwanError::InvalidArgument(
                "sliding window capacity must be greater than zero".into(),
            ));
        }
        Ok(Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        })
    }

    pub fn append(&mut self, value: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    pub fn mean(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().sum::<f64>() / self.samples.len() as f64)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.samples.iter()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(SlidingWindowBuffer::new(0).is_err());
    }

    #[test]
    fn respects_window_bound() {
        let mut buf = SlidingWindowBuffer::new(3).unwrap();
        for i in 1..=10 {
            buf.append(i as f64);
            assert!(buf.len() <= 3);
        }
        let contents: Vec<f64> = buf.iter().copied().collect();
        assert_eq!(contents, vec![8.0, 9.0, 10.0]);
    }

    #[test]
    fn mean_of_empty_is_absent() {
        let buf = SlidingWindowBuffer::new(5).unwrap();
        assert_eq!(buf.mean(), None);
    }

    #[test]
    fn mean_matches_sum_over_len() {
        let mut buf = SlidingWindowBuffer::new(5).unwrap();
        buf.append(10.0);
        buf.append(20.0);
        buf.append(30.0);
        assert_eq!(buf.mean(), Some(20.0));
    }

    #[test]
    fn clear_empties_buffer() {
        let mut buf = SlidingWindowBuffer::new(2).unwrap();
        buf.append(1.0);
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.mean(), None);
    }
}
