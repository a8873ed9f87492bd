use crate::utils::buffer_ops::add_scaled;

/// Block-sized scratch buffers for node ports, allocated up front and reused
/// every cycle.
pub struct AudioBufferPool {
    pub buffers: Vec<Vec<f32>>,
    buffer_size: usize,
    available: Vec<usize>,
}

impl AudioBufferPool {
    pub fn new(buffer_size: usize, initial_capacity: usize) -> Self {
        let buffers = (0..initial_capacity)
            .map(|_| vec![0.0; buffer_size])
            .collect();
        // Hand out low indices first.
        let available = (0..initial_capacity).rev().collect();

        Self {
            buffers,
            buffer_size,
            available,
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Hands out a pre-allocated buffer, growing the pool when none is left.
    pub fn acquire(&mut self) -> usize {
        self.available.pop().unwrap_or_else(|| {
            self.buffers.push(vec![0.0; self.buffer_size]);
            self.buffers.len() - 1
        })
    }

    /// Changes the length of every buffer. Contents are zeroed.
    pub fn resize(&mut self, buffer_size: usize) {
        self.buffer_size = buffer_size;
        for buffer in &mut self.buffers {
            buffer.clear();
            buffer.resize(buffer_size, 0.0);
        }
    }

    pub fn fill(&mut self, index: usize, value: f32) {
        self.buffers[index].fill(value);
    }

    pub fn copy_in(&mut self, index: usize, data: &[f32]) {
        let buffer = &mut self.buffers[index];
        let len = data.len().min(buffer.len());
        buffer[..len].copy_from_slice(&data[..len]);
    }

    pub fn copy_out(&self, index: usize) -> &[f32] {
        &self.buffers[index]
    }

    pub fn clear(&mut self, index: usize) {
        self.buffers[index].fill(0.0);
    }

    /// Adds `source * amount` into `dest`. Mixing a buffer into itself is a
    /// no-op.
    pub fn mix_into(&mut self, source: usize, dest: usize, amount: f32) {
        if source == dest {
            return;
        }
        let (src, dst) = if source < dest {
            let (low, high) = self.buffers.split_at_mut(dest);
            (&low[source], &mut high[0])
        } else {
            let (low, high) = self.buffers.split_at_mut(source);
            (&high[0], &mut low[dest])
        };
        add_scaled(src, amount, dst);
    }

    /// Moves a buffer out so it can be written while others are borrowed.
    /// Must be handed back with [`AudioBufferPool::restore`].
    pub fn take(&mut self, index: usize) -> Vec<f32> {
        std::mem::take(&mut self.buffers[index])
    }

    pub fn restore(&mut self, index: usize, buffer: Vec<f32>) {
        self.buffers[index] = buffer;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_grows_past_initial_capacity() {
        let mut pool = AudioBufferPool::new(8, 2);
        let a = pool.acquire();
        let b = pool.acquire();
        let c = pool.acquire();
        assert_eq!((a, b, c), (0, 1, 2));
        assert_eq!(pool.buffers.len(), 3);
        assert_eq!(pool.copy_out(c).len(), 8);
    }

    #[test]
    fn test_mix_into_both_directions() {
        let mut pool = AudioBufferPool::new(4, 3);
        pool.fill(0, 1.0);
        pool.fill(2, 2.0);

        pool.mix_into(0, 1, 0.5);
        pool.mix_into(2, 1, 1.0);
        assert_eq!(pool.copy_out(1), &[2.5, 2.5, 2.5, 2.5]);

        pool.mix_into(1, 1, 1.0);
        assert_eq!(pool.copy_out(1), &[2.5, 2.5, 2.5, 2.5]);
    }

    #[test]
    fn test_take_and_restore() {
        let mut pool = AudioBufferPool::new(4, 1);
        let mut buffer = pool.take(0);
        buffer[2] = 7.0;
        pool.restore(0, buffer);
        assert_eq!(pool.copy_out(0), &[0.0, 0.0, 7.0, 0.0]);
    }

    #[test]
    fn test_resize_zeroes() {
        let mut pool = AudioBufferPool::new(4, 2);
        pool.fill(1, 3.0);
        pool.resize(16);
        assert_eq!(pool.buffer_size(), 16);
        assert!(pool.buffers.iter().all(|b| b.len() == 16 && b.iter().all(|&s| s == 0.0)));
    }
}
