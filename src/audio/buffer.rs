/// A possibly-unconnected input port.
///
/// Unconnected ports and reads past the end of the buffer yield
/// `default_value`.
#[derive(Debug, Clone, Copy)]
pub struct AudioInput<'a> {
    buffer: Option<&'a [f32]>,
    default_value: f32,
}

impl<'a> AudioInput<'a> {
    pub fn new(buffer: Option<&'a [f32]>, default_value: f32) -> Self {
        Self {
            buffer,
            default_value,
        }
    }

    #[inline]
    pub fn get(&self, index: usize) -> f32 {
        self.buffer
            .and_then(|b| b.get(index))
            .copied()
            .unwrap_or(self.default_value)
    }

    pub fn is_connected(&self) -> bool {
        self.buffer.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconnected_input_uses_default() {
        let input = AudioInput::new(None, 250.0);
        assert!(!input.is_connected());
        assert_eq!(input.get(0), 250.0);
        assert_eq!(input.get(63), 250.0);
    }

    #[test]
    fn test_connected_input_falls_back_past_end() {
        let data = [1.0, 2.0];
        let input = AudioInput::new(Some(&data), 0.0);
        assert_eq!(input.get(1), 2.0);
        assert_eq!(input.get(2), 0.0);
    }
}
