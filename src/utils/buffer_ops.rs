/// `output[i] += input[i] * amount` over the shorter of the two slices.
pub fn add_scaled(input: &[f32], amount: f32, output: &mut [f32]) {
    for (out, &sample) in output.iter_mut().zip(input) {
        *out += sample * amount;
    }
}

/// Copies `input` into the front of `output` and zeroes the rest.
pub fn copy_or_silence(input: &[f32], output: &mut [f32]) {
    let len = input.len().min(output.len());
    output[..len].copy_from_slice(&input[..len]);
    output[len..].fill(0.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_scaled() {
        let input = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let mut output = vec![1.0; 5];

        add_scaled(&input, 0.5, &mut output);

        assert_eq!(output, vec![1.5, 2.0, 2.5, 3.0, 3.5]);
    }

    #[test]
    fn test_copy_or_silence() {
        let mut output = vec![9.0; 4];
        copy_or_silence(&[1.0, 2.0], &mut output);
        assert_eq!(output, vec![1.0, 2.0, 0.0, 0.0]);
    }
}
