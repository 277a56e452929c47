/// Block-averaging decimator from a device's native rate to a fixed target rate.
///
/// Output sample `i` is the mean of input samples in
/// `[floor(i * ratio), floor((i + 1) * ratio))` where `ratio = from / to`.
/// This is a moving-average low-pass, not a windowed-sinc resampler.
/// Windows that come out empty (possible when `ratio < 1`) yield `0.0`.
///
/// No clamping is performed here; that happens in the PCM encoder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resampler {
    from_rate: u32,
    to_rate: u32,
    ratio: f64,
}

impl Resampler {
    pub fn new(from_rate: u32, to_rate: u32) -> Result<Self, String> {
        if from_rate == 0 || to_rate == 0 {
            return Err(format!(
                "sample rates must be positive (from {} Hz to {} Hz)",
                from_rate, to_rate
            ));
        }
        Ok(Self {
            from_rate,
            to_rate,
            ratio: from_rate as f64 / to_rate as f64,
        })
    }

    pub fn from_rate(&self) -> u32 {
        self.from_rate
    }

    pub fn to_rate(&self) -> u32 {
        self.to_rate
    }

    pub fn is_identity(&self) -> bool {
        self.from_rate == self.to_rate
    }

    /// Number of output samples produced for `input_len` input samples.
    pub fn output_len(&self, input_len: usize) -> usize {
        if self.is_identity() {
            return input_len;
        }
        (input_len as f64 / self.ratio).round() as usize
    }

    /// Resample `input` into `output`, replacing its contents.
    ///
    /// `output` is only reallocated if its capacity is below
    /// `output_len(input.len())`; callers on the audio thread reserve it up front.
    pub fn process_into(&self, input: &[f32], output: &mut Vec<f32>) {
        output.clear();
        if self.is_identity() {
            output.extend_from_slice(input);
            return;
        }

        let out_len = self.output_len(input.len());
        for i in 0..out_len {
            let start = ((i as f64 * self.ratio).floor() as usize).min(input.len());
            let end = (((i + 1) as f64 * self.ratio).floor() as usize).min(input.len());
            if start >= end {
                output.push(0.0);
                continue;
            }
            let window = &input[start..end];
            let sum: f32 = window.iter().sum();
            output.push(sum / window.len() as f32);
        }
    }

    pub fn process(&self, input: &[f32]) -> Vec<f32> {
        let mut output = Vec::with_capacity(self.output_len(input.len()));
        self.process_into(input, &mut output);
        output
    }
}

/// Resample one block from `from_rate` to `to_rate`.
///
/// # Panics
///
/// Panics if either rate is zero.
pub fn resample(block: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    match Resampler::new(from_rate, to_rate) {
        Ok(resampler) => resampler.process(block),
        Err(e) => panic!("{}", e),
    }
}
