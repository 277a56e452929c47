/// Downmix interleaved multi-channel audio to mono into `mono`, replacing its contents.
///
/// Each output sample is the mean of one frame's channels. A trailing
/// partial frame is ignored.
pub fn downmix_to_mono_into(samples: &[f32], channels: usize, mono: &mut Vec<f32>) {
    mono.clear();
    if channels <= 1 {
        mono.extend_from_slice(samples);
        return;
    }
    let scale = 1.0 / channels as f32;
    mono.extend(
        samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() * scale),
    );
}
