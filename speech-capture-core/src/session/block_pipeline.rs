use std::sync::atomic::Ordering;

use crate::models::config::CaptureConfiguration;
use crate::models::error::CaptureError;
use crate::processing::downmix;
use crate::processing::levels;
use crate::processing::pcm_encoder;
use crate::processing::resampler::Resampler;
use crate::processing::ring_buffer::RingBuffer;
use crate::transport::envelope::FrameEncoder;

use super::shared::Shared;

/// Per-session working state for the audio callback.
///
/// Owned by the callback closure, so only the audio thread touches it.
/// Every buffer is sized at construction; a new native rate may grow the
/// resampler output once.
///
/// ```text
/// device packet → [downmix] → [RingBuffer] → block → [Resampler] → [PCM16] → [FrameEncoder] → channel
/// ```
pub(crate) struct BlockPipeline {
    block_size: usize,
    target_rate: u32,
    current_rate: Option<u32>,
    resampler: Option<Resampler>,
    mono: Vec<f32>,
    assembler: RingBuffer,
    block: Vec<f32>,
    resampled: Vec<f32>,
    pcm: Vec<i16>,
    frames: FrameEncoder,
    dropping: bool,
}

impl BlockPipeline {
    pub fn new(config: &CaptureConfiguration) -> Self {
        let block_size = config.block_size;
        Self {
            block_size,
            target_rate: config.target_sample_rate,
            current_rate: None,
            resampler: None,
            mono: Vec::with_capacity(block_size * config.channels as usize),
            assembler: RingBuffer::new(block_size * 2),
            block: vec![0.0; block_size],
            resampled: Vec::with_capacity(block_size),
            pcm: Vec::with_capacity(block_size),
            frames: FrameEncoder::with_capacity(block_size),
            dropping: false,
        }
    }

    /// Feed one device packet; runs every completed block through the pipeline.
    ///
    /// Errors are reported per block and do not stop later blocks.
    pub fn push(&mut self, samples: &[f32], sample_rate: u32, channels: u16, shared: &Shared) {
        if self.current_rate != Some(sample_rate) {
            if let Some(previous) = self.current_rate {
                log::info!(
                    "Native rate changed {} Hz -> {} Hz; discarding {} buffered samples",
                    previous,
                    sample_rate,
                    self.assembler.count()
                );
            }
            self.assembler.reset();
            self.current_rate = Some(sample_rate);
        }

        downmix::downmix_to_mono_into(samples, channels.max(1) as usize, &mut self.mono);

        let mut offset = 0;
        while offset < self.mono.len() {
            let end = (offset + self.block_size).min(self.mono.len());
            self.assembler.write(&self.mono[offset..end]);
            offset = end;

            while self.assembler.count() >= self.block_size {
                self.assembler.read_into(&mut self.block);
                if let Err(e) = self.process_block(sample_rate, shared) {
                    shared.report("failed to process audio block", e);
                }
            }
        }
    }

    /// Drop any partially assembled block.
    pub fn reset(&mut self) {
        self.assembler.reset();
    }

    fn process_block(&mut self, sample_rate: u32, shared: &Shared) -> Result<(), CaptureError> {
        let slot = shared.channel();
        let channel = match slot.as_deref() {
            Some(channel) if channel.ready_state().is_open() => channel,
            _ => {
                if !self.dropping {
                    log::debug!("Transport channel not open; dropping audio until it is");
                    self.dropping = true;
                }
                shared.counters.frames_dropped.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }
        };
        self.dropping = false;

        let resampler = self.resampler_for(sample_rate)?;
        resampler.process_into(&self.block, &mut self.resampled);
        pcm_encoder::encode_into(&self.resampled, &mut self.pcm);
        let block_levels = levels::measure(&self.resampled);

        let text = self.frames.encode(&self.pcm)?;
        channel.send_text(text)?;

        let counters = &shared.counters;
        counters.blocks_processed.fetch_add(1, Ordering::Relaxed);
        counters.frames_sent.fetch_add(1, Ordering::Relaxed);
        counters
            .bytes_sent
            .fetch_add(self.frames.payload_len() as u64, Ordering::Relaxed);

        if let Some(delegate) = shared.delegate().as_deref() {
            delegate.on_audio_data(&self.pcm, &block_levels);
        }
        Ok(())
    }

    fn resampler_for(&mut self, sample_rate: u32) -> Result<Resampler, CaptureError> {
        if let Some(resampler) = self.resampler {
            if resampler.from_rate() == sample_rate {
                return Ok(resampler);
            }
        }
        let resampler =
            Resampler::new(sample_rate, self.target_rate).map_err(CaptureError::ProcessingError)?;
        let needed = resampler.output_len(self.block_size);
        if needed > self.resampled.capacity() {
            self.resampled.reserve(needed - self.resampled.len());
            self.pcm.reserve(needed - self.pcm.len());
        }
        self.resampler = Some(resampler);
        Ok(resampler)
    }
}
