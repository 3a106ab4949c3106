/// Device host — plays rendered blocks on the default output through rodio.

use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, Sink};

use super::host::{AudioError, AudioHost, StreamConfig};

/// Silence queued ahead of the first block so a late write does not
/// underrun the device.
const LEAD_MS: u32 = 120;

/// The default system output. Rodio resamples the mono stream to whatever
/// the device runs at.
pub struct DeviceHost {
    sample_rate: u32,
    // The stream must outlive the sink or playback stops.
    output: Option<(OutputStream, Sink)>,
}

impl DeviceHost {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            output: None,
        }
    }

    /// Blocks queued on the device and not yet played.
    pub fn queued_blocks(&self) -> usize {
        self.output.as_ref().map_or(0, |(_, sink)| sink.len())
    }
}

impl Default for DeviceHost {
    fn default() -> Self {
        Self::new(44_100)
    }
}

impl AudioHost for DeviceHost {
    fn open(&mut self) -> Result<StreamConfig, AudioError> {
        if self.sample_rate == 0 {
            return Err(AudioError::InvalidSampleRate(self.sample_rate));
        }
        let (stream, handle) =
            OutputStream::try_default().map_err(|e| AudioError::Unsupported(e.to_string()))?;
        let sink = Sink::try_new(&handle).map_err(|e| AudioError::Unsupported(e.to_string()))?;

        let lead = (self.sample_rate * LEAD_MS / 1_000) as usize;
        sink.append(SamplesBuffer::new(1, self.sample_rate, vec![0.0f32; lead]));
        tracing::debug!(sample_rate = self.sample_rate, "audio device opened");

        self.output = Some((stream, sink));
        Ok(StreamConfig {
            sample_rate: self.sample_rate,
        })
    }

    fn write(&mut self, samples: &[f32]) {
        if let Some((_, sink)) = &self.output {
            sink.append(SamplesBuffer::new(1, self.sample_rate, samples.to_vec()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_device_reads_as_unsupported() {
        let mut host = DeviceHost::default();
        match host.open() {
            Ok(config) => assert_eq!(config.sample_rate, 44_100),
            Err(e) => assert!(matches!(e, AudioError::Unsupported(_))),
        }
    }

    #[test]
    fn writes_before_open_are_dropped() {
        let mut host = DeviceHost::new(8_000);
        host.write(&[0.25; 128]);
        assert_eq!(host.queued_blocks(), 0);
    }

    #[test]
    fn zero_rate_is_rejected_before_touching_the_device() {
        let mut host = DeviceHost::new(0);
        assert!(matches!(host.open(), Err(AudioError::InvalidSampleRate(0))));
    }
}
