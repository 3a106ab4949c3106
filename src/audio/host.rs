/// Audio host seam — opening the output and taking the blocks the graph
/// renders as time passes.

use std::sync::{Arc, Mutex};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("audio output unsupported: {0}")]
    Unsupported(String),
    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(u32),
}

/// Properties of an opened output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    pub sample_rate: u32,
}

/// Something that can open an audio output.
///
/// `open` is called at most once, on the first user gesture. An error
/// disables audio for the rest of the session. After a successful open the
/// engine renders mono blocks in step with its clock and hands each one to
/// `write`, in order.
pub trait AudioHost {
    fn open(&mut self) -> Result<StreamConfig, AudioError>;

    fn write(&mut self, samples: &[f32]);
}

impl<H: AudioHost + ?Sized> AudioHost for Box<H> {
    fn open(&mut self) -> Result<StreamConfig, AudioError> {
        (**self).open()
    }

    fn write(&mut self, samples: &[f32]) {
        (**self).write(samples)
    }
}

/// Every sample an [`OfflineHost`] has been handed, shared with the caller.
#[derive(Debug, Clone, Default)]
pub struct OfflineOutput(Arc<Mutex<Vec<f32>>>);

impl OfflineOutput {
    /// Drain the samples written so far.
    pub fn take(&self) -> Vec<f32> {
        match self.0.lock() {
            Ok(mut buf) => std::mem::take(&mut *buf),
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.0.lock().map(|buf| buf.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A host with no device behind it. Blocks are dropped, or kept in an
/// [`OfflineOutput`] when built with [`OfflineHost::capturing`].
#[derive(Debug, Clone)]
pub struct OfflineHost {
    pub sample_rate: u32,
    capture: Option<OfflineOutput>,
}

impl OfflineHost {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            capture: None,
        }
    }

    /// A host that records everything written to it.
    pub fn capturing(sample_rate: u32) -> (Self, OfflineOutput) {
        let output = OfflineOutput::default();
        let host = Self {
            sample_rate,
            capture: Some(output.clone()),
        };
        (host, output)
    }
}

impl Default for OfflineHost {
    fn default() -> Self {
        Self::new(44_100)
    }
}

impl AudioHost for OfflineHost {
    fn open(&mut self) -> Result<StreamConfig, AudioError> {
        if self.sample_rate == 0 {
            return Err(AudioError::InvalidSampleRate(self.sample_rate));
        }
        Ok(StreamConfig {
            sample_rate: self.sample_rate,
        })
    }

    fn write(&mut self, samples: &[f32]) {
        if let Some(OfflineOutput(buf)) = &self.capture {
            if let Ok(mut buf) = buf.lock() {
                buf.extend_from_slice(samples);
            }
        }
    }
}

/// A host for environments without audio. Always fails to open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnsupportedHost;

impl AudioHost for UnsupportedHost {
    fn open(&mut self) -> Result<StreamConfig, AudioError> {
        Err(AudioError::Unsupported("no audio output available".to_string()))
    }

    fn write(&mut self, _samples: &[f32]) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_host_opens() {
        let mut host = OfflineHost::default();
        assert_eq!(host.open().unwrap().sample_rate, 44_100);
    }

    #[test]
    fn zero_rate_is_rejected() {
        let mut host = OfflineHost::new(0);
        assert!(matches!(host.open(), Err(AudioError::InvalidSampleRate(0))));
    }

    #[test]
    fn unsupported_host_fails() {
        let mut host = UnsupportedHost;
        assert!(host.open().is_err());
    }

    #[test]
    fn capturing_host_keeps_blocks_in_order() {
        let (mut host, output) = OfflineHost::capturing(8_000);
        host.open().unwrap();
        host.write(&[0.1, 0.2]);
        host.write(&[0.3]);
        assert_eq!(output.len(), 3);
        assert_eq!(output.take(), vec![0.1, 0.2, 0.3]);
        assert!(output.is_empty());
    }

    #[test]
    fn plain_offline_host_drops_blocks() {
        let mut host = OfflineHost::new(8_000);
        host.write(&[0.5; 64]);
        assert!(host.capture.is_none());
    }
}
