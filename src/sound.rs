//! Audible alert playback.
//!
//! The dispatcher plays through the [`SoundPlayer`] trait so tests can count
//! attempts and audio-less builds still link. The default implementation,
//! [`ChimePlayer`], synthesizes a short two-tone chime with rodio; it is
//! compiled only with the `audio` feature (on by default).

use crate::error::AudioError;

/// Plays the in-stock alert sound.
pub trait SoundPlayer: Send + Sync {
    fn play(&self) -> Result<(), AudioError>;
}

/// No-op player used in tests and when the `audio` feature is disabled.
pub struct NullSound;

impl SoundPlayer for NullSound {
    fn play(&self) -> Result<(), AudioError> {
        Ok(())
    }
}

#[cfg(feature = "audio")]
pub use chime::ChimePlayer;

#[cfg(feature = "audio")]
mod chime {
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;
    use rodio::{OutputStream, OutputStreamBuilder, Sink, Source};

    use super::SoundPlayer;
    use crate::error::AudioError;

    /// Rodio-backed alert chime.
    ///
    /// Holds the output stream for the lifetime of the player; a player that
    /// failed to open an output device can be constructed `disabled()` and
    /// reports [`AudioError::Disabled`] on every play attempt instead of
    /// panicking or retrying device setup.
    pub struct ChimePlayer {
        stream: Option<OutputStream>,
        sink: Option<Arc<Mutex<Sink>>>,
        /// Volume 0-100. 0 silences the chime without disabling the player.
        volume: u8,
    }

    impl ChimePlayer {
        pub fn new() -> Result<Self, AudioError> {
            let stream = OutputStreamBuilder::open_default_stream()
                .map_err(|e| AudioError::Device(e.to_string()))?;
            let sink = Sink::connect_new(stream.mixer());
            Ok(Self {
                stream: Some(stream),
                sink: Some(Arc::new(Mutex::new(sink))),
                volume: 60,
            })
        }

        /// A player with no audio output; every play reports `Disabled`.
        pub fn disabled() -> Self {
            Self {
                stream: None,
                sink: None,
                volume: 0,
            }
        }

        pub fn with_volume(mut self, volume: u8) -> Self {
            self.volume = volume.min(100);
            self
        }

        /// Best-effort default: a working player, or a disabled one with a
        /// warning when no output device is available.
        pub fn new_or_disabled() -> Self {
            match Self::new() {
                Ok(player) => player,
                Err(e) => {
                    log::warn!("Failed to initialize alert chime: {}", e);
                    Self::disabled()
                }
            }
        }
    }

    impl SoundPlayer for ChimePlayer {
        fn play(&self) -> Result<(), AudioError> {
            if self.volume == 0 {
                return Ok(());
            }

            let sink_arc = self.sink.as_ref().ok_or(AudioError::Disabled)?;
            let volume_f32 = (self.volume.min(100) as f32) / 100.0;

            // Two rising tones read as "good news" better than the plain
            // 800 Hz terminal bell
            let first = rodio::source::SineWave::new(880.0)
                .take_duration(Duration::from_millis(140))
                .amplify(volume_f32 * 0.3);
            let second = rodio::source::SineWave::new(1318.5)
                .take_duration(Duration::from_millis(220))
                .amplify(volume_f32 * 0.3);

            let sink = sink_arc.lock();
            sink.append(first);
            sink.append(second);
            Ok(())
        }
    }

    impl Drop for ChimePlayer {
        fn drop(&mut self) {
            // Stop and clear the sink BEFORE forgetting the stream, so the
            // sink never touches a forgotten stream's mixer
            if let Some(sink_arc) = self.sink.take() {
                if let Ok(sink) = Arc::try_unwrap(sink_arc) {
                    let sink = sink.into_inner();
                    sink.stop();
                }
            }

            // Suppress rodio's drop message by forgetting the stream
            if let Some(stream) = self.stream.take() {
                std::mem::forget(stream);
            }
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_sound_always_succeeds() {
        assert!(NullSound.play().is_ok());
    }
}
