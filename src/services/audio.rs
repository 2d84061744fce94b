//! Audio duration probing for the duration filter.
//!
//! The generic path asks symphonia's default probe for the container, then
//! derives the length from the default track's frame count and sample rate.
//! MP3 is not part of symphonia's default feature set, so `.mp3` files that
//! the generic probe cannot read fall back to a frame scan with
//! `mp3-duration`. Anything that still cannot be measured yields `None`.

use camino::Utf8Path;
use std::fs::File;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Source of audio durations, in seconds
#[cfg_attr(test, mockall::automock)]
pub trait DurationProbe: Send + Sync {
    /// `None` when the file is not audio or cannot be read
    fn duration_secs(&self, path: &Utf8Path) -> Option<f64>;
}

/// Probe backed by symphonia with an MP3 fallback
#[derive(Debug, Default, Clone, Copy)]
pub struct AudioProbe;

impl AudioProbe {
    pub fn new() -> Self {
        Self
    }

    fn probe_generic(path: &Utf8Path) -> Option<f64> {
        let file = File::open(path).ok()?;
        let stream = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension() {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                stream,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .ok()?;

        let track = probed.format.default_track()?;
        let params = &track.codec_params;
        let frames = params.n_frames?;
        let rate = params.sample_rate?;
        if rate == 0 {
            return None;
        }

        Some(frames as f64 / rate as f64)
    }

    fn probe_mp3(path: &Utf8Path) -> Option<f64> {
        match mp3_duration::from_path(path.as_std_path()) {
            Ok(duration) if duration.is_zero() => None,
            Ok(duration) => Some(duration.as_secs_f64()),
            Err(e) => {
                tracing::debug!("MP3 frame scan failed for {}: {:?}", path, e);
                None
            }
        }
    }
}

impl DurationProbe for AudioProbe {
    fn duration_secs(&self, path: &Utf8Path) -> Option<f64> {
        if let Some(secs) = Self::probe_generic(path) {
            return Some(secs);
        }

        let is_mp3 = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("mp3"));
        if is_mp3 {
            return Self::probe_mp3(path);
        }

        None
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use std::io::Write;
    use tempfile::TempDir;

    /// Write a mono 16-bit PCM WAV file holding `secs` seconds of silence.
    pub(crate) fn write_wav(path: &Utf8Path, secs: u32, sample_rate: u32) {
        let data_len = secs * sample_rate * 2;
        let mut bytes = Vec::with_capacity(44 + data_len as usize);
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
        bytes.extend_from_slice(&1u16.to_le_bytes()); // mono
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        bytes.extend_from_slice(&(sample_rate * 2).to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        bytes.resize(44 + data_len as usize, 0);

        let mut file = File::create(path).unwrap();
        file.write_all(&bytes).unwrap();
    }

    #[test]
    fn test_wav_duration() {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let wav = dir.join("tone.wav");
        write_wav(&wav, 3, 8000);

        let secs = AudioProbe::new().duration_secs(&wav).unwrap();
        assert!((secs - 3.0).abs() < 0.01, "got {secs}");
    }

    #[test]
    fn test_non_audio_has_no_duration() {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let text = dir.join("notes.txt");
        std::fs::write(&text, "just some words").unwrap();

        assert_eq!(AudioProbe::new().duration_secs(&text), None);
    }

    #[test]
    fn test_garbage_mp3_has_no_duration() {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let fake = dir.join("broken.mp3");
        std::fs::write(&fake, [0u8; 16]).unwrap();

        assert_eq!(AudioProbe::new().duration_secs(&fake), None);
    }

    #[test]
    fn test_missing_file_has_no_duration() {
        assert_eq!(
            AudioProbe::new().duration_secs(Utf8Path::new("/definitely/not/here.wav")),
            None
        );
    }
}
