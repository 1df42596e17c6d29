//! Speech synthesis collaborator using kokoro-tiny.
//!
//! Synthesis is optional: when enabled, response events carry a base64 WAV
//! blob; when it fails, the utterance simply goes out without audio.

use std::io::Cursor;

use async_trait::async_trait;
use kokoro_tiny::TtsEngine;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("TTS error: {0}")]
    Tts(String),

    #[error("WAV encoding error: {0}")]
    Encode(#[from] hound::Error),
}

/// Narrow contract: text plus a voice hint in, WAV bytes out.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>, SpeechError>;
}

const SAMPLE_RATE: u32 = 24_000;

/// Synthesizer backed by the kokoro-tiny engine.
pub struct KokoroSpeech {
    // The engine needs &mut for synthesis, and turns are strictly
    // sequential anyway.
    engine: Mutex<TtsEngine>,
    available_voices: Vec<String>,
}

impl KokoroSpeech {
    /// Initialize the TTS engine (downloads the model on first run).
    pub async fn new() -> Result<Self, SpeechError> {
        let engine = TtsEngine::new()
            .await
            .map_err(|e| SpeechError::Tts(format!("Failed to initialize TTS: {}", e)))?;

        let available_voices = engine.voices();

        Ok(Self {
            engine: Mutex::new(engine),
            available_voices,
        })
    }

    pub fn available_voices(&self) -> &[String] {
        &self.available_voices
    }

    fn validate_voice(&self, voice_id: &str) -> Result<(), SpeechError> {
        if !self.available_voices.contains(&voice_id.to_string()) {
            return Err(SpeechError::Tts(format!("Unknown voice '{}'", voice_id)));
        }
        Ok(())
    }
}

#[async_trait]
impl SpeechSynthesizer for KokoroSpeech {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>, SpeechError> {
        self.validate_voice(voice)?;

        let chunks = split_into_chunks(text, 200);
        let mut all_samples = Vec::new();

        let mut engine = self.engine.lock().await;
        for chunk in chunks {
            if chunk.trim().is_empty() {
                continue;
            }

            let samples = engine
                .synthesize(&chunk, Some(voice))
                .map_err(|e| SpeechError::Tts(format!("Synthesis failed: {}", e)))?;

            all_samples.extend(samples);
            // Short pause between chunks to prevent cutoff
            all_samples.extend(std::iter::repeat(0.0).take(7_200));
        }

        wav_bytes(&all_samples)
    }
}

/// Encode f32 samples as a 16-bit mono WAV container in memory.
fn wav_bytes(samples: &[f32]) -> Result<Vec<u8>, SpeechError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            let clamped = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer.write_sample(clamped)?;
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}

/// Split text into chunks that are safe for the synthesis engine, which
/// has a strict input length limit.
fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in text.split_inclusive(&['.', '!', '?', ';'][..]) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }

        if current.len() + sentence.len() > max_chars && !current.is_empty() {
            chunks.push(current.trim().to_string());
            current = String::new();
        }

        if sentence.len() > max_chars {
            // Fall back to comma boundaries for very long sentences.
            for part in sentence.split_inclusive(',') {
                if current.len() + part.len() > max_chars && !current.is_empty() {
                    chunks.push(current.trim().to_string());
                    current = String::new();
                }
                current.push_str(part);
                current.push(' ');
            }
        } else {
            current.push_str(sentence);
            current.push(' ');
        }
    }

    if !current.trim().is_empty() {
        chunks.push(current.trim().to_string());
    }

    chunks
}
