//! Voice processing module
//!
//! Inbound audio is decoded and transcoded by [`AudioIngest`], sent to the
//! transcription service through a [`Transcriber`], and split into
//! utterances by [`SegmentMerger`]. Outbound speech goes through
//! [`SynthesisTemplater`].

mod ingest;
mod segments;
mod stt;
mod transcode;
mod tts;

pub use ingest::{AudioIngest, decode_payload};
pub use segments::{NO_AUDIBLE_VOICE, SegmentMerger};
pub use stt::{HttpTranscriber, TranscriptionResult, TranscriptionSegment, Transcriber};
pub use transcode::{FfmpegTranscoder, Transcoder, ffmpeg_available};
pub use tts::{HttpSpeechSynthesizer, SpeechSynthesizer, SynthesisTemplater, build_query};
