//! Wire formats for streamed and single-shot results.
//!
//! * [`ndjson`] - newline-delimited JSON records for token generation
//! * [`envelope`] - prologue, audio chunks and epilogue for speech synthesis
//! * [`wav`] - PCM quantization and WAV containers

#[cfg(feature = "generation")]
pub mod ndjson;

#[cfg(feature = "speech")]
pub mod envelope;

#[cfg(feature = "speech")]
pub mod wav;
