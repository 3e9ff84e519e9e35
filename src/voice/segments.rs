//! Splits a transcription result into time-stamped utterances

use chrono::{DateTime, TimeDelta, Utc};

use super::stt::TranscriptionResult;
use crate::db::{Interval, TranscriptStore};
use crate::{Error, Result};

/// Returned when a transcription contains no speech
pub const NO_AUDIBLE_VOICE: &str = "No audible voice.";

/// Persists one user utterance per non-empty segment
#[derive(Clone)]
pub struct SegmentMerger {
    store: TranscriptStore,
}

impl SegmentMerger {
    /// Create a merger writing into `store`
    #[must_use]
    pub const fn new(store: TranscriptStore) -> Self {
        Self { store }
    }

    /// Persist each non-empty segment and return their space-joined text
    ///
    /// Segment offsets are anchored at `request_time`. Storage failures are
    /// logged per segment; the returned text is unaffected.
    ///
    /// # Errors
    ///
    /// Returns error without persisting anything if a segment offset lands
    /// outside the representable time range
    pub fn merge(
        &self,
        result: &TranscriptionResult,
        request_time: DateTime<Utc>,
    ) -> Result<String> {
        let mut spoken = Vec::with_capacity(result.segments.len());
        for segment in &result.segments {
            let text = segment.text.trim();
            if text.is_empty() {
                continue;
            }
            let interval = Interval::new(
                anchor(request_time, segment.start)?,
                anchor(request_time, segment.end)?,
            );
            spoken.push((text, interval));
        }

        for (text, interval) in &spoken {
            if let Err(e) = self.store.append_utterance(text, "", false, *interval) {
                tracing::error!(error = %e, "failed to save transcription segment");
            }
        }

        if spoken.is_empty() {
            return Ok(NO_AUDIBLE_VOICE.to_string());
        }
        Ok(spoken
            .iter()
            .map(|(text, _)| *text)
            .collect::<Vec<_>>()
            .join(" "))
    }
}

/// `request_time` shifted by a segment offset in seconds
fn anchor(request_time: DateTime<Utc>, seconds: f64) -> Result<DateTime<Utc>> {
    offset(seconds)
        .and_then(|delta| request_time.checked_add_signed(delta))
        .ok_or_else(|| Error::Stt(format!("segment offset out of range: {seconds}")))
}

/// Seconds to a microsecond-precision delta; non-finite offsets count as zero
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn offset(seconds: f64) -> Option<TimeDelta> {
    if !seconds.is_finite() {
        return Some(TimeDelta::zero());
    }
    let micros = (seconds * 1_000_000.0).round();
    if micros.abs() >= i64::MAX as f64 {
        return None;
    }
    Some(TimeDelta::microseconds(micros as i64))
}

#[cfg(test)]
mod tests {
    use chrono::SubsecRound;

    use super::*;
    use crate::db::init_memory;
    use crate::voice::TranscriptionSegment;

    fn setup() -> (TranscriptStore, SegmentMerger) {
        let store = TranscriptStore::new(init_memory().unwrap());
        (store.clone(), SegmentMerger::new(store))
    }

    fn result(segments: Vec<TranscriptionSegment>) -> TranscriptionResult {
        TranscriptionResult { segments }
    }

    #[test]
    fn test_one_utterance_per_segment() {
        let (store, merger) = setup();
        let request_time = Utc::now().trunc_subsecs(6);

        let text = merger.merge(
            &result(vec![
                TranscriptionSegment::new(" hello", 0.0, 0.6),
                TranscriptionSegment::new(" there", 0.6, 1.1),
                TranscriptionSegment::new(" friend", 1.5, 2.0),
            ]),
            request_time,
        )
        .unwrap();

        assert_eq!(text, "hello there friend");
        let stored = store
            .recent_utterances(request_time - TimeDelta::minutes(1))
            .unwrap();
        assert_eq!(stored.len(), 3);
        assert!(stored.iter().all(|u| !u.is_synthesized && u.audio_reference.is_empty()));
        assert_eq!(stored[2].interval.start, request_time + TimeDelta::milliseconds(1500));
        assert_eq!(stored[2].interval.end, request_time + TimeDelta::seconds(2));
    }

    #[test]
    fn test_non_overlapping_segments_stay_non_overlapping() {
        let (store, merger) = setup();
        let request_time = Utc::now();

        merger.merge(
            &result(vec![
                TranscriptionSegment::new("a", 0.0, 1.0),
                TranscriptionSegment::new("b", 1.0, 2.5),
                TranscriptionSegment::new("c", 2.5, 3.0),
            ]),
            request_time,
        )
        .unwrap();

        let stored = store
            .recent_utterances(request_time - TimeDelta::minutes(1))
            .unwrap();
        for pair in stored.windows(2) {
            assert!(!pair[0].interval.overlaps(&pair[1].interval));
        }
    }

    #[test]
    fn test_overlapping_segments_stay_overlapping() {
        let (store, merger) = setup();
        let request_time = Utc::now();

        merger.merge(
            &result(vec![
                TranscriptionSegment::new("a", 0.0, 1.5),
                TranscriptionSegment::new("b", 1.0, 2.0),
            ]),
            request_time,
        )
        .unwrap();

        let stored = store
            .recent_utterances(request_time - TimeDelta::minutes(1))
            .unwrap();
        assert!(stored[0].interval.overlaps(&stored[1].interval));
    }

    #[test]
    fn test_empty_segments_skipped() {
        let (store, merger) = setup();

        let text = merger.merge(
            &result(vec![
                TranscriptionSegment::new("", 0.0, 0.5),
                TranscriptionSegment::new("yes", 0.5, 0.9),
                TranscriptionSegment::new("   ", 0.9, 1.0),
            ]),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(text, "yes");
        assert_eq!(store.utterance_count().unwrap(), 1);
    }

    #[test]
    fn test_no_segments_returns_sentinel() {
        let (store, merger) = setup();

        assert_eq!(merger.merge(&result(vec![]), Utc::now()).unwrap(), NO_AUDIBLE_VOICE);
        assert_eq!(
            merger
                .merge(&result(vec![TranscriptionSegment::new("", 0.0, 1.0)]), Utc::now())
                .unwrap(),
            NO_AUDIBLE_VOICE
        );
        assert_eq!(store.utterance_count().unwrap(), 0);
    }

    #[test]
    fn test_reversed_segment_clamped() {
        let (store, merger) = setup();
        let request_time = Utc::now();

        merger.merge(
            &result(vec![TranscriptionSegment::new("odd", 2.0, 1.0)]),
            request_time,
        )
        .unwrap();

        let stored = store
            .recent_utterances(request_time - TimeDelta::minutes(1))
            .unwrap();
        assert_eq!(stored[0].interval.start, stored[0].interval.end);
    }

    #[test]
    fn test_out_of_range_offset_rejected() {
        let (store, merger) = setup();

        let outcome = merger.merge(
            &result(vec![
                TranscriptionSegment::new("fine", 0.0, 1.0),
                TranscriptionSegment::new("hi", 0.0, 1e13),
            ]),
            Utc::now(),
        );

        assert!(matches!(outcome, Err(Error::Stt(_))));
        assert_eq!(store.utterance_count().unwrap(), 0);
    }

    #[test]
    fn test_offset_past_chrono_range_rejected() {
        let (_store, merger) = setup();

        // Fits in i64 microseconds but not in a DateTime
        let outcome = merger.merge(
            &result(vec![TranscriptionSegment::new("hi", -9e12, 0.0)]),
            Utc::now(),
        );
        assert!(outcome.is_err());
    }

    #[test]
    fn test_non_finite_offset_anchors_at_request_time() {
        let (store, merger) = setup();
        let request_time = Utc::now().trunc_subsecs(6);

        merger
            .merge(
                &result(vec![TranscriptionSegment::new("hm", f64::NAN, f64::INFINITY)]),
                request_time,
            )
            .unwrap();

        let stored = store
            .recent_utterances(request_time - TimeDelta::minutes(1))
            .unwrap();
        assert_eq!(stored[0].interval.start, request_time);
        assert_eq!(stored[0].interval.end, request_time);
    }
}
