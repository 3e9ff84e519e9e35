//! Trailing-window digest of recent utterances

use chrono::{DateTime, TimeDelta, Utc};

use crate::db::{TranscriptStore, Utterance};

/// Limits for the rolling context window
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// How far back utterances are included
    pub window: TimeDelta,
    /// Maximum rendered length in characters
    pub max_chars: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            window: TimeDelta::minutes(10),
            max_chars: 4000,
        }
    }
}

/// Renders the recent transcript as `speaker: text` lines
#[derive(Clone)]
pub struct ContextWindow {
    store: TranscriptStore,
    config: ContextConfig,
}

impl ContextWindow {
    /// Create a new context window over a transcript store
    #[must_use]
    pub const fn new(store: TranscriptStore, config: ContextConfig) -> Self {
        Self { store, config }
    }

    /// Render the window ending at `now`
    ///
    /// A storage failure is logged and yields an empty window.
    #[must_use]
    pub fn render(&self, now: DateTime<Utc>) -> String {
        let since = now
            .checked_sub_signed(self.config.window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let utterances = match self.store.recent_utterances(since) {
            Ok(utterances) => utterances,
            Err(e) => {
                tracing::error!(error = %e, "failed to read transcript for context window");
                return String::new();
            }
        };

        let rendered = truncate_oldest(format_lines(&utterances), self.config.max_chars);
        tracing::debug!(
            utterances = utterances.len(),
            chars = rendered.chars().count(),
            "context window rendered"
        );
        rendered
    }
}

/// Join utterances oldest-first, one `user:`/`other:` line each
#[must_use]
pub fn format_lines(utterances: &[Utterance]) -> String {
    utterances
        .iter()
        .map(|u| {
            let speaker = if u.is_synthesized { "other" } else { "user" };
            format!("{speaker}: {}", u.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Drop whole lines from the front until the text fits in `max_chars`
///
/// Stops early when no newline remains, so a single oversized line is
/// returned as-is.
#[must_use]
pub fn truncate_oldest(mut text: String, max_chars: usize) -> String {
    while text.chars().count() > max_chars {
        let Some(pos) = text.find('\n') else {
            break;
        };
        text.drain(..=pos);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Interval, init_memory};

    fn setup() -> (TranscriptStore, ContextWindow) {
        let store = TranscriptStore::new(init_memory().unwrap());
        let window = ContextWindow::new(store.clone(), ContextConfig::default());
        (store, window)
    }

    fn add(store: &TranscriptStore, text: &str, synthesized: bool, at: DateTime<Utc>) {
        store
            .append_utterance_at(text, "", synthesized, Interval::instant(at), at)
            .unwrap();
    }

    #[test]
    fn test_speaker_prefixes() {
        let (store, window) = setup();
        let now = Utc::now();
        add(&store, "are you hungry?", true, now - TimeDelta::minutes(2));
        add(&store, "yes please", false, now - TimeDelta::minutes(1));

        assert_eq!(window.render(now), "other: are you hungry?\nuser: yes please");
    }

    #[test]
    fn test_empty_transcript_renders_empty() {
        let (_store, window) = setup();
        assert_eq!(window.render(Utc::now()), "");
    }

    #[test]
    fn test_window_boundary() {
        let (store, window) = setup();
        let now = Utc::now();
        add(
            &store,
            "too old",
            false,
            now - TimeDelta::minutes(10) - TimeDelta::seconds(1),
        );
        add(
            &store,
            "just inside",
            false,
            now - TimeDelta::minutes(9) - TimeDelta::seconds(59),
        );

        assert_eq!(window.render(now), "user: just inside");
    }

    #[test]
    fn test_truncates_from_oldest_line() {
        let text = "user: aaaa\nother: bbbb\nuser: cccc".to_string();
        assert_eq!(truncate_oldest(text.clone(), 100), text);
        assert_eq!(truncate_oldest(text.clone(), 22), "other: bbbb\nuser: cccc");
        assert_eq!(truncate_oldest(text, 10), "user: cccc");
    }

    #[test]
    fn test_single_oversized_line_kept() {
        let text = "x".repeat(50);
        assert_eq!(truncate_oldest(text.clone(), 10), text);
    }

    #[test]
    fn test_rendered_window_bounded_and_line_aligned() {
        let (store, window) = setup();
        let now = Utc::now();
        let mut lines = Vec::new();
        for i in 0..200 {
            let text = format!("utterance number {i} with some padding text");
            add(&store, &text, i % 2 == 0, now - TimeDelta::seconds(300 - i));
            let speaker = if i % 2 == 0 { "other" } else { "user" };
            lines.push(format!("{speaker}: {text}"));
        }

        let rendered = window.render(now);
        assert!(rendered.chars().count() <= 4000);
        let first_line = rendered.lines().next().unwrap();
        assert!(lines.iter().any(|l| l == first_line));
        assert!(rendered.ends_with(lines.last().unwrap().as_str()));
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        let text = "user: ééé\nuser: ü".to_string();
        // 9 + 1 + 7 characters, more bytes
        assert_eq!(truncate_oldest(text.clone(), 17), text);
    }

    #[test]
    fn test_oversized_window_reads_whole_transcript() {
        let store = TranscriptStore::new(init_memory().unwrap());
        let window = ContextWindow::new(
            store.clone(),
            ContextConfig {
                window: TimeDelta::MAX,
                max_chars: 4000,
            },
        );
        let now = Utc::now();
        add(&store, "long ago", false, now - TimeDelta::days(400));

        assert_eq!(window.render(now), "user: long ago");
    }
}
