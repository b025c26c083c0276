//! Format selection policy: best audio-only encoding by bitrate.

use thiserror::Error;
use tracing::debug;

use crate::media::{EncodingDescriptor, SelectedEncoding};

/// Selection failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SelectionError {
    /// None of the candidates is audio-only.
    #[error("no audio-only format among {candidates} candidates")]
    NoAudioFormat { candidates: usize },
}

/// Picks the audio-only candidate with the highest bitrate.
///
/// Candidates without a bitrate rank below every candidate that reports one.
/// Equal bitrates resolve to the first candidate in input order.
///
/// # Errors
///
/// - `SelectionError::NoAudioFormat` - No candidate is audio-only
pub fn select(candidates: &[EncodingDescriptor]) -> Result<SelectedEncoding, SelectionError> {
    let mut best: Option<&EncodingDescriptor> = None;

    for candidate in candidates.iter().filter(|c| c.audio_only) {
        // Option ordering puts None below any Some, which is the policy we want.
        let better = match best {
            None => true,
            Some(current) => candidate.bitrate > current.bitrate,
        };
        if better {
            best = Some(candidate);
        }
    }

    let chosen = best.ok_or(SelectionError::NoAudioFormat {
        candidates: candidates.len(),
    })?;

    debug!(
        key = %chosen.key,
        mime_type = %chosen.mime_type,
        bitrate = ?chosen.bitrate,
        "Selected encoding out of {} candidates",
        candidates.len()
    );

    Ok(SelectedEncoding::new(chosen.clone()))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn candidate(key: &str, audio_only: bool, bitrate: Option<u32>) -> EncodingDescriptor {
        EncodingDescriptor {
            key: key.to_string(),
            mime_type: if audio_only { "audio/mp4" } else { "video/mp4" }.to_string(),
            bitrate,
            content_length: None,
            audio_only,
            locator: None,
        }
    }

    #[test]
    fn test_picks_highest_audio_bitrate() {
        let candidates = vec![
            candidate("video", false, Some(720)),
            candidate("low", true, Some(128)),
            candidate("high", true, Some(256)),
        ];

        let selected = select(&candidates).unwrap();
        assert_eq!(selected.descriptor().key, "high");
    }

    #[test]
    fn test_no_audio_format() {
        let candidates = vec![candidate("v1", false, Some(720)), candidate("v2", false, None)];
        assert_eq!(
            select(&candidates),
            Err(SelectionError::NoAudioFormat { candidates: 2 })
        );
        assert_eq!(
            select(&[]),
            Err(SelectionError::NoAudioFormat { candidates: 0 })
        );
    }

    #[test]
    fn test_missing_bitrate_ranks_lowest() {
        let candidates = vec![
            candidate("unknown", true, None),
            candidate("tiny", true, Some(1)),
        ];
        assert_eq!(select(&candidates).unwrap().descriptor().key, "tiny");

        let only_unknown = vec![candidate("a", true, None), candidate("b", true, None)];
        assert_eq!(select(&only_unknown).unwrap().descriptor().key, "a");
    }

    #[test]
    fn test_ties_resolve_to_first() {
        let candidates = vec![
            candidate("first", true, Some(160)),
            candidate("second", true, Some(160)),
        ];
        assert_eq!(select(&candidates).unwrap().descriptor().key, "first");
    }

    fn arb_candidate() -> impl Strategy<Value = EncodingDescriptor> {
        (any::<bool>(), proptest::option::of(0u32..1024), "[a-z]{1,6}")
            .prop_map(|(audio_only, bitrate, key)| candidate(&key, audio_only, bitrate))
    }

    proptest! {
        #[test]
        fn prop_selected_is_maximal_audio(candidates in proptest::collection::vec(arb_candidate(), 0..16)) {
            let audio: Vec<&EncodingDescriptor> = candidates.iter().filter(|c| c.audio_only).collect();
            match select(&candidates) {
                Ok(selected) => {
                    let chosen = selected.descriptor();
                    prop_assert!(chosen.audio_only);
                    prop_assert!(audio.iter().all(|c| c.bitrate <= chosen.bitrate));
                    let first_max = audio.iter().find(|c| c.bitrate == chosen.bitrate).unwrap();
                    prop_assert_eq!(*first_max, chosen);
                }
                Err(SelectionError::NoAudioFormat { .. }) => prop_assert!(audio.is_empty()),
            }
        }

        #[test]
        fn prop_selection_is_deterministic(candidates in proptest::collection::vec(arb_candidate(), 0..16)) {
            prop_assert_eq!(select(&candidates), select(&candidates));
        }
    }
}
