//! Audio-offset estimation for words, by linear interpolation on
//! character offsets. Deliberately approximate: character position is a
//! coarse proxy for time, and the confidence heuristic penalizes long
//! turns accordingly.

use crate::backend::records::WordAudioEstimate;
use crate::backend::CorpusBackend;
use crate::error::Result;

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

impl CorpusBackend {
    /// Estimate the audio window of the `occurrence`-th (0-indexed)
    /// case-insensitive occurrence of `word` in an episode's turns.
    /// Returns `None` when the word does not occur that many times, or
    /// when the matching turn has no usable timing or text.
    pub fn estimate_word_audio(
        &self,
        podcast_id: &str,
        episode_id: &str,
        word: &str,
        occurrence: usize,
    ) -> Result<Option<WordAudioEstimate>> {
        let turns = self.get_turns_for_episode(podcast_id, episode_id, false)?;
        if turns.is_empty() {
            return Ok(None);
        }

        let word_lower = word.to_lowercase();
        if word_lower.is_empty() {
            return Ok(None);
        }
        let word_chars = word_lower.chars().count();
        let mut found = 0usize;

        for turn in &turns {
            let text_lower = turn.turn_text.to_lowercase();
            let mut search_from = 0usize;
            while let Some(offset) = text_lower[search_from..].find(&word_lower) {
                let byte_index = search_from + offset;
                if found == occurrence {
                    let turn_duration = turn.end_time - turn.start_time;
                    let total_chars = text_lower.chars().count();
                    if turn_duration <= 0.0 || total_chars == 0 {
                        return Ok(None);
                    }
                    let char_index = text_lower[..byte_index].chars().count();
                    let start_ratio = char_index as f64 / total_chars as f64;
                    let end_ratio = (char_index + word_chars) as f64 / total_chars as f64;
                    return Ok(Some(WordAudioEstimate {
                        mp3_url: turn.mp3_url.clone(),
                        estimated_start: round2(turn.start_time + start_ratio * turn_duration),
                        estimated_end: round2(turn.start_time + end_ratio * turn_duration),
                        turn_start: turn.start_time,
                        turn_end: turn.end_time,
                        turn_text: turn.turn_text.clone(),
                        confidence: round3((10.0 / turn_duration.max(1.0)).min(1.0)),
                    }));
                }
                found += 1;
                // Advance one character so overlapping hits still count.
                let mut next = byte_index + 1;
                while next < text_lower.len() && !text_lower.is_char_boundary(next) {
                    next += 1;
                }
                search_from = next;
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_helpers() {
        assert_eq!(round2(15.5555), 15.56);
        assert_eq!(round3(0.66666), 0.667);
    }
}
