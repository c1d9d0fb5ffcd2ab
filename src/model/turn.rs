use std::collections::BTreeMap;

/// A single speaker turn within an episode. The `speaker` list holds
/// more than one label when diarization detected overlapping speech.
#[derive(Debug, Clone, Default)]
pub struct Turn {
    pub speaker: Vec<String>,
    pub text: String,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    pub turn_count: i64,
    pub inferred_speaker_role: Option<String>,
    pub inferred_speaker_name: Option<String>,
    pub mp3_url: Option<String>,
    pub mfcc1_sma3_mean: Option<f64>,
    pub mfcc2_sma3_mean: Option<f64>,
    pub mfcc3_sma3_mean: Option<f64>,
    pub mfcc4_sma3_mean: Option<f64>,
    pub f0_semitone_from_27_5hz_sma3nz_mean: Option<f64>,
    pub f1_frequency_sma3nz_mean: Option<f64>,
}

impl Turn {
    /// More than one speaker label means overlapping speech.
    pub fn is_overlapping(&self) -> bool {
        self.speaker.len() > 1
    }

    /// The first speaker label, if any.
    pub fn primary_speaker(&self) -> Option<&str> {
        self.speaker.first().map(String::as_str)
    }

    pub fn is_host(&self) -> bool {
        self.inferred_speaker_role.as_deref() == Some("host")
    }

    pub fn is_guest(&self) -> bool {
        self.inferred_speaker_role.as_deref() == Some("guest")
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    pub fn words_per_second(&self) -> f64 {
        if self.duration > 0.0 {
            self.word_count() as f64 / self.duration
        } else {
            0.0
        }
    }

    /// Whether `time` falls inside this turn (inclusive bounds).
    pub fn contains_time(&self, time: f64) -> bool {
        time >= self.start_time && time <= self.end_time
    }

    /// Whether this turn's time span intersects another turn's.
    pub fn overlaps_with(&self, other: &Turn) -> bool {
        self.start_time < other.end_time && self.end_time > other.start_time
    }

    /// Whether this turn's time span intersects `[start, end]`.
    pub fn overlaps_range(&self, start: f64, end: f64) -> bool {
        self.start_time < end && self.end_time > start
    }

    /// The acoustic summary features that are present, keyed by name.
    pub fn audio_features(&self) -> BTreeMap<&'static str, f64> {
        let mut features = BTreeMap::new();
        let fields = [
            ("mfcc1_sma3_mean", self.mfcc1_sma3_mean),
            ("mfcc2_sma3_mean", self.mfcc2_sma3_mean),
            ("mfcc3_sma3_mean", self.mfcc3_sma3_mean),
            ("mfcc4_sma3_mean", self.mfcc4_sma3_mean),
            (
                "f0_semitone_from_27_5hz_sma3nz_mean",
                self.f0_semitone_from_27_5hz_sma3nz_mean,
            ),
            ("f1_frequency_sma3nz_mean", self.f1_frequency_sma3nz_mean),
        ];
        for (name, value) in fields {
            if let Some(v) = value {
                features.insert(name, v);
            }
        }
        features
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(start: f64, end: f64) -> Turn {
        Turn {
            speaker: vec!["SPEAKER_00".into()],
            text: "one two three".into(),
            start_time: start,
            end_time: end,
            duration: end - start,
            ..Turn::default()
        }
    }

    #[test]
    fn overlap_detection_from_speaker_list() {
        let mut t = turn(0.0, 1.0);
        assert!(!t.is_overlapping());
        t.speaker.push("SPEAKER_01".into());
        assert!(t.is_overlapping());
        assert_eq!(t.primary_speaker(), Some("SPEAKER_00"));
    }

    #[test]
    fn words_per_second_zero_duration() {
        let mut t = turn(0.0, 0.0);
        t.duration = 0.0;
        assert_eq!(t.word_count(), 3);
        assert_eq!(t.words_per_second(), 0.0);
        let t2 = turn(0.0, 2.0);
        assert_eq!(t2.words_per_second(), 1.5);
    }

    #[test]
    fn time_predicates() {
        let a = turn(0.0, 10.0);
        let b = turn(9.0, 12.0);
        let c = turn(10.0, 12.0);
        assert!(a.overlaps_with(&b));
        // Touching endpoints do not overlap.
        assert!(!a.overlaps_with(&c));
        assert!(a.contains_time(10.0));
        assert!(a.overlaps_range(9.5, 20.0));
    }

    #[test]
    fn audio_features_only_present_fields() {
        let mut t = turn(0.0, 1.0);
        assert!(t.audio_features().is_empty());
        t.mfcc1_sma3_mean = Some(0.5);
        t.f1_frequency_sma3nz_mean = Some(500.0);
        let f = t.audio_features();
        assert_eq!(f.len(), 2);
        assert_eq!(f["mfcc1_sma3_mean"], 0.5);
    }
}
