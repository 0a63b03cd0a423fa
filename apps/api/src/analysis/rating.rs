use serde::{Deserialize, Serialize};

/// Qualitative band derived from an analysis score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreLabel {
    Excellent,
    Good,
    Fair,
    NeedsWork,
}

impl ScoreLabel {
    pub const ALL: [ScoreLabel; 4] = [
        ScoreLabel::Excellent,
        ScoreLabel::Good,
        ScoreLabel::Fair,
        ScoreLabel::NeedsWork,
    ];

    /// Total over every `u8`; scores above 100 never reach here because
    /// engine results are validated first.
    pub fn from_score(score: u8) -> Self {
        match score {
            90.. => ScoreLabel::Excellent,
            75..=89 => ScoreLabel::Good,
            60..=74 => ScoreLabel::Fair,
            _ => ScoreLabel::NeedsWork,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScoreLabel::Excellent => "excellent",
            ScoreLabel::Good => "good",
            ScoreLabel::Fair => "fair",
            ScoreLabel::NeedsWork => "needs_work",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_boundaries() {
        assert_eq!(ScoreLabel::from_score(100), ScoreLabel::Excellent);
        assert_eq!(ScoreLabel::from_score(90), ScoreLabel::Excellent);
        assert_eq!(ScoreLabel::from_score(89), ScoreLabel::Good);
        assert_eq!(ScoreLabel::from_score(75), ScoreLabel::Good);
        assert_eq!(ScoreLabel::from_score(74), ScoreLabel::Fair);
        assert_eq!(ScoreLabel::from_score(60), ScoreLabel::Fair);
        assert_eq!(ScoreLabel::from_score(59), ScoreLabel::NeedsWork);
        assert_eq!(ScoreLabel::from_score(0), ScoreLabel::NeedsWork);
    }

    #[test]
    fn test_every_score_has_a_label_and_bands_are_ordered() {
        let mut previous = ScoreLabel::NeedsWork;
        let rank = |l: ScoreLabel| ScoreLabel::ALL.iter().rev().position(|x| *x == l);
        for score in 0..=100u8 {
            let label = ScoreLabel::from_score(score);
            assert!(rank(label) >= rank(previous), "label regressed at {score}");
            previous = label;
        }
    }

    #[test]
    fn test_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(ScoreLabel::NeedsWork).unwrap(),
            serde_json::json!("needs_work")
        );
        assert_eq!(ScoreLabel::Good.as_str(), "good");
    }
}
