//! Ranking and presentation of classifier output.
//!
use std::fmt;

/// Probability above which a result is shown as high-confidence.
pub const HIGH_CONFIDENCE: f32 = 0.7;

/// Probability of one class for one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub probability: f32,
}

impl Prediction {
    pub fn new(label: impl Into<String>, probability: f32) -> Self {
        Self {
            label: label.into(),
            probability,
        }
    }
}

/// Get the most probable entry of a prediction set.
///
/// On ties the entry coming first wins. `NaN` probabilities never win.
pub fn top_prediction(predictions: &[Prediction]) -> Option<&Prediction> {
    predictions
        .iter()
        .filter(|candidate| !candidate.probability.is_nan())
        .fold(None, |best, candidate| match best {
            None => Some(candidate),
            Some(best) if candidate.probability > best.probability => Some(candidate),
            Some(best) => Some(best),
        })
}

/// Visual treatment of a rendered result.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Confidence {
    Neutral,
    High,
}

impl Confidence {
    pub fn of(probability: f32) -> Self {
        match probability {
            p if p > HIGH_CONFIDENCE => Confidence::High,
            _ => Confidence::Neutral,
        }
    }
}

/// Rendering of the top prediction of a frame.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultView {
    pub label: String,
    /// Probability in percent with one decimal place, e.g. `"90.0"`.
    pub percentage: String,
    /// Fill of the confidence bar in percent, `0.0..=100.0`.
    pub bar_width: f32,
    pub confidence: Confidence,
}

impl From<&Prediction> for ResultView {
    fn from(prediction: &Prediction) -> Self {
        let percent = prediction.probability * 100.0;
        Self {
            label: prediction.label.clone(),
            percentage: format!("{:.1}", percent),
            bar_width: percent.clamp(0.0, 100.0),
            confidence: Confidence::of(prediction.probability),
        }
    }
}

impl fmt::Display for ResultView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}%", self.label, self.percentage)
    }
}

#[cfg(test)]
mod test {

    use super::*;

    fn set(entries: &[(&str, f32)]) -> Vec<Prediction> {
        entries
            .iter()
            .map(|(label, probability)| Prediction::new(*label, *probability))
            .collect()
    }

    #[test]
    fn test_dominant_class_is_high_confidence() {
        let predictions = set(&[("A", 0.9), ("B", 0.05), ("C", 0.05)]);

        let view = ResultView::from(top_prediction(&predictions).unwrap());

        assert_eq!(view.label, "A");
        assert_eq!(view.percentage, "90.0");
        assert_eq!(view.confidence, Confidence::High);
        assert_eq!(view.to_string(), "A 90.0%");
    }

    #[test]
    fn test_split_vote_is_neutral() {
        let predictions = set(&[("A", 0.5), ("B", 0.3), ("C", 0.2)]);

        let view = ResultView::from(top_prediction(&predictions).unwrap());

        assert_eq!(view.label, "A");
        assert_eq!(view.percentage, "50.0");
        assert_eq!(view.confidence, Confidence::Neutral);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        assert_eq!(Confidence::of(0.7), Confidence::Neutral);
        assert_eq!(Confidence::of(0.700_1), Confidence::High);
        assert_eq!(Confidence::of(0.0), Confidence::Neutral);
        assert_eq!(Confidence::of(1.0), Confidence::High);
    }

    #[test]
    fn test_top_is_not_the_first_entry() {
        let predictions = set(&[("cat", 0.1), ("dog", 0.6), ("bird", 0.3)]);

        assert_eq!(top_prediction(&predictions).unwrap().label, "dog");
    }

    #[test]
    fn test_ties_keep_first() {
        let predictions = set(&[("left", 0.4), ("right", 0.4), ("none", 0.2)]);

        assert_eq!(top_prediction(&predictions).unwrap().label, "left");
    }

    #[test]
    fn test_nan_never_wins() {
        let predictions = set(&[("broken", f32::NAN), ("fine", 0.2)]);

        assert_eq!(top_prediction(&predictions).unwrap().label, "fine");
    }

    #[test]
    fn test_empty_set() {
        assert_eq!(top_prediction(&[]), None);
    }

    #[test]
    fn test_bar_is_clamped() {
        let view = ResultView::from(&Prediction::new("over", 1.2));
        assert_eq!(view.bar_width, 100.0);

        let view = ResultView::from(&Prediction::new("under", -0.1));
        assert_eq!(view.bar_width, 0.0);
    }
}
