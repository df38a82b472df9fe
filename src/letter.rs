use serde::{Deserialize, Serialize};

/// Label reported when a gradebook has no categories to grade against.
pub const NOT_AVAILABLE: &str = "N/A";

/// Every label a final grade can carry, best first.
pub const LETTER_LABELS: [&str; 13] = [
    "A+", "A", "A-", "B+", "B", "B-", "C+", "C", "C-", "D+", "D", "D-", "F",
];

const PLUS_MINUS_BANDS: [(f64, &str); 13] = [
    (97.0, "A+"),
    (93.0, "A"),
    (90.0, "A-"),
    (87.0, "B+"),
    (83.0, "B"),
    (80.0, "B-"),
    (77.0, "C+"),
    (73.0, "C"),
    (70.0, "C-"),
    (67.0, "D+"),
    (63.0, "D"),
    (60.0, "D-"),
    (0.0, "F"),
];

const SIMPLE_BANDS: [(f64, &str); 5] = [
    (90.0, "A"),
    (80.0, "B"),
    (70.0, "C"),
    (60.0, "D"),
    (0.0, "F"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum GradingScale {
    #[default]
    Standard,
    PlusMinus,
    Simple,
}

impl GradingScale {
    pub const ALL: [GradingScale; 3] = [
        GradingScale::Standard,
        GradingScale::PlusMinus,
        GradingScale::Simple,
    ];

    /// Unrecognised names (including legacy values such as
    /// `weighted_categories`) resolve to `Standard`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "plus_minus" => Self::PlusMinus,
            "simple" => Self::Simple,
            _ => Self::Standard,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::PlusMinus => "plus_minus",
            Self::Simple => "simple",
        }
    }

    /// Descending (threshold, label) table for this scale.
    ///
    /// `Standard` and `PlusMinus` share one table.
    pub fn bands(&self) -> &'static [(f64, &'static str)] {
        match self {
            Self::Standard | Self::PlusMinus => &PLUS_MINUS_BANDS,
            Self::Simple => &SIMPLE_BANDS,
        }
    }
}

impl From<String> for GradingScale {
    fn from(name: String) -> Self {
        Self::from_name(&name)
    }
}

impl From<GradingScale> for &'static str {
    fn from(scale: GradingScale) -> Self {
        scale.as_str()
    }
}

/// Maps a percentage onto the scale. Anything below every threshold,
/// negative and NaN values included, gets the lowest label.
pub fn letter_grade(percentage: f64, scale: GradingScale) -> &'static str {
    let bands = scale.bands();
    bands
        .iter()
        .find(|(threshold, _)| percentage >= *threshold)
        .or_else(|| bands.last())
        .map(|(_, label)| *label)
        .unwrap_or("F")
}

/// Position of a label in [`LETTER_LABELS`]; lower is better.
pub fn letter_rank(label: &str) -> Option<usize> {
    LETTER_LABELS.iter().position(|candidate| *candidate == label)
}

/// Coarse descriptor used by report views and record filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PerformanceLevel {
    Excellent,
    AboveAverage,
    Average,
    BelowAverage,
    NeedsImprovement,
}

impl PerformanceLevel {
    pub const ALL: [PerformanceLevel; 5] = [
        PerformanceLevel::Excellent,
        PerformanceLevel::AboveAverage,
        PerformanceLevel::Average,
        PerformanceLevel::BelowAverage,
        PerformanceLevel::NeedsImprovement,
    ];

    pub fn for_percentage(percentage: f64) -> Self {
        if percentage >= 90.0 {
            Self::Excellent
        } else if percentage >= 80.0 {
            Self::AboveAverage
        } else if percentage >= 70.0 {
            Self::Average
        } else if percentage >= 60.0 {
            Self::BelowAverage
        } else {
            Self::NeedsImprovement
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::AboveAverage => "Above Average",
            Self::Average => "Average",
            Self::BelowAverage => "Below Average",
            Self::NeedsImprovement => "Needs Improvement",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_scale_maps_boundaries() {
        assert_eq!(letter_grade(97.0, GradingScale::Standard), "A+");
        assert_eq!(letter_grade(96.99, GradingScale::Standard), "A");
        assert_eq!(letter_grade(89.0, GradingScale::Standard), "B+");
        assert_eq!(letter_grade(60.0, GradingScale::Standard), "D-");
        assert_eq!(letter_grade(59.9, GradingScale::Standard), "F");
    }

    #[test]
    fn plus_minus_matches_standard() {
        let mut value = -5.0;
        while value <= 105.0 {
            assert_eq!(
                letter_grade(value, GradingScale::PlusMinus),
                letter_grade(value, GradingScale::Standard)
            );
            value += 0.5;
        }
    }

    #[test]
    fn simple_scale_has_five_bands() {
        assert_eq!(GradingScale::Simple.bands().len(), 5);
        assert_eq!(letter_grade(91.0, GradingScale::Simple), "A");
        assert_eq!(letter_grade(79.9, GradingScale::Simple), "C");
    }

    #[test]
    fn negative_and_nan_fall_to_lowest_label() {
        for scale in GradingScale::ALL {
            assert_eq!(letter_grade(-12.0, scale), "F");
            assert_eq!(letter_grade(f64::NAN, scale), "F");
        }
    }

    #[test]
    fn letters_never_improve_as_percentage_drops() {
        for scale in GradingScale::ALL {
            let mut previous = letter_rank(letter_grade(110.0, scale)).expect("known label");
            let mut value = 110.0;
            while value >= -10.0 {
                let rank = letter_rank(letter_grade(value, scale)).expect("known label");
                assert!(rank >= previous, "{scale:?} improved at {value}");
                previous = rank;
                value -= 0.25;
            }
        }
    }

    #[test]
    fn unknown_scale_name_uses_standard() {
        assert_eq!(
            GradingScale::from_name("weighted_categories"),
            GradingScale::Standard
        );
    }

    #[test]
    fn performance_levels_follow_tens() {
        assert_eq!(PerformanceLevel::for_percentage(95.0), PerformanceLevel::Excellent);
        assert_eq!(PerformanceLevel::for_percentage(80.0), PerformanceLevel::AboveAverage);
        assert_eq!(PerformanceLevel::for_percentage(12.0), PerformanceLevel::NeedsImprovement);
    }
}
