use serde::{Deserialize, Serialize};

/// How a raw fractional percentage is turned into a displayed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum RoundingMethod {
    #[default]
    NearestWhole,
    RoundUp,
    RoundDown,
    NearestTenth,
    NearestHundredth,
}

impl RoundingMethod {
    pub const ALL: [RoundingMethod; 5] = [
        RoundingMethod::NearestWhole,
        RoundingMethod::RoundUp,
        RoundingMethod::RoundDown,
        RoundingMethod::NearestTenth,
        RoundingMethod::NearestHundredth,
    ];

    /// Unrecognised names resolve to `NearestWhole`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "round_up" => Self::RoundUp,
            "round_down" => Self::RoundDown,
            "nearest_tenth" => Self::NearestTenth,
            "nearest_hundredth" => Self::NearestHundredth,
            _ => Self::NearestWhole,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NearestWhole => "nearest_whole",
            Self::RoundUp => "round_up",
            Self::RoundDown => "round_down",
            Self::NearestTenth => "nearest_tenth",
            Self::NearestHundredth => "nearest_hundredth",
        }
    }

    pub fn apply(self, value: f64) -> f64 {
        if !value.is_finite() {
            return value;
        }

        match self {
            Self::NearestWhole => value.round(),
            Self::RoundUp => value.ceil(),
            Self::RoundDown => value.floor(),
            Self::NearestTenth => (value * 10.0).round() / 10.0,
            Self::NearestHundredth => (value * 100.0).round() / 100.0,
        }
    }
}

impl From<String> for RoundingMethod {
    fn from(name: String) -> Self {
        Self::from_name(&name)
    }
}

impl From<RoundingMethod> for &'static str {
    fn from(method: RoundingMethod) -> Self {
        method.as_str()
    }
}

pub fn round(value: f64, method: RoundingMethod) -> f64 {
    method.apply(value)
}
