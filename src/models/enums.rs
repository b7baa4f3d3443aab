use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(LinkStatus {
    Pending => "pending",
    Completed => "completed",
    Expired => "expired",
});

str_enum!(IntakeStatus {
    ReadyForReview => "ready_for_review",
    Reviewed => "reviewed",
});

str_enum!(FlagCategory {
    Cardiac => "cardiac",
    Respiratory => "respiratory",
    Neurological => "neurological",
    Hemorrhage => "hemorrhage",
    Sepsis => "sepsis",
    Anaphylaxis => "anaphylaxis",
    MentalHealth => "mental_health",
    Obstetric => "obstetric",
    Metabolic => "metabolic",
});

/// Red-flag severity, ordered LOW < MEDIUM < HIGH < CRITICAL.
///
/// Derives `Ord` so the detection engine can sort and dedupe by severity;
/// the variant order here is load-bearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl FlagSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl std::str::FromStr for FlagSeverity {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(DatabaseError::InvalidEnum {
                field: "FlagSeverity".into(),
                value: s.into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn link_status_round_trip() {
        for (variant, s) in [
            (LinkStatus::Pending, "pending"),
            (LinkStatus::Completed, "completed"),
            (LinkStatus::Expired, "expired"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(LinkStatus::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn intake_status_round_trip() {
        for (variant, s) in [
            (IntakeStatus::ReadyForReview, "ready_for_review"),
            (IntakeStatus::Reviewed, "reviewed"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(IntakeStatus::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn severity_ordering_is_ascending() {
        assert!(FlagSeverity::Low < FlagSeverity::Medium);
        assert!(FlagSeverity::Medium < FlagSeverity::High);
        assert!(FlagSeverity::High < FlagSeverity::Critical);
    }

    #[test]
    fn severity_round_trip() {
        for (variant, s) in [
            (FlagSeverity::Low, "low"),
            (FlagSeverity::Medium, "medium"),
            (FlagSeverity::High, "high"),
            (FlagSeverity::Critical, "critical"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(FlagSeverity::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn invalid_enum_returns_error() {
        assert!(LinkStatus::from_str("open").is_err());
        assert!(IntakeStatus::from_str("draft").is_err());
        assert!(FlagSeverity::from_str("").is_err());
        assert!(FlagCategory::from_str("dermatology").is_err());
    }
}
