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

str_enum!(AnalysisStatus {
    Pending => "pending",
    Analyzed => "analyzed",
    Failed => "failed",
});

str_enum!(MarkerStatus {
    Normal => "normal",
    Low => "low",
    High => "high",
    Critical => "critical",
    Unknown => "unknown",
});

str_enum!(MarkerCategory {
    Blood => "blood",
    Immunity => "immunity",
    Coagulation => "coagulation",
    Metabolism => "metabolism",
    Lipids => "lipids",
    Cardiovascular => "cardiovascular",
    Kidney => "kidney",
    Liver => "liver",
    Hormonal => "hormonal",
    Other => "other",
});

str_enum!(Importance {
    High => "high",
    Medium => "medium",
    Low => "low",
});

impl MarkerStatus {
    /// Lenient parse for values arriving from the AI analysis boundary.
    /// Unknown strings degrade to `Unknown` instead of erroring.
    pub fn from_str_lenient(s: &str) -> Self {
        s.parse().unwrap_or(Self::Unknown)
    }
}

impl MarkerCategory {
    /// Lenient parse for values arriving from the AI analysis boundary.
    pub fn from_str_lenient(s: &str) -> Self {
        s.parse().unwrap_or(Self::Other)
    }
}
