use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
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

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(Role {
    Tutor => "TUTOR",
    Veterinarian => "VETERINARIAN",
    Admin => "ADMIN",
});

str_enum!(AppointmentStatus {
    Pending => "PENDING",
    Confirmed => "CONFIRMED",
    Cancelled => "CANCELLED",
    Completed => "COMPLETED",
});

str_enum!(RiskLevel {
    Low => "LOW",
    Medium => "MEDIUM",
    High => "HIGH",
});

str_enum!(NotificationType {
    Appointment => "APPOINTMENT",
    Triage => "TRIAGE",
    Success => "SUCCESS",
    Info => "INFO",
});

impl AppointmentStatus {
    /// CANCELLED and COMPLETED admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed)
    }
}

impl RiskLevel {
    /// Clinical label used in triage summaries ("Baixo", "Médio", "Alto").
    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "Baixo",
            Self::Medium => "Médio",
            Self::High => "Alto",
        }
    }

    /// Short label used in notification titles ("Leve", "Atenção", "Urgente").
    pub fn notice_label(&self) -> &'static str {
        match self {
            Self::Low => "Leve",
            Self::Medium => "Atenção",
            Self::High => "Urgente",
        }
    }

    /// Lower-case code understood by older clients.
    pub fn legacy_code(&self) -> &'static str {
        match self {
            Self::Low => "ok",
            Self::Medium => "monitor",
            Self::High => "urgent",
        }
    }

    /// Accept the canonical code, either label set, or a legacy code.
    pub fn parse_any(value: &str) -> Option<Self> {
        let v = value.trim().to_lowercase();
        match v.as_str() {
            "low" | "baixo" | "leve" | "ok" => Some(Self::Low),
            "medium" | "médio" | "medio" | "atenção" | "atencao" | "monitor" => Some(Self::Medium),
            "high" | "alto" | "urgente" | "urgent" => Some(Self::High),
            _ => None,
        }
    }
}
