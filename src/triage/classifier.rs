//! Keyword-based symptom risk classifier.
//!
//! Deterministic and pure: the same text always yields the same tier.
//! Keywords are matched as lower-case substrings so that stems like
//! "convuls" cover "convulsão", "convulsionando", etc. Each keyword counts
//! at most once, however often it appears.

use serde::Serialize;

use crate::models::enums::RiskLevel;

/// Inputs longer than this many words are treated as at least MEDIUM.
pub const COMPLEX_DESCRIPTION_WORDS: usize = 25;

/// Warning hits at or above this count escalate to HIGH.
pub const WARNING_HITS_FOR_HIGH: usize = 3;

/// Signals that alone justify emergency care.
pub const URGENT_SIGNALS: &[&str] = &[
    "convuls",
    "não respira",
    "nao respira",
    "dificuldade para respirar",
    "respiração rápida",
    "respiracao rapida",
    "sangue",
    "sangrando",
    "não levanta",
    "nao levanta",
    "inconsciente",
    "não responde",
    "nao responde",
    "seizure",
    "not breathing",
    "bleeding",
    "unresponsive",
];

/// Signals of moderate discomfort.
pub const WARNING_SIGNALS: &[&str] = &[
    "vômit",
    "vomit",
    "diarre",
    "diarrh",
    "febre",
    "febril",
    "fever",
    "apatia",
    "letarg",
    "letharg",
    "não come",
    "nao come",
    "não está comendo",
    "nao esta comendo",
    "sem comer",
    "not eating",
    "não bebe",
    "nao bebe",
    "mancando",
    "claudicação",
    "claudicacao",
    "coçando",
    "coceira",
];

/// Classifier output. Summary and recommendation are fixed per tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assessment {
    pub risk_level: RiskLevel,
    pub summary: String,
    pub recommendations: String,
}

/// Maps symptom text to a risk assessment.
///
/// Callers reject empty input before classifying.
pub trait Classifier: Send + Sync {
    fn classify(&self, symptoms: &str) -> Assessment;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalCounts {
    pub urgent: usize,
    pub warning: usize,
    pub words: usize,
}

/// The default classifier over [`URGENT_SIGNALS`] and [`WARNING_SIGNALS`].
#[derive(Debug, Clone, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn count_signals(symptoms: &str) -> SignalCounts {
        let text = symptoms.to_lowercase();
        SignalCounts {
            urgent: URGENT_SIGNALS.iter().filter(|k| text.contains(*k)).count(),
            warning: WARNING_SIGNALS.iter().filter(|k| text.contains(*k)).count(),
            words: text.split_whitespace().count(),
        }
    }

    pub fn tier_for(counts: SignalCounts) -> RiskLevel {
        if counts.urgent >= 1 || counts.warning >= WARNING_HITS_FOR_HIGH {
            RiskLevel::High
        } else if counts.warning >= 1 || counts.words > COMPLEX_DESCRIPTION_WORDS {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

impl Classifier for KeywordClassifier {
    fn classify(&self, symptoms: &str) -> Assessment {
        let counts = Self::count_signals(symptoms);
        let risk_level = Self::tier_for(counts);
        tracing::debug!(
            urgent = counts.urgent,
            warning = counts.warning,
            words = counts.words,
            risk = risk_level.as_str(),
            "Symptoms classified"
        );
        template_for(risk_level)
    }
}

/// Fixed human-readable texts for a tier.
pub fn template_for(risk_level: RiskLevel) -> Assessment {
    let (summary, recommendations) = match risk_level {
        RiskLevel::High => (
            "Os sintomas relatados indicam um quadro potencialmente grave ou emergencial.",
            "Leve o animal imediatamente a um pronto-atendimento veterinário. \
             Evite oferecer alimentos ou medicamentos por conta própria e mantenha o animal em local calmo.",
        ),
        RiskLevel::Medium => (
            "Os sintomas sugerem um desconforto moderado que merece acompanhamento próximo.",
            "Observe o animal pelas próximas horas, registrando mudanças de apetite, vômitos, fezes e comportamento. \
             Se os sintomas persistirem por mais de 24h ou piorarem, agende uma consulta o quanto antes.",
        ),
        RiskLevel::Low => (
            "Os sintomas descritos parecem leves ou inespecíficos neste momento.",
            "Mantenha a rotina normal do animal, com água fresca e ambiente confortável. \
             Caso surjam novos sintomas ou haja piora, agende uma avaliação veterinária.",
        ),
    };
    Assessment {
        risk_level,
        summary: format!("Nível de risco: {}. {summary}", risk_level.label()),
        recommendations: recommendations.to_string(),
    }
}
