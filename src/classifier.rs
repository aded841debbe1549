//! State Classifier
//!
//! Pure mapping from `(operational_state, engine_on, speed)` to a
//! `Category`. Rules are evaluated in order, first match wins:
//!
//! 1. **Maintenance** - state contains a maintenance keyword
//! 2. **Idle engine** - engine on, speed at or below the idle limit, state
//!    contains a stopped keyword
//! 3. **Productive** - state contains a productive keyword
//! 4. **Available** - everything else
//!
//! Maintenance is checked first so a running engine during a repair is
//! never booked as operational idling.
//!
//! A keyword matches only where a word of the state label begins, so the
//! stem `PRODUTIV` matches `PRODUTIVA` but not `IMPRODUTIVA`, and
//! `DISPONIVEL` does not match `INDISPONIVEL`.
//!
//! `Category::Washing` is never produced here; washing and roller cleaning
//! come from the side-table extractors keyed on operation codes.

use crate::config::ClassifierConfig;
use crate::types::{Category, TelemetryRecord};

/// Keyword-driven state classifier. Cheap to clone.
#[derive(Debug, Clone)]
pub struct StateClassifier {
    maintenance: Vec<String>,
    stopped: Vec<String>,
    productive: Vec<String>,
    idle_speed_max_kmh: f64,
}

impl StateClassifier {
    /// Build from a classifier config section. Keywords are upper-cased
    /// once here so `classify` only does word-prefix checks.
    pub fn new(config: &ClassifierConfig) -> Self {
        let upper = |list: &[String]| -> Vec<String> {
            list.iter()
                .map(|k| k.trim().to_uppercase())
                .filter(|k| !k.is_empty())
                .collect()
        };
        Self {
            maintenance: upper(&config.maintenance_keywords),
            stopped: upper(&config.stopped_keywords),
            productive: upper(&config.productive_keywords),
            idle_speed_max_kmh: config.idle_speed_max_kmh,
        }
    }

    /// Classifier built from the process-wide configuration.
    pub fn from_global() -> Self {
        Self::new(&crate::config::get().classifier)
    }

    /// Classify one sample.
    pub fn classify(&self, operational_state: &str, engine_on: bool, speed_kmh: f64) -> Category {
        let state = operational_state.trim().to_uppercase();

        if contains_any(&state, &self.maintenance) {
            Category::Maintenance
        } else if engine_on
            && speed_kmh <= self.idle_speed_max_kmh
            && contains_any(&state, &self.stopped)
        {
            Category::IdleEngine
        } else if contains_any(&state, &self.productive) {
            Category::Productive
        } else {
            Category::Available
        }
    }

    /// Classify a normalized record.
    pub fn classify_record(&self, record: &TelemetryRecord) -> Category {
        self.classify(&record.operational_state, record.engine_on, record.speed_kmh)
    }
}

impl Default for StateClassifier {
    fn default() -> Self {
        Self::new(&ClassifierConfig::default())
    }
}

fn contains_any(state: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|k| matches_at_word_start(state, k))
}

/// True when `keyword` occurs in `state` starting at a word boundary.
fn matches_at_word_start(state: &str, keyword: &str) -> bool {
    state.match_indices(keyword).any(|(pos, _)| {
        state[..pos]
            .chars()
            .next_back()
            .map_or(true, |prev| !prev.is_alphanumeric())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parada_engine_on_stopped_is_idle() {
        let c = StateClassifier::default();
        assert_eq!(c.classify("PARADA", true, 0.0), Category::IdleEngine);
    }

    #[test]
    fn test_parada_engine_off_is_available() {
        let c = StateClassifier::default();
        assert_eq!(c.classify("PARADA", false, 0.0), Category::Available);
    }

    #[test]
    fn test_parada_moving_is_not_idle() {
        let c = StateClassifier::default();
        assert_eq!(c.classify("PARADA", true, 3.2), Category::Available);
    }

    #[test]
    fn test_maintenance_overrides_running_engine() {
        let c = StateClassifier::default();
        assert_eq!(c.classify("MANUTENÇÃO", true, 0.0), Category::Maintenance);
        assert_eq!(c.classify("MANUTENCAO PARADA", true, 0.0), Category::Maintenance);
    }

    #[test]
    fn test_productive_state() {
        let c = StateClassifier::default();
        assert_eq!(c.classify("PRODUTIVA", true, 5.5), Category::Productive);
        // Productive rule ignores engine and speed
        assert_eq!(c.classify("produtivo", false, 0.0), Category::Productive);
    }

    #[test]
    fn test_unknown_state_is_available() {
        let c = StateClassifier::default();
        assert_eq!(c.classify("DESLOCAMENTO", true, 12.0), Category::Available);
        assert_eq!(c.classify("", false, 0.0), Category::Available);
    }

    #[test]
    fn test_never_returns_washing() {
        let c = StateClassifier::default();
        for state in ["LAVAGEM", "PARADA LAVAGEM", "PRODUTIVA"] {
            assert_ne!(c.classify(state, true, 0.0), Category::Washing);
        }
    }

    #[test]
    fn test_negated_productive_label_is_not_productive() {
        let c = StateClassifier::default();
        assert_eq!(c.classify("IMPRODUTIVA", false, 0.0), Category::Available);
        assert_eq!(c.classify("IMPRODUTIVA", true, 4.0), Category::Available);
        assert_eq!(c.classify("PARADA IMPRODUTIVA", true, 0.0), Category::IdleEngine);
    }

    #[test]
    fn test_unavailable_label_is_not_idle() {
        let c = StateClassifier::default();
        assert_eq!(c.classify("INDISPONIVEL", true, 0.0), Category::Available);
        assert_eq!(c.classify("INDISPONÍVEL", true, 0.0), Category::Available);
        assert_eq!(c.classify("DISPONIVEL", true, 0.0), Category::IdleEngine);
    }

    #[test]
    fn test_keyword_after_separator_matches() {
        let c = StateClassifier::default();
        assert_eq!(c.classify("EM/PRODUTIVA", true, 5.0), Category::Productive);
        assert_eq!(c.classify("02-PARADA", true, 0.0), Category::IdleEngine);
        assert_eq!(c.classify("PRE-MANUTENCAO", true, 0.0), Category::Maintenance);
    }

    #[test]
    fn test_word_start_matching() {
        assert!(matches_at_word_start("PRODUTIVA", "PRODUTIV"));
        assert!(matches_at_word_start("NAO IMPRODUTIVA PRODUTIVA", "PRODUTIV"));
        assert!(!matches_at_word_start("IMPRODUTIVA", "PRODUTIV"));
        assert!(!matches_at_word_start("", "PRODUTIV"));
    }

    #[test]
    fn test_custom_idle_speed_limit() {
        let config = ClassifierConfig {
            idle_speed_max_kmh: 1.0,
            ..Default::default()
        };
        let c = StateClassifier::new(&config);
        assert_eq!(c.classify("PARADA", true, 0.8), Category::IdleEngine);
        assert_eq!(c.classify("PARADA", true, 1.5), Category::Available);
    }

    #[test]
    fn test_custom_keywords_are_case_insensitive() {
        let config = ClassifierConfig {
            stopped_keywords: vec!["aguardando".to_string()],
            ..Default::default()
        };
        let c = StateClassifier::new(&config);
        assert_eq!(c.classify("Aguardando Transbordo", true, 0.0), Category::IdleEngine);
        // Default stopped keywords are replaced, not extended
        assert_eq!(c.classify("PARADA", true, 0.0), Category::Available);
    }
}
