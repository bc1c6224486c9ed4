//! Content filter applied before persistence.
//!
//! A short-circuiting chain of [`FilterRule`]s. The first rule that
//! objects to a posting rejects it; rejected postings are counted, never
//! persisted, and are not errors.

use std::collections::HashSet;
use std::fmt;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use harvest_types::{FilterSettings, RawPosting};

use crate::error::PipelineError;

/// Why a posting was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Rejection {
    /// Title or job type names an internship or trainee role.
    Internship { field: &'static str, term: String },

    /// Description or requirements demand fluency in the restricted language.
    LanguageRequirement { matched: String },

    /// Job type outside the allowed set.
    JobType { job_type: String },
}

impl Rejection {
    pub fn rule(&self) -> &'static str {
        match self {
            Self::Internship { .. } => "internship",
            Self::LanguageRequirement { .. } => "language_requirement",
            Self::JobType { .. } => "job_type",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internship { field, term } => write!(f, "internship term '{term}' in {field}"),
            Self::LanguageRequirement { matched } => {
                write!(f, "language requirement '{matched}'")
            }
            Self::JobType { job_type } => write!(f, "job type '{job_type}' not allowed"),
        }
    }
}

/// One inclusion rule.
pub trait FilterRule: Send + Sync {
    fn name(&self) -> &'static str;

    /// Return a rejection if the posting violates this rule.
    fn check(&self, posting: &RawPosting) -> Option<Rejection>;
}

/// Builds `\b(?:a|b|c)\b`, or `None` for an empty term list.
fn word_pattern(terms: &[String]) -> Result<Option<Regex>, PipelineError> {
    let alternation = terms
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .map(|t| regex::escape(&t))
        .collect::<Vec<_>>()
        .join("|");
    if alternation.is_empty() {
        return Ok(None);
    }
    Regex::new(&format!(r"(?i)\b(?:{alternation})\b"))
        .map(Some)
        .map_err(|e| PipelineError::FilterConfig(e.to_string()))
}

/// Rejects internship and trainee roles by whole-word match on title and
/// job type.
pub struct InternshipRule {
    pattern: Option<Regex>,
}

impl InternshipRule {
    pub fn new(terms: &[String]) -> Result<Self, PipelineError> {
        Ok(Self {
            pattern: word_pattern(terms)?,
        })
    }
}

impl FilterRule for InternshipRule {
    fn name(&self) -> &'static str {
        "internship"
    }

    fn check(&self, posting: &RawPosting) -> Option<Rejection> {
        let pattern = self.pattern.as_ref()?;
        let fields = [
            ("title", Some(posting.title.as_str())),
            ("job_type", posting.job_type.as_deref()),
        ];
        fields.into_iter().find_map(|(field, value)| {
            pattern.find(value?).map(|m| Rejection::Internship {
                field,
                term: m.as_str().to_lowercase(),
            })
        })
    }
}

/// Rejects postings that require native or advanced fluency in the
/// restricted language.
///
/// Matches literal phrases as substrings, then a set of patterns built from
/// the language names: "fluent (in) X", "native X (speaker)",
/// "X native speaker", a C1/C2 level after a language name, and a C1/C2
/// level before one when joined by a separator or "level".
pub struct LanguageRequirementRule {
    phrases: Vec<String>,
    pattern: Option<Regex>,
}

impl LanguageRequirementRule {
    pub fn new(language_terms: &[String], phrases: &[String]) -> Result<Self, PipelineError> {
        let languages = language_terms
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .map(|t| regex::escape(&t))
            .collect::<Vec<_>>()
            .join("|");

        let pattern = if languages.is_empty() {
            None
        } else {
            let l = languages;
            let source = [
                format!(r"\bfluent(?:ly)?\s+(?:in\s+)?(?:{l})\b"),
                format!(r"\bnative\s+(?:{l})(?:\s+speaker)?\b"),
                format!(r"\b(?:{l})\s+native\s+speaker"),
                // Level first only with a separator or "level"/"niveau" in between
                format!(r"\bc[12](?:\s*[-:(]\s*(?:(?:level|niveau)\s+)?|\s+(?:level|niveau)\s+)(?:{l})"),
                format!(r"\b(?:{l})\w*\s*[-:(]?\s*(?:level\s+|niveau\s+)?c[12]\b"),
            ]
            .iter()
            .map(|p| format!("(?:{p})"))
            .collect::<Vec<_>>()
            .join("|");
            Some(
                Regex::new(&format!("(?i){source}"))
                    .map_err(|e| PipelineError::FilterConfig(e.to_string()))?,
            )
        };

        Ok(Self {
            phrases: phrases
                .iter()
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
            pattern,
        })
    }
}

impl FilterRule for LanguageRequirementRule {
    fn name(&self) -> &'static str {
        "language_requirement"
    }

    fn check(&self, posting: &RawPosting) -> Option<Rejection> {
        let text = format!(
            "{} {}",
            posting.description,
            posting.requirements.as_deref().unwrap_or_default()
        )
        .to_lowercase();

        if let Some(phrase) = self.phrases.iter().find(|p| text.contains(p.as_str())) {
            return Some(Rejection::LanguageRequirement {
                matched: phrase.clone(),
            });
        }

        self.pattern
            .as_ref()?
            .find(&text)
            .map(|m| Rejection::LanguageRequirement {
                matched: m.as_str().to_string(),
            })
    }
}

/// Accepts only job types in the allowed set; an absent job type passes.
pub struct JobTypeRule {
    allowed: HashSet<String>,
}

impl JobTypeRule {
    pub fn new(allowed: &[String]) -> Self {
        Self {
            allowed: allowed.iter().map(|t| t.trim().to_lowercase()).collect(),
        }
    }
}

impl FilterRule for JobTypeRule {
    fn name(&self) -> &'static str {
        "job_type"
    }

    fn check(&self, posting: &RawPosting) -> Option<Rejection> {
        let job_type = posting.job_type.as_deref()?.trim().to_lowercase();
        if job_type.is_empty() || self.allowed.contains(&job_type) {
            return None;
        }
        Some(Rejection::JobType { job_type })
    }
}

/// Result of filtering one batch.
#[derive(Debug, Default)]
pub struct FilterOutcome {
    pub accepted: Vec<RawPosting>,
    pub rejections: Vec<Rejection>,
}

impl FilterOutcome {
    pub fn rejected(&self) -> usize {
        self.rejections.len()
    }
}

/// Ordered rule chain.
pub struct ContentFilter {
    rules: Vec<Box<dyn FilterRule>>,
}

impl ContentFilter {
    /// Filter with no rules; accepts everything.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Internship, language, then job type rules.
    pub fn from_settings(settings: &FilterSettings) -> Result<Self, PipelineError> {
        Ok(Self::empty()
            .with_rule(InternshipRule::new(&settings.internship_terms)?)
            .with_rule(LanguageRequirementRule::new(
                &settings.language_terms,
                &settings.language_phrases,
            )?)
            .with_rule(JobTypeRule::new(&settings.allowed_job_types)))
    }

    pub fn with_rule(mut self, rule: impl FilterRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// First rejection raised by the chain, if any.
    pub fn evaluate(&self, posting: &RawPosting) -> Option<Rejection> {
        self.rules.iter().find_map(|rule| rule.check(posting))
    }

    /// Split a batch into accepted postings and rejections.
    pub fn apply(&self, postings: Vec<RawPosting>) -> FilterOutcome {
        let mut outcome = FilterOutcome::default();
        for posting in postings {
            match self.evaluate(&posting) {
                Some(rejection) => {
                    debug!(
                        url = %posting.canonical_url,
                        title = %posting.title,
                        reason = %rejection,
                        "Posting rejected"
                    );
                    outcome.rejections.push(rejection);
                }
                None => outcome.accepted.push(posting),
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn posting(title: &str, description: &str) -> RawPosting {
        RawPosting {
            title: title.to_string(),
            company: "Acme GmbH".to_string(),
            location: "Berlin".to_string(),
            description: description.to_string(),
            canonical_url: "https://jobs.example/1".to_string(),
            source: "test".to_string(),
            requirements: None,
            benefits: None,
            salary: None,
            job_type: None,
            contract_type: None,
            remote_type: None,
            experience_level: None,
            deadline_at: None,
            posted_at: Utc::now(),
            scraped_at: Utc::now(),
        }
    }

    fn filter() -> ContentFilter {
        ContentFilter::from_settings(&FilterSettings::default()).unwrap()
    }

    #[test]
    fn test_rule_order() {
        assert_eq!(
            filter().rule_names(),
            vec!["internship", "language_requirement", "job_type"]
        );
    }

    #[test]
    fn test_internship_titles_rejected() {
        let filter = filter();
        for title in [
            "Software Engineering Intern",
            "Internship Data Science",
            "Praktikum Marketing",
            "Praktikantin HR (w/m/d)",
            "Trainee Controlling",
        ] {
            let rejection = filter.evaluate(&posting(title, "Nice team"));
            assert!(
                matches!(rejection, Some(Rejection::Internship { field: "title", .. })),
                "{title} should be rejected"
            );
        }
    }

    #[test]
    fn test_internship_whole_word_only() {
        let filter = filter();
        for title in ["International Sales Manager", "Internal Tools Engineer"] {
            assert_eq!(filter.evaluate(&posting(title, "Nice team")), None, "{title}");
        }
    }

    #[test]
    fn test_internship_job_type_rejected() {
        let mut p = posting("Data Analyst", "Nice team");
        p.job_type = Some("Internship".to_string());
        assert!(matches!(
            filter().evaluate(&p),
            Some(Rejection::Internship {
                field: "job_type",
                ..
            })
        ));
    }

    #[test]
    fn test_language_phrases_rejected() {
        let filter = filter();
        for description in [
            "You speak fluent German and English.",
            "Fließend Deutsch in Wort und Schrift",
            "Verhandlungssichere Deutschkenntnisse erforderlich",
            "Sprachniveau: C1 Deutsch",
        ] {
            assert!(
                matches!(
                    filter.evaluate(&posting("Data Scientist", description)),
                    Some(Rejection::LanguageRequirement { .. })
                ),
                "{description}"
            );
        }
    }

    #[test]
    fn test_language_patterns_rejected() {
        let filter = filter();
        for description in [
            "Must be fluent in German",
            "Native German speaker preferred",
            "German native speaker",
            "German (C1) required",
            "Deutschkenntnisse (C2) erforderlich",
            "C1 level German",
            "C1-level German",
            "Level c2: German",
        ] {
            assert!(
                matches!(
                    filter.evaluate(&posting("Data Scientist", description)),
                    Some(Rejection::LanguageRequirement { .. })
                ),
                "{description}"
            );
        }
    }

    #[test]
    fn test_language_in_requirements_rejected() {
        let mut p = posting("Data Scientist", "Great role");
        p.requirements = Some("Fluent German".to_string());
        assert!(filter().evaluate(&p).is_some());
    }

    #[test]
    fn test_language_mentions_allowed() {
        let filter = filter();
        for description in [
            "English is our working language; German is a plus",
            "English C1, German B1",
            "English C1 German B1",
            "We are a German company",
        ] {
            assert_eq!(
                filter.evaluate(&posting("Data Scientist", description)),
                None,
                "{description}"
            );
        }
    }

    #[test]
    fn test_job_type_rule() {
        let filter = filter();
        let mut p = posting("Data Scientist", "Nice team");
        for allowed in ["full-time", "Full Time", "Vollzeit", " fulltime "] {
            p.job_type = Some(allowed.to_string());
            assert_eq!(filter.evaluate(&p), None, "{allowed}");
        }
        p.job_type = Some("part-time".to_string());
        assert_eq!(
            filter.evaluate(&p),
            Some(Rejection::JobType {
                job_type: "part-time".to_string()
            })
        );
        p.job_type = None;
        assert_eq!(filter.evaluate(&p), None);
    }

    #[test]
    fn test_apply_splits_batch() {
        let outcome = filter().apply(vec![
            posting("Data Scientist", "Python"),
            posting("Software Engineering Intern", "Python"),
            posting("ML Engineer", "Native German speaker"),
        ]);
        assert_eq!(outcome.accepted.len(), 1);
        assert_eq!(outcome.rejected(), 2);
        assert_eq!(outcome.rejections[0].rule(), "internship");
        assert_eq!(outcome.rejections[1].rule(), "language_requirement");
    }

    #[test]
    fn test_empty_filter_accepts_all() {
        let outcome = ContentFilter::empty().apply(vec![posting("Intern", "fluent german")]);
        assert_eq!(outcome.accepted.len(), 1);
    }
}
