//! Rule-based content quality scoring.
//!
//! A stateless collaborator of the pipeline: the orchestrator attaches a
//! score to successful generations but never fails a request over scoring.
//! Every measurement is a deterministic lexical-density check, so identical
//! content always produces an identical report.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

const EXECUTIVE_TERMS: &[&str] = &[
    "strategic",
    "competitive",
    "market leadership",
    "organizations",
    "executives",
    "c-suite",
    "business leaders",
    "decision makers",
    "enterprise",
    "corporate",
    "transformation",
    "initiatives",
];

const FORWARD_TERMS: &[&str] = &[
    "future",
    "emerging",
    "evolution",
    "trajectory",
    "next generation",
    "tomorrow",
    "ahead",
    "anticipated",
    "projected",
    "forecasted",
    "trends",
    "outlook",
    "roadmap",
    "vision",
    "innovative",
];

const AUTHORITY_TERMS: &[&str] = &[
    "must",
    "will",
    "requires",
    "imperative",
    "critical",
    "essential",
    "should",
    "need to",
    "demands",
    "necessitates",
    "crucial",
    "fundamental",
    "vital",
    "key",
    "primary",
];

const BUSINESS_TERMS: &[&str] = &[
    "revenue",
    "roi",
    "investment",
    "operational",
    "profitability",
    "market share",
    "competitive advantage",
    "cost",
    "efficiency",
    "growth",
    "performance",
    "value creation",
    "stakeholder",
];

const REQUIRED_SECTIONS: &[&str] = &[
    "executive summary",
    "strategic",
    "implementation",
    "future",
    "recommendations",
    "conclusion",
    "analysis",
    "framework",
];

const HOUSE_PHRASES: &[&str] = &[
    "strategic imperatives",
    "competitive positioning",
    "market leadership",
    "forward-thinking organizations",
    "unprecedented opportunities",
];

static DATA_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\d+[-–—]\d+%",
        r"\d+%",
        r"\$\d+[kmb]?",
        r"\d+x",
        r"(?i)roi",
        r"(?i)return on investment",
        r"(?i)cost reduction",
        r"(?i)efficiency gains",
        r"(?i)productivity improvement",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static pattern"))
    .collect()
});

static HOUSE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"convergence of.*?innovation",
        r"unprecedented.*?opportunities",
        r"forward-thinking organizations",
        r"competitive landscape",
        r"market.*?positioning",
        r"strategic.*?imperatives",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static pattern"))
    .collect()
});

/// Quality score with per-dimension breakdown. All scores are 0-100.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    pub overall_score: f32,
    pub executive_language: f32,
    pub data_driven: f32,
    pub forward_thinking: f32,
    pub authority_tone: f32,
    pub business_focus: f32,
    pub structure: f32,
    pub readability: f32,
    pub house_style: f32,
    pub grade: String,
    pub recommendations: Vec<String>,
}

/// Deterministic lexical quality scorer.
#[derive(Debug, Clone)]
pub struct QualityScorer {
    brand_name: String,
}

impl QualityScorer {
    pub fn new(brand_name: impl Into<String>) -> Self {
        Self {
            brand_name: brand_name.into(),
        }
    }

    /// Score content across all dimensions.
    pub fn score(&self, content: &str, title: &str) -> QualityReport {
        let lower = content.to_lowercase();

        let executive_language = score_executive_language(&lower);
        let data_driven = score_data_driven(content);
        let forward_thinking = score_term_presence(&lower, FORWARD_TERMS, &[8, 6, 4, 3, 2]);
        let authority_tone = score_term_presence(&lower, AUTHORITY_TERMS, &[10, 8, 6, 4, 2]);
        let business_focus = score_term_presence(&lower, BUSINESS_TERMS, &[10, 8, 6, 4, 2]);
        let structure = score_structure(content, title);
        let readability = score_readability(content);
        let house_style = self.score_house_style(&lower);

        let overall_score = executive_language * 0.15
            + data_driven * 0.15
            + forward_thinking * 0.15
            + authority_tone * 0.10
            + business_focus * 0.15
            + structure * 0.10
            + readability * 0.10
            + house_style * 0.10;

        let mut report = QualityReport {
            overall_score: round1(overall_score),
            executive_language: round1(executive_language),
            data_driven: round1(data_driven),
            forward_thinking: round1(forward_thinking),
            authority_tone: round1(authority_tone),
            business_focus: round1(business_focus),
            structure: round1(structure),
            readability: round1(readability),
            house_style: round1(house_style),
            grade: grade(overall_score).to_string(),
            recommendations: vec![],
        };
        report.recommendations = recommendations(&report);
        report
    }

    fn score_house_style(&self, lower: &str) -> f32 {
        let pattern_matches = HOUSE_PATTERNS.iter().filter(|p| p.is_match(lower)).count();
        let base = (pattern_matches as f32 / HOUSE_PATTERNS.len() as f32) * 60.0;

        let mut bonus: f32 = HOUSE_PHRASES
            .iter()
            .filter(|phrase| lower.contains(*phrase))
            .count() as f32
            * 10.0;
        if lower.contains(&self.brand_name.to_lowercase()) {
            bonus += 10.0;
        }

        (base + bonus).min(100.0)
    }
}

fn round1(v: f32) -> f32 {
    (v * 10.0).round() / 10.0
}

fn grade(overall: f32) -> &'static str {
    if overall >= 90.0 {
        "A+"
    } else if overall >= 85.0 {
        "A"
    } else if overall >= 80.0 {
        "B+"
    } else if overall >= 75.0 {
        "B"
    } else if overall >= 70.0 {
        "C+"
    } else if overall >= 65.0 {
        "C"
    } else {
        "D"
    }
}

/// Executive vocabulary density, normalized by content length.
fn score_executive_language(lower: &str) -> f32 {
    let total_words = lower.split_whitespace().count();
    if total_words == 0 {
        return 0.0;
    }
    let found = EXECUTIVE_TERMS.iter().filter(|t| lower.contains(*t)).count();
    let density = (found as f32 / total_words as f32) * 100.0;

    if density >= 1.5 {
        100.0
    } else if density >= 1.0 {
        90.0
    } else if density >= 0.8 {
        80.0
    } else if density >= 0.5 {
        70.0
    } else if density >= 0.3 {
        60.0
    } else {
        (density * 200.0).min(60.0)
    }
}

/// Numeric/statistic density; a good business article carries 3-8 data points.
fn score_data_driven(content: &str) -> f32 {
    let matches: usize = DATA_PATTERNS
        .iter()
        .map(|p| p.find_iter(content).count())
        .sum();
    match matches {
        m if m >= 8 => 100.0,
        m if m >= 6 => 90.0,
        m if m >= 4 => 80.0,
        m if m >= 2 => 70.0,
        m if m >= 1 => 60.0,
        _ => 30.0,
    }
}

/// Banded scoring on how many terms from a fixed list appear.
/// `bands` are the thresholds for 100/90/80/70/60.
fn score_term_presence(lower: &str, terms: &[&str], bands: &[usize; 5]) -> f32 {
    let found = terms.iter().filter(|t| lower.contains(*t)).count();
    if found >= bands[0] {
        100.0
    } else if found >= bands[1] {
        90.0
    } else if found >= bands[2] {
        80.0
    } else if found >= bands[3] {
        70.0
    } else if found >= bands[4] {
        60.0
    } else {
        (found as f32 * 30.0).min(60.0)
    }
}

fn score_structure(content: &str, title: &str) -> f32 {
    let lower = content.to_lowercase();
    let mut score: f32 = 0.0;

    let section_count = content.matches("##").count();
    score += match section_count {
        n if n >= 6 => 30.0,
        n if n >= 4 => 25.0,
        n if n >= 2 => 20.0,
        n => n as f32 * 10.0,
    };

    let required_found = REQUIRED_SECTIONS
        .iter()
        .filter(|s| lower.contains(*s))
        .count();
    score += (required_found as f32 / REQUIRED_SECTIONS.len() as f32) * 40.0;

    let dash_count = content.matches("- ").count();
    let bullet_count = content.matches('\u{2022}').count();
    if dash_count >= 5 || bullet_count >= 5 {
        score += 15.0;
    } else if dash_count >= 3 {
        score += 10.0;
    }

    if title.contains(':') && title.len() > 50 {
        score += 15.0;
    }

    score.min(100.0)
}

/// Sentence/paragraph length closeness to the house target band
/// (about 20 words per sentence, about 115 words per paragraph).
fn score_readability(content: &str) -> f32 {
    let words = content.split_whitespace().count();
    let sentences = content.split('.').filter(|s| !s.trim().is_empty()).count();
    if words == 0 || sentences == 0 {
        return 0.0;
    }

    let avg_sentence = words as f32 / sentences as f32;
    let sentence_score = (100.0 - (20.0 - avg_sentence).abs() * 3.0).clamp(0.0, 100.0);

    let paragraph_lengths: Vec<usize> = content
        .split("\n\n")
        .filter(|p| !p.trim().is_empty())
        .map(|p| p.split_whitespace().count())
        .collect();
    let paragraph_score = if paragraph_lengths.is_empty() {
        50.0
    } else {
        let avg = paragraph_lengths.iter().sum::<usize>() as f32 / paragraph_lengths.len() as f32;
        (100.0 - (115.0 - avg).abs() * 0.5).clamp(0.0, 100.0)
    };

    sentence_score * 0.6 + paragraph_score * 0.4
}

fn recommendations(report: &QualityReport) -> Vec<String> {
    let mut out = Vec::new();
    if report.executive_language < 70.0 {
        out.push("Enhance executive vocabulary and C-suite perspective".to_string());
    }
    if report.data_driven < 70.0 {
        out.push("Include more quantitative metrics and data points".to_string());
    }
    if report.forward_thinking < 70.0 {
        out.push("Add future outlook and emerging trend analysis".to_string());
    }
    if report.authority_tone < 70.0 {
        out.push("Use more confident, declarative statements".to_string());
    }
    if report.business_focus < 70.0 {
        out.push("Strengthen business value proposition and ROI focus".to_string());
    }
    if report.structure < 70.0 {
        out.push("Improve article structure with clear sections and headers".to_string());
    }
    if report.readability < 70.0 {
        out.push("Enhance readability with shorter sentences and clearer language".to_string());
    }
    if report.house_style < 70.0 {
        out.push("Better align with the house editorial style and tone".to_string());
    }
    if out.is_empty() {
        out.push("Excellent content quality - maintain current standards".to_string());
    }
    out
}
