//! Style prompt composition.
//!
//! Turns retrieved exemplars plus the task brief into one deterministic
//! generation instruction: style-guide preamble, exemplar blocks with
//! detected pattern tags, the brief, and numbered structural instructions.
//! Identical inputs always produce byte-identical output.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use scribe_common::GenerationRequest;

use crate::retriever::RetrievalResult;

static NUMBERED_LIST: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+\.").expect("static pattern"));

pub struct PromptComposer {
    brand_name: String,
    max_example_words: usize,
}

impl PromptComposer {
    pub fn new(brand_name: impl Into<String>, max_example_words: usize) -> Self {
        Self {
            brand_name: brand_name.into(),
            max_example_words,
        }
    }

    /// The retrieval query string for a request: topic, length, industry,
    /// keywords, audience, plus any extended context and requirements.
    pub fn build_brief(request: &GenerationRequest) -> String {
        let opts = &request.options;
        let mut brief = format!(
            "Write a {} article about {}",
            opts.content_length.label(),
            request.topic
        );
        if let Some(industry) = &opts.industry {
            brief.push_str(&format!(" specifically for the {} industry", industry));
        }
        if !request.keywords.is_empty() {
            brief.push_str(&format!(
                " including keywords: {}",
                request.keywords.join(", ")
            ));
        }
        brief.push_str(&format!(" for {}", request.audience));
        if let Some(context) = &opts.company_context {
            brief.push_str(&format!(". Company context: {}", context));
        }
        if let Some(source) = &opts.data_source {
            brief.push_str(&format!(". Reference data from: {}", source));
        }

        let mut requirements = Vec::new();
        if opts.include_statistics {
            requirements.push("Include relevant statistics and data points");
        }
        if opts.include_case_studies {
            requirements.push("Include real-world examples and case studies");
        }
        if !requirements.is_empty() {
            brief.push_str(&format!(". Requirements: {}", requirements.join("; ")));
        }
        brief
    }

    /// Assemble the full generation instruction.
    pub fn compose(
        &self,
        request: &GenerationRequest,
        category: &str,
        exemplars: &[RetrievalResult],
    ) -> String {
        let brief = Self::build_brief(request);
        let mut parts: Vec<String> = vec![
            format!(
                "You are an expert content writer for {}, a digital transformation and \
                 marketing consultancy.",
                self.brand_name
            ),
            String::new(),
            format!("{} WRITING STYLE GUIDELINES:", self.brand_name.to_uppercase()),
            "- Start articles with a forward-looking industry framing".to_string(),
            "- Use clear, business-focused language that is accessible yet professional"
                .to_string(),
            "- Include practical examples and case studies".to_string(),
            "- Structure content with numbered lists and clear sections".to_string(),
            format!(
                "- End with calls-to-action mentioning {}'s services",
                self.brand_name
            ),
            "- Focus on business value and practical implementation".to_string(),
        ];

        if !exemplars.is_empty() {
            parts.push(String::new());
            parts.push(
                "Write content that matches the style demonstrated in these examples from \
                 our article database:"
                    .to_string(),
            );
            for result in exemplars {
                let article = &result.article;
                parts.push(String::new());
                parts.push(format!(
                    "EXAMPLE {} - {} Category (Similarity: {:.3}):",
                    result.rank, article.category, result.similarity
                ));
                parts.push(format!("Title: {}", article.title));
                parts.push(format!(
                    "Content Preview: {}",
                    content_preview(&article.content, self.max_example_words)
                ));
                parts.push(format!("Word Count: {} words", article.word_count));
                parts.push(format!(
                    "Key Patterns: {}",
                    self.detect_style_patterns(&article.content).join(", ")
                ));
            }
        }

        parts.push(String::new());
        parts.push("CONTENT BRIEF:".to_string());
        parts.push(brief);
        parts.push(String::new());
        parts.push("WRITING INSTRUCTIONS:".to_string());
        parts.push("Write content that demonstrates:".to_string());
        parts.push(String::new());
        parts.push("1. TONE & VOICE:".to_string());
        parts.push(format!("   - {} in register, yet approachable", request.tone));
        parts.push("   - Forward-thinking and optimistic perspective".to_string());
        parts.push("   - Authoritative but not overly technical".to_string());
        parts.push(String::new());
        parts.push("2. STRUCTURE:".to_string());
        parts.push("   - Clear, engaging introduction with industry context".to_string());
        parts.push("   - Well-organized sections with descriptive headings".to_string());
        parts.push("   - Numbered lists for key points or strategies".to_string());
        parts.push("   - Practical examples and real-world applications".to_string());
        parts.push(String::new());
        parts.push("3. CONTENT ELEMENTS:".to_string());
        parts.push("   - Open with a forward-looking industry framing".to_string());
        parts.push("   - Include specific business benefits and value propositions".to_string());
        parts.push("   - Reference current trends and future implications".to_string());
        parts.push("   - Provide actionable insights and recommendations".to_string());
        parts.push(String::new());
        parts.push("4. BRANDING:".to_string());
        parts.push(format!(
            "   - Conclude with {} service offerings relevant to the topic",
            self.brand_name
        ));
        parts.push(format!(
            "   - Include a call-to-action for {}",
            request.options.call_to_action
        ));

        parts.push(String::new());
        parts.push("5. LENGTH REQUIREMENT:".to_string());
        parts.push(format!(
            "   - Target approximately {} words",
            request.options.content_length.target_words()
        ));
        parts.push("   - Ensure comprehensive coverage without being verbose".to_string());

        if let Some(instructions) = category_instructions(category) {
            parts.push(String::new());
            parts.push(format!("6. {} CATEGORY FOCUS:", category.to_uppercase()));
            for line in instructions {
                parts.push(format!("   - {}", line));
            }
        }

        parts.push(String::new());
        parts.push(
            "Generate the article following these style guidelines and incorporating the \
             demonstrated patterns."
                .to_string(),
        );
        parts.push(format!(
            "Ensure the content is valuable, engaging, and clearly positions {} as the \
             expert solution provider.",
            self.brand_name
        ));

        let prompt = parts.join("\n");
        debug!(
            "Composed prompt: {} chars, {} exemplars",
            prompt.len(),
            exemplars.len()
        );
        prompt
    }

    /// Informational style tags for an exemplar. Detection never changes
    /// which exemplars were retrieved.
    pub fn detect_style_patterns(&self, content: &str) -> Vec<&'static str> {
        let lower = content.to_lowercase();
        let mut patterns = Vec::new();

        if content.contains("In today's digital era") {
            patterns.push("Digital era opening");
        }
        if lower.contains("digital transformation") {
            patterns.push("Digital transformation focus");
        }
        if ["In recent years", "The rapidly evolving", "Modern businesses"]
            .iter()
            .any(|phrase| content.contains(phrase))
        {
            patterns.push("Industry context setting");
        }
        if NUMBERED_LIST.is_match(content) {
            patterns.push("Numbered lists");
        }
        if content.contains(self.brand_name.as_str()) {
            patterns.push("Brand integration");
        }
        if ["strategy", "solution", "implementation"]
            .iter()
            .any(|word| lower.contains(word))
        {
            patterns.push("Business-focused language");
        }
        if lower.contains("contact us") || lower.contains("ready to help") {
            patterns.push("Call-to-action");
        }

        if patterns.is_empty() {
            patterns.push("Standard business writing");
        }
        patterns
    }
}

/// First paragraph (plus part of the second when the budget allows), capped
/// at `max_words` and suffixed with an ellipsis when truncated.
fn content_preview(content: &str, max_words: usize) -> String {
    let cleaned: String = content.split_whitespace().collect::<Vec<_>>().join(" ");
    let total_words = cleaned.split_whitespace().count();

    let paragraphs: Vec<&str> = content
        .split("\n\n")
        .filter(|p| !p.trim().is_empty())
        .collect();

    let mut preview = if let Some(first) = paragraphs.first() {
        let first_clean = first.split_whitespace().collect::<Vec<_>>().join(" ");
        if first_clean.split_whitespace().count() < max_words {
            let mut out = first_clean.clone();
            let remaining = max_words - first_clean.split_whitespace().count();
            if remaining > 20 {
                if let Some(second) = paragraphs.get(1) {
                    let extra: Vec<&str> =
                        second.split_whitespace().take(remaining).collect();
                    out.push_str("\n\n");
                    out.push_str(&extra.join(" "));
                }
            }
            out
        } else {
            cleaned
                .split_whitespace()
                .take(max_words)
                .collect::<Vec<_>>()
                .join(" ")
        }
    } else {
        String::new()
    };

    if total_words > max_words {
        preview.push_str("...");
    }
    preview
}

/// Writing guidance specific to the standing content categories.
fn category_instructions(category: &str) -> Option<&'static [&'static str]> {
    match category {
        "Futurist" => Some(&[
            "Focus on emerging trends and future implications",
            "Include technology adoption and innovation themes",
            "Emphasize forward-thinking business strategies",
        ]),
        "Marketing" => Some(&[
            "Emphasize practical marketing strategies and tactics",
            "Include case studies and campaign examples",
            "Focus on measurable business results and ROI",
        ]),
        "Technology" => Some(&[
            "Explain technical concepts in business-friendly terms",
            "Include implementation considerations and best practices",
            "Focus on digital transformation and efficiency gains",
        ]),
        "Consumer Insights" => Some(&[
            "Include customer behavior analysis and psychology",
            "Focus on actionable insights for business decisions",
            "Emphasize customer experience and satisfaction",
        ]),
        "Experience" => Some(&[
            "Focus on user experience and customer journey",
            "Include experiential marketing and engagement strategies",
            "Emphasize emotional connection and brand loyalty",
        ]),
        "Utility & Sustainability" => Some(&[
            "Include sustainability and environmental considerations",
            "Focus on long-term business value and responsibility",
            "Emphasize efficiency and resource optimization",
        ]),
        _ => None,
    }
}
