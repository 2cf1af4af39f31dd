//! Deterministic template-based article writer.
//!
//! The always-successful fallback behind the LLM providers: it assembles an
//! article from fixed structural patterns keyed off category and topic, with
//! keyword-driven phrasing. No randomness, no I/O; the same request always
//! yields the same article.

use scribe_common::GenerationRequest;

pub struct TemplateWriter {
    brand_name: String,
}

impl TemplateWriter {
    pub fn new(brand_name: impl Into<String>) -> Self {
        Self {
            brand_name: brand_name.into(),
        }
    }

    /// Produce (title, content) for the request. Never fails.
    pub fn write(&self, request: &GenerationRequest, category: &str) -> (String, String) {
        let topic = request.topic.trim();
        let topic_lower = topic.to_lowercase();
        let keywords = &request.keywords;

        let mut sections = vec![opening(&topic_lower, category)];

        if topic_lower.contains("what is") || matches!(category, "Technology" | "Consumer Insights")
        {
            sections.push(what_is_section(topic, &topic_lower, keywords));
            sections.push(why_important_section(topic, &topic_lower, keywords));
        } else if category == "Futurist" || topic_lower.contains("trends") {
            sections.push(list_section(topic, &topic_lower, category, keywords));
        } else if category == "Experience" || topic_lower.contains("tips") {
            sections.push(list_section(topic, &topic_lower, category, keywords));
        } else {
            sections.push(what_is_section(topic, &topic_lower, keywords));
            sections.push(list_section(topic, &topic_lower, category, keywords));
        }

        sections.push(conclusion(topic, &topic_lower, category));
        sections.push(format!(
            "If your organization is seeking expert guidance in {}, {} offers comprehensive \
             solutions tailored to your goals. Contact us today to get started.",
            topic_lower, self.brand_name
        ));

        let content = sections.join("\n\n");
        let title = title_for(topic, &topic_lower, category, keywords, &request.audience);
        (title, content)
    }
}

fn keyword(keywords: &[String], index: usize, fallback: &str) -> String {
    keywords
        .get(index)
        .map(|k| k.to_string())
        .unwrap_or_else(|| fallback.to_string())
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn opening(topic_lower: &str, category: &str) -> String {
    match category {
        "Futurist" | "Technology" => format!(
            "Customer expectations are rising while cutting-edge technology reshapes every \
             sector, and {} has become the cornerstone of strategy for organizations that \
             intend to stay ahead.",
            topic_lower
        ),
        "Marketing" | "Experience" => format!(
            "In today's digital era, {} has become a critical strategy for brands to stand \
             out.",
            topic_lower
        ),
        _ => format!(
            "In today's data-driven world, {} is key to staying competitive.",
            topic_lower
        ),
    }
}

fn what_is_section(topic: &str, topic_lower: &str, keywords: &[String]) -> String {
    let primary = keyword(keywords, 0, "strategic approaches");
    let secondary = keyword(keywords, 1, "customer engagement");
    let tertiary = keyword(keywords, 2, "brand recognition");

    format!(
        "What Is {topic}?\n\
         {topic} is the strategic process of leveraging {primary} to achieve business \
         objectives. The goal is to enhance {secondary}, strengthen {tertiary}, and drive \
         measurable business results. Ultimately, {topic_lower} aims to develop lasting \
         customer relationships.\n\n\
         What does {topic_lower} involve? It depends on the business objectives and market \
         conditions. Examples include:\n\
         - {p1} implementation\n\
         - {p2} optimization\n\
         - {p3} transformation\n\
         - Performance measurement and analysis\n\
         - Continuous improvement initiatives",
        topic = topic,
        topic_lower = topic_lower,
        primary = primary,
        secondary = secondary,
        tertiary = tertiary,
        p1 = title_case(&primary),
        p2 = title_case(&secondary),
        p3 = title_case(&tertiary),
    )
}

fn why_important_section(topic: &str, topic_lower: &str, keywords: &[String]) -> String {
    format!(
        "Why Is {topic} Important?\n\
         Traditional methods are no longer enough to meet modern expectations. Today's \
         businesses need to create innovative {topic_lower} strategies that resonate. The \
         importance of {topic_lower} lies in its ability to:\n\n\
         - Enhanced {k0}: stronger outcomes where they matter most\n\
         - Improved {k1}: faster, leaner day-to-day execution\n\
         - Greater {k2}: visible results stakeholders can measure\n\
         - Competitive advantage in the market\n\
         - Long-term strategic value creation",
        topic = topic,
        topic_lower = topic_lower,
        k0 = keyword(keywords, 0, "performance"),
        k1 = keyword(keywords, 1, "efficiency"),
        k2 = keyword(keywords, 2, "impact"),
    )
}

fn list_section(topic: &str, topic_lower: &str, category: &str, keywords: &[String]) -> String {
    let is_trends = topic_lower.contains("trend") || category == "Futurist";
    let kind = if is_trends { "Trends" } else { "Tips" };

    let items: [String; 5] = match category {
        "Marketing" => [
            format!("Strategic {} Integration", title_case(&keyword(keywords, 0, "brand"))),
            format!("Data-Driven {} Insights", title_case(&keyword(keywords, 1, "customer"))),
            format!("Omnichannel {} Design", title_case(&keyword(keywords, 2, "experience"))),
            "Performance Measurement and ROI Tracking".to_string(),
            "Continuous Optimization and A/B Testing".to_string(),
        ],
        "Technology" | "Futurist" => [
            format!("Advanced {} Implementation", title_case(&keyword(keywords, 0, "AI"))),
            format!("Scalable {} Architecture", title_case(&keyword(keywords, 1, "cloud"))),
            format!("Enhanced {} Protocols", title_case(&keyword(keywords, 2, "security"))),
            "Real-time Analytics and Monitoring".to_string(),
            "Future-proof Integration Planning".to_string(),
        ],
        _ => [
            format!("Strategic {} Planning", title_case(&keyword(keywords, 0, "innovation"))),
            format!(
                "Systematic {} Approach",
                title_case(&keyword(keywords, 1, "implementation"))
            ),
            format!("Quality {} Frameworks", title_case(&keyword(keywords, 2, "assurance"))),
            "Performance Metrics and KPI Development".to_string(),
            "Stakeholder Engagement and Communication".to_string(),
        ],
    };

    let mut lines = vec![format!("5 {} {}", topic, kind)];
    for (i, item) in items.iter().enumerate() {
        lines.push(String::new());
        lines.push(format!("{}. {}", i + 1, item));
        lines.push(format!(
            "\"Excellence in {} drives sustainable competitive advantage.\"",
            item.to_lowercase()
        ));
        lines.push(format!(
            "Organizations implementing comprehensive {} strategies achieve significant \
             improvements in operational efficiency and customer satisfaction. This approach \
             requires systematic planning, dedicated resources, and continuous refinement to \
             deliver measurable business results.",
            item.to_lowercase()
        ));
    }
    lines.join("\n")
}

fn conclusion(topic: &str, topic_lower: &str, category: &str) -> String {
    match category {
        "Marketing" => format!(
            "{} is more than a simple process - it's a strategic communication tool that \
             builds sustainable value.",
            topic
        ),
        "Experience" => format!(
            "In a world where consumer choices are abundant, a well-planned {} strategy can \
             set your brand apart and drive long-term success.",
            topic_lower
        ),
        _ => format!(
            "{} goes far beyond using basic tools - it's about creating meaningful \
             connections through strategy and execution. Businesses that want to thrive must \
             begin laying this foundation today.",
            topic
        ),
    }
}

fn title_for(
    topic: &str,
    topic_lower: &str,
    category: &str,
    keywords: &[String],
    audience: &str,
) -> String {
    let primary = title_case(&keyword(keywords, 0, "strategic"));
    if topic_lower.contains("what is") {
        format!("What Is {}? {} Guide for {}", topic, primary, audience)
    } else if matches!(category, "Futurist" | "Experience") {
        format!("5 {} {} for Success", topic, if category == "Futurist" { "Trends to Watch" } else { "Tips" })
    } else {
        format!("{}: Building Better {} for Modern Business", topic, primary)
    }
}
