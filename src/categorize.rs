//! Heuristic category labels.
//!
//! Each source has an ordered list of rules; the first rule whose predicate
//! matches decides the label, and a fixed default applies when none do.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::DEFAULT_CATEGORY;
use crate::util::extract_domain;

pub struct CategoryRule<T: ?Sized> {
    pub label: &'static str,
    predicate: fn(&T) -> bool,
}

impl<T: ?Sized> CategoryRule<T> {
    pub const fn new(label: &'static str, predicate: fn(&T) -> bool) -> Self {
        Self { label, predicate }
    }

    pub fn matches(&self, subject: &T) -> bool {
        (self.predicate)(subject)
    }
}

/// Label of the first matching rule, or `default` when nothing matches.
pub fn first_match<T: ?Sized>(
    rules: &[CategoryRule<T>],
    subject: &T,
    default: &'static str,
) -> &'static str {
    rules
        .iter()
        .find(|rule| rule.matches(subject))
        .map(|rule| rule.label)
        .unwrap_or(default)
}

fn word_regex(alternatives: &str) -> Regex {
    Regex::new(&format!(r"\b({})\b", alternatives)).expect("valid category pattern")
}

// Stories ------------------------------------------------------------------

/// What story rules look at: the lower-cased title and the link's domain.
pub struct StorySubject {
    pub title: String,
    pub domain: String,
}

static AI_ML: Lazy<Regex> = Lazy::new(|| {
    word_regex("ai|artificial intelligence|machine learning|ml|gpt|chatgpt|openai|llm|neural|deep learning")
});
static PROGRAMMING: Lazy<Regex> = Lazy::new(|| {
    word_regex("javascript|python|rust|go|programming|code|software|framework|library|api")
});
static STARTUP: Lazy<Regex> =
    Lazy::new(|| word_regex("startup|funding|vc|venture|business|company|entrepreneur"));
static SECURITY: Lazy<Regex> =
    Lazy::new(|| word_regex("security|privacy|encryption|hack|breach|vulnerability|cyber"));
static RESEARCH: Lazy<Regex> =
    Lazy::new(|| word_regex("research|study|science|scientific|paper|university|academic"));

static STORY_RULES: [CategoryRule<StorySubject>; 7] = [
    CategoryRule::new("AI/ML", |s| AI_ML.is_match(&s.title)),
    CategoryRule::new("Programming", |s| PROGRAMMING.is_match(&s.title)),
    CategoryRule::new("Startup", |s| STARTUP.is_match(&s.title)),
    CategoryRule::new("Security", |s| SECURITY.is_match(&s.title)),
    CategoryRule::new("Research", |s| {
        RESEARCH.is_match(&s.title)
            || ["arxiv", "nature", "science"]
                .iter()
                .any(|d| s.domain.contains(d))
    }),
    CategoryRule::new("Show HN", |s| s.title.starts_with("show hn")),
    CategoryRule::new("Ask HN", |s| s.title.starts_with("ask hn")),
];

/// Category for an HN story from its title and optional link.
pub fn categorize_story(title: &str, url: Option<&str>) -> &'static str {
    let subject = StorySubject {
        title: title.to_lowercase(),
        domain: url.and_then(extract_domain).unwrap_or_default(),
    };
    first_match(&STORY_RULES, &subject, DEFAULT_CATEGORY)
}

// Articles -----------------------------------------------------------------

pub const ARTICLE_DEFAULT_CATEGORY: &str = "Cyber Security";

/// Feed category that asks for content-based classification.
pub const CATCH_ALL_FEED_CATEGORY: &str = "All";

static RED_TEAM: Lazy<Regex> =
    Lazy::new(|| word_regex("red team|penetration|exploit|attack|offensive"));
static BLUE_TEAM: Lazy<Regex> =
    Lazy::new(|| word_regex("blue team|defense|detection|monitoring|soc"));
static AI_SECURITY: Lazy<Regex> =
    Lazy::new(|| word_regex("ai|artificial intelligence|machine learning|ml"));
static THREAT_INTEL: Lazy<Regex> =
    Lazy::new(|| word_regex("threat|intel|apt|malware|vulnerability"));
static CISO: Lazy<Regex> = Lazy::new(|| word_regex("ciso|governance|compliance|risk"));
static WRITE_UPS: Lazy<Regex> = Lazy::new(|| word_regex("writeup|ctf|challenge|solution"));
static CAREER: Lazy<Regex> = Lazy::new(|| word_regex("career|job|interview|skill"));

static ARTICLE_RULES: [CategoryRule<str>; 7] = [
    CategoryRule::new("Red Team", |text| RED_TEAM.is_match(text)),
    CategoryRule::new("Blue Team", |text| BLUE_TEAM.is_match(text)),
    CategoryRule::new("AI/Security", |text| AI_SECURITY.is_match(text)),
    CategoryRule::new("Threat Intel", |text| THREAT_INTEL.is_match(text)),
    CategoryRule::new("CISO", |text| CISO.is_match(text)),
    CategoryRule::new("Write-ups", |text| WRITE_UPS.is_match(text)),
    CategoryRule::new("Career", |text| CAREER.is_match(text)),
];

/// Category for an RSS article. Feeds other than the catch-all feed label
/// their own articles.
pub fn categorize_article(title: &str, description: &str, feed_category: &str) -> String {
    if feed_category != CATCH_ALL_FEED_CATEGORY {
        return feed_category.to_string();
    }

    let text = format!("{} {}", title, description).to_lowercase();
    first_match(&ARTICLE_RULES, text.as_str(), ARTICLE_DEFAULT_CATEGORY).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    mod story_tests {
        use super::*;

        #[test]
        fn test_keyword_rules() {
            assert_eq!(categorize_story("OpenAI ships a new model", None), "AI/ML");
            assert_eq!(categorize_story("Writing a parser in Rust", None), "Programming");
            assert_eq!(categorize_story("Startup raises seed funding", None), "Startup");
            assert_eq!(categorize_story("A new breach at a bank", None), "Security");
            assert_eq!(categorize_story("University study on sleep", None), "Research");
            assert_eq!(categorize_story("Ask HN: how do you sleep?", None), "Ask HN");
            assert_eq!(categorize_story("Why the sky looks blue", None), "Tech News");
        }

        #[test]
        fn test_word_boundaries() {
            // "mail" contains "ai" but not as a word
            assert_eq!(categorize_story("Self-hosting mail in 2024", None), "Tech News");
            assert_eq!(categorize_story("Gone fishing", None), "Tech News");
        }

        #[test]
        fn test_show_hn_prefix() {
            assert_eq!(categorize_story("Show HN: my parser", None), "Show HN");
            assert_eq!(categorize_story("show hn: a tiny editor", None), "Show HN");
        }

        #[test]
        fn test_priority_order() {
            // Keyword rules sit ahead of the Show HN prefix rule
            assert_eq!(categorize_story("Show HN: my rust parser", None), "Programming");
            // AI/ML beats Programming
            assert_eq!(categorize_story("An LLM written in Python", None), "AI/ML");
            // Startup beats Security
            assert_eq!(categorize_story("Security startup acquired", None), "Startup");
            // Security beats Research
            assert_eq!(categorize_story("Research on encryption", None), "Security");
        }

        #[test]
        fn test_research_by_domain() {
            assert_eq!(
                categorize_story("Cells that glow", Some("https://www.nature.com/articles/x")),
                "Research"
            );
            assert_eq!(
                categorize_story("Attention variants", Some("https://arxiv.org/abs/1234.5678")),
                "Research"
            );
            assert_eq!(
                categorize_story("Cells that glow", Some("https://example.com/")),
                "Tech News"
            );
        }

        #[test]
        fn test_first_match_on_custom_rules() {
            let rules: [CategoryRule<str>; 2] = [
                CategoryRule::new("first", |s| s.contains('a')),
                CategoryRule::new("second", |s| s.contains('b')),
            ];
            assert_eq!(first_match(&rules, "ab", "none"), "first");
            assert_eq!(first_match(&rules, "b", "none"), "second");
            assert_eq!(first_match(&rules, "c", "none"), "none");
        }
    }

    mod article_tests {
        use super::*;

        #[test]
        fn test_feed_category_wins_outside_catch_all() {
            assert_eq!(
                categorize_article("Detecting malware", "", "Red Team"),
                "Red Team"
            );
        }

        #[test]
        fn test_catch_all_feed_uses_content_rules() {
            assert_eq!(categorize_article("Exploit chains", "", "All"), "Red Team");
            assert_eq!(categorize_article("Building a SOC", "", "All"), "Blue Team");
            assert_eq!(categorize_article("AI for defenders?", "", "All"), "AI/Security");
            assert_eq!(categorize_article("APT group tradecraft", "", "All"), "Threat Intel");
            assert_eq!(categorize_article("Board-level risk", "", "All"), "CISO");
            assert_eq!(categorize_article("CTF recap", "", "All"), "Write-ups");
            assert_eq!(categorize_article("Landing your first job", "", "All"), "Career");
            assert_eq!(categorize_article("Platform update", "", "All"), "Cyber Security");
        }

        #[test]
        fn test_description_is_considered() {
            assert_eq!(
                categorize_article("Weekly roundup", "New malware family spotted", "All"),
                "Threat Intel"
            );
        }

        #[test]
        fn test_article_priority_order() {
            // Red Team is checked before Blue Team
            assert_eq!(
                categorize_article("Attack and detection engineering", "", "All"),
                "Red Team"
            );
        }
    }
}
