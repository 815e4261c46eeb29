//! Rule-based intent classification for inbound messages.
//!
//! Deliberately simple: an ordered pattern table over the lowercased text,
//! first matching rule wins, no ambiguity resolution, no learning. Unmatched
//! text falls through to `General`, which the responder answers with a
//! help-style nudge.

use regex::Regex;

/// What the sender is asking for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Intent {
    Greeting,
    Help,
    BestSellers { category: Option<String> },
    Revenue,
    CategoryBreakdown,
    General,
}

enum Rule {
    Greeting,
    Help,
    CategoryBreakdown,
    BestSellers,
    Revenue,
}

pub struct IntentClassifier {
    rules: Vec<(Regex, Rule)>,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentClassifier {
    pub fn new() -> Self {
        // Order matters: first match wins.
        let table: Vec<(&str, Rule)> = vec![
            (
                r"\b(hello|hi|hey|good (morning|afternoon|evening))\b",
                Rule::Greeting,
            ),
            (
                r"\bhelp\b|what can you do|\bcommands\b|\boptions\b",
                Rule::Help,
            ),
            (r"\bcategor(y|ies)\b|\bbreakdown\b", Rule::CategoryBreakdown),
            (
                r"best.?sell|top.?sell|most popular|\b(best|top|popular|sold|how many)\b|\b(coffee|drink|beverage|food|pastry)\b",
                Rule::BestSellers,
            ),
            (r"\b(revenue|income|sales|money|earn(ed|ings)?)\b", Rule::Revenue),
        ];

        let rules = table
            .into_iter()
            .map(|(pat, rule)| (Regex::new(pat).expect("valid intent pattern"), rule))
            .collect();

        Self { rules }
    }

    pub fn classify(&self, text: &str) -> Intent {
        let text = text.trim().to_lowercase();
        if text.is_empty() {
            return Intent::Greeting;
        }

        for (re, rule) in &self.rules {
            if !re.is_match(&text) {
                continue;
            }
            return match rule {
                Rule::Greeting => Intent::Greeting,
                Rule::Help => Intent::Help,
                Rule::CategoryBreakdown => Intent::CategoryBreakdown,
                Rule::BestSellers => Intent::BestSellers {
                    category: extract_category(&text),
                },
                Rule::Revenue => Intent::Revenue,
            };
        }

        Intent::General
    }
}

/// Keyword → canonical category tag. Mirrors the menu taxonomy the POS
/// adapter reports ("Coffee" / "Pastry").
fn extract_category(text: &str) -> Option<String> {
    if ["coffee", "drink", "beverage", "latte", "espresso", "cappuccino"]
        .iter()
        .any(|kw| text.contains(kw))
    {
        return Some("Coffee".to_string());
    }
    if ["food", "pastry", "bakery", "croissant", "muffin"]
        .iter()
        .any(|kw| text.contains(kw))
    {
        return Some("Pastry".to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(text: &str) -> Intent {
        IntentClassifier::new().classify(text)
    }

    #[test]
    fn empty_message_is_a_greeting() {
        assert_eq!(classify("   "), Intent::Greeting);
    }

    #[test]
    fn greetings() {
        assert_eq!(classify("Hello!"), Intent::Greeting);
        assert_eq!(classify("good morning"), Intent::Greeting);
        // "hi" must not fire inside words
        assert_ne!(classify("show me this week's top items"), Intent::Greeting);
    }

    #[test]
    fn help_requests() {
        assert_eq!(classify("help"), Intent::Help);
        assert_eq!(classify("What can you do?"), Intent::Help);
    }

    #[test]
    fn best_sellers_without_category() {
        assert_eq!(
            classify("What are my best-selling items?"),
            Intent::BestSellers { category: None }
        );
        assert_eq!(
            classify("top 5 items this week"),
            Intent::BestSellers { category: None }
        );
    }

    #[test]
    fn best_sellers_with_category() {
        assert_eq!(
            classify("What's my best-selling drink this week?"),
            Intent::BestSellers {
                category: Some("Coffee".to_string())
            }
        );
        assert_eq!(
            classify("show me coffee sales"),
            Intent::BestSellers {
                category: Some("Coffee".to_string())
            }
        );
        assert_eq!(
            classify("how many croissants did I sell?"),
            Intent::BestSellers {
                category: Some("Pastry".to_string())
            }
        );
    }

    #[test]
    fn revenue_questions() {
        assert_eq!(classify("what's my revenue today?"), Intent::Revenue);
        assert_eq!(classify("total income this week"), Intent::Revenue);
    }

    #[test]
    fn category_breakdown() {
        assert_eq!(classify("breakdown by category"), Intent::CategoryBreakdown);
        assert_eq!(classify("sales per category"), Intent::CategoryBreakdown);
    }

    #[test]
    fn first_match_wins() {
        // Contains both greeting and best-seller keywords; greeting is
        // earlier in the table.
        assert_eq!(classify("hey, what are my top items?"), Intent::Greeting);
    }

    #[test]
    fn unmatched_text_is_general() {
        assert_eq!(classify("the weather is nice"), Intent::General);
    }
}
