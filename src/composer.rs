use crate::models::{Review, Rule};

/// Ratings at or above this get a thank-you reply
pub const POSITIVE_RATING: u8 = 4;

/// Builds the generation prompt for a review
#[derive(Debug, Clone)]
pub struct ReplyComposer {
    language: String,
}

impl Default for ReplyComposer {
    fn default() -> Self {
        Self::new("Russian")
    }
}

impl ReplyComposer {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }

    pub fn compose(&self, review: &Review, rule: Option<&Rule>) -> String {
        let tone = if review.rating >= POSITIVE_RATING {
            "Thank the buyer warmly for the purchase and the feedback."
        } else {
            "Apologize to the buyer for the inconvenience and offer the remedy."
        };

        let text = if review.text.trim().is_empty() {
            "(no text, rating only)"
        } else {
            review.text.as_str()
        };

        let knowledge = match rule {
            Some(rule) => format!(
                "\nKnown issue: {}\nRecommended solution (use it as is, do not invent a different remedy):\n{}\n",
                rule.problem, rule.solution
            ),
            None => String::new(),
        };

        format!(
            r#"You are a seller replying to a customer review on a marketplace.

Rating: {rating}/5
Product: {product}
Review: {text}
{knowledge}
{tone}
Write the reply in {language}. Keep it to 2-3 sentences. Do not use emoji, markdown or decorative symbols. Return only the reply text."#,
            rating = review.rating,
            product = review.product.name,
            language = self.language,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Product;
    use chrono::Utc;

    fn review(rating: u8, text: &str) -> Review {
        Review {
            id: "r1".to_string(),
            rating,
            text: text.to_string(),
            product: Product {
                name: "Весы напольные".to_string(),
                sku: Some(1001),
            },
            published_at: Utc::now(),
            answered: false,
        }
    }

    fn blue_rule() -> Rule {
        Rule {
            id: "display".to_string(),
            triggers: vec!["синий".to_string()],
            problem: "Blue screen".to_string(),
            solution: "Синяя подсветка штатная.".to_string(),
        }
    }

    #[test]
    fn test_positive_rating_thanks_buyer() {
        let prompt = ReplyComposer::default().compose(&review(5, "синий экран"), Some(&blue_rule()));
        assert!(prompt.contains("Thank the buyer"));
        assert!(!prompt.contains("Apologize"));
        assert!(prompt.contains("Синяя подсветка штатная."));
        assert!(prompt.contains("Rating: 5/5"));
        assert!(prompt.contains("Весы напольные"));
    }

    #[test]
    fn test_low_rating_apologizes() {
        let prompt = ReplyComposer::default().compose(&review(3, "плохо"), None);
        assert!(prompt.contains("Apologize"));
        assert!(!prompt.contains("Known issue"));
        assert!(prompt.contains("2-3 sentences"));
    }

    #[test]
    fn test_threshold_boundary() {
        let composer = ReplyComposer::new("English");
        assert!(composer.compose(&review(4, "ok"), None).contains("Thank the buyer"));
        assert!(composer.compose(&review(3, "ok"), None).contains("Apologize"));
        assert!(composer.compose(&review(4, "ok"), None).contains("in English"));
    }

    #[test]
    fn test_empty_text_placeholder() {
        let prompt = ReplyComposer::default().compose(&review(5, "  "), None);
        assert!(prompt.contains("(no text, rating only)"));
    }
}
