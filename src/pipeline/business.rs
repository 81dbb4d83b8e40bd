//! Automated business-account heuristic.
//!
//! Scores one message text against independent pattern categories; the
//! score is additive and unnormalized. Accumulation of scores across
//! messages lives in the contact store — this type only observes a text.

use regex::Regex;

/// Each matching category contributes this weight.
const CATEGORY_WEIGHT: u8 = 20;

/// Bonus for a URL in the text.
const URL_BONUS: u8 = 15;

/// Bonus when the whole trimmed text is a 4–8 digit code (OTP-like).
const OTP_BONUS: u8 = 25;

/// Accumulated confidence at or above this marks the contact as business.
/// A single category match suffices.
pub const BUSINESS_THRESHOLD: u8 = 20;

/// One scoring category with a compiled pattern.
#[derive(Debug, Clone)]
struct Category {
    /// Short label for logging.
    label: &'static str,
    regex: Regex,
}

/// Heuristic scorer for "automated business account" likelihood.
#[derive(Debug, Clone)]
pub struct BusinessDetector {
    categories: Vec<Category>,
    url: Regex,
}

impl BusinessDetector {
    /// Build the detector with the default pattern categories.
    pub fn new() -> Self {
        let categories = vec![
            Category {
                label: "automated-sender",
                regex: Regex::new(
                    r"(?i)\b(do not reply|no[- ]?reply|auto[- ]?generated|automated (message|system)|this is an automated)\b",
                )
                .unwrap(),
            },
            Category {
                label: "transactional",
                regex: Regex::new(
                    r"(?i)\b(invoice|receipt|payment|order|transaction|billing|amount due|account balance|debited|credited)\b",
                )
                .unwrap(),
            },
            Category {
                label: "delivery",
                regex: Regex::new(
                    r"(?i)\b(delivered|delivery|shipment|shipped|shipping|tracking|courier|dispatched|out for delivery)\b",
                )
                .unwrap(),
            },
            Category {
                label: "booking-notification",
                regex: Regex::new(
                    r"(?i)\b(booking|appointment|reservation|confirmed|reminder|scheduled for|otp|verification code|one[- ]time password)\b",
                )
                .unwrap(),
            },
            Category {
                label: "marketing",
                regex: Regex::new(
                    r"(?i)\b(offer|discount|sale|limited time|subscribe|unsubscribe|promo|cashback|exclusive deal)\b",
                )
                .unwrap(),
            },
        ];

        Self {
            categories,
            url: Regex::new(r"(?i)https?://|www\.").unwrap(),
        }
    }

    /// Additive heuristic score for one message text.
    pub fn score(&self, text: &str) -> u8 {
        let mut score: u32 = 0;

        for category in &self.categories {
            if category.regex.is_match(text) {
                tracing::trace!(category = category.label, "Business pattern matched");
                score += u32::from(CATEGORY_WEIGHT);
            }
        }

        if self.url.is_match(text) {
            score += u32::from(URL_BONUS);
        }

        let trimmed = text.trim();
        if (4..=8).contains(&trimmed.len()) && trimmed.chars().all(|c| c.is_ascii_digit()) {
            score += u32::from(OTP_BONUS);
        }

        score.min(100) as u8
    }
}

impl Default for BusinessDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_greeting_scores_zero() {
        let detector = BusinessDetector::new();
        assert_eq!(detector.score("hey, are we still on for dinner?"), 0);
    }

    #[test]
    fn single_category_reaches_threshold() {
        let detector = BusinessDetector::new();
        let score = detector.score("please send invoice 123456");
        assert!(score >= BUSINESS_THRESHOLD);
    }

    #[test]
    fn categories_are_additive() {
        let detector = BusinessDetector::new();
        // transactional + delivery + URL
        let score =
            detector.score("Your order has shipped. Payment receipt: https://shop.example/r/1");
        assert!(score >= CATEGORY_WEIGHT * 2 + URL_BONUS);
    }

    #[test]
    fn otp_like_text_gets_bonus() {
        let detector = BusinessDetector::new();
        assert_eq!(detector.score("482913"), OTP_BONUS);
        // 3 digits: too short
        assert_eq!(detector.score("123"), 0);
        // 9 digits: too long
        assert_eq!(detector.score("123456789"), 0);
        // digits embedded in words don't count as OTP
        assert_eq!(detector.score("call me at 482913 ok"), 0);
    }

    #[test]
    fn url_alone_stays_below_threshold() {
        let detector = BusinessDetector::new();
        let score = detector.score("check this out www.example.com");
        assert_eq!(score, URL_BONUS);
        assert!(score < BUSINESS_THRESHOLD);
    }

    #[test]
    fn automated_sender_phrasing_detected() {
        let detector = BusinessDetector::new();
        assert!(detector.score("This is an automated message, do not reply.") >= CATEGORY_WEIGHT);
    }

    #[test]
    fn score_caps_at_100() {
        let detector = BusinessDetector::new();
        let text = "Automated message: your order invoice payment shipped delivery tracking \
                    booking appointment confirmed otp offer discount sale https://x.example";
        assert!(detector.score(text) <= 100);
    }
}
