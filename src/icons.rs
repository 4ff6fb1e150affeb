//! Category icon suggestion.
//!
//! The result is always a member of [`CATEGORY_ICONS`] or [`FALLBACK_ICON`].
//! With an AI key configured, an OpenAI-compatible chat completion picks the
//! icon; without one, a keyword table does.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const FALLBACK_ICON: &str = "Folder";

/// Icon names the admin UI can render.
pub const CATEGORY_ICONS: &[&str] = &[
    "Brain",
    "Bot",
    "Cpu",
    "Database",
    "Code",
    "Cloud",
    "Shield",
    "Lock",
    "LineChart",
    "BarChart",
    "PieChart",
    "TrendingUp",
    "Briefcase",
    "Building",
    "Users",
    "MessageSquare",
    "Mail",
    "Headphones",
    "Globe",
    "Search",
    "Lightbulb",
    "Rocket",
    "Target",
    "Zap",
    "Settings",
    "Wrench",
    "FileText",
    "BookOpen",
    "GraduationCap",
    "Camera",
    "Video",
    "Palette",
    "PenTool",
    "ShoppingCart",
    "CreditCard",
    "DollarSign",
    "Heart",
    "Stethoscope",
    "Scale",
    "Truck",
    "Home",
    "Calendar",
    "Folder",
];

/// Keyword → icon, checked in order against the lowercased category name.
const KEYWORD_ICONS: &[(&str, &str)] = &[
    ("machine learning", "Brain"),
    ("ai", "Brain"),
    ("intelligence", "Brain"),
    ("ذكاء", "Brain"),
    ("chatbot", "Bot"),
    ("bot", "Bot"),
    ("automation", "Zap"),
    ("hardware", "Cpu"),
    ("data", "Database"),
    ("بيانات", "Database"),
    ("develop", "Code"),
    ("software", "Code"),
    ("code", "Code"),
    ("cloud", "Cloud"),
    ("security", "Shield"),
    ("أمن", "Shield"),
    ("privacy", "Lock"),
    ("analytics", "LineChart"),
    ("report", "BarChart"),
    ("growth", "TrendingUp"),
    ("marketing", "TrendingUp"),
    ("consult", "Briefcase"),
    ("استشار", "Briefcase"),
    ("business", "Briefcase"),
    ("enterprise", "Building"),
    ("team", "Users"),
    ("hr", "Users"),
    ("chat", "MessageSquare"),
    ("email", "Mail"),
    ("support", "Headphones"),
    ("web", "Globe"),
    ("seo", "Search"),
    ("research", "Search"),
    ("innovation", "Lightbulb"),
    ("strategy", "Target"),
    ("startup", "Rocket"),
    ("integration", "Settings"),
    ("maintenance", "Wrench"),
    ("document", "FileText"),
    ("content", "FileText"),
    ("training", "GraduationCap"),
    ("education", "GraduationCap"),
    ("تدريب", "GraduationCap"),
    ("course", "BookOpen"),
    ("vision", "Camera"),
    ("video", "Video"),
    ("design", "Palette"),
    ("writing", "PenTool"),
    ("commerce", "ShoppingCart"),
    ("payment", "CreditCard"),
    ("finance", "DollarSign"),
    ("health", "Stethoscope"),
    ("legal", "Scale"),
    ("logistics", "Truck"),
    ("real estate", "Home"),
    ("booking", "Calendar"),
];

const SYSTEM_PROMPT: &str = "You pick an icon for a service category. Reply with exactly one icon name from the list and nothing else.";

/// Map arbitrary model output onto the icon list.
pub fn normalize_icon(raw: &str) -> &'static str {
    let cleaned = raw
        .trim()
        .trim_matches(|c: char| !c.is_ascii_alphanumeric())
        .to_string();
    CATEGORY_ICONS
        .iter()
        .copied()
        .find(|icon| icon.eq_ignore_ascii_case(&cleaned))
        .unwrap_or(FALLBACK_ICON)
}

/// Pick an icon from keywords in the category name.
pub fn heuristic_icon(name: &str) -> &'static str {
    let lower = name.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    KEYWORD_ICONS
        .iter()
        .find(|(keyword, _)| {
            // Short ASCII keywords must match a whole word ("ai" in "maintenance" is not AI).
            if keyword.len() <= 3 && keyword.is_ascii() {
                words.iter().any(|w| w == keyword)
            } else {
                lower.contains(keyword)
            }
        })
        .map(|(_, icon)| *icon)
        .unwrap_or(FALLBACK_ICON)
}

#[derive(Debug, Serialize)]
pub struct IconSuggestion {
    pub icon: &'static str,
    /// "ai", "heuristic" or "fallback"
    pub source: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

pub struct IconSuggester {
    client: Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
}

impl IconSuggester {
    pub fn new(api_url: &str, api_key: Option<String>, model: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_url: api_url.to_string(),
            api_key,
            model: model.to_string(),
        }
    }

    /// Suggester that never calls out; used when no AI key is configured and in tests.
    pub fn offline() -> Self {
        Self::new("", None, "")
    }

    pub async fn suggest(&self, name: &str, description: Option<&str>) -> IconSuggestion {
        let Some(ref api_key) = self.api_key else {
            let icon = heuristic_icon(name);
            let source = if icon == FALLBACK_ICON { "fallback" } else { "heuristic" };
            return IconSuggestion { icon, source };
        };

        match self.ask_model(api_key, name, description).await {
            Ok(raw) => {
                let icon = normalize_icon(&raw);
                if icon == FALLBACK_ICON && !raw.trim().eq_ignore_ascii_case(FALLBACK_ICON) {
                    tracing::debug!("Model suggested unknown icon {:?}", raw);
                }
                IconSuggestion { icon, source: "ai" }
            }
            Err(e) => {
                tracing::warn!("Icon suggestion failed: {}", e);
                IconSuggestion {
                    icon: FALLBACK_ICON,
                    source: "fallback",
                }
            }
        }
    }

    async fn ask_model(
        &self,
        api_key: &str,
        name: &str,
        description: Option<&str>,
    ) -> std::result::Result<String, String> {
        let prompt = format!(
            "Category: {}\nDescription: {}\nIcons: {}",
            name,
            description.unwrap_or("-"),
            CATEGORY_ICONS.join(", ")
        );
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": prompt},
            ],
            "max_tokens": 10,
            "temperature": 0,
        });

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("status {}", response.status()));
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| e.to_string())?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| "empty completion".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_accepts_listed_icons_case_insensitively() {
        assert_eq!(normalize_icon("Brain"), "Brain");
        assert_eq!(normalize_icon("  \"linechart\".\n"), "LineChart");
    }

    #[test]
    fn normalize_falls_back_for_anything_else() {
        for raw in ["", "   ", "Unicorn", "Brain Cpu", "<svg/>", "🧠"] {
            assert_eq!(normalize_icon(raw), FALLBACK_ICON, "{raw:?}");
        }
    }

    #[test]
    fn heuristic_matches_keywords() {
        assert_eq!(heuristic_icon("AI Consulting"), "Brain");
        assert_eq!(heuristic_icon("Data Engineering"), "Database");
        assert_eq!(heuristic_icon("Cyber Security Audits"), "Shield");
        assert_eq!(heuristic_icon("Maintenance"), "Wrench");
        assert_eq!(heuristic_icon("Miscellaneous"), FALLBACK_ICON);
    }

    #[test]
    fn heuristic_output_always_in_list() {
        for (_, icon) in KEYWORD_ICONS {
            assert!(CATEGORY_ICONS.contains(icon), "{icon} missing from list");
        }
    }

    #[tokio::test]
    async fn offline_suggester_uses_heuristic() {
        let suggester = IconSuggester::offline();
        let suggestion = suggester.suggest("Training Programs", None).await;
        assert_eq!(suggestion.icon, "GraduationCap");
        assert_eq!(suggestion.source, "heuristic");

        let suggestion = suggester.suggest("", None).await;
        assert_eq!(suggestion.icon, FALLBACK_ICON);
    }
}
