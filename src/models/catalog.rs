use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::error::{AppError, Result, msg};

/// Display language for bilingual catalog content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ar,
}

impl Language {
    /// Pick the text for this language, falling back to English when the
    /// Arabic variant is missing or blank.
    pub fn pick<'a>(&self, en: &'a str, ar: Option<&'a str>) -> &'a str {
        match (self, ar) {
            (Language::Ar, Some(ar)) if !ar.trim().is_empty() => ar,
            _ => en,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct LanguageQuery {
    #[serde(default)]
    pub lang: Language,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name_en: String,
    pub name_ar: Option<String>,
    pub description_en: Option<String>,
    pub description_ar: Option<String>,
    pub icon: String,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub category_id: Option<String>,
    pub name_en: String,
    pub name_ar: Option<String>,
    pub description_en: Option<String>,
    pub description_ar: Option<String>,
    pub price_cents: i64,
    pub currency: String,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicePackage {
    pub id: String,
    pub service_id: String,
    pub name_en: String,
    pub name_ar: Option<String>,
    pub description_en: Option<String>,
    pub description_ar: Option<String>,
    pub price_cents: i64,
    pub currency: String,
    pub features: Vec<String>,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Catalog entry rendered in a single language.
#[derive(Debug, Clone, Serialize)]
pub struct LocalizedItem {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_cents: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
}

fn localize_description(lang: Language, en: &Option<String>, ar: &Option<String>) -> Option<String> {
    match en {
        Some(en) => Some(lang.pick(en, ar.as_deref()).to_string()),
        None => ar.clone().filter(|_| lang == Language::Ar),
    }
}

impl Category {
    pub fn localize(&self, lang: Language) -> LocalizedItem {
        LocalizedItem {
            id: self.id.clone(),
            name: lang.pick(&self.name_en, self.name_ar.as_deref()).to_string(),
            description: localize_description(lang, &self.description_en, &self.description_ar),
            parent_id: None,
            icon: Some(self.icon.clone()),
            price_cents: None,
            currency: None,
            features: Vec::new(),
        }
    }
}

impl Service {
    pub fn localize(&self, lang: Language) -> LocalizedItem {
        LocalizedItem {
            id: self.id.clone(),
            name: lang.pick(&self.name_en, self.name_ar.as_deref()).to_string(),
            description: localize_description(lang, &self.description_en, &self.description_ar),
            parent_id: self.category_id.clone(),
            icon: None,
            price_cents: Some(self.price_cents),
            currency: Some(self.currency.clone()),
            features: Vec::new(),
        }
    }
}

impl ServicePackage {
    pub fn localize(&self, lang: Language) -> LocalizedItem {
        LocalizedItem {
            id: self.id.clone(),
            name: lang.pick(&self.name_en, self.name_ar.as_deref()).to_string(),
            description: localize_description(lang, &self.description_en, &self.description_ar),
            parent_id: Some(self.service_id.clone()),
            icon: None,
            price_cents: Some(self.price_cents),
            currency: Some(self.currency.clone()),
            features: self.features.clone(),
        }
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(AppError::BadRequest(msg::NAME_EMPTY.into()));
    }
    Ok(())
}

fn validate_price(price_cents: i64, currency: &str) -> Result<()> {
    if price_cents < 0 {
        return Err(AppError::BadRequest(msg::INVALID_PRICE.into()));
    }
    validate_currency(currency)
}

fn validate_currency(currency: &str) -> Result<()> {
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::BadRequest(msg::INVALID_CURRENCY.into()));
    }
    Ok(())
}

fn default_currency() -> String {
    "usd".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct CreateCategory {
    pub name_en: String,
    #[serde(default)]
    pub name_ar: Option<String>,
    #[serde(default)]
    pub description_en: Option<String>,
    #[serde(default)]
    pub description_ar: Option<String>,
    /// Suggested automatically when omitted.
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl CreateCategory {
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name_en)
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateCategory {
    pub name_en: Option<String>,
    pub name_ar: Option<String>,
    pub description_en: Option<String>,
    pub description_ar: Option<String>,
    pub icon: Option<String>,
    pub is_active: Option<bool>,
}

impl UpdateCategory {
    pub fn validate(&self) -> Result<()> {
        if let Some(ref name) = self.name_en {
            validate_name(name)?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateService {
    #[serde(default)]
    pub category_id: Option<String>,
    pub name_en: String,
    #[serde(default)]
    pub name_ar: Option<String>,
    #[serde(default)]
    pub description_en: Option<String>,
    #[serde(default)]
    pub description_ar: Option<String>,
    pub price_cents: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl CreateService {
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name_en)?;
        validate_price(self.price_cents, &self.currency)
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateService {
    pub category_id: Option<String>,
    pub name_en: Option<String>,
    pub name_ar: Option<String>,
    pub description_en: Option<String>,
    pub description_ar: Option<String>,
    pub price_cents: Option<i64>,
    pub currency: Option<String>,
    pub is_active: Option<bool>,
}

impl UpdateService {
    pub fn validate(&self) -> Result<()> {
        if let Some(ref name) = self.name_en {
            validate_name(name)?;
        }
        if let Some(price) = self.price_cents
            && price < 0
        {
            return Err(AppError::BadRequest(msg::INVALID_PRICE.into()));
        }
        if let Some(ref currency) = self.currency {
            validate_currency(currency)?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateServicePackage {
    pub service_id: String,
    pub name_en: String,
    #[serde(default)]
    pub name_ar: Option<String>,
    #[serde(default)]
    pub description_en: Option<String>,
    #[serde(default)]
    pub description_ar: Option<String>,
    pub price_cents: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl CreateServicePackage {
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name_en)?;
        validate_price(self.price_cents, &self.currency)
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateServicePackage {
    pub name_en: Option<String>,
    pub name_ar: Option<String>,
    pub description_en: Option<String>,
    pub description_ar: Option<String>,
    pub price_cents: Option<i64>,
    pub currency: Option<String>,
    pub features: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

impl UpdateServicePackage {
    pub fn validate(&self) -> Result<()> {
        if let Some(ref name) = self.name_en {
            validate_name(name)?;
        }
        if let Some(price) = self.price_cents
            && price < 0
        {
            return Err(AppError::BadRequest(msg::INVALID_PRICE.into()));
        }
        if let Some(ref currency) = self.currency {
            validate_currency(currency)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(name_ar: Option<&str>) -> Service {
        Service {
            id: "s1".into(),
            category_id: None,
            name_en: "AI Strategy".into(),
            name_ar: name_ar.map(String::from),
            description_en: Some("Roadmap workshop".into()),
            description_ar: None,
            price_cents: 150_000,
            currency: "usd".into(),
            is_active: true,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn arabic_falls_back_to_english_when_missing() {
        let item = service(None).localize(Language::Ar);
        assert_eq!(item.name, "AI Strategy");
        assert_eq!(item.description.as_deref(), Some("Roadmap workshop"));

        let item = service(Some("  ")).localize(Language::Ar);
        assert_eq!(item.name, "AI Strategy");
    }

    #[test]
    fn arabic_used_when_present() {
        let item = service(Some("استراتيجية الذكاء الاصطناعي")).localize(Language::Ar);
        assert_eq!(item.name, "استراتيجية الذكاء الاصطناعي");
        assert_eq!(service(Some("x")).localize(Language::En).name, "AI Strategy");
    }

    #[test]
    fn negative_price_and_bad_currency_rejected() {
        let mut input = CreateService {
            category_id: None,
            name_en: "Audit".into(),
            name_ar: None,
            description_en: None,
            description_ar: None,
            price_cents: -1,
            currency: "usd".into(),
            is_active: true,
        };
        assert!(input.validate().is_err());
        input.price_cents = 100;
        input.currency = "dollars".into();
        assert!(input.validate().is_err());
        input.currency = "eur".into();
        assert!(input.validate().is_ok());
    }
}
