use crate::i18n::Locale;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

/// Root of `assets/data/menu.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct MenuFile {
    pub menu: MenuData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MenuData {
    /// Every category, keyed by category key. Despite the name this holds
    /// the non-alcoholic categories, snacks and combos too.
    #[serde(default)]
    pub alcoholic_drinks: HashMap<String, MenuCategory>,
}

impl MenuData {
    pub fn category(&self, key: &str) -> Option<&MenuCategory> {
        self.alcoholic_drinks.get(key)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MenuCategory {
    #[serde(default)]
    pub title: Option<CategoryTitle>,
    #[serde(default)]
    pub items: Vec<MenuItem>,
}

const UNTITLED: &str = "Category";

impl MenuCategory {
    /// Title for `locale`, falling back to Serbian, then to a generic label.
    pub fn display_title(&self, locale: Locale) -> &str {
        let title = match &self.title {
            Some(CategoryTitle::Plain(title)) => Some(title.as_str()),
            Some(CategoryTitle::Localized(titles)) => titles
                .get(locale.code())
                .filter(|t| !t.is_empty())
                .or_else(|| titles.get(Locale::Sr.code()))
                .map(String::as_str),
            None => None,
        };
        title.filter(|t| !t.is_empty()).unwrap_or(UNTITLED)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CategoryTitle {
    Plain(String),
    Localized(HashMap<String, String>),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MenuItem {
    #[serde(default)]
    pub name: String,
    /// Items without a price render without the price tag.
    #[serde(default)]
    pub price: Option<Price>,
    /// Litres.
    #[serde(default)]
    pub volume: Option<f64>,
}

/// Prices appear both as numbers and as preformatted strings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Price {
    Amount(serde_json::Number),
    Text(String),
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Price::Amount(amount) => write!(f, "{}", amount),
            Price::Text(text) => f.write_str(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MENU: &str = r#"{
        "menu": {
            "alcoholic_drinks": {
                "beer": {
                    "title": {"sr": "Pivo", "en": "Beer"},
                    "items": [
                        {"name": "Jelen", "price": 250, "volume": 0.5},
                        {"name": "Heineken", "price": "300"}
                    ]
                },
                "grickalice": {"title": "Grickalice", "items": []},
                "vino": {"title": {"sr": "Vino", "en": ""}},
                "likeri": {"title": {"de": "Likör"}},
                "vodka": {}
            }
        }
    }"#;

    fn menu() -> MenuData {
        serde_json::from_str::<MenuFile>(MENU).unwrap().menu
    }

    #[test]
    fn test_deserialize_menu() {
        let menu = menu();
        let beer = menu.category("beer").unwrap();

        assert_eq!(beer.items.len(), 2);
        assert_eq!(beer.items[0].volume, Some(0.5));
        assert_eq!(beer.items[0].price.as_ref().unwrap().to_string(), "250");
        assert_eq!(beer.items[1].price.as_ref().unwrap().to_string(), "300");
        assert_eq!(beer.items[1].volume, None);
        assert!(menu.category("cocktails").is_none());
    }

    #[test]
    fn test_display_title_fallbacks() {
        let menu = menu();

        assert_eq!(menu.category("beer").unwrap().display_title(Locale::En), "Beer");
        assert_eq!(menu.category("beer").unwrap().display_title(Locale::Sr), "Pivo");
        // Empty entry falls back to Serbian
        assert_eq!(menu.category("vino").unwrap().display_title(Locale::En), "Vino");
        assert_eq!(menu.category("likeri").unwrap().display_title(Locale::En), "Category");
        assert_eq!(menu.category("vodka").unwrap().display_title(Locale::Sr), "Category");
        assert_eq!(
            menu.category("grickalice").unwrap().display_title(Locale::En),
            "Grickalice"
        );
    }

    #[test]
    fn test_fractional_price_keeps_decimals() {
        let item: MenuItem = serde_json::from_str(r#"{"name":"Espresso","price":120.5}"#).unwrap();
        assert_eq!(item.price.unwrap().to_string(), "120.5");
    }

    #[test]
    fn test_item_missing_fields_still_decodes() {
        let items: Vec<MenuItem> = serde_json::from_str(
            r#"[{"price": 150}, {"name": "Kafa"}, {"name": "Čaj", "price": 140}]"#,
        )
        .unwrap();

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].name, "");
        assert_eq!(items[1].price, None);
        assert_eq!(items[2].price, Some(Price::Amount(140u64.into())));
    }
}
