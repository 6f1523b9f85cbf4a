//! Turning menu data into page markup.

use super::model::{MenuCategory, MenuData, MenuItem};
use crate::dom::{Document, NodeId};
use crate::i18n::Locale;

/// A menu section and the categories it shows, in display order.
pub struct Section {
    pub key: &'static str,
    pub categories: &'static [&'static str],
}

pub const SECTIONS: [Section; 4] = [
    Section {
        key: "non_alcoholic",
        categories: &[
            "hot_drinks",
            "iced_coffee",
            "fresh_juices",
            "mineral_water",
            "carbonated_drinks",
            "soft_drinks",
            "energy_drinks",
        ],
    },
    Section {
        key: "alcoholic",
        categories: &[
            "beer",
            "toceno_pivo",
            "vino",
            "domaca_rakija",
            "rum",
            "tequila",
            "vermut",
            "gin",
            "whiskey",
            "cognac",
            "likeri",
            "vodka",
            "cocktails",
        ],
    },
    Section {
        key: "snacks",
        categories: &["grickalice"],
    },
    Section {
        key: "combos",
        categories: &["combo_deals"],
    },
];

const DEFAULT_ICON: &str = "fas fa-glass-martini";

pub fn category_icon(category_key: &str) -> &'static str {
    match category_key {
        "toceno_pivo" | "beer" => "fas fa-beer",
        "gin" | "likeri" | "rum" | "tequila" | "cocktails" => "fas fa-cocktail",
        "whiskey" | "vodka" | "carbonated_drinks" | "soft_drinks" => "fas fa-glass-whiskey",
        "vino" => "fas fa-wine-glass-alt",
        "cognac" | "domaca_rakija" => "fas fa-wine-bottle",
        "vermut" => "fas fa-wine-glass",
        "grickalice" => "fas fa-cookie-bite",
        "hot_drinks" => "fas fa-coffee",
        "iced_coffee" => "fas fa-ice-cream",
        "fresh_juices" => "fas fa-lemon",
        "mineral_water" => "fas fa-tint",
        "energy_drinks" => "fas fa-bolt",
        "combo_deals" => "fas fa-gift",
        _ => DEFAULT_ICON,
    }
}

/// Section headings come from this table, not the translation documents.
/// Unknown sections show their key.
pub fn section_title(section_key: &str, locale: Locale) -> &str {
    let title = match (locale, section_key) {
        (Locale::Sr, "non_alcoholic") => "Bezalkoholna pića",
        (Locale::Sr, "alcoholic") => "Alkoholna pića",
        (Locale::Sr, "combos") => "Combo ponude",
        (Locale::Sr, "snacks") => "Grickalice",
        (Locale::En, "non_alcoholic") => "Non-Alcoholic Drinks",
        (Locale::En, "alcoholic") => "Alcoholic Drinks",
        (Locale::En, "combos") => "Combo Deals",
        (Locale::En, "snacks") => "Snacks",
        _ => return section_key,
    };
    title
}

/// Volume in litres as shown next to a drink: `1l`, `0.33l`, `30ml`.
pub fn format_volume(volume: f64) -> String {
    if volume >= 1.0 {
        format!("{}l", volume)
    } else if volume >= 0.1 {
        format!("{:.2}l", volume)
    } else {
        format!("{}ml", (volume * 1000.0).round() as i64)
    }
}

/// Replace the contents of `container` with the rendered menu.
///
/// Sections always get a header; categories missing from `data` are skipped
/// and categories not listed in [`SECTIONS`] never render.
pub fn render_menu(doc: &mut Document, container: NodeId, data: &MenuData, locale: Locale) {
    doc.remove_children(container);

    for section in &SECTIONS {
        let header = section_header(doc, section.key, locale);
        doc.append_child(container, header);

        for &category_key in section.categories {
            if let Some(category) = data.category(category_key) {
                let element = category_element(doc, category_key, category, locale);
                doc.append_child(container, element);
            }
        }
    }
}

fn element(doc: &mut Document, tag: &str, class_name: &str) -> NodeId {
    let id = doc.create_element(tag);
    doc.set_class_name(id, class_name);
    id
}

fn text_element(doc: &mut Document, tag: &str, class_name: &str, text: &str) -> NodeId {
    let id = element(doc, tag, class_name);
    doc.set_text_content(id, text);
    id
}

fn section_header(doc: &mut Document, section_key: &str, locale: Locale) -> NodeId {
    let header = element(doc, "div", "menu-section-header");
    let title = text_element(
        doc,
        "h2",
        "menu-section-title",
        section_title(section_key, locale),
    );
    doc.append_child(header, title);
    header
}

fn category_element(
    doc: &mut Document,
    category_key: &str,
    category: &MenuCategory,
    locale: Locale,
) -> NodeId {
    let root = element(doc, "div", "menu-category");

    let header = element(doc, "div", "category-header");
    let icon = element(doc, "i", category_icon(category_key));
    let title = text_element(doc, "h3", "category-title", category.display_title(locale));
    doc.append_child(header, icon);
    doc.append_child(header, title);
    doc.append_child(root, header);

    let divider = element(doc, "div", "category-divider");
    doc.append_child(root, divider);

    let list = element(doc, "div", "drinks-list");
    for item in &category.items {
        let drink = drink_element(doc, item);
        doc.append_child(list, drink);
    }
    doc.append_child(root, list);

    root
}

fn drink_element(doc: &mut Document, item: &MenuItem) -> NodeId {
    let drink = element(doc, "div", "drink-item");

    let info = element(doc, "div", "drink-info");
    let name = text_element(doc, "span", "drink-name", &item.name);
    doc.append_child(info, name);

    if let Some(volume) = item.volume.filter(|v| *v != 0.0) {
        let volume = text_element(doc, "span", "drink-volume", &format_volume(volume));
        doc.append_child(info, volume);
    }
    doc.append_child(drink, info);

    if let Some(price) = &item.price {
        let price = text_element(doc, "span", "drink-price", &format!("{} din", price));
        doc.append_child(drink, price);
    }

    drink
}
