// Listing-card field extraction with ordered fallbacks
use crate::enricher::contact::find_phone;
use crate::model::ConfigError;
use crate::utils::collapse_whitespace;
use scraper::{ElementRef, Selector};

const MAX_TEXT_NAME_LENGTH: usize = 100;

/// Selector candidates per field, tried in order.
#[derive(Debug, Clone, Copy)]
pub struct FieldSelectors {
    pub name: &'static [&'static str],
    pub address: &'static [&'static str],
    pub phone: &'static [&'static str],
    pub website: &'static [&'static str],
    /// Place text shown on the card, kept as a location hint.
    pub location: &'static [&'static str],
    /// Fall back to the card's own text lines when no name selector hits.
    pub name_from_text: bool,
    /// Fall back to a phone-number regex over the card text.
    pub phone_from_text: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFields {
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub location: Option<String>,
}

pub struct FieldExtractor {
    name: Vec<Selector>,
    address: Vec<Selector>,
    phone: Vec<Selector>,
    website: Vec<Selector>,
    location: Vec<Selector>,
    name_from_text: bool,
    phone_from_text: bool,
    min_name_length: usize,
    denylist: Vec<String>,
}

pub fn parse_selectors(candidates: &[&str]) -> Result<Vec<Selector>, ConfigError> {
    candidates
        .iter()
        .map(|css| {
            Selector::parse(css).map_err(|e| ConfigError::Invalid(format!("bad selector '{}': {}", css, e)))
        })
        .collect()
}

impl FieldExtractor {
    pub fn new(rules: &FieldSelectors, min_name_length: usize, denylist: &[String]) -> Result<Self, ConfigError> {
        Ok(Self {
            name: parse_selectors(rules.name)?,
            address: parse_selectors(rules.address)?,
            phone: parse_selectors(rules.phone)?,
            website: parse_selectors(rules.website)?,
            location: parse_selectors(rules.location)?,
            name_from_text: rules.name_from_text,
            phone_from_text: rules.phone_from_text,
            min_name_length,
            denylist: denylist.iter().map(|d| d.to_lowercase()).collect(),
        })
    }

    /// `None` rejects the whole card: no usable name.
    pub fn extract(&self, element: ElementRef) -> Option<ExtractedFields> {
        let name = self.extract_name(element)?;
        if !self.is_acceptable_name(&name) {
            return None;
        }

        Some(ExtractedFields {
            name,
            address: first_text(element, &self.address),
            phone: self.extract_phone(element),
            website: first_href(element, &self.website),
            location: first_text(element, &self.location),
        })
    }

    pub fn is_acceptable_name(&self, name: &str) -> bool {
        if name.chars().count() < self.min_name_length {
            return false;
        }
        let lower = name.to_lowercase();
        !self.denylist.iter().any(|d| *d == lower)
    }

    fn extract_name(&self, element: ElementRef) -> Option<String> {
        for selector in &self.name {
            if let Some(el) = element.select(selector).next() {
                let text = collapse_whitespace(&el.text().collect::<String>());
                if text.chars().count() >= self.min_name_length {
                    return Some(text);
                }
            }
        }

        if !self.name_from_text {
            return None;
        }

        text_lines(element).into_iter().find(|line| {
            let len = line.chars().count();
            let lower = line.to_lowercase();
            len > self.min_name_length
                && len < MAX_TEXT_NAME_LENGTH
                && !self.denylist.iter().any(|d| lower.contains(d.as_str()))
        })
    }

    fn extract_phone(&self, element: ElementRef) -> Option<String> {
        if let Some(phone) = first_text(element, &self.phone) {
            return Some(phone);
        }
        if !self.phone_from_text {
            return None;
        }
        find_phone(&element.text().collect::<Vec<_>>().join(" "))
    }
}

/// First non-empty, whitespace-collapsed text among the selector candidates.
fn first_text(element: ElementRef, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|selector| {
        element
            .select(selector)
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .find(|text| !text.is_empty())
    })
}

fn first_href(element: ElementRef, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|selector| {
        element
            .select(selector)
            .filter_map(|el| el.value().attr("href"))
            .map(str::trim)
            .find(|href| href.starts_with("http"))
            .map(str::to_string)
    })
}

/// Lines of the card's whole text, so inline markup does not split a name.
fn text_lines(element: ElementRef) -> Vec<String> {
    element
        .text()
        .collect::<String>()
        .split('\n')
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    const CARD: FieldSelectors = FieldSelectors {
        name: &["h3", ".dbg0pd"],
        address: &[".rllt__details", ".W4Efsd"],
        phone: &["[data-value=\"Phone\"]"],
        website: &["a[href*=\"http\"]"],
        location: &[".locality"],
        name_from_text: true,
        phone_from_text: true,
    };

    fn denylist() -> Vec<String> {
        ["directions", "website", "phone", "address"].iter().map(|s| s.to_string()).collect()
    }

    fn extract(html: &str) -> Option<ExtractedFields> {
        let extractor = FieldExtractor::new(&CARD, 3, &denylist()).unwrap();
        let fragment = Html::parse_fragment(html);
        let card = Selector::parse("div.card").unwrap();
        let element = fragment.select(&card).next().unwrap();
        extractor.extract(element)
    }

    #[test]
    fn takes_first_matching_selector() {
        let fields = extract(
            r#"<div class="card">
                <h3>  Acme   Ltd </h3>
                <span class="W4Efsd">1 High St, Hull</span>
                <span data-value="Phone">01482 000000</span>
                <a href="/relative">x</a><a href="https://acme.co.uk">site</a>
            </div>"#,
        )
        .unwrap();
        assert_eq!(fields.name, "Acme Ltd");
        assert_eq!(fields.address.as_deref(), Some("1 High St, Hull"));
        assert_eq!(fields.phone.as_deref(), Some("01482 000000"));
        assert_eq!(fields.website.as_deref(), Some("https://acme.co.uk"));
    }

    #[test]
    fn falls_back_to_second_selector() {
        let fields = extract(r#"<div class="card"><h3></h3><div class="dbg0pd">Beta Co</div></div>"#).unwrap();
        assert_eq!(fields.name, "Beta Co");
        assert_eq!(fields.address, None);
        assert_eq!(fields.website, None);
    }

    #[test]
    fn directions_only_card_is_rejected() {
        assert_eq!(extract(r#"<div class="card">Directions</div>"#), None);
        assert_eq!(extract(r#"<div class="card"><h3>Directions</h3></div>"#), None);
    }

    #[test]
    fn short_names_are_rejected() {
        assert_eq!(extract(r#"<div class="card"><h3>AB</h3></div>"#), None);
    }

    #[test]
    fn text_fallback_skips_ui_chrome() {
        let fields = extract(
            "<div class=\"card\">\n<span>Website</span>\n<span>Gamma Plumbing</span>\n<span>Call 01482 123 4567</span>\n</div>",
        )
        .unwrap();
        assert_eq!(fields.name, "Gamma Plumbing");
        assert_eq!(fields.phone.as_deref(), Some("01482 123 4567"));
    }

    #[test]
    fn inline_markup_stays_inside_the_text_name() {
        let fields = extract(r#"<div class="card">Acme <b>Plumbing</b> Ltd</div>"#).unwrap();
        assert_eq!(fields.name, "Acme Plumbing Ltd");

        let fields = extract("<div class=\"card\">\n  Delta <em>Design</em>\n  <span>Directions</span>\n</div>").unwrap();
        assert_eq!(fields.name, "Delta Design");
    }

    #[test]
    fn card_location_is_extracted() {
        let fields = extract(r#"<div class="card"><h3>Acme Ltd</h3><span class="locality">Leeds, England</span></div>"#)
            .unwrap();
        assert_eq!(fields.location.as_deref(), Some("Leeds, England"));
        assert_eq!(fields.address, None);
    }

    #[test]
    fn invalid_selector_is_a_configuration_error() {
        let rules = FieldSelectors { name: &["h3[["], ..CARD };
        assert!(matches!(FieldExtractor::new(&rules, 3, &[]), Err(ConfigError::Invalid(_))));
    }
}
