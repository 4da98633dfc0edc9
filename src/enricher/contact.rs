// Pattern matching over fetched pages: emails, phones, websites, meta and social links
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").expect("static email regex"));

static UK_PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\+44|0)[0-9\s\-()]{10,}").expect("static phone regex"));

static WEBSITE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").expect("static website regex"));

static META_DESCRIPTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[name="description"]"#).expect("static meta selector"));

static SOCIAL: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    vec![
        ("facebook", Regex::new(r"facebook\.com/[a-zA-Z0-9._-]+").expect("static facebook regex")),
        ("twitter", Regex::new(r"twitter\.com/[a-zA-Z0-9._-]+").expect("static twitter regex")),
        ("linkedin", Regex::new(r"linkedin\.com/company/[a-zA-Z0-9._-]+").expect("static linkedin regex")),
    ]
});

const IMAGE_SUFFIXES: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".webp", ".svg"];

/// Hosts that show up in result pages but are never the business's own site.
const FOREIGN_HOSTS: &[&str] = &[
    "google.", "gstatic.", "googleapis.", "googleusercontent.", "schema.org", "w3.org",
    "facebook.com", "twitter.com", "x.com", "linkedin.com", "instagram.com", "youtube.com",
    "yell.com", "yelp.", "wikipedia.org",
];

pub fn find_email(text: &str) -> Option<String> {
    EMAIL
        .find_iter(text)
        .map(|m| m.as_str())
        .find(|email| {
            let lower = email.to_lowercase();
            !IMAGE_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix))
        })
        .map(str::to_string)
}

pub fn find_phone(text: &str) -> Option<String> {
    UK_PHONE
        .find(text)
        .map(|m| m.as_str().trim().to_string())
        .filter(|p| !p.is_empty())
}

pub fn find_website(text: &str) -> Option<String> {
    WEBSITE
        .find_iter(text)
        .map(|m| m.as_str())
        .find(|url| {
            let host = url.split("://").nth(1).unwrap_or_default().to_lowercase();
            !FOREIGN_HOSTS.iter().any(|foreign| host.contains(foreign))
        })
        .map(str::to_string)
}

pub fn meta_description(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    document
        .select(&META_DESCRIPTION)
        .filter_map(|el| el.value().attr("content"))
        .map(str::trim)
        .find(|content| !content.is_empty())
        .map(str::to_string)
}

/// JSON object of platform -> first profile link, `None` when the page links none.
pub fn social_links(html: &str) -> Option<String> {
    let links: BTreeMap<&str, &str> = SOCIAL
        .iter()
        .filter_map(|(platform, regex)| regex.find(html).map(|m| (*platform, m.as_str())))
        .collect();
    if links.is_empty() {
        return None;
    }
    serde_json::to_string(&links).ok()
}

/// `https://<lowercase alphanumerics of the name, max 20>.co.uk`
pub fn guess_domain(name: &str) -> Option<String> {
    let stem: String = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(20)
        .collect();
    if stem.is_empty() {
        return None;
    }
    Some(format!("https://{}.co.uk", stem))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_skips_image_names() {
        let page = r#"<img src="logo@2x.png"> Write to contact@acme.co.uk or sales@acme.co.uk"#;
        assert_eq!(find_email(page).as_deref(), Some("contact@acme.co.uk"));
        assert_eq!(find_email("no address here"), None);
    }

    #[test]
    fn website_skips_search_and_social_hosts() {
        let page = "https://www.google.com/url?q= https://www.facebook.com/acme http://acme-builders.co.uk/about";
        assert_eq!(find_website(page).as_deref(), Some("http://acme-builders.co.uk"));
        assert_eq!(find_website("https://maps.google.co.uk"), None);
    }

    #[test]
    fn phone_is_trimmed() {
        assert_eq!(find_phone("Tel: 01482 226 000 \n").as_deref(), Some("01482 226 000"));
        assert_eq!(find_phone("+44 (0)1482 226000").as_deref(), Some("+44 (0)1482 226000"));
        assert_eq!(find_phone("call 123"), None);
    }

    #[test]
    fn reads_meta_description() {
        let html = r#"<html><head><meta name="description" content=" Bespoke joinery in Hull "></head></html>"#;
        assert_eq!(meta_description(html).as_deref(), Some("Bespoke joinery in Hull"));
        assert_eq!(meta_description("<html></html>"), None);
    }

    #[test]
    fn collects_social_profiles() {
        let html = r#"<a href="https://www.linkedin.com/company/acme-ltd">in</a>
                      <a href="https://facebook.com/AcmeHull">fb</a>"#;
        let json: serde_json::Value = serde_json::from_str(&social_links(html).unwrap()).unwrap();
        assert_eq!(json["facebook"], "facebook.com/AcmeHull");
        assert_eq!(json["linkedin"], "linkedin.com/company/acme-ltd");
        assert!(json.get("twitter").is_none());
        assert_eq!(social_links("<p>nothing</p>"), None);
    }

    #[test]
    fn guesses_domain_from_name() {
        assert_eq!(guess_domain("Acme & Sons Ltd").as_deref(), Some("https://acmesonsltd.co.uk"));
        assert_eq!(
            guess_domain("The Very Long Business Name Company").as_deref(),
            Some("https://theverylongbusinessn.co.uk")
        );
        assert_eq!(guess_domain("!!!"), None);
    }
}
