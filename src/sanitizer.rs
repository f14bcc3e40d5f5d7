//! HTML attribute parsing and sanitisation.

use html_escape::{decode_html_entities, encode_double_quoted_attribute};
use indexmap::IndexMap;
use regex::Regex;
use std::sync::LazyLock;

/// Ordered HTML attributes.
pub type Attributes = IndexMap<String, String>;

/// A single attribute in tag attribute text.
static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s/>=][^\s/>=]*)(?:\s*=\s*(?:"([^"]*)(?:"|$)|'([^']*)(?:'|$)|([^\s>]*)))?"#)
        .unwrap()
});

/// Attributes allowed on every tag.
static COMMON: phf::Set<&str> = phf::phf_set! {
    "id", "class", "style", "lang", "dir", "title", "tabindex", "role",
    "about", "property", "resource", "datatype", "typeof",
    "itemid", "itemprop", "itemref", "itemscope", "itemtype",
};

/// Additional attributes allowed on specific tags.
static TAG_SPECIFIC: phf::Map<&str, &[&str]> = phf::phf_map! {
    "table" => &["summary", "width", "border", "frame", "rules", "cellspacing", "cellpadding", "align", "bgcolor"],
    "caption" => &["align"],
    "tr" => &["bgcolor", "align", "valign"],
    "td" => &["abbr", "axis", "headers", "scope", "rowspan", "colspan", "nowrap", "width", "height", "bgcolor", "align", "valign"],
    "th" => &["abbr", "axis", "headers", "scope", "rowspan", "colspan", "nowrap", "width", "height", "bgcolor", "align", "valign"],
    "pre" => &["width"],
};

/// Splits tag attribute text into attributes.
///
/// Attribute names are lowercased and values have their character references
/// decoded. If a name appears more than once, the last value wins. An
/// attribute with no value has an empty value.
pub fn parse_attributes(text: &str) -> Attributes {
    let mut attributes = Attributes::new();
    for caps in ATTRIBUTE.captures_iter(text) {
        let name = caps[1].to_lowercase();
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map_or("", |value| value.as_str());
        attributes.insert(name, decode_html_entities(value).into_owned());
    }
    attributes
}

/// Renders attributes as HTML, with a leading space before each attribute.
pub fn render_attributes(attributes: &Attributes) -> String {
    let mut out = String::new();
    for (name, value) in attributes {
        out.push(' ');
        out += name;
        out += "=\"";
        out += &encode_double_quoted_attribute(value);
        out.push('"');
    }
    out
}

/// An HTML attribute sanitiser.
pub trait AttributeSanitizer: Send + Sync {
    /// Parses the raw attribute text of a `tag` and returns only the safe
    /// attributes.
    fn fix_attributes(&self, raw: &str, tag: &str) -> Attributes;
}

/// The default attribute sanitiser, which keeps only allowlisted attributes
/// and drops styles which could execute script or load resources.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sanitizer;

impl Sanitizer {
    /// Returns true if `name` is allowed on `tag`.
    fn is_allowed(tag: &str, name: &str) -> bool {
        if name.starts_with("on") {
            return false;
        }

        COMMON.contains(name)
            || name.starts_with("aria-")
            || (name.starts_with("data-")
                && !name.starts_with("data-ooui")
                && !name.starts_with("data-mw"))
            || TAG_SPECIFIC
                .get(tag)
                .is_some_and(|allowed| allowed.contains(&name))
    }

    /// Returns true if a `style` attribute value is safe.
    fn is_safe_style(value: &str) -> bool {
        let value = value.to_ascii_lowercase();
        !["expression", "url(", "image-set(", "javascript:", "vbscript:"]
            .iter()
            .any(|needle| value.contains(needle))
    }
}

impl AttributeSanitizer for Sanitizer {
    fn fix_attributes(&self, raw: &str, tag: &str) -> Attributes {
        let tag = tag.to_ascii_lowercase();
        let mut attributes = parse_attributes(raw);
        attributes.retain(|name, value| {
            let keep = Self::is_allowed(&tag, name) && (name != "style" || Self::is_safe_style(value));
            if !keep {
                log::debug!("dropped unsafe attribute {name}={value:?} on <{tag}>");
            }
            keep
        });
        attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse() {
        let attributes =
            parse_attributes(r#" Class="a b"  id='x' colspan=2 hidden title="&lt;t&gt;" id=y"#);
        assert_eq!(
            attributes.into_iter().collect::<Vec<_>>(),
            [
                ("class".to_string(), "a b".to_string()),
                ("id".to_string(), "y".to_string()),
                ("colspan".to_string(), "2".to_string()),
                ("hidden".to_string(), String::new()),
                ("title".to_string(), "<t>".to_string()),
            ]
        );
    }

    #[test]
    fn parse_unterminated_quote() {
        let attributes = parse_attributes(r#"class="a b"#);
        assert_eq!(attributes.get("class").map(String::as_str), Some("a b"));
    }

    #[test]
    fn sanitize() {
        let attributes = Sanitizer.fix_attributes(
            r#"class="c" onclick="evil()" colspan="2" style="width: expression(1)" data-x="1""#,
            "td",
        );
        assert_eq!(
            render_attributes(&attributes),
            r#" class="c" colspan="2" data-x="1""#
        );

        let attributes = Sanitizer.fix_attributes(r#"colspan="2" style="color: red""#, "table");
        assert_eq!(render_attributes(&attributes), r#" style="color: red""#);
    }

    #[test]
    fn render_escapes() {
        let mut attributes = Attributes::new();
        attributes.insert("title".into(), r#"a "b" & c"#.into());
        assert_eq!(
            render_attributes(&attributes),
            r#" title="a &quot;b&quot; &amp; c""#
        );
    }
}
