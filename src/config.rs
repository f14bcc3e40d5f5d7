//! Wiki configuration.
//!
//! Wikitext documents are not self-encapsulated and cannot be expanded without
//! out-of-band configuration data. Most of this configuration data can be
//! acquired by querying the MediaWiki API for a given MediaWiki installation;
//! the defaults here match a stock English-language installation.

use crate::title::{Namespace, NamespaceCase};
use serde::Deserialize;
use std::{collections::HashSet, time::Duration};

/// Registered variable names, lowercased.
static VARIABLES: phf::Set<&str> = phf::phf_set! {
    "currentmonth", "currentmonth1", "currentmonthname", "currentmonthnamegen",
    "currentmonthabbrev", "currentday", "currentday2", "currentdayname", "currentyear",
    "currenttime", "currenthour", "localmonth", "localmonth1", "localmonthname",
    "localmonthnamegen", "localmonthabbrev", "localday", "localday2", "localdayname",
    "localyear", "localtime", "localhour", "numberofarticles", "numberoffiles",
    "numberofedits", "articlepath", "pageid", "sitename", "server", "servername",
    "scriptpath", "stylepath", "pagename", "pagenamee", "fullpagename", "fullpagenamee",
    "namespace", "namespacee", "namespacenumber", "currentweek", "currentdow",
    "localweek", "localdow", "revisionid", "revisionday", "revisionday2",
    "revisionmonth", "revisionmonth1", "revisionyear", "revisiontimestamp",
    "revisionuser", "revisionsize", "subpagename", "subpagenamee", "talkspace",
    "talkspacee", "subjectspace", "subjectspacee", "talkpagename", "talkpagenamee",
    "subjectpagename", "subjectpagenamee", "numberofusers", "numberofactiveusers",
    "numberofpages", "currentversion", "rootpagename", "rootpagenamee",
    "basepagename", "basepagenamee", "currenttimestamp", "localtimestamp",
    "directionmark", "contentlanguage", "pagelanguage", "numberofadmins",
    "cascadingsources", "bcp47", "dir", "!", "=",
};

/// Registered parser function hook names, lowercased.
static FUNCTION_HOOKS: phf::Set<&str> = phf::phf_set! {
    "ns", "nse", "urlencode", "lcfirst", "ucfirst", "lc", "uc", "localurl",
    "localurle", "fullurl", "fullurle", "canonicalurl", "canonicalurle", "formatnum",
    "grammar", "gender", "plural", "bidi", "padleft", "padright", "anchorencode",
    "defaultsort", "filepath", "pagesincategory", "pagesize", "protectionlevel",
    "pagename", "pagenamee", "fullpagename", "fullpagenamee", "subpagename",
    "subpagenamee", "rootpagename", "rootpagenamee", "basepagename", "basepagenamee",
    "talkpagename", "talkpagenamee", "subjectpagename", "subjectpagenamee",
    "namespace", "namespacee", "namespacenumber", "talkspace", "talkspacee",
    "subjectspace", "subjectspacee", "int", "special", "speciale", "tag",
    "formatdate", "displaytitle", "if", "ifeq", "switch", "ifexist", "ifexpr",
    "iferror", "time", "timel", "expr", "rel2abs", "titleparts", "invoke",
};

/// Template expansion resource limits.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct Limits {
    /// The maximum number of nested template expansions.
    // MediaWiki documentation says this is the stack limit
    pub max_depth: usize,
    /// The maximum wall-clock time for one render, if any.
    #[serde(with = "optional_seconds")]
    pub timeout: Option<Duration>,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_depth: 40,
            timeout: None,
        }
    }
}

/// Site specific configuration of a wiki.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// The article path pattern, where `$1` is replaced by the title.
    pub article_path: String,
    /// Registered parser function hooks, lowercased.
    pub function_hooks: HashSet<String>,
    /// Template expansion limits.
    pub limits: Limits,
    /// Registered title namespaces.
    pub namespaces: Vec<Namespace>,
    /// Registered variables, lowercased.
    pub variables: HashSet<String>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            article_path: "/wiki/$1".into(),
            function_hooks: FUNCTION_HOOKS.iter().map(|name| (*name).to_string()).collect(),
            limits: Limits::default(),
            namespaces: default_namespaces(),
            variables: VARIABLES.iter().map(|name| (*name).to_string()).collect(),
        }
    }
}

impl Configuration {
    /// Loads a configuration from a JSON document. Any missing field uses the
    /// default value for a stock installation.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Finds the namespace with the given numeric ID.
    pub fn namespace_by_id(&self, id: i32) -> Option<&Namespace> {
        self.namespaces.iter().find(|ns| ns.id == id)
    }

    /// Finds the namespace with the given case-insensitive name. Searches the
    /// name, the canonical name, and all aliases.
    pub fn namespace_by_name(&self, name: &str) -> Option<&Namespace> {
        let name = name.replace('_', " ");
        self.namespaces.iter().find(|ns| {
            ns.name.eq_ignore_ascii_case(&name)
                || ns
                    .canonical
                    .as_deref()
                    .is_some_and(|canonical| name.eq_ignore_ascii_case(canonical))
                || ns
                    .aliases
                    .iter()
                    .any(|alias| alias.eq_ignore_ascii_case(&name))
        })
    }

    /// Returns true if `name` is a registered variable.
    pub fn is_variable(&self, name: &str) -> bool {
        self.variables.contains(&name.to_lowercase())
    }

    /// Returns true if `name` is a registered parser function hook.
    ///
    /// We can just assume that if it starts with a '#' then it is a parser
    /// function since the way MediaWiki URLs work mean these cannot be
    /// templates, and the list of function hooks from the MediaWiki API does
    /// not actually include the hash.
    pub fn is_function_hook(&self, name: &str) -> bool {
        name.starts_with('#') || self.function_hooks.contains(&name.to_lowercase())
    }

    /// Formats the local URL of an article.
    pub fn article_url(&self, title: &str) -> String {
        let encoded =
            percent_encoding::utf8_percent_encode(&title.replace(' ', "_"), TITLE_ENCODE_SET)
                .to_string();
        self.article_path.replace("$1", &encoded)
    }
}

/// Characters which must be escaped when a title is written into a URL path.
const TITLE_ENCODE_SET: &percent_encoding::AsciiSet = &percent_encoding::CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b']')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// The namespaces of a stock installation.
fn default_namespaces() -> Vec<Namespace> {
    const TABLE: &[(i32, &str, Option<&str>, &[&str])] = &[
        (Namespace::MEDIA, "Media", None, &[]),
        (Namespace::SPECIAL, "Special", None, &[]),
        (Namespace::MAIN, "", None, &[]),
        (Namespace::TALK, "Talk", None, &[]),
        (Namespace::USER, "User", None, &[]),
        (Namespace::USER_TALK, "User talk", None, &[]),
        (Namespace::PROJECT, "Wikipedia", Some("Project"), &["WP"]),
        (Namespace::PROJECT_TALK, "Wikipedia talk", Some("Project talk"), &["WT"]),
        (Namespace::FILE, "File", None, &["Image"]),
        (Namespace::FILE_TALK, "File talk", None, &["Image talk"]),
        (Namespace::MEDIAWIKI, "MediaWiki", None, &[]),
        (Namespace::MEDIAWIKI_TALK, "MediaWiki talk", None, &[]),
        (Namespace::TEMPLATE, "Template", None, &[]),
        (Namespace::TEMPLATE_TALK, "Template talk", None, &[]),
        (Namespace::HELP, "Help", None, &[]),
        (Namespace::HELP_TALK, "Help talk", None, &[]),
        (Namespace::CATEGORY, "Category", None, &[]),
        (Namespace::CATEGORY_TALK, "Category talk", None, &[]),
        (Namespace::MODULE, "Module", None, &[]),
        (Namespace::MODULE_TALK, "Module talk", None, &[]),
    ];

    TABLE
        .iter()
        .map(|(id, name, canonical, aliases)| Namespace {
            id: *id,
            name: (*name).to_string(),
            canonical: canonical.map(str::to_string),
            case: NamespaceCase::FirstLetter,
            aliases: aliases.iter().map(|alias| (*alias).to_string()).collect(),
        })
        .collect()
}

/// Serde adapter for an optional [`Duration`] given in fractional seconds.
mod optional_seconds {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<f64>::deserialize(deserializer)?
            .map(|secs| Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom))
            .transpose()
    }
}
