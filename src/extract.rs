/// Pattern-based fact extraction from fetched pages
use crate::error::{LaracastsError, Result};
use anyhow::anyhow;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;

/// Facts the engine can derive from a page body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fact {
    LoginForm,
    LoginTokenInput,
    LoginToken,
    LessonPages,
    Authenticated,
    SeriesList,
    SeriesEpisodeNumbers,
    EpisodeTitle,
    VimeoUrl,
}

impl Fact {
    pub const ALL: [Fact; 9] = [
        Fact::LoginForm,
        Fact::LoginTokenInput,
        Fact::LoginToken,
        Fact::LessonPages,
        Fact::Authenticated,
        Fact::SeriesList,
        Fact::SeriesEpisodeNumbers,
        Fact::EpisodeTitle,
        Fact::VimeoUrl,
    ];

    /// Symbolic name used in log and error messages.
    pub fn name(self) -> &'static str {
        match self {
            Fact::LoginForm => "loginForm",
            Fact::LoginTokenInput => "loginTokenInput",
            Fact::LoginToken => "loginToken",
            Fact::LessonPages => "lessonPages",
            Fact::Authenticated => "authenticated",
            Fact::SeriesList => "seriesList",
            Fact::SeriesEpisodeNumbers => "seriesEpisodeNumbers",
            Fact::EpisodeTitle => "episodeTitle",
            Fact::VimeoUrl => "vimeoUrl",
        }
    }
}

/// One row of the fact table: where a fact's value lives in a page.
struct FactSpec {
    fact: Fact,
    pattern: &'static str,
    group: &'static str,
    multiple: bool,
}

/// Single source of truth for what the engine can extract. Adding a fact
/// means adding a row here, never a new code path.
const FACT_TABLE: &[FactSpec] = &[
    FactSpec {
        fact: Fact::LoginForm,
        pattern: r#"(?si)(?P<form><form .*?action="/sessions".*?>.+</form>)"#,
        group: "form",
        multiple: false,
    },
    FactSpec {
        fact: Fact::LoginTokenInput,
        pattern: r#"(?P<input><input.*?name="_token".*?>)"#,
        group: "input",
        multiple: false,
    },
    FactSpec {
        fact: Fact::LoginToken,
        pattern: r#"value="(?P<value>[^"]+)""#,
        group: "value",
        multiple: false,
    },
    FactSpec {
        fact: Fact::LessonPages,
        pattern: r"/lessons\?page=(?P<pageNumbers>\d+)",
        group: "pageNumbers",
        multiple: true,
    },
    FactSpec {
        fact: Fact::Authenticated,
        pattern: r"(?i)(?P<text>my laracasts)",
        group: "text",
        multiple: false,
    },
    FactSpec {
        fact: Fact::SeriesList,
        pattern: r#"/series/(?P<name>[^"/.]+)"#,
        group: "name",
        multiple: true,
    },
    FactSpec {
        fact: Fact::SeriesEpisodeNumbers,
        pattern: r"/episodes/(?P<episodeNumber>\d+)",
        group: "episodeNumber",
        multiple: true,
    },
    FactSpec {
        fact: Fact::EpisodeTitle,
        pattern: r"<title>(?P<name>.+?)</title>",
        group: "name",
        multiple: false,
    },
    FactSpec {
        // The site serves progressive HD mp4 URLs off player.vimeo.com.
        fact: Fact::VimeoUrl,
        pattern: r#"(?P<url>player\.vimeo\.com[^"']+\.hd.mp4\?[^"']+)"#,
        group: "url",
        multiple: false,
    },
];

/// A fact rule with its pattern compiled and ready to apply.
struct FactRule {
    pattern: Regex,
    group: &'static str,
    multiple: bool,
}

/// The fact table compiled once at startup, indexed by `Fact`.
pub struct FactRegistry {
    rules: Vec<FactRule>,
}

impl FactRegistry {
    pub fn new() -> anyhow::Result<Self> {
        let rules = Fact::ALL
            .iter()
            .map(|&fact| {
                let spec = FACT_TABLE
                    .iter()
                    .find(|spec| spec.fact == fact)
                    .ok_or_else(|| anyhow!("fact '{}' has no row in the fact table", fact.name()))?;
                let pattern = Regex::new(spec.pattern)
                    .map_err(|e| anyhow!("fact '{}' has an invalid pattern: {}", fact.name(), e))?;
                Ok(FactRule {
                    pattern,
                    group: spec.group,
                    multiple: spec.multiple,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    fn rule(&self, fact: Fact) -> &FactRule {
        // `rules` is built from Fact::ALL in declaration order.
        &self.rules[fact as usize]
    }
}

/// What a rule produced: one value, or every match in source order.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Single(String),
    Multiple(Vec<String>),
}

/// Applies fact rules to one fetched page body.
pub struct PageExtractor {
    registry: Arc<FactRegistry>,
    body: String,
}

impl PageExtractor {
    pub fn new(registry: Arc<FactRegistry>, body: String) -> Self {
        Self { registry, body }
    }

    /// Applies a fact's rule to the page body. Single-value rules yield the
    /// first capture of the named group; multi-value rules yield every
    /// capture, left to right, without deduplication.
    pub fn extract(&self, fact: Fact) -> Result<Extraction> {
        self.extract_from(fact, &self.body)
    }

    /// Same as [`extract`](Self::extract), but over caller-supplied text.
    /// Nested facts are reached by chaining: each stage runs on the text the
    /// previous stage returned.
    pub fn extract_from(&self, fact: Fact, from: &str) -> Result<Extraction> {
        let rule = self.registry.rule(fact);
        if rule.multiple {
            let values: Vec<String> = rule
                .pattern
                .captures_iter(from)
                .filter_map(|caps| caps.name(rule.group))
                .map(|m| m.as_str().to_string())
                .collect();
            if values.is_empty() {
                return Err(LaracastsError::match_not_found(fact.name(), from));
            }
            Ok(Extraction::Multiple(values))
        } else {
            rule.pattern
                .captures(from)
                .and_then(|caps| caps.name(rule.group))
                .map(|m| Extraction::Single(m.as_str().to_string()))
                .ok_or_else(|| LaracastsError::match_not_found(fact.name(), from))
        }
    }

    /// True when the page shows the signed-in marker. Not-found is not an
    /// error here, it simply means the marker is absent.
    pub fn is_authenticated(&self) -> bool {
        self.extract(Fact::Authenticated).is_ok()
    }

    /// The anti-forgery token for the login post: the token input sits inside
    /// the session form, so this chains three single-value extractions.
    pub fn login_token(&self) -> Result<String> {
        let form = self.single(Fact::LoginForm, &self.body)?;
        let input = self.single(Fact::LoginTokenInput, &form)?;
        self.single(Fact::LoginToken, &input)
    }

    /// Highest page number referenced by the listing pagination links.
    pub fn highest_page(&self) -> Result<u32> {
        self.numeric_max(Fact::LessonPages)
    }

    /// Series names linked from a listing page, first occurrence order,
    /// duplicates removed. The rule itself reports every link.
    pub fn series_list(&self) -> Result<Vec<String>> {
        let names = self.list(Fact::SeriesList, &self.body)?;
        let mut seen = HashSet::new();
        Ok(names.into_iter().filter(|name| seen.insert(name.clone())).collect())
    }

    /// Highest episode number linked from a series page. Episode numbering
    /// starts at 1, so a page whose links never go above 0 carries no usable
    /// count and is reported as not found.
    pub fn total_episodes(&self) -> Result<u32> {
        let highest = self.numeric_max(Fact::SeriesEpisodeNumbers)?;
        if highest == 0 {
            return Err(LaracastsError::match_not_found(
                Fact::SeriesEpisodeNumbers.name(),
                &self.body,
            ));
        }
        Ok(highest)
    }

    pub fn episode_title(&self) -> Result<String> {
        self.single(Fact::EpisodeTitle, &self.body)
    }

    pub fn download_url(&self) -> Result<String> {
        self.single(Fact::VimeoUrl, &self.body)
    }

    fn single(&self, fact: Fact, from: &str) -> Result<String> {
        match self.extract_from(fact, from)? {
            Extraction::Single(value) => Ok(value),
            Extraction::Multiple(values) => {
                // A multi-value rule used in a single-value position keeps
                // the first match, mirroring first-capture semantics.
                values
                    .into_iter()
                    .next()
                    .ok_or_else(|| LaracastsError::match_not_found(fact.name(), from))
            }
        }
    }

    fn list(&self, fact: Fact, from: &str) -> Result<Vec<String>> {
        match self.extract_from(fact, from)? {
            Extraction::Multiple(values) => Ok(values),
            Extraction::Single(value) => Ok(vec![value]),
        }
    }

    /// Parses every match of a numeric fact and returns the maximum. The
    /// comparison is numeric, never lexicographic.
    fn numeric_max(&self, fact: Fact) -> Result<u32> {
        let values = self.list(fact, &self.body)?;
        let mut highest = 0u32;
        for value in &values {
            let number: u32 = value
                .parse()
                .map_err(|_| LaracastsError::match_not_found(fact.name(), value))?;
            highest = highest.max(number);
        }
        Ok(highest)
    }
}
