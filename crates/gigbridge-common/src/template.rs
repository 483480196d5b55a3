use std::fmt::Display;
use std::marker::PhantomData;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Formats and parses strings built around a single `{placeholder}` field.
///
/// The template is split at the placeholder into a literal prefix and suffix,
/// optionally wrapped in caller-supplied outer affixes. Parsing never fails
/// loudly: anything that does not match yields `None`.
#[derive(Debug)]
pub struct SimpleTemplate<T = String> {
    template: String,
    keyword: String,
    prefix: String,
    suffix: String,
    _value: PhantomData<T>,
}

impl<T: FromStr + Display> SimpleTemplate<T> {
    pub fn new(template: impl Into<String>, keyword: impl Into<String>) -> Result<Self> {
        Self::with_affixes(template, keyword, "", "")
    }

    /// `outer_prefix` and `outer_suffix` are prepended/appended outside the
    /// template itself, e.g. `@` and `:example.com` around a username template.
    pub fn with_affixes(
        template: impl Into<String>,
        keyword: impl Into<String>,
        outer_prefix: &str,
        outer_suffix: &str,
    ) -> Result<Self> {
        let template = template.into();
        let keyword = keyword.into();
        let placeholder = format!("{{{keyword}}}");
        let index = template
            .find(&placeholder)
            .ok_or_else(|| Error::MissingPlaceholder {
                template: template.clone(),
                keyword: keyword.clone(),
            })?;
        let prefix = format!("{outer_prefix}{}", &template[..index]);
        let suffix = format!("{}{outer_suffix}", &template[index + placeholder.len()..]);
        Ok(Self {
            template,
            keyword,
            prefix,
            suffix,
            _value: PhantomData,
        })
    }

    /// Substitutes the value into the original template string. Outer affixes
    /// are not applied here; use [`format_full`](Self::format_full) for those.
    pub fn format(&self, value: &T) -> String {
        let placeholder = format!("{{{}}}", self.keyword);
        self.template.replacen(&placeholder, &value.to_string(), 1)
    }

    /// `prefix + value + suffix`. No validation; always succeeds.
    pub fn format_full(&self, value: &T) -> String {
        format!("{}{}{}", self.prefix, value, self.suffix)
    }

    /// Extracts and parses the value between prefix and suffix.
    ///
    /// An empty suffix is no constraint at all: the entire remainder after
    /// the prefix is taken as the value.
    pub fn parse(&self, text: &str) -> Option<T> {
        if !text.starts_with(&self.prefix) {
            return None;
        }
        if !self.suffix.is_empty() && !text.ends_with(&self.suffix) {
            return None;
        }
        let end = if self.suffix.is_empty() {
            text.len()
        } else {
            text.len() - self.suffix.len()
        };
        // Prefix and suffix may overlap on short inputs; the value is then empty.
        let start = self.prefix.len().min(end);
        text.get(start..end)?.parse().ok()
    }
}
