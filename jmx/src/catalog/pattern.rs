//! Object name glob patterns.

use regex::Regex;

use crate::error::{JmxError, JmxResult};

/// A `*`/`?` glob over the full object name string, compiled once.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    regex: Regex,
}

impl GlobPattern {
    pub fn compile(glob: &str) -> JmxResult<Self> {
        if glob.trim().is_empty() {
            return Err(JmxError::Config("empty object name pattern".into()));
        }

        let mut expr = String::with_capacity(glob.len() + 8);
        expr.push('^');
        for c in glob.chars() {
            match c {
                '*' => expr.push_str(".*"),
                '?' => expr.push('.'),
                other => expr.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
            }
        }
        expr.push('$');

        let regex = Regex::new(&expr).map_err(|e| {
            JmxError::Config(format!("invalid object name pattern '{}': {}", glob, e))
        })?;
        Ok(Self {
            source: glob.to_string(),
            regex,
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Include/exclude filter: exclude wins, then at least one include must match.
#[derive(Debug, Clone)]
pub struct PatternFilter {
    include: Vec<GlobPattern>,
    exclude: Vec<GlobPattern>,
}

impl PatternFilter {
    pub fn new<I, E>(include: I, exclude: E) -> JmxResult<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        let include = include
            .into_iter()
            .map(|p| GlobPattern::compile(p.as_ref()))
            .collect::<JmxResult<Vec<_>>>()?;
        let exclude = exclude
            .into_iter()
            .map(|p| GlobPattern::compile(p.as_ref()))
            .collect::<JmxResult<Vec<_>>>()?;
        Ok(Self { include, exclude })
    }

    pub fn accepts(&self, name: &str) -> bool {
        if self.exclude.iter().any(|p| p.matches(name)) {
            return false;
        }
        self.include.iter().any(|p| p.matches(name))
    }
}
