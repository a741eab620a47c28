// crates/core/src/analyzer.rs
//! Derives the Tilt web UI URL from fetched log lines.
//!
//! Tilt prints its banner ("Tilt started on http://localhost:10350/") as the
//! first line of a fresh log, so only that line is scanned. The result is a
//! pure function of `(lines, lifecycle)`.

use std::sync::OnceLock;

use regex_lite::Regex;
use tilt_orchestrator_types::Lifecycle;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Analysis {
    /// Empty when no URL was found or the tool is not running.
    pub url: String,
    /// True only while the tool is running.
    pub keep: bool,
}

impl Analysis {
    pub fn url(&self) -> Option<&str> {
        (!self.url.is_empty()).then_some(self.url.as_str())
    }

    /// Resolve the URL to publish given the one currently shown.
    ///
    /// While running, a banner that scrolled out of the fetch window keeps the
    /// URL already discovered for this session. Leaving `Running` always
    /// clears it.
    pub fn retain(&self, previous: Option<&str>) -> Option<String> {
        if !self.keep {
            return None;
        }
        self.url().or(previous).map(str::to_string)
    }
}

fn url_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        // scheme, then a host starting with an alphanumeric, then the rest
        // of the token; quotes and brackets end the token
        Regex::new(r#"https?://[A-Za-z0-9][^\s/"'<>()\[\]]*[^\s"'<>()\[\]]*"#).ok()
    })
    .as_ref()
}

/// Extract the first well-formed `http(s)://` token from the banner line.
pub fn analyze<S: AsRef<str>>(lines: &[S], lifecycle: Lifecycle) -> Analysis {
    if lifecycle != Lifecycle::Running {
        return Analysis::default();
    }
    let url = lines
        .first()
        .zip(url_regex())
        .and_then(|(line, re)| re.find(line.as_ref()))
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':']).to_string())
        .unwrap_or_default();
    Analysis { url, keep: true }
}
