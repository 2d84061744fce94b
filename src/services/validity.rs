use crate::models::RunConfig;
use crate::services::audio::{AudioProbe, DurationProbe};
use camino::Utf8Path;
use regex::{Regex, RegexBuilder};

/// Pure predicate deciding whether a candidate file may be copied.
///
/// The filter lists are compiled into case-insensitive regexes once, at
/// construction time:
///
/// - extensions become `\.{ext}$` and are matched against the file name
/// - keywords are matched literally anywhere in the file stem
///
/// A file passes only if every enabled predicate passes. Deny lists are
/// checked before allow lists, so a term present in both rejects.
pub struct ValidityChecker {
    size_bytes: Option<(u64, u64)>,
    duration_secs: Option<(f64, f64)>,
    include_extensions: Vec<Regex>,
    exclude_extensions: Vec<Regex>,
    include_keywords: Vec<Regex>,
    exclude_keywords: Vec<Regex>,
    probe: Box<dyn DurationProbe>,
}

impl ValidityChecker {
    /// Build a checker for `config` using the real audio probe
    pub fn from_config(config: &RunConfig) -> Result<Self, regex::Error> {
        Self::with_probe(config, Box::new(AudioProbe::new()))
    }

    pub fn with_probe(
        config: &RunConfig,
        probe: Box<dyn DurationProbe>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            size_bytes: config.size.map(|range| range.bounds_bytes()),
            duration_secs: config.duration.map(|range| range.bounds_secs()),
            include_extensions: compile_extensions(&config.extensions.include)?,
            exclude_extensions: compile_extensions(&config.extensions.exclude)?,
            include_keywords: compile_keywords(&config.keywords.include)?,
            exclude_keywords: compile_keywords(&config.keywords.exclude)?,
            probe,
        })
    }

    /// Evaluate `path` (whose size on disk is `size`) against every filter.
    pub fn validate(&self, path: &Utf8Path, size: u64) -> bool {
        let name = path.file_name().unwrap_or_default();
        let stem = path.file_stem().unwrap_or_default();

        if let Some((min, max)) = self.size_bytes {
            if size < min || size > max {
                tracing::trace!("Rejected by size ({} bytes): {}", size, path);
                return false;
            }
        }

        if self.exclude_extensions.iter().any(|re| re.is_match(name)) {
            tracing::trace!("Rejected by excluded extension: {}", path);
            return false;
        }

        if self.exclude_keywords.iter().any(|re| re.is_match(stem)) {
            tracing::trace!("Rejected by excluded keyword: {}", path);
            return false;
        }

        if !self.include_extensions.is_empty()
            && !self.include_extensions.iter().any(|re| re.is_match(name))
        {
            tracing::trace!("No included extension matches: {}", path);
            return false;
        }

        if !self.include_keywords.is_empty()
            && !self.include_keywords.iter().any(|re| re.is_match(stem))
        {
            tracing::trace!("No included keyword matches: {}", path);
            return false;
        }

        if let Some((min, max)) = self.duration_secs {
            match self.probe.duration_secs(path) {
                Some(secs) if secs < min || secs > max => {
                    tracing::trace!("Rejected by duration ({:.2}s): {}", secs, path);
                    return false;
                }
                Some(_) => {}
                // Unmeasurable files are not excluded by duration
                None => tracing::trace!("Duration unknown, accepting: {}", path),
            }
        }

        true
    }
}

fn compile_extensions(extensions: &[String]) -> Result<Vec<Regex>, regex::Error> {
    extensions
        .iter()
        .map(|ext| ext.trim().trim_start_matches('.'))
        .filter(|ext| !ext.is_empty())
        .map(|ext| {
            RegexBuilder::new(&format!(r"\.{}$", regex::escape(ext)))
                .case_insensitive(true)
                .build()
        })
        .collect()
}

fn compile_keywords(keywords: &[String]) -> Result<Vec<Regex>, regex::Error> {
    keywords
        .iter()
        .map(|keyword| keyword.trim())
        .filter(|keyword| !keyword.is_empty())
        .map(|keyword| {
            RegexBuilder::new(&regex::escape(keyword))
                .case_insensitive(true)
                .build()
        })
        .collect()
}
