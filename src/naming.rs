//! Station file naming convention and queue marker names

use regex::Regex;

use crate::error::Result;

/// Site code, measurement type, date and optional time/extension,
/// e.g. `RDLm_BFCV_2012_01_17_0900.ruv`
pub const DEFAULT_FILE_PATTERN: &str =
    r"^[A-Za-z0-9_]{3,4}_[A-Za-z0-9_]{4}_(?:[0-9]{2}|[0-9]{4})_[0-9]{2}_[0-9]{2}(?:_[0-9]{2}(?:[0-9]{2}(?:[0-9]{2})?)?)?(?:\.[A-Za-z0-9_]{3,4})?$";

pub const DEFAULT_QUEUED_SUFFIX: &str = ".queued";
pub const DEFAULT_SENT_SUFFIX: &str = ".sent";

/// Compiled naming rules for one queue directory
#[derive(Debug, Clone)]
pub struct StationPattern {
    pattern: Regex,
    queued_suffix: String,
    sent_suffix: String,
}

impl StationPattern {
    pub fn new(pattern: &str, queued_suffix: &str, sent_suffix: &str) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            queued_suffix: queued_suffix.to_string(),
            sent_suffix: sent_suffix.to_string(),
        })
    }

    pub fn queued_suffix(&self) -> &str {
        &self.queued_suffix
    }

    pub fn sent_suffix(&self) -> &str {
        &self.sent_suffix
    }

    /// Whether `name` (a base file name, no marker suffix) follows the convention
    pub fn matches(&self, name: &str) -> bool {
        self.pattern.is_match(name)
    }

    pub fn queued_name(&self, base: &str) -> String {
        format!("{base}{}", self.queued_suffix)
    }

    pub fn sent_name(&self, base: &str) -> String {
        format!("{base}{}", self.sent_suffix)
    }

    /// Strip the queued suffix; `None` if `marker` is not a queued marker
    pub fn strip_queued<'a>(&self, marker: &'a str) -> Option<&'a str> {
        marker
            .strip_suffix(self.queued_suffix.as_str())
            .filter(|base| !base.is_empty())
    }
}

impl Default for StationPattern {
    fn default() -> Self {
        Self {
            pattern: Regex::new(DEFAULT_FILE_PATTERN).expect("default pattern compiles"),
            queued_suffix: DEFAULT_QUEUED_SUFFIX.to_string(),
            sent_suffix: DEFAULT_SENT_SUFFIX.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_station_files() {
        let p = StationPattern::default();
        assert!(p.matches("RDLm_BFCV_2012_01_17_0900.ruv"));
        assert!(p.matches("TOTL_MARA_12_01_17"));
        assert!(p.matches("CSS_BFCV_2012_01_17_093000.cs4"));
        assert!(p.matches("RDL_ABCD_2012_01_17_09"));
    }

    #[test]
    fn rejects_unrelated_files() {
        let p = StationPattern::default();
        assert!(!p.matches("notes.txt"));
        assert!(!p.matches("RDLm_BFCV_2012_1_17"));
        assert!(!p.matches("RDLm_BFCV_2012_01_17_0900.ruv.bak"));
        assert!(!p.matches("RDLmx_BFCV_2012_01_17"));
        assert!(!p.matches("RDLm_BFCV_201_01_17"));
    }

    #[test]
    fn ascii_only() {
        let p = StationPattern::default();
        // Fullwidth and Arabic-Indic digits, accented site code
        assert!(!p.matches("RDLm_BFCV_２０１２_01_17_0900.ruv"));
        assert!(!p.matches("RDLm_BFCV_2012_01_١٧_0900.ruv"));
        assert!(!p.matches("RDLé_BFCV_2012_01_17_0900.ruv"));
        assert!(p.matches("RDLm_BFCV_2012_01_17_0900.ruv"));
    }

    #[test]
    fn marker_names() {
        let p = StationPattern::default();
        let base = "RDLm_BFCV_2012_01_17_0900.ruv";
        assert_eq!(p.queued_name(base), "RDLm_BFCV_2012_01_17_0900.ruv.queued");
        assert_eq!(p.sent_name(base), "RDLm_BFCV_2012_01_17_0900.ruv.sent");
        assert_eq!(p.strip_queued(&p.queued_name(base)), Some(base));
        assert_eq!(p.strip_queued("RDLm_BFCV_2012_01_17_0900.ruv.sent"), None);
        assert_eq!(p.strip_queued(".queued"), None);
    }

    #[test]
    fn custom_suffixes() {
        let p = StationPattern::new(DEFAULT_FILE_PATTERN, ".pending", ".done").unwrap();
        assert_eq!(p.queued_name("x"), "x.pending");
        assert_eq!(p.sent_name("x"), "x.done");
    }

    #[test]
    fn bad_pattern_is_an_error() {
        assert!(StationPattern::new("(", ".queued", ".sent").is_err());
    }
}
