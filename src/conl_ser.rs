//! CONL serialization for the crawl configuration
//!
//! Used to write out a starting config file that `CrawlConfig::load` reads back.

use crate::config::CrawlConfig;

/// Trait for types that can be serialized to CONL
pub trait ToConl {
    fn to_conl(&self) -> String;
}

/// Escape a string value if needed for CONL
fn escape_value(s: &str) -> String {
    // Values that need quoting: start/end with space, contain = or ;, or newlines
    if s.is_empty()
        || s.starts_with(' ')
        || s.ends_with(' ')
        || s.starts_with('"')
        || s.contains(';')
        || s.contains('=')
        || s.contains('\n')
        || s.contains('\r')
    {
        let escaped = s
            .replace('\\', "\\\\")
            .replace('"', "\\\"")
            .replace('\n', "\\n")
            .replace('\r', "\\r")
            .replace('\t', "\\t");
        format!("\"{}\"", escaped)
    } else {
        s.to_string()
    }
}

impl ToConl for CrawlConfig {
    fn to_conl(&self) -> String {
        let lines = [
            "; quotes-scraper configuration".to_string(),
            format!("database_path = {}", escape_value(&self.database_path)),
            format!("base_url = {}", escape_value(&self.base_url)),
            format!("tag = {}", escape_value(&self.tag)),
            format!("first_page = {}", self.first_page),
            format!("last_page = {}", self.last_page),
            format!("timeout_secs = {}", self.timeout_secs),
            format!("user_agent = {}", escape_value(&self.user_agent)),
            format!("stop_when_empty = {}", self.stop_when_empty),
        ];

        lines.join("\n") + "\n"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_value() {
        assert_eq!(escape_value("philosophy"), "philosophy");
        assert_eq!(escape_value("quotes DB.db"), "quotes DB.db");
        assert_eq!(escape_value(" leading"), "\" leading\"");
        assert_eq!(escape_value(""), "\"\"");
        assert_eq!(escape_value("a=b"), "\"a=b\"");
        assert_eq!(escape_value("line\nbreak"), "\"line\\nbreak\"");
    }

    #[test]
    fn test_default_config_written() {
        let conl = CrawlConfig::default().to_conl();
        assert!(conl.contains("tag = philosophy\n"));
        assert!(conl.contains("last_page = 99\n"));
        assert!(conl.contains("stop_when_empty = false\n"));
    }

    #[test]
    fn test_written_config_loads_back() {
        let config = CrawlConfig {
            tag: "stoicism".to_string(),
            last_page: 3,
            stop_when_empty: true,
            ..CrawlConfig::default()
        };
        let parsed: CrawlConfig = serde_conl::from_str(&config.to_conl()).unwrap();
        assert_eq!(parsed, config);
    }
}
