//! Clock tool.
//!
//! Reports the current date and time in UTC, the fixed reference timezone,
//! so answers do not depend on where the process happens to run.

use std::collections::BTreeMap;

use chrono::Utc;

use super::{Tool, ToolError, ToolParameter};

/// A tool to get the current date and time.
pub struct ClockTool;

impl Tool for ClockTool {
    fn name(&self) -> &str {
        "get_current_time"
    }

    fn description(&self) -> &str {
        "Gets the current date and time."
    }

    fn parameters(&self) -> &[ToolParameter] {
        &[]
    }

    fn execute(&self, _args: &BTreeMap<String, String>) -> Result<String, ToolError> {
        let now = Utc::now();
        Ok(format!(
            "The current date and time is: {} UTC",
            now.format("%Y-%m-%d %H:%M:%S")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_properties() {
        let tool = ClockTool;
        assert_eq!(tool.name(), "get_current_time");
        assert_eq!(tool.description(), "Gets the current date and time.");
        assert!(tool.parameters().is_empty());
    }

    #[test]
    fn test_execute_format() {
        let result = ClockTool.execute(&BTreeMap::new()).unwrap();
        assert!(result.starts_with("The current date and time is: "));
        assert!(result.ends_with(" UTC"));

        // The timestamp part must parse back with the declared format.
        let stamp = result
            .trim_start_matches("The current date and time is: ")
            .trim_end_matches(" UTC");
        assert!(chrono::NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S").is_ok());
    }

    #[test]
    fn test_extra_arguments_ignored() {
        let mut args = BTreeMap::new();
        args.insert("timezone".to_string(), "PST".to_string());
        assert!(ClockTool.execute(&args).is_ok());
    }
}
