//! RFC 6570 subset URI template matching (spec §4.5, C3).
//!
//! A regex-compiled template with a variables list extracted from
//! `{name}` placeholders, extended with two operators: the wildcard form
//! `{x*}` (matches a path segment that may itself contain `/`) and the
//! query form `{?a,b}` (RFC 6570 form-style expansion of query
//! parameters).

use std::collections::HashMap;

use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable { name: String, wildcard: bool },
}

/// A compiled URI template, able to both match a concrete URI and extract
/// its variables.
#[derive(Debug, Clone)]
pub struct UriTemplate {
    pattern: String,
    regex: Regex,
    /// Path variable names in order of appearance (excludes query vars).
    path_variables: Vec<String>,
    /// Query variable names from a trailing `{?a,b}` operator, if present.
    query_variables: Vec<String>,
}

impl UriTemplate {
    pub fn new(pattern: &str) -> Result<Self, String> {
        let (path_part, query_variables) = split_query_operator(pattern)?;
        let segments = parse_segments(&path_part)?;

        let mut regex_pattern = String::from("^");
        let mut path_variables = Vec::new();
        for segment in &segments {
            match segment {
                Segment::Literal(lit) => regex_pattern.push_str(&regex::escape(lit)),
                Segment::Variable { name, wildcard } => {
                    path_variables.push(name.clone());
                    if *wildcard {
                        regex_pattern.push_str("(.+)");
                    } else {
                        regex_pattern.push_str("([^/]+)");
                    }
                }
            }
        }
        regex_pattern.push('$');

        let regex = Regex::new(&regex_pattern).map_err(|e| format!("invalid URI template '{pattern}': {e}"))?;

        Ok(Self { pattern: pattern.to_string(), regex, path_variables, query_variables })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn variables(&self) -> Vec<String> {
        self.path_variables.iter().chain(self.query_variables.iter()).cloned().collect()
    }

    /// Match `uri` against this template, returning the extracted variables
    /// (path and query) if it matches. The query string, if present on
    /// `uri`, is parsed separately from the path regex match.
    pub fn matches(&self, uri: &str) -> Option<HashMap<String, String>> {
        let (path, query) = split_once_query(uri);
        let captures = self.regex.captures(path)?;

        let mut out = HashMap::new();
        for (i, name) in self.path_variables.iter().enumerate() {
            if let Some(m) = captures.get(i + 1) {
                out.insert(name.clone(), m.as_str().to_string());
            }
        }

        if !self.query_variables.is_empty() {
            let params = parse_query(query.unwrap_or(""));
            for name in &self.query_variables {
                if let Some(value) = params.get(name) {
                    out.insert(name.clone(), value.clone());
                }
            }
        }

        Some(out)
    }
}

fn split_once_query(uri: &str) -> (&str, Option<&str>) {
    match uri.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (uri, None),
    }
}

fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|s| !s.is_empty())
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Split a trailing `{?a,b}` query operator off the pattern, returning the
/// path portion and the list of query variable names.
fn split_query_operator(pattern: &str) -> Result<(String, Vec<String>), String> {
    if let Some(start) = pattern.find("{?") {
        let end = pattern[start..].find('}').map(|i| i + start).ok_or_else(|| {
            format!("unterminated query operator in template '{pattern}'")
        })?;
        let names: Vec<String> =
            pattern[start + 2..end].split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        let rest = &pattern[end + 1..];
        if !rest.is_empty() {
            return Err(format!("query operator must be the final component of template '{pattern}'"));
        }
        Ok((pattern[..start].to_string(), names))
    } else {
        Ok((pattern.to_string(), Vec::new()))
    }
}

fn parse_segments(pattern: &str) -> Result<Vec<Segment>, String> {
    let var_regex = Regex::new(r"\{([^}]+)\}").unwrap();
    let mut segments = Vec::new();
    let mut last_end = 0;

    for capture in var_regex.captures_iter(pattern) {
        let m = capture.get(0).unwrap();
        if m.start() > last_end {
            segments.push(Segment::Literal(pattern[last_end..m.start()].to_string()));
        }
        let raw = capture.get(1).unwrap().as_str();
        let (name, wildcard) = match raw.strip_suffix('*') {
            Some(stripped) => (stripped.to_string(), true),
            None => (raw.to_string(), false),
        };
        if name.is_empty() {
            return Err(format!("empty variable name in template '{pattern}'"));
        }
        segments.push(Segment::Variable { name, wildcard });
        last_end = m.end();
    }
    if last_end < pattern.len() {
        segments.push(Segment::Literal(pattern[last_end..].to_string()));
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_simple_path_variable() {
        let template = UriTemplate::new("users://{user_id}/profile").unwrap();
        let vars = template.matches("users://42/profile").unwrap();
        assert_eq!(vars.get("user_id"), Some(&"42".to_string()));
    }

    #[test]
    fn rejects_uri_with_extra_path_segment() {
        let template = UriTemplate::new("users://{user_id}/profile").unwrap();
        assert!(template.matches("users://42/profile/extra").is_none());
    }

    #[test]
    fn wildcard_variable_matches_embedded_slashes() {
        let template = UriTemplate::new("files:///{path*}").unwrap();
        let vars = template.matches("files:///a/b/c.txt").unwrap();
        assert_eq!(vars.get("path"), Some(&"a/b/c.txt".to_string()));
    }

    #[test]
    fn query_operator_extracts_present_params_only() {
        let template = UriTemplate::new("search://results{?q,page}").unwrap();
        let vars = template.matches("search://results?q=rust&page=2").unwrap();
        assert_eq!(vars.get("q"), Some(&"rust".to_string()));
        assert_eq!(vars.get("page"), Some(&"2".to_string()));
    }

    #[test]
    fn query_operator_tolerates_missing_params() {
        let template = UriTemplate::new("search://results{?q,page}").unwrap();
        let vars = template.matches("search://results?q=rust").unwrap();
        assert!(vars.contains_key("q"));
        assert!(!vars.contains_key("page"));
    }

    #[test]
    fn variables_reports_path_and_query_names() {
        let template = UriTemplate::new("search://{scope}{?q}").unwrap();
        assert_eq!(template.variables(), vec!["scope".to_string(), "q".to_string()]);
    }
}
