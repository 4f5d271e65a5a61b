//! URI templates.
//!
//! A template is a `/`-separated list of segments:
//!
//! | Syntax          | Matches                                      |
//! |-----------------|----------------------------------------------|
//! | `users`         | exactly `users`                              |
//! | `{id}`          | any single non-empty segment                 |
//! | `{id: \d+}`     | a single segment matching the regex          |
//! | `*path`         | all remaining segments (possibly none)       |
//! | `{path: .*}`    | same as `*path`                              |
//! | `{path: .+}`    | all remaining segments, at least one         |
//!
//! Templates match a prefix of the request path; the matcher hands the rest
//! to child resources.

use std::cmp::Ordering;
use std::fmt;

use regex::Regex;

use crate::error::{RouteError, RouteResult};
use crate::params::Params;

/// A single template segment.
#[derive(Debug, Clone)]
pub enum Segment {
    /// Literal text.
    Literal(String),
    /// A named capture of one segment, optionally constrained by a regex.
    Param {
        /// Capture name.
        name: String,
        /// Anchored constraint, if any.
        pattern: Option<Regex>,
    },
    /// A named capture of the remaining path.
    CatchAll {
        /// Capture name.
        name: String,
        /// Whether an empty remainder matches.
        allow_empty: bool,
    },
}

/// Ordering key ranking templates from most to least specific.
///
/// Compares, in order: more literal characters, absence of a catch-all,
/// fewer unconstrained parameters, more regex-constrained parameters.
/// `Less` means more specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Specificity {
    /// Characters in literal segments.
    pub literal_chars: usize,
    /// Template ends in a catch-all.
    pub catch_all: bool,
    /// Parameters without a regex.
    pub free_params: usize,
    /// Parameters with a regex.
    pub constrained_params: usize,
}

impl Ord for Specificity {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .literal_chars
            .cmp(&self.literal_chars)
            .then(self.catch_all.cmp(&other.catch_all))
            .then(self.free_params.cmp(&other.free_params))
            .then(other.constrained_params.cmp(&self.constrained_params))
    }
}

impl PartialOrd for Specificity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A parsed URI template.
///
/// # Example
///
/// ```rust
/// use ariadne_router::{Params, PathTemplate};
///
/// let template = PathTemplate::parse("/orders/{id: \\d+}").unwrap();
/// let mut params = Params::new();
///
/// assert_eq!(template.match_prefix(&["orders", "42", "items"], &mut params), Some(2));
/// assert_eq!(params.get("id"), Some("42"));
/// assert_eq!(template.match_prefix(&["orders", "latest"], &mut params), None);
/// ```
#[derive(Debug, Clone)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
    specificity: Specificity,
}

impl PathTemplate {
    /// Parses a template.
    ///
    /// Leading, trailing and repeated slashes are ignored, so `""`, `"/"`
    /// and `"//"` all denote the empty template, which matches without
    /// consuming anything.
    pub fn parse(raw: &str) -> RouteResult<Self> {
        let parts: Vec<&str> = raw.split('/').filter(|s| !s.is_empty()).collect();
        let mut segments = Vec::with_capacity(parts.len());

        for (index, part) in parts.iter().enumerate() {
            let segment = parse_segment(raw, part)?;
            if matches!(segment, Segment::CatchAll { .. }) && index + 1 != parts.len() {
                return Err(RouteError::CatchAllNotLast {
                    template: raw.to_owned(),
                });
            }
            segments.push(segment);
        }

        let specificity = specificity_of(&segments);
        Ok(Self {
            raw: raw.to_owned(),
            segments,
            specificity,
        })
    }

    /// Returns the template text as declared.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the parsed segments.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns the specificity key.
    pub const fn specificity(&self) -> Specificity {
        self.specificity
    }

    /// Returns `true` for the empty template.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Matches the template against the start of `path`.
    ///
    /// On success returns the number of path segments consumed and appends
    /// captures to `params`. On failure `params` is left unchanged.
    pub fn match_prefix(&self, path: &[&str], params: &mut Params) -> Option<usize> {
        let mark = params.len();
        let mut consumed = 0;

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => {
                    if path.get(consumed) != Some(&text.as_str()) {
                        params.truncate(mark);
                        return None;
                    }
                    consumed += 1;
                }
                Segment::Param { name, pattern } => {
                    let Some(value) = path.get(consumed) else {
                        params.truncate(mark);
                        return None;
                    };
                    if pattern.as_ref().is_some_and(|p| !p.is_match(value)) {
                        params.truncate(mark);
                        return None;
                    }
                    params.push(name.clone(), *value);
                    consumed += 1;
                }
                Segment::CatchAll { name, allow_empty } => {
                    let rest = &path[consumed..];
                    if rest.is_empty() && !allow_empty {
                        params.truncate(mark);
                        return None;
                    }
                    params.push(name.clone(), rest.join("/"));
                    consumed = path.len();
                }
            }
        }

        Some(consumed)
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn parse_segment(template: &str, part: &str) -> RouteResult<Segment> {
    if let Some(name) = part.strip_prefix('*') {
        if name.is_empty() {
            return Err(RouteError::EmptyParamName {
                template: template.to_owned(),
            });
        }
        return Ok(Segment::CatchAll {
            name: name.to_owned(),
            allow_empty: true,
        });
    }

    let Some(inner) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) else {
        if part.contains('{') || part.contains('}') {
            return Err(RouteError::UnbalancedBraces {
                template: template.to_owned(),
                segment: part.to_owned(),
            });
        }
        return Ok(Segment::Literal(part.to_owned()));
    };

    let (name, pattern) = match inner.split_once(':') {
        Some((name, pattern)) => (name.trim(), Some(pattern.trim())),
        None => (inner.trim(), None),
    };
    if name.is_empty() {
        return Err(RouteError::EmptyParamName {
            template: template.to_owned(),
        });
    }

    match pattern {
        None | Some("") => Ok(Segment::Param {
            name: name.to_owned(),
            pattern: None,
        }),
        Some(".*") => Ok(Segment::CatchAll {
            name: name.to_owned(),
            allow_empty: true,
        }),
        Some(".+") => Ok(Segment::CatchAll {
            name: name.to_owned(),
            allow_empty: false,
        }),
        Some(pattern) => {
            let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|source| {
                RouteError::InvalidPattern {
                    template: template.to_owned(),
                    name: name.to_owned(),
                    source,
                }
            })?;
            Ok(Segment::Param {
                name: name.to_owned(),
                pattern: Some(regex),
            })
        }
    }
}

fn specificity_of(segments: &[Segment]) -> Specificity {
    let mut key = Specificity {
        literal_chars: 0,
        catch_all: false,
        free_params: 0,
        constrained_params: 0,
    };
    for segment in segments {
        match segment {
            Segment::Literal(text) => key.literal_chars += text.len(),
            Segment::Param { pattern: None, .. } => key.free_params += 1,
            Segment::Param { pattern: Some(_), .. } => key.constrained_params += 1,
            Segment::CatchAll { .. } => key.catch_all = true,
        }
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> PathTemplate {
        PathTemplate::parse(raw).unwrap()
    }

    #[test]
    fn test_parse_segments() {
        let template = parse("/users/{id}/files/*path");
        assert_eq!(template.segments().len(), 4);
        assert!(matches!(&template.segments()[0], Segment::Literal(s) if s == "users"));
        assert!(matches!(&template.segments()[1], Segment::Param { name, pattern: None } if name == "id"));
        assert!(matches!(&template.segments()[3], Segment::CatchAll { name, .. } if name == "path"));
    }

    #[test]
    fn test_empty_template() {
        for raw in ["", "/", "//"] {
            let template = parse(raw);
            assert!(template.is_empty());
            assert_eq!(template.match_prefix(&["x"], &mut Params::new()), Some(0));
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            PathTemplate::parse("/a/{id"),
            Err(RouteError::UnbalancedBraces { .. })
        ));
        assert!(matches!(
            PathTemplate::parse("/a/{}"),
            Err(RouteError::EmptyParamName { .. })
        ));
        assert!(matches!(
            PathTemplate::parse("/a/{id: [}"),
            Err(RouteError::InvalidPattern { .. })
        ));
        assert!(matches!(
            PathTemplate::parse("/a/*rest/b"),
            Err(RouteError::CatchAllNotLast { .. })
        ));
    }

    #[test]
    fn test_regex_is_anchored() {
        let template = parse("/{id: \\d+}");
        assert_eq!(template.match_prefix(&["12"], &mut Params::new()), Some(1));
        assert_eq!(template.match_prefix(&["12a"], &mut Params::new()), None);
    }

    #[test]
    fn test_failed_match_leaves_params_untouched() {
        let template = parse("/{a}/{b}/end");
        let mut params = Params::new();
        params.push("keep", "me");
        assert_eq!(template.match_prefix(&["1", "2", "other"], &mut params), None);
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_catch_all_variants() {
        let any = parse("/files/{path: .*}");
        let mut params = Params::new();
        assert_eq!(any.match_prefix(&["files"], &mut params), Some(1));
        assert_eq!(params.get("path"), Some(""));

        let some = parse("/files/{path: .+}");
        assert_eq!(some.match_prefix(&["files"], &mut Params::new()), None);

        let mut params = Params::new();
        assert_eq!(some.match_prefix(&["files", "a", "b.txt"], &mut params), Some(3));
        assert_eq!(params.get("path"), Some("a/b.txt"));
    }

    #[test]
    fn test_specificity_order() {
        let fixed = parse("/a/fixed").specificity();
        let param = parse("/a/{id}").specificity();
        let constrained = parse("/a/{id: \\d+}").specificity();
        let catch_all = parse("/a/*rest").specificity();

        assert!(fixed < param);
        assert!(constrained < param);
        assert!(param < catch_all);
    }
}
