//! Request line grammar.
//!
//! Grammar forms, in precedence order: the modern comma-quoted form
//! `name["object","attribute",...]`, the trap form
//! `trap[server][host][key][value]`, the operation form
//! `jmx_op[object][operation][args]`, the legacy form
//! `jmx[object][attribute]`, `system.property[key]`, `system.env[key]`,
//! `agent.ping` and `agent.version`. The quoted form is unambiguous, so
//! it is always tried first regardless of prefix; everything else is
//! matched by prefix. Lines matching nothing parse as
//! [`Query::Unrecognized`].

use once_cell::sync::Lazy;
use regex::Regex;

/// A parsed inbound request. One query produces one response, then is
/// discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Attribute lookup, from the quoted or the legacy form.
    Attribute { object: String, attribute: String },
    /// Operation invocation. Arguments stay raw until they can be
    /// coerced against the store's declared parameter kinds.
    Operation {
        object: String,
        operation: String,
        args_raw: String,
    },
    SystemProperty { key: String },
    Environment { key: String },
    Ping,
    Version,
    Unrecognized,
}

/// A one-shot push to a remote collector, recognized so the active
/// trapper can be exercised through the passive listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrapPush {
    pub server: String,
    pub host: String,
    pub key: String,
    pub value: String,
}

/// Outcome of parsing one request line: a query to answer, or a trap
/// command to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedRequest {
    Query(Query),
    Trap(TrapPush),
}

static QUOTED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^[A-Za-z0-9._-]+\["(.*?)","(.*?)"(?:,.*)?\]$"#).expect("quoted query pattern")
});

static TRAP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^trap\[([^\]]*)\]\[([^\]]*)\]\[([^\]]*)\]\[([^\]]*)\]$").expect("trap pattern")
});

static OPERATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^jmx_op\[([^\]]*)\]\[([^\]]*)\]\[(.*)\]$").expect("operation pattern"));

// Greedy first group: the attribute is the last bracket pair, the
// object name is everything before it and may itself contain brackets.
static LEGACY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^jmx\[(.*)\]\[([^\[\]]*)\]$").expect("legacy pattern"));

static SYSTEM_PROPERTY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^system\.property\[(.*)\]$").expect("property pattern"));

static SYSTEM_ENV: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^system\.env\[(.*)\]$").expect("env pattern"));

/// Parse one request line.
pub fn parse(line: &str) -> ParsedRequest {
    if let Some(caps) = QUOTED.captures(line) {
        return ParsedRequest::Query(Query::Attribute {
            object: caps[1].to_string(),
            attribute: caps[2].to_string(),
        });
    }

    if line.starts_with("trap[") {
        if let Some(caps) = TRAP.captures(line) {
            return ParsedRequest::Trap(TrapPush {
                server: caps[1].to_string(),
                host: caps[2].to_string(),
                key: caps[3].to_string(),
                value: caps[4].to_string(),
            });
        }
    }

    if line.starts_with("jmx_op[") {
        if let Some(caps) = OPERATION.captures(line) {
            return ParsedRequest::Query(Query::Operation {
                object: caps[1].to_string(),
                operation: caps[2].to_string(),
                args_raw: caps[3].to_string(),
            });
        }
    }

    if line.starts_with("jmx[") {
        if let Some(caps) = LEGACY.captures(line) {
            return ParsedRequest::Query(Query::Attribute {
                object: caps[1].to_string(),
                attribute: caps[2].to_string(),
            });
        }
    }

    if let Some(caps) = SYSTEM_PROPERTY.captures(line) {
        return ParsedRequest::Query(Query::SystemProperty {
            key: caps[1].to_string(),
        });
    }

    if let Some(caps) = SYSTEM_ENV.captures(line) {
        return ParsedRequest::Query(Query::Environment {
            key: caps[1].to_string(),
        });
    }

    ParsedRequest::Query(match line {
        "agent.ping" => Query::Ping,
        "agent.version" => Query::Version,
        _ => Query::Unrecognized,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_query(line: &str) -> Query {
        match parse(line) {
            ParsedRequest::Query(query) => query,
            other => panic!("expected a query for {:?}, got {:?}", line, other),
        }
    }

    #[test]
    fn quoted_form_extracts_both_fields() {
        assert_eq!(
            parse_query(r#"jmx["java.lang:type=Memory","HeapMemoryUsage.used"]"#),
            Query::Attribute {
                object: "java.lang:type=Memory".to_string(),
                attribute: "HeapMemoryUsage.used".to_string(),
            }
        );
    }

    #[test]
    fn quoted_form_ignores_trailing_tokens() {
        assert_eq!(
            parse_query(r#"jmx["obj","attr",60,"extra"]"#),
            Query::Attribute {
                object: "obj".to_string(),
                attribute: "attr".to_string(),
            }
        );
    }

    #[test]
    fn quoted_form_wins_over_prefix_rules() {
        // Any identifier works for the quoted form, including ones that
        // collide with the prefix rules below it.
        assert_eq!(
            parse_query(r#"trap["obj","attr"]"#),
            Query::Attribute {
                object: "obj".to_string(),
                attribute: "attr".to_string(),
            }
        );
    }

    #[test]
    fn trap_form_parses_four_groups() {
        assert_eq!(
            parse("trap[collector.example][web01][load][0.7]"),
            ParsedRequest::Trap(TrapPush {
                server: "collector.example".to_string(),
                host: "web01".to_string(),
                key: "load".to_string(),
                value: "0.7".to_string(),
            })
        );
    }

    #[test]
    fn operation_form_keeps_raw_arguments() {
        assert_eq!(
            parse_query("jmx_op[app:type=Cache][evict][sessions,25]"),
            Query::Operation {
                object: "app:type=Cache".to_string(),
                operation: "evict".to_string(),
                args_raw: "sessions,25".to_string(),
            }
        );
    }

    #[test]
    fn legacy_form_takes_last_two_bracket_pairs() {
        assert_eq!(
            parse_query("jmx[java.lang:type=Compilation][TotalCompilationTime]"),
            Query::Attribute {
                object: "java.lang:type=Compilation".to_string(),
                attribute: "TotalCompilationTime".to_string(),
            }
        );
        // Bracketed object names survive because the first group is
        // greedy; this is also why oddly bracketed lines mis-split.
        assert_eq!(
            parse_query("jmx[domain:name=queue[0]][Depth]"),
            Query::Attribute {
                object: "domain:name=queue[0]".to_string(),
                attribute: "Depth".to_string(),
            }
        );
        assert_eq!(
            parse_query("jmx[a][b][c]"),
            Query::Attribute {
                object: "a][b".to_string(),
                attribute: "c".to_string(),
            }
        );
    }

    #[test]
    fn keyed_forms() {
        assert_eq!(
            parse_query("system.property[java.version]"),
            Query::SystemProperty {
                key: "java.version".to_string()
            }
        );
        assert_eq!(
            parse_query("system.env[PATH]"),
            Query::Environment {
                key: "PATH".to_string()
            }
        );
    }

    #[test]
    fn fixed_forms() {
        assert_eq!(parse_query("agent.ping"), Query::Ping);
        assert_eq!(parse_query("agent.version"), Query::Version);
    }

    #[test]
    fn anything_else_is_unrecognized() {
        assert_eq!(parse_query(""), Query::Unrecognized);
        assert_eq!(parse_query("bogus"), Query::Unrecognized);
        assert_eq!(parse_query("jmx[missing-attribute]"), Query::Unrecognized);
        assert_eq!(parse_query("trap[only][three][groups]"), Query::Unrecognized);
    }
}
