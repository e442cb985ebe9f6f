use regex::Regex;
use std::sync::OnceLock;

/// Pattern and replacement, applied in order.
struct Rule {
    pattern: Regex,
    replacement: &'static str,
}

static RULES: OnceLock<Vec<Rule>> = OnceLock::new();

const RULE_SOURCES: &[(&str, &str)] = &[
    // JWTs first, before the bearer rule swallows them
    (r"\beyJ[a-zA-Z0-9_-]+\.[a-zA-Z0-9_-]+\.[a-zA-Z0-9_-]*", "[REDACTED]"),
    (r"Bearer\s+[a-zA-Z0-9\-_\.~+/]+=*", "Bearer [REDACTED]"),
    (
        r#"(?i)\b(client_secret|password|passwd|pwd|access_token|refresh_token)"?\s*[:=]\s*"?[^\s"&,}]+"?"#,
        "$1=[REDACTED]",
    ),
    (r"\b(sk_|pk_|api_|key_)[a-zA-Z0-9_]{15,}\b", "[REDACTED]"),
    // Keep the domain visible
    (r"\b([a-zA-Z0-9._%+-]+)@([a-zA-Z0-9.-]+\.[a-zA-Z]{2,})\b", "***@$2"),
    (r"\b(\d{1,3})\.(\d{1,3})\.(\d{1,3})\.(\d{1,3})\b", "$1.$2.x.x"),
];

fn rules() -> &'static [Rule] {
    RULES.get_or_init(|| {
        RULE_SOURCES
            .iter()
            .filter_map(|(source, replacement)| {
                Regex::new(source).ok().map(|pattern| Rule {
                    pattern,
                    replacement,
                })
            })
            .collect()
    })
}

/// Mask secrets and personal data in free text before it is logged.
///
/// Covers bearer tokens and JWTs, credential fields (`client_secret=`,
/// `password:` and the like), API keys, e-mail addresses (shown as
/// `***@domain`) and IPv4 addresses (shown as `a.b.x.x`).
pub fn sanitize_log_message(message: &str) -> String {
    rules().iter().fold(message.to_string(), |acc, rule| {
        rule.pattern.replace_all(&acc, rule.replacement).into_owned()
    })
}
