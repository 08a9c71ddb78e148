//! Robots.txt rules for the catalog host
//!
//! Allow/disallow matching is delegated to the robotstxt crate. Crawl-delay is
//! not part of the standard it implements, so it is read here directly.

use robotstxt::DefaultMatcher;

/// Robots.txt rules for one host
///
/// An empty or missing file allows everything.
#[derive(Debug, Clone, Default)]
pub struct ParsedRobots {
    content: Option<String>,
}

impl ParsedRobots {
    /// Wraps raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        let content = (!content.trim().is_empty()).then(|| content.to_string());
        Self { content }
    }

    /// Rules that allow every path, used when the file cannot be fetched
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Checks whether `url` may be fetched by the crawler named `agent`
    ///
    /// `agent` is the product token (e.g. `CatalogSnapshot`), not the full
    /// User-Agent header.
    pub fn is_allowed(&self, url: &str, agent: &str) -> bool {
        match &self.content {
            None => true,
            Some(content) => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(content, agent, url)
            }
        }
    }

    /// Crawl-delay in seconds that applies to `agent`
    ///
    /// A group naming the agent wins over the `*` group. Groups are matched
    /// on the product token (`TestBot` in `TestBot/1.0`), case-insensitively;
    /// empty User-agent lines name nobody.
    pub fn crawl_delay(&self, agent: &str) -> Option<f64> {
        let content = self.content.as_deref()?;
        let agent = product_token(agent);
        if agent.is_empty() {
            return None;
        }

        let mut group_agents: Vec<&str> = Vec::new();
        let mut in_agent_lines = false;
        let mut wildcard_delay = None;
        let mut agent_delay = None;

        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();

            if key == "user-agent" {
                // Consecutive User-agent lines share one group
                if !in_agent_lines {
                    group_agents.clear();
                }
                let token = if value.starts_with('*') {
                    "*"
                } else {
                    product_token(value)
                };
                if !token.is_empty() {
                    group_agents.push(token);
                }
                in_agent_lines = true;
                continue;
            }
            in_agent_lines = false;

            if key != "crawl-delay" {
                continue;
            }
            let Ok(delay) = value.parse::<f64>() else {
                continue;
            };

            if group_agents.iter().any(|ua| ua.eq_ignore_ascii_case(agent)) {
                agent_delay = Some(delay);
            } else if group_agents.contains(&"*") {
                wildcard_delay = Some(delay);
            }
        }

        agent_delay.or(wildcard_delay)
    }
}

/// Leading run of `[A-Za-z_-]` characters, as robots.txt matching uses
fn product_token(value: &str) -> &str {
    let end = value
        .find(|c: char| !(c.is_ascii_alphabetic() || c == '-' || c == '_'))
        .unwrap_or(value.len());
    &value[..end]
}
