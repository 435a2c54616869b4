//! robots.txt group handling
//!
//! Allow/disallow matching is delegated to the `robotstxt` crate; the
//! `Crawl-delay` directive is not exposed by that crate and is parsed by
//! hand here.

use robotstxt::DefaultMatcher;
use std::time::Duration;

/// The rules of a robots.txt file as they apply to one user agent.
///
/// A group is selected once per domain, before crawling starts, and is
/// read-only thereafter.
#[derive(Debug, Clone)]
pub struct RobotsGroup {
    /// Raw robots.txt body; matching re-parses it on demand
    content: String,
    /// The user agent the group was selected for
    user_agent: String,
    /// Crawl-delay applying to that user agent, zero when unspecified
    crawl_delay: Duration,
}

impl RobotsGroup {
    /// Selects the group applying to `user_agent` from a robots.txt body.
    ///
    /// A group applies when one of its `User-agent` lines is `*` or a
    /// substring of the (case-folded) user agent. Returns `None` when no
    /// group applies, not even a wildcard one.
    pub fn find(content: &str, user_agent: &str) -> Option<Self> {
        if !has_matching_group(content, user_agent) {
            return None;
        }
        let crawl_delay = group_crawl_delay(content, user_agent)
            .map(Duration::from_secs_f64)
            .unwrap_or(Duration::ZERO);
        Some(Self {
            content: content.to_string(),
            user_agent: user_agent.to_string(),
            crawl_delay,
        })
    }

    /// Tests whether a path (with query, if any) may be fetched
    pub fn test(&self, path: &str) -> bool {
        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, &self.user_agent, path)
    }

    /// The Crawl-delay advertised for this group's user agent
    pub fn crawl_delay(&self) -> Duration {
        self.crawl_delay
    }
}

/// Walks the `User-agent` lines of a robots.txt body looking for one that
/// applies to `user_agent`
fn has_matching_group(content: &str, user_agent: &str) -> bool {
    let normalized = user_agent.to_lowercase();
    directives(content).any(|(key, value)| {
        key == "user-agent" && {
            let agent = value.to_lowercase();
            agent == "*" || (!agent.is_empty() && normalized.contains(&agent))
        }
    })
}

/// Extracts the Crawl-delay applying to `user_agent`, in seconds.
///
/// Groups are tracked as runs of consecutive `User-agent` lines followed by
/// rule lines; a delay found in a group naming the agent specifically wins
/// over one found in a wildcard group.
fn group_crawl_delay(content: &str, user_agent: &str) -> Option<f64> {
    let normalized = user_agent.to_lowercase();
    let mut current_agents: Vec<String> = Vec::new();
    let mut in_rules = false;
    let mut wildcard_delay: Option<f64> = None;
    let mut agent_delay: Option<f64> = None;

    for (key, value) in directives(content) {
        match key.as_str() {
            "user-agent" => {
                if in_rules {
                    current_agents.clear();
                    in_rules = false;
                }
                current_agents.push(value.to_lowercase());
            }
            "crawl-delay" => {
                in_rules = true;
                if let Ok(delay) = value.parse::<f64>() {
                    if current_agents
                        .iter()
                        .any(|a| !a.is_empty() && a != "*" && normalized.contains(a))
                    {
                        agent_delay = Some(delay);
                    } else if current_agents.iter().any(|a| a == "*") {
                        wildcard_delay = Some(delay);
                    }
                }
            }
            _ => {
                in_rules = true;
            }
        }
    }

    agent_delay.or(wildcard_delay)
}

/// Yields `(lowercased key, value)` directive pairs, skipping comments and
/// blank lines
fn directives(content: &str) -> impl Iterator<Item = (String, String)> + '_ {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            line.split_once(':')
                .map(|(key, value)| (key.trim().to_lowercase(), value.trim().to_string()))
        })
}
