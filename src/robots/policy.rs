//! Robots.txt rules for one host
//!
//! Allow/disallow matching is delegated to the robotstxt crate. Crawl-delay
//! is not part of that matcher and is read here from the user-agent groups.

use robotstxt::DefaultMatcher;

#[derive(Debug, Clone, PartialEq)]
pub struct RobotsPolicy {
    /// Raw robots.txt body; empty means allow all
    content: String,
    groups: Vec<AgentGroup>,
}

#[derive(Debug, Clone, PartialEq)]
struct AgentGroup {
    agents: Vec<String>,
    crawl_delay: Option<f64>,
}

impl RobotsPolicy {
    /// Parses the body of a robots.txt response
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            groups: parse_groups(content),
        }
    }

    /// The policy used when a host has no robots.txt (or it was unfetchable)
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            groups: Vec::new(),
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Checks whether `url` may be fetched by `user_agent`
    ///
    /// `url` may be a full URL or a path with optional query.
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.content.trim().is_empty() {
            return true;
        }
        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }

    /// Crawl-delay in seconds for `user_agent`, preferring its own group over `*`
    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        let agent = user_agent.to_lowercase();

        let specific = self
            .groups
            .iter()
            .filter(|g| {
                g.agents
                    .iter()
                    .any(|a| !a.is_empty() && a != "*" && agent.contains(a.as_str()))
            })
            .find_map(|g| g.crawl_delay);

        specific.or_else(|| {
            self.groups
                .iter()
                .filter(|g| g.agents.iter().any(|a| a == "*"))
                .find_map(|g| g.crawl_delay)
        })
    }
}

/// Splits robots.txt into user-agent groups
///
/// Consecutive `User-agent` lines share one group; the first rule line after
/// them closes the list of agents.
fn parse_groups(content: &str) -> Vec<AgentGroup> {
    let mut groups: Vec<AgentGroup> = Vec::new();
    let mut collecting_agents = false;

    for raw in content.lines() {
        let line = raw.split('#').next().unwrap_or("").trim();
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();

        match key.as_str() {
            "user-agent" => {
                if !collecting_agents || groups.is_empty() {
                    groups.push(AgentGroup {
                        agents: Vec::new(),
                        crawl_delay: None,
                    });
                    collecting_agents = true;
                }
                if let Some(group) = groups.last_mut() {
                    group.agents.push(value.to_lowercase());
                }
            }
            "crawl-delay" => {
                collecting_agents = false;
                if let (Some(group), Ok(delay)) = (groups.last_mut(), value.parse::<f64>()) {
                    if delay.is_finite() && delay >= 0.0 {
                        group.crawl_delay = Some(delay);
                    }
                }
            }
            _ => collecting_agents = false,
        }
    }

    groups
}
