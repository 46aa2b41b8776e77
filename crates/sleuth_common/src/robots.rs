//! robots.txt rules
//!
//! Only the subset needed to decide whether a single path may be fetched:
//! `User-agent` groups with `Allow` / `Disallow` prefixes. The longest
//! matching prefix wins; ties go to `Allow`.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RobotsRules {
    allow: Vec<String>,
    disallow: Vec<String>,
}

impl RobotsRules {
    /// Rules that allow everything (missing or unreadable robots.txt)
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Parse robots.txt for `agent`. A group naming the agent takes
    /// precedence over the `*` group.
    pub fn parse(content: &str, agent: &str) -> Self {
        let agent = agent.to_lowercase();
        let product = agent.split('/').next().unwrap_or("").trim().to_string();

        let mut specific = RobotsRules::default();
        let mut wildcard = RobotsRules::default();
        let mut matched_specific = false;

        // Agents of the group currently being read
        let mut group_agents: Vec<String> = Vec::new();
        let mut in_rules = false;

        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    if in_rules {
                        group_agents.clear();
                        in_rules = false;
                    }
                    group_agents.push(value.to_lowercase());
                }
                "allow" | "disallow" => {
                    in_rules = true;
                    let is_specific = !product.is_empty()
                        && group_agents
                            .iter()
                            .any(|a| a != "*" && product.contains(a.as_str()));
                    let is_wildcard = group_agents.iter().any(|a| a == "*");

                    let target = if is_specific {
                        matched_specific = true;
                        &mut specific
                    } else if is_wildcard {
                        &mut wildcard
                    } else {
                        continue;
                    };

                    // Empty Disallow means allow everything
                    if value.is_empty() {
                        continue;
                    }
                    if key == "allow" {
                        target.allow.push(value.to_string());
                    } else {
                        target.disallow.push(value.to_string());
                    }
                }
                _ => {}
            }
        }

        if matched_specific {
            specific
        } else {
            wildcard
        }
    }

    /// Whether `path` (path + query of a URL) may be fetched
    pub fn is_allowed(&self, path: &str) -> bool {
        let longest = |rules: &[String]| {
            rules
                .iter()
                .filter(|prefix| path.starts_with(prefix.trim_end_matches('*')))
                .map(|prefix| prefix.len())
                .max()
        };

        match (longest(&self.allow), longest(&self.disallow)) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(a), Some(d)) => a >= d,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROBOTS: &str = "\
User-agent: *
Disallow: /private/
Allow: /private/public-note
Disallow: /tmp

User-agent: sleuth
Disallow: /no-bots/
";

    #[test]
    fn test_wildcard_group() {
        let rules = RobotsRules::parse(ROBOTS, "OtherBot/1.0");
        assert!(rules.is_allowed("/index.html"));
        assert!(!rules.is_allowed("/private/secret"));
        assert!(rules.is_allowed("/private/public-note"));
        assert!(!rules.is_allowed("/tmp/file"));
    }

    #[test]
    fn test_specific_group_wins() {
        let rules = RobotsRules::parse(ROBOTS, "Sleuth/0.4.0 (+https://example.org)");
        assert!(!rules.is_allowed("/no-bots/page"));
        // The wildcard group no longer applies
        assert!(rules.is_allowed("/private/secret"));
    }

    #[test]
    fn test_empty_disallow_allows_all() {
        let rules = RobotsRules::parse("User-agent: *\nDisallow:\n", "x");
        assert!(rules.is_allowed("/anything"));
        assert!(RobotsRules::allow_all().is_allowed("/"));
    }

    #[test]
    fn test_comments_ignored() {
        let rules = RobotsRules::parse("# hello\nUser-agent: * # all\nDisallow: /a # no\n", "x");
        assert!(!rules.is_allowed("/a/b"));
        assert!(rules.is_allowed("/b"));
    }
}
