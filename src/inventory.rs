use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::str::FromStr;

/// Tag that selects every host; it may not appear in an inventory.
pub const ALL_TAG: &str = "all";

/// Hosts (IPs or hostnames) mapped to free-form tags.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Inventory {
    pub hosts: BTreeMap<String, Vec<String>>,
}

impl Inventory {
    pub fn from_reader(rdr: impl Read) -> Result<Self> {
        serde_json::from_reader(rdr).context("Failed to decode inventory")
    }

    /// Tag → hosts carrying that tag.
    pub fn hosts_by_tag(&self) -> BTreeMap<String, Vec<String>> {
        let mut by_tag: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (host, tags) in &self.hosts {
            for tag in tags {
                let hosts = by_tag.entry(tag.clone()).or_default();
                if !hosts.contains(host) {
                    hosts.push(host.clone());
                }
            }
        }
        by_tag
    }

    /// Keep only hosts with a selected tag, and only the selected tags on them.
    pub fn select(&self, selection: &TagSelection) -> Result<Inventory> {
        if self.hosts.values().flatten().any(|t| t == ALL_TAG) {
            bail!("reserved keyword '{}' cannot be an inventory tag", ALL_TAG);
        }
        let hosts: BTreeMap<String, Vec<String>> = self
            .hosts
            .iter()
            .filter_map(|(host, tags)| {
                let kept: Vec<String> = tags
                    .iter()
                    .filter(|t| selection.contains(t))
                    .cloned()
                    .collect();
                (!kept.is_empty()).then(|| (host.clone(), kept))
            })
            .collect();

        if let TagSelection::Only(wanted) = selection {
            let found: BTreeSet<&String> = hosts.values().flatten().collect();
            let missing: Vec<&str> = wanted
                .iter()
                .filter(|t| !found.contains(t))
                .map(String::as_str)
                .collect();
            if !missing.is_empty() {
                bail!("tags not defined in inventory: {}", missing.join(", "));
            }
        }
        if hosts.is_empty() {
            bail!("no hosts in inventory");
        }
        Ok(Inventory { hosts })
    }
}

impl FromStr for Inventory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_reader(s.as_bytes())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TagSelection {
    All,
    Only(BTreeSet<String>),
}

impl TagSelection {
    pub fn only(tag: &str) -> Self {
        TagSelection::Only(BTreeSet::from([tag.to_string()]))
    }

    pub fn contains(&self, tag: &str) -> bool {
        match self {
            TagSelection::All => true,
            TagSelection::Only(tags) => tags.contains(tag),
        }
    }
}

impl std::fmt::Display for TagSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TagSelection::All => f.write_str(ALL_TAG),
            TagSelection::Only(tags) => {
                let tags: Vec<&str> = tags.iter().map(String::as_str).collect();
                f.write_str(&tags.join(", "))
            }
        }
    }
}

impl FromStr for TagSelection {
    type Err = anyhow::Error;

    /// Comma separated tags. `all` stands alone.
    fn from_str(s: &str) -> Result<Self> {
        let tags: BTreeSet<String> = s
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        if tags.is_empty() {
            bail!("no tags given");
        }
        if tags.contains(ALL_TAG) {
            if tags.len() > 1 {
                bail!("cannot use '{}' tag alongside others", ALL_TAG);
            }
            return Ok(TagSelection::All);
        }
        Ok(TagSelection::Only(tags))
    }
}
