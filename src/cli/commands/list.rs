//! List reports command implementation

use super::{EXIT_CONFIG, EXIT_OK};
use crate::core::reports::ReportRegistry;
use clap::Args;

/// Arguments for the list-reports command
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only list the members of this group
    #[arg(short, long)]
    pub group: Option<String>,
}

impl ListArgs {
    /// Execute the list-reports command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        let registry = ReportRegistry::standard();
        match render(&registry, self.group.as_deref()) {
            Ok(listing) => {
                print!("{listing}");
                Ok(EXIT_OK)
            }
            Err(e) => {
                eprintln!("{e}");
                Ok(EXIT_CONFIG)
            }
        }
    }
}

fn render(registry: &ReportRegistry, only: Option<&str>) -> anyhow::Result<String> {
    let mut out = String::new();

    if let Some(group) = only {
        if registry.group(group).is_none() {
            anyhow::bail!("Unknown report group '{group}'");
        }
    }

    for (group, members) in registry.groups() {
        if only.is_some_and(|g| g != group.as_str()) {
            continue;
        }
        out.push_str(&format!("{group}:\n"));
        for name in members {
            let description = registry
                .get(name)
                .map(|unit| unit.description())
                .unwrap_or_default();
            out.push_str(&format!("  {:<26} {description}\n", name.as_str()));
        }
        out.push('\n');
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_all_groups() {
        let out = render(&ReportRegistry::standard(), None).unwrap();
        assert!(out.contains("monthly:\n"));
        assert!(out.contains("inventory:\n"));
        assert!(out.contains("po:\n"));
        assert!(out.contains("  dead_inventory"));
    }

    #[test]
    fn test_render_single_group() {
        let out = render(&ReportRegistry::standard(), Some("po")).unwrap();
        assert!(out.starts_with("po:\n"));
        assert!(out.contains("open_po"));
        assert!(!out.contains("daily_sales"));
    }

    #[test]
    fn test_render_unknown_group() {
        assert!(render(&ReportRegistry::standard(), Some("weekly")).is_err());
    }
}
