//! Routes command implementation
//!
//! Shows which channels each configured check notifies, and through which
//! rule.

use super::load_config;
use crate::cli::args::OutputFormat;
use crate::cli::output::{print_output, CheckRoutes, RouteEntry, RouteList};
use crate::error::Result;
use crate::services::Setup;

/// Execute the routes command
pub fn run_routes(check: Option<&str>, config_path: Option<&str>, format: OutputFormat) -> Result<()> {
    let config = load_config(config_path)?;
    let setup = Setup::from_config(&config)?;

    print_output(&route_list(&setup, check), format)?;
    Ok(())
}

/// Resolve the routes of every configured check, or of one check
///
/// A check that is not configured has no tags and therefore no routes.
pub fn route_list(setup: &Setup, filter: Option<&str>) -> RouteList {
    setup.router.with_index(|index| {
        let ids: Vec<&str> = match filter {
            Some(id) => vec![id],
            None => index.checks().collect(),
        };

        let checks = ids
            .into_iter()
            .map(|id| {
                let routes = index
                    .routes_for(id)
                    .iter()
                    .filter_map(|route| {
                        let channel = setup.recipients.channel(&route.channel_id)?;
                        Some(RouteEntry {
                            check: id.to_string(),
                            rule: route.rule_id.clone(),
                            channel: channel.id.clone(),
                            contact: channel.contact_id.clone(),
                            kind: channel.kind.clone(),
                            address: channel.address.clone(),
                        })
                    })
                    .collect();

                CheckRoutes {
                    check: id.to_string(),
                    tags: index
                        .tags_for(id)
                        .map(|tags| tags.iter().cloned().collect())
                        .unwrap_or_default(),
                    routes,
                }
            })
            .collect();

        RouteList { checks }
    })
}
