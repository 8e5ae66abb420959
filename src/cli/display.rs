//! Display formatting for CLI output
//!
//! SBIO pattern: Pure functions that format data for display

use chrono::{DateTime, Utc};

use super::commands::ValidationResult;
use crate::cluster::{Node, Pod};

// ============================================================================
// Table formatting helpers
// ============================================================================

/// Format a simple table with headers and rows
pub fn format_table(headers: &[&str], rows: Vec<Vec<String>>) -> String {
    if rows.is_empty() {
        return "No resources found.\n".to_string();
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let mut output = String::new();

    for (i, header) in headers.iter().enumerate() {
        if i > 0 {
            output.push_str("   ");
        }
        output.push_str(&format!(
            "{:width$}",
            header.to_uppercase(),
            width = widths[i]
        ));
    }
    output.push('\n');

    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i > 0 {
                output.push_str("   ");
            }
            if i < widths.len() {
                output.push_str(&format!("{:width$}", cell, width = widths[i]));
            } else {
                output.push_str(cell);
            }
        }
        output.push('\n');
    }

    output
}

/// Compact age like `42s`, `7m`, `3h` or `2d`
pub fn format_age(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - created_at).num_seconds().max(0);
    match secs {
        0..=59 => format!("{}s", secs),
        60..=3599 => format!("{}m", secs / 60),
        3600..=86_399 => format!("{}h", secs / 3600),
        _ => format!("{}d", secs / 86_400),
    }
}

/// Container ids are long; tables show the first 12 characters like docker does
fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

// ============================================================================
// Pod display
// ============================================================================

/// Format pod list for display
pub fn format_pod_list(pods: &[Pod]) -> String {
    let now = Utc::now();
    let headers = &["ID", "NAME", "IMAGE", "NODE", "STATUS", "AGE"];
    let rows: Vec<Vec<String>> = pods
        .iter()
        .map(|p| {
            vec![
                short_id(&p.id).to_string(),
                p.name.clone(),
                p.image.clone(),
                p.node_name.clone().unwrap_or_else(|| "<none>".to_string()),
                format!("{:?}", p.state),
                format_age(p.created_at, now),
            ]
        })
        .collect();

    format_table(headers, rows)
}

/// Format a single pod for display
pub fn format_pod_detail(pod: &Pod) -> String {
    let mut output = String::new();

    output.push_str(&format!("ID:       {}\n", pod.id));
    output.push_str(&format!("Name:     {}\n", pod.name));
    output.push_str(&format!("Image:    {}\n", pod.image));
    output.push_str(&format!(
        "Node:     {}\n",
        pod.node_name.as_deref().unwrap_or("<none>")
    ));
    output.push_str(&format!("Status:   {:?}\n", pod.state));
    output.push_str(&format!("Created:  {}\n", pod.created_at.to_rfc3339()));

    if let Some(message) = &pod.message {
        output.push_str(&format!("Message:  {}\n", message));
    }

    output
}

// ============================================================================
// Node display
// ============================================================================

/// Format node list for display
pub fn format_node_list(nodes: &[Node]) -> String {
    let headers = &["NAME", "CAPACITY", "USED", "AVAILABLE", "LEAKED"];
    let rows: Vec<Vec<String>> = nodes
        .iter()
        .map(|n| {
            vec![
                n.name.clone(),
                n.capacity.to_string(),
                n.used.to_string(),
                n.available().to_string(),
                n.leaked.to_string(),
            ]
        })
        .collect();

    format_table(headers, rows)
}

// ============================================================================
// Validation display
// ============================================================================

/// Format validation result for display
pub fn format_validation_result(result: &ValidationResult, path: &str) -> String {
    let mut output = String::new();

    match (&result.config, &result.error) {
        (Some(config), _) if result.valid => {
            output.push_str(&format!("✓ {} is valid\n\n", path));
            output.push_str(&format!("  Runtime:  {:?}\n", config.runtime));
            output.push_str(&format!("  Capacity: {}\n\n", config.total_capacity()));
            let nodes: Vec<Node> = config
                .nodes
                .iter()
                .map(|n| Node {
                    name: n.name.clone(),
                    capacity: n.capacity,
                    used: 0,
                    leaked: 0,
                })
                .collect();
            output.push_str(&format_node_list(&nodes));
        }
        (_, error) => {
            output.push_str(&format!("✗ {} is invalid\n\n", path));
            if let Some(error) = error {
                output.push_str(&format!("  Error: {}\n", error));
            }
        }
    }

    output
}

// ============================================================================
// Cluster status display
// ============================================================================

/// Format cluster status for display
pub fn format_cluster_status(status: &serde_json::Value) -> String {
    let mut output = String::new();

    output.push_str("Cluster Status\n");
    output.push_str("==============\n\n");

    if let Some(runtime) = status["runtime"].as_str() {
        output.push_str(&format!("Runtime:  {}\n", runtime));
    }

    if let Some(stats) = status.get("stats") {
        output.push_str(&format!(
            "Nodes:    {}\n",
            stats["nodes"].as_u64().unwrap_or(0)
        ));
        output.push_str(&format!(
            "Capacity: {}/{} used ({} leaked)\n",
            stats["used"].as_u64().unwrap_or(0),
            stats["capacity"].as_u64().unwrap_or(0),
            stats["leaked"].as_u64().unwrap_or(0)
        ));
        output.push_str(&format!(
            "Pods:     {} running, {} deleting, {} failed\n",
            stats["running"].as_u64().unwrap_or(0),
            stats["deleting"].as_u64().unwrap_or(0),
            stats["failed"].as_u64().unwrap_or(0)
        ));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::PodSpec;
    use crate::config::ClusterConfig;
    use crate::runtime::WorkloadHandle;
    use chrono::Duration;

    #[test]
    fn test_format_table() {
        let headers = &["NAME", "AGE"];
        let rows = vec![
            vec!["Alice".to_string(), "30".to_string()],
            vec!["Bob".to_string(), "25".to_string()],
        ];

        let output = format_table(headers, rows);
        assert!(output.contains("NAME"));
        assert!(output.contains("Alice"));
        assert!(output.contains("Bob"));
    }

    #[test]
    fn test_format_table_empty() {
        let output = format_table(&["NAME"], vec![]);
        assert!(output.contains("No resources found"));
    }

    #[test]
    fn test_format_age() {
        let now = Utc::now();
        assert_eq!(format_age(now - Duration::seconds(5), now), "5s");
        assert_eq!(format_age(now - Duration::minutes(7), now), "7m");
        assert_eq!(format_age(now - Duration::hours(3), now), "3h");
        assert_eq!(format_age(now - Duration::days(2), now), "2d");
        assert_eq!(format_age(now + Duration::seconds(5), now), "0s");
    }

    #[test]
    fn test_format_pod_list_shortens_ids() {
        let pod = Pod::running(
            &WorkloadHandle::new("0123456789abcdef0123"),
            &PodSpec::new("web", "nginx"),
            "node1",
        );

        let output = format_pod_list(&[pod]);
        assert!(output.contains("0123456789ab "));
        assert!(!output.contains("0123456789abc"));
        assert!(output.contains("Running"));
    }

    #[test]
    fn test_format_pod_detail_shows_failure() {
        let pod = Pod::running(&WorkloadHandle::new("abc"), &PodSpec::new("web", "nginx"), "node2")
            .with_failure("remove failed");

        let output = format_pod_detail(&pod);
        assert!(output.contains("Failed"));
        assert!(output.contains("remove failed"));
        assert!(output.contains("node2"));
    }

    #[test]
    fn test_format_node_list() {
        let nodes = vec![Node {
            name: "node1".to_string(),
            capacity: 2,
            used: 1,
            leaked: 0,
        }];

        let output = format_node_list(&nodes);
        assert!(output.contains("AVAILABLE"));
        assert!(output.contains("node1"));
    }

    #[test]
    fn test_format_validation_valid() {
        let result = ValidationResult {
            valid: true,
            config: Some(ClusterConfig::default()),
            error: None,
        };

        let output = format_validation_result(&result, "config.yaml");
        assert!(output.contains("✓"));
        assert!(output.contains("Capacity: 6"));
        assert!(output.contains("node3"));
    }

    #[test]
    fn test_format_validation_invalid() {
        let result = ValidationResult {
            valid: false,
            config: None,
            error: Some("Config must declare at least one node".to_string()),
        };

        let output = format_validation_result(&result, "config.yaml");
        assert!(output.contains("✗"));
        assert!(output.contains("at least one node"));
    }

    #[test]
    fn test_format_cluster_status() {
        let status = serde_json::json!({
            "status": "ok",
            "runtime": "simulated",
            "stats": {"nodes": 3, "capacity": 6, "used": 2, "leaked": 0,
                      "pods": 2, "running": 2, "deleting": 0, "failed": 0}
        });

        let output = format_cluster_status(&status);
        assert!(output.contains("simulated"));
        assert!(output.contains("2/6 used"));
    }
}
