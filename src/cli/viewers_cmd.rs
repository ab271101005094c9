//! `eview viewers`

use super::output::Output;
use crate::storage::Config;

pub fn list(output: &Output, config: &Config) {
    if output.is_json() {
        let items: Vec<_> = config
            .viewers
            .iter()
            .map(|v| {
                serde_json::json!({
                    "key": v.key,
                    "title": v.label(),
                    "extensions": v.extensions,
                })
            })
            .collect();
        output.data(&items);
        return;
    }

    println!("{:<16} {:<16} EXTENSIONS", "KEY", "TITLE");
    println!("{}", "-".repeat(50));
    for viewer in &config.viewers {
        let extensions = if viewer.extensions.is_empty() {
            "-".to_string()
        } else {
            viewer
                .extensions
                .iter()
                .map(|e| format!(".{}", e))
                .collect::<Vec<_>>()
                .join(" ")
        };
        println!("{:<16} {:<16} {}", viewer.key, viewer.label(), extensions);
    }
}
