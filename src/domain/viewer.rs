//! Viewer presets
//!
//! A preset pairs a command script with a starter script. The command is
//! called as `cmd SCRIPT_FILE GRAPHIC_FILE` and is expected to write the
//! graphic to its second argument.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ViewerError {
    #[error("Unknown viewer '{0}'. Run 'eview viewers' to list available viewers.")]
    Unknown(String),

    #[error("No viewer handles '{0}'. Pass --viewer to pick one.")]
    NoMatch(String),

    #[error("Invalid viewer: {0}")]
    Invalid(String),
}

const GNUPLOT_CMD: &str = r#"#! /bin/bash

gnuplot -e "set term png; set output '${2}'; load '${1}'"
"#;

const GNUPLOT_SCRIPT: &str = r#"
plot sin(x)
"#;

const TEX2IM_MATH_CMD: &str = r#"#! /bin/bash
# some useful options
# -B INT : set border width in pixels
# -n :     don't insert equation environment (for non-math latex images)
# -t :     text color
# -b :     background color
# -z :     transparent background

tex2im "${1}" -o "${2}"
"#;

const TEX2IM_MATH_SCRIPT: &str = r#"
\div{\vec{E}} = \rho / \epsilon_0
"#;

const TEX2IM_TIKZ_CMD: &str = r#"#! /bin/bash
# some useful options
# -B INT : set border width in pixels
# -n :     don't insert equation environment (for non-math latex images)
# -t :     text color
# -b :     background color
# -z :     transparent background

tex2im -n -B 10 "${1}" -o "${2}"
"#;

const TEX2IM_TIKZ_SCRIPT: &str = r#"
\begin{tikzpicture}
\draw (0,0) -- (1,1)
\end{tikzpicture}
"#;

const CUSTOM_CMD: &str = r#"#! /bin/bash
SCRIPT_FILE="${1}"
IMAGE_FILE="${2}"
# insert command that will create an image named ${IMAGE_FILE}
bash ${SCRIPT_FILE}
"#;

const CUSTOM_SCRIPT: &str = r#"
# Edit command script to process this file and then edit this file.
echo "Hello World!"
"#;

/// A command template plus the script a new tab starts with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerPreset {
    /// Unique key, used by `--viewer`
    pub key: String,

    /// Tab title
    pub title: String,

    /// Optional group shown before the title (e.g. `tex2im`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    /// Executable command script
    pub command: String,

    /// Starter script
    #[serde(default)]
    pub script: String,

    /// File extensions (without dot) this viewer opens
    #[serde(default)]
    pub extensions: Vec<String>,
}

impl ViewerPreset {
    pub fn new(key: &str, title: &str, command: &str, script: &str) -> Self {
        Self {
            key: key.to_string(),
            title: title.to_string(),
            group: None,
            command: command.to_string(),
            script: script.to_string(),
            extensions: Vec::new(),
        }
    }

    pub fn with_group(mut self, group: &str) -> Self {
        self.group = Some(group.to_string());
        self
    }

    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|e| e.to_string()).collect();
        self
    }

    /// Label for tab bars: `group/title` or just `title`
    pub fn label(&self) -> String {
        match &self.group {
            Some(group) => format!("{}/{}", group, self.title),
            None => self.title.clone(),
        }
    }

    /// Returns true if this viewer opens files with the given extension
    pub fn handles_extension(&self, ext: &str) -> bool {
        let ext = ext.trim_start_matches('.');
        self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
    }

    /// Checks the preset can be run at all
    pub fn validate(&self) -> Result<(), ViewerError> {
        if self.key.trim().is_empty() {
            return Err(ViewerError::Invalid("key must not be empty".to_string()));
        }
        if self.key.chars().any(char::is_whitespace) {
            return Err(ViewerError::Invalid(format!(
                "key '{}' must not contain whitespace",
                self.key
            )));
        }
        if self.command.trim().is_empty() {
            return Err(ViewerError::Invalid(format!(
                "viewer '{}' has an empty command",
                self.key
            )));
        }
        Ok(())
    }
}

/// The presets every installation starts with, in tab order
pub fn builtin_presets() -> Vec<ViewerPreset> {
    vec![
        ViewerPreset::new("gnuplot", "gnuplot", GNUPLOT_CMD, GNUPLOT_SCRIPT)
            .with_extensions(&["gp", "gnuplot"]),
        ViewerPreset::new("tex2im-math", "math", TEX2IM_MATH_CMD, TEX2IM_MATH_SCRIPT)
            .with_group("tex2im")
            .with_extensions(&["tex"]),
        ViewerPreset::new("tex2im-tikz", "tikz", TEX2IM_TIKZ_CMD, TEX2IM_TIKZ_SCRIPT)
            .with_group("tex2im"),
        ViewerPreset::new("custom", "custom", CUSTOM_CMD, CUSTOM_SCRIPT),
    ]
}

/// Merges extra presets into a base list.
///
/// An extra preset with the key of an existing one replaces it in place;
/// new keys are appended in order.
pub fn merge_presets(mut base: Vec<ViewerPreset>, extra: &[ViewerPreset]) -> Vec<ViewerPreset> {
    for preset in extra {
        match base.iter_mut().find(|p| p.key == preset.key) {
            Some(existing) => *existing = preset.clone(),
            None => base.push(preset.clone()),
        }
    }
    base
}

/// Finds the preset with the given key
pub fn find_preset<'a>(
    presets: &'a [ViewerPreset],
    key: &str,
) -> Result<&'a ViewerPreset, ViewerError> {
    presets
        .iter()
        .find(|p| p.key == key)
        .ok_or_else(|| ViewerError::Unknown(key.to_string()))
}

/// Returns the index of the first preset that opens `path`, by extension
pub fn preset_for_path(presets: &[ViewerPreset], path: &Path) -> Option<usize> {
    let ext = path.extension()?.to_str()?;
    presets.iter().position(|p| p.handles_extension(ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn builtin_order_matches_tabs() {
        let keys: Vec<_> = builtin_presets().into_iter().map(|p| p.key).collect();
        assert_eq!(keys, ["gnuplot", "tex2im-math", "tex2im-tikz", "custom"]);
    }

    #[test]
    fn builtin_presets_are_valid() {
        for preset in builtin_presets() {
            preset.validate().unwrap();
            assert!(preset.command.starts_with("#! /bin/bash"));
        }
    }

    #[test]
    fn gnuplot_command_uses_both_arguments() {
        let presets = builtin_presets();
        let gnuplot = find_preset(&presets, "gnuplot").unwrap();
        assert!(gnuplot.command.contains("set output '${2}'"));
        assert!(gnuplot.command.contains("load '${1}'"));
        assert_eq!(gnuplot.script.trim(), "plot sin(x)");
    }

    #[test]
    fn labels_include_group() {
        let presets = builtin_presets();
        assert_eq!(presets[0].label(), "gnuplot");
        assert_eq!(presets[1].label(), "tex2im/math");
        assert_eq!(presets[2].label(), "tex2im/tikz");
    }

    #[test]
    fn gnuplot_extensions_pick_first_tab() {
        let presets = builtin_presets();
        assert_eq!(preset_for_path(&presets, &PathBuf::from("plot.gp")), Some(0));
        assert_eq!(preset_for_path(&presets, &PathBuf::from("a/b.gnuplot")), Some(0));
        assert_eq!(preset_for_path(&presets, &PathBuf::from("PLOT.GP")), Some(0));
    }

    #[test]
    fn tex_picks_math_tab() {
        let presets = builtin_presets();
        assert_eq!(preset_for_path(&presets, &PathBuf::from("eq.tex")), Some(1));
    }

    #[test]
    fn unknown_extension_has_no_preset() {
        let presets = builtin_presets();
        assert_eq!(preset_for_path(&presets, &PathBuf::from("notes.txt")), None);
        assert_eq!(preset_for_path(&presets, &PathBuf::from("Makefile")), None);
    }

    #[test]
    fn find_unknown_preset_fails() {
        let presets = builtin_presets();
        assert_eq!(
            find_preset(&presets, "nope").unwrap_err(),
            ViewerError::Unknown("nope".to_string())
        );
    }

    #[test]
    fn merge_replaces_and_appends() {
        let replacement = ViewerPreset::new("custom", "mine", "#!/bin/sh\ntrue\n", "");
        let extra = ViewerPreset::new("dot", "dot", "#!/bin/sh\ndot -Tpng $1 -o $2\n", "")
            .with_extensions(&["dot"]);

        let merged = merge_presets(builtin_presets(), &[replacement, extra]);

        assert_eq!(merged.len(), 5);
        assert_eq!(merged[3].key, "custom");
        assert_eq!(merged[3].title, "mine");
        assert_eq!(merged[4].key, "dot");
        assert_eq!(preset_for_path(&merged, &PathBuf::from("g.dot")), Some(4));
    }

    #[test]
    fn validate_rejects_empty_command() {
        let preset = ViewerPreset::new("x", "x", "  ", "");
        assert!(matches!(preset.validate(), Err(ViewerError::Invalid(_))));
    }

    #[test]
    fn validate_rejects_bad_key() {
        assert!(ViewerPreset::new("", "x", "true", "").validate().is_err());
        assert!(ViewerPreset::new("a b", "x", "true", "").validate().is_err());
    }
}
