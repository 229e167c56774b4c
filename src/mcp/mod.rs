//! MCP (Model Context Protocol) tool surface.
//!
//! The transport/server shell lives in the host process; this module only
//! defines the tool contract it exposes:
//! - `dcb_compile_project` - compile one project, errors-only result
//! - `dcb_generate_config` - generate a config file from one build log
//! - `dcb_generate_multi_config` - generate from several build logs
//! - `dcb_extend_config` - merge a build log into an existing config
//!
//! Tool results are the serde-serialized result types in
//! [`crate::models`].

use serde::Serialize;

/// Tool definition for the MCP manifest.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDef {
    pub name: &'static str,
    pub description: &'static str,
}

/// Get all available MCP tools.
pub fn get_tools() -> Vec<ToolDef> {
    vec![
        ToolDef {
            name: "dcb_compile_project",
            description: "Compile a Delphi project (.dpr, .dpk, or .dproj) and return parsed \
                          results. Reads build configuration from the .dproj and library paths \
                          from the config file. Returns only errors, filtering warnings and hints.",
        },
        ToolDef {
            name: "dcb_generate_config",
            description: "Generate a delphi_config.toml by parsing an IDE build log. Extracts \
                          library paths, compiler settings, and configuration from a successful \
                          IDE compilation. Uses platform-specific file names by default.",
        },
        ToolDef {
            name: "dcb_generate_multi_config",
            description: "Generate configuration from multiple IDE build logs covering \
                          different configurations (Debug/Release) and platforms \
                          (Win32/Win64/Linux64), unified or one file per platform.",
        },
        ToolDef {
            name: "dcb_extend_config",
            description: "Extend an existing delphi_config.toml with settings from a new IDE \
                          build log. Merges new paths and platforms while preserving existing \
                          settings and skipping duplicates.",
        },
    ]
}

/// Render the MCP tool manifest as JSON.
pub fn manifest() -> String {
    let manifest = serde_json::json!({ "tools": get_tools() });
    serde_json::to_string_pretty(&manifest).expect("manifest serializes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_names_are_namespaced() {
        for tool in get_tools() {
            assert!(tool.name.starts_with("dcb_"));
        }
    }

    #[test]
    fn test_manifest_is_valid_json() {
        let manifest = manifest();
        let parsed: serde_json::Value = serde_json::from_str(&manifest).unwrap();
        assert_eq!(parsed["tools"].as_array().unwrap().len(), 4);
        assert_eq!(parsed["tools"][0]["name"], "dcb_compile_project");
    }
}
