//! Project descriptor (.dproj) parsing.
//!
//! A .dproj is an MSBuild project: settings live in `PropertyGroup` elements
//! gated by `Condition` attributes referencing internal configuration keys
//! (`Base`, `Cfg_1`, `Cfg_1_Win32`, ...). The mapping from human
//! configuration names ("Debug") to those keys is declared by
//! `BuildConfiguration` items. This parser selects the property groups
//! applicable to one platform/configuration pair and folds them, in document
//! order, into a [`ProjectSettings`].
//!
//! XML access uses `roxmltree`; MSBuild's namespace is ignored by matching
//! on local element names.

use crate::models::{Platform, VersionInfo};
use crate::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

/// Settings extracted from a .dproj file for one platform/configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectSettings {
    /// Active build configuration name (e.g. "Debug")
    pub active_config: String,

    /// Active platform
    pub active_platform: Option<Platform>,

    /// Main source file from the MainSource element (e.g. "MyApp.dpr" for
    /// applications, "MyPackage.dpk" for packages)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_source: Option<String>,

    /// Compiler command-line flags derived from DCC_* switch properties
    #[serde(default)]
    pub compiler_flags: Vec<String>,

    /// Conditional defines
    #[serde(default)]
    pub defines: Vec<String>,

    /// Unit search paths
    #[serde(default)]
    pub unit_search_paths: Vec<String>,

    /// Include file paths
    #[serde(default)]
    pub include_paths: Vec<String>,

    /// Resource file paths
    #[serde(default)]
    pub resource_paths: Vec<String>,

    /// Output directory for the executable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,

    /// Output directory for compiled units
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dcu_output_dir: Option<String>,

    /// Namespace prefixes from the project
    #[serde(default)]
    pub namespace_prefixes: Vec<String>,

    /// Version information for resource compilation, when enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_info: Option<VersionInfo>,
}

impl ProjectSettings {
    /// Whether the main source describes a package (.dpk) rather than an
    /// application (.dpr).
    pub fn is_package(&self) -> bool {
        self.main_source
            .as_deref()
            .map(|s| s.to_ascii_lowercase().ends_with(".dpk"))
            .unwrap_or(false)
    }
}

/// Mapping of DCC switch properties to compiler flags.
const DCC_SWITCHES: [(&str, char); 9] = [
    ("DCC_Optimize", 'O'),
    ("DCC_DebugInfoInExe", 'D'),
    ("DCC_LocalDebugSymbols", 'L'),
    ("DCC_SymbolReferenceInfo", 'Y'),
    ("DCC_AssertionsRuntime", 'C'),
    ("DCC_IOChecking", 'I'),
    ("DCC_RangeChecking", 'R'),
    ("DCC_OverflowChecking", 'Q'),
    ("DCC_WriteableConst", 'J'),
];

/// Parses .dproj files to extract build settings and compiler configuration.
pub struct DprojParser {
    source: String,
    project_dir: String,
    project_stem: String,
}

fn msbuild_var_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\(([^)]+)\)").expect("msbuild variable pattern"))
}

impl DprojParser {
    /// Create a parser by reading a .dproj file.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ProjectParse(format!(
                "project file not found: {}",
                path.display()
            )));
        }
        let source = std::fs::read_to_string(path)?;
        let project_dir = path
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        let project_stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            source,
            project_dir,
            project_stem,
        })
    }

    /// Create a parser over in-memory XML, with an explicit project
    /// directory and stem for path and variable resolution.
    pub fn new(source: impl Into<String>, project_dir: &str, project_stem: &str) -> Self {
        Self {
            source: source.into(),
            project_dir: project_dir.to_string(),
            project_stem: project_stem.to_string(),
        }
    }

    /// Parse the descriptor and extract settings for the active (or
    /// overridden) configuration and platform.
    pub fn parse(
        &self,
        override_config: Option<&str>,
        override_platform: Option<Platform>,
    ) -> Result<ProjectSettings> {
        let doc = roxmltree::Document::parse(&self.source)
            .map_err(|e| Error::ProjectParse(format!("invalid .dproj file: {}", e)))?;
        let root = doc.root_element();

        let active_config = override_config
            .map(str::to_string)
            .unwrap_or_else(|| self.default_property(&root, "Configuration", "Debug"));
        let active_platform = override_platform.or_else(|| {
            Platform::parse(&self.default_property(&root, "Platform", "Win32"))
        });

        debug!(config = %active_config, platform = ?active_platform, "resolving project settings");

        let config_key = self
            .config_key_map(&root)
            .get(&active_config)
            .cloned()
            .unwrap_or_else(|| "Cfg_1".to_string());
        let platform_name = active_platform.map(|p| p.as_str()).unwrap_or("Win32");

        let mut settings = ProjectSettings {
            active_config: active_config.clone(),
            active_platform,
            main_source: self.main_source(&root),
            ..Default::default()
        };

        // Conditions applicable to this config/platform pair, from least to
        // most specific. MSBuild evaluates Base before Cfg_N before
        // Cfg_N_Platform; document order preserves that here.
        let matching = [
            "'$(Base)'!=''".to_string(),
            format!("'$(Base_{})'!=''", platform_name),
            format!("'$({})'!=''", config_key),
            format!("'$({}_{})'!=''", config_key, platform_name),
        ];
        let alternates = [
            format!("'$(Config)'=='{}'", active_config),
            format!("'$(Platform)'=='{}'", platform_name),
            format!("'{}|{}'", active_config, platform_name),
        ];

        let mut verinfo = VerInfoAccumulator::default();

        for group in root
            .descendants()
            .filter(|n| n.is_element() && n.tag_name().name() == "PropertyGroup")
        {
            let condition = group.attribute("Condition").unwrap_or("");
            let applies = condition.is_empty()
                || matching.iter().any(|m| condition.contains(m.as_str()))
                || alternates.iter().any(|a| condition.contains(a.as_str()));
            if !applies {
                continue;
            }
            self.fold_property_group(&group, &mut settings, &mut verinfo, platform_name);
        }

        settings.version_info = verinfo.finish();
        Ok(settings)
    }

    /// Read the default value of a top-level property such as
    /// `<Configuration Condition="'$(Configuration)'==''">Debug</Configuration>`.
    fn default_property(&self, root: &roxmltree::Node<'_, '_>, name: &str, fallback: &str) -> String {
        for group in root
            .descendants()
            .filter(|n| n.is_element() && n.tag_name().name() == "PropertyGroup")
        {
            for child in group.children().filter(|c| c.is_element()) {
                if child.tag_name().name() != name {
                    continue;
                }
                let condition = group.attribute("Condition").unwrap_or("");
                let default_guard = format!("'$({})'==''", name);
                if condition.is_empty() || condition.contains(&default_guard) {
                    if let Some(text) = child.text() {
                        if !text.trim().is_empty() {
                            return text.trim().to_string();
                        }
                    }
                }
            }
        }
        fallback.to_string()
    }

    /// Build the map from configuration names to internal Cfg_N keys.
    fn config_key_map(&self, root: &roxmltree::Node<'_, '_>) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        for bc in root
            .descendants()
            .filter(|n| n.is_element() && n.tag_name().name() == "BuildConfiguration")
        {
            let include = bc.attribute("Include").unwrap_or("");
            let key = bc
                .children()
                .find(|c| c.is_element() && c.tag_name().name() == "Key")
                .and_then(|k| k.text());
            if let (false, Some(key)) = (include.is_empty(), key) {
                map.insert(include.to_string(), key.trim().to_string());
            }
        }
        map.entry("Debug".to_string()).or_insert_with(|| "Cfg_1".to_string());
        map.entry("Release".to_string()).or_insert_with(|| "Cfg_2".to_string());
        map
    }

    /// Read the MainSource element naming the actual file to compile.
    fn main_source(&self, root: &roxmltree::Node<'_, '_>) -> Option<String> {
        root.descendants()
            .filter(|n| n.is_element() && n.tag_name().name() == "MainSource")
            .find_map(|n| n.text())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }

    /// Fold one applicable PropertyGroup into the settings.
    fn fold_property_group(
        &self,
        group: &roxmltree::Node<'_, '_>,
        settings: &mut ProjectSettings,
        verinfo: &mut VerInfoAccumulator,
        platform_name: &str,
    ) {
        let config = settings.active_config.clone();

        for elem in group.children().filter(|c| c.is_element()) {
            let tag = elem.tag_name().name();
            let value = elem.text().unwrap_or("").trim();

            match tag {
                "DCC_Define" => {
                    for item in split_semicolon_list(value) {
                        if !settings.defines.contains(&item) {
                            settings.defines.push(item);
                        }
                    }
                }
                "DCC_UnitSearchPath" => {
                    self.merge_paths(value, &mut settings.unit_search_paths, &config, platform_name)
                }
                "DCC_IncludePath" => {
                    self.merge_paths(value, &mut settings.include_paths, &config, platform_name)
                }
                "DCC_ResourcePath" => {
                    self.merge_paths(value, &mut settings.resource_paths, &config, platform_name)
                }
                "DCC_ExeOutput" => {
                    settings.output_dir = self.resolve_path(value, &config, platform_name)
                }
                "DCC_DcuOutput" => {
                    settings.dcu_output_dir = self.resolve_path(value, &config, platform_name)
                }
                "DCC_Namespace" => {
                    for ns in split_semicolon_list(value) {
                        if !settings
                            .namespace_prefixes
                            .iter()
                            .any(|n| n.eq_ignore_ascii_case(&ns))
                        {
                            settings.namespace_prefixes.push(ns);
                        }
                    }
                }
                "VerInfo_IncludeVerInfo" => {
                    verinfo.include = Some(value.eq_ignore_ascii_case("true"));
                }
                "VerInfo_MajorVer" => verinfo.set_individual(|v| v.major = parse_u16(value)),
                "VerInfo_MinorVer" => verinfo.set_individual(|v| v.minor = parse_u16(value)),
                "VerInfo_Release" => verinfo.set_individual(|v| v.release = parse_u16(value)),
                "VerInfo_Build" => verinfo.set_individual(|v| v.build = parse_u16(value)),
                "VerInfo_Locale" => {
                    if let Ok(locale) = value.parse::<u32>() {
                        verinfo.touch().locale = locale;
                    }
                }
                "VerInfo_Keys" => {
                    let resolved = self.substitute_variables(value, &config, platform_name);
                    verinfo.consume_keys(&resolved);
                }
                _ => {
                    if let Some(flag) = dcc_switch_flag(tag, value) {
                        if !settings.compiler_flags.contains(&flag) {
                            settings.compiler_flags.push(flag);
                        }
                    }
                }
            }
        }
    }

    fn merge_paths(&self, value: &str, target: &mut Vec<String>, config: &str, platform: &str) {
        for raw in value.split(';') {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            if let Some(path) = self.resolve_path(raw, config, platform) {
                if !target.iter().any(|p| p.eq_ignore_ascii_case(&path)) {
                    target.push(path);
                }
            }
        }
    }

    /// Resolve a path value: substitute `$(Platform)` / `$(Config)` /
    /// `$(MSBuildProjectName)` with their literals, drop values that are
    /// *only* an unresolvable variable reference, strip remaining
    /// references, and anchor relative paths at the project directory.
    ///
    /// Substituting before stripping matters: an output dir of
    /// `.\$(Platform)\$(Config)` must become `./Win32/Debug`, not `./`.
    fn resolve_path(&self, raw: &str, config: &str, platform: &str) -> Option<String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        let substituted = self.substitute_variables(raw, config, platform);

        // A value that is nothing but a leftover variable reference carries
        // no usable path.
        if substituted.starts_with("$(") && substituted.ends_with(')') && !substituted[2..].contains("$(")
        {
            return None;
        }

        let stripped = msbuild_var_re().replace_all(&substituted, "").trim().to_string();
        if stripped.is_empty() {
            return None;
        }

        let normalized = stripped.replace('\\', "/");
        if is_absolute_path(&normalized) {
            Some(normalized)
        } else {
            let base = self.project_dir.replace('\\', "/");
            if base.is_empty() {
                Some(normalized)
            } else {
                Some(format!("{}/{}", base.trim_end_matches('/'), normalized))
            }
        }
    }

    /// Replace the MSBuild variables this tool resolves itself.
    fn substitute_variables(&self, value: &str, config: &str, platform: &str) -> String {
        value
            .replace("$(Platform)", platform)
            .replace("$(Config)", config)
            .replace("$(Configuration)", config)
            .replace("$(MSBuildProjectName)", &self.project_stem)
    }
}

/// Parse a semicolon list, skipping empty items and bare variable
/// references.
fn split_semicolon_list(value: &str) -> Vec<String> {
    value
        .split(';')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .filter(|item| !(item.starts_with("$(") && item.ends_with(')')))
        .map(str::to_string)
        .collect()
}

fn dcc_switch_flag(tag: &str, value: &str) -> Option<String> {
    DCC_SWITCHES.iter().find(|(name, _)| *name == tag).map(|(_, letter)| {
        let sign = if value.eq_ignore_ascii_case("true") {
            '+'
        } else {
            '-'
        };
        format!("-${}{}", letter, sign)
    })
}

fn parse_u16(value: &str) -> u16 {
    value.trim().parse().unwrap_or(0)
}

fn is_absolute_path(path: &str) -> bool {
    path.starts_with('/')
        || (path.len() >= 2 && path.as_bytes()[1] == b':' && path.as_bytes()[0].is_ascii_alphabetic())
}

/// Accumulates VerInfo_* properties across property groups; individual
/// version fields override anything derived from VerInfo_Keys.
#[derive(Default)]
struct VerInfoAccumulator {
    include: Option<bool>,
    info: Option<VersionInfo>,
    individual_version: bool,
}

impl VerInfoAccumulator {
    fn touch(&mut self) -> &mut VersionInfo {
        self.info.get_or_insert_with(VersionInfo::default)
    }

    fn set_individual(&mut self, apply: impl FnOnce(&mut VersionInfo)) {
        self.individual_version = true;
        apply(self.touch());
    }

    /// Parse `Key=Value;Key=Value` pairs; a `FileVersion` key seeds the
    /// version quadruple unless individual fields were given.
    fn consume_keys(&mut self, keys: &str) {
        let derive_version = !self.individual_version;
        let info = self.touch();
        for pair in keys.split(';') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            if key.is_empty() {
                continue;
            }
            info.keys.insert(key.to_string(), value.to_string());

            if derive_version && key == "FileVersion" {
                let mut parts = value.split('.').map(|p| p.trim().parse::<u16>().unwrap_or(0));
                info.major = parts.next().unwrap_or(0);
                info.minor = parts.next().unwrap_or(0);
                info.release = parts.next().unwrap_or(0);
                info.build = parts.next().unwrap_or(0);
            }
        }
    }

    fn finish(self) -> Option<VersionInfo> {
        match self.include {
            Some(false) => None,
            _ => self.info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BuildConfig;

    const DPROJ_BASIC: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Project xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
    <PropertyGroup>
        <MainSource>TestApp.dpr</MainSource>
        <Configuration Condition="'$(Configuration)'==''">Debug</Configuration>
        <Platform Condition="'$(Platform)'==''">Win32</Platform>
        <ProjectGuid>{TEST-GUID}</ProjectGuid>
    </PropertyGroup>
    <PropertyGroup Condition="'$(Base)'!=''">
        <DCC_Define>BASEDEF;$(DCC_Define)</DCC_Define>
        <DCC_Namespace>System;Winapi;Vcl</DCC_Namespace>
        <DCC_UnitSearchPath>..\common;$(DCC_UnitSearchPath)</DCC_UnitSearchPath>
        <DCC_ExeOutput>.\$(Platform)\$(Config)</DCC_ExeOutput>
    </PropertyGroup>
    <PropertyGroup Condition="'$(Cfg_1)'!=''">
        <DCC_DebugInfoInExe>true</DCC_DebugInfoInExe>
        <DCC_Optimize>false</DCC_Optimize>
        <DCC_Define>DEBUG;$(DCC_Define)</DCC_Define>
    </PropertyGroup>
    <PropertyGroup Condition="'$(Cfg_2)'!=''">
        <DCC_Optimize>true</DCC_Optimize>
        <DCC_Define>RELEASE;$(DCC_Define)</DCC_Define>
    </PropertyGroup>
    <ItemGroup>
        <BuildConfiguration Include="Debug">
            <Key>Cfg_1</Key>
        </BuildConfiguration>
        <BuildConfiguration Include="Release">
            <Key>Cfg_2</Key>
        </BuildConfiguration>
    </ItemGroup>
</Project>
"#;

    const DPROJ_VERINFO_KEYS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Project xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
    <PropertyGroup>
        <MainSource>TestApp.dpr</MainSource>
        <Configuration Condition="'$(Configuration)'==''">Debug</Configuration>
        <Platform Condition="'$(Platform)'==''">Win32</Platform>
    </PropertyGroup>
    <PropertyGroup Condition="'$(Base)'!=''">
        <VerInfo_Locale>1031</VerInfo_Locale>
        <VerInfo_Keys>CompanyName=TestCo;FileDescription=Test Application;FileVersion=2.5.1.42;InternalName=;LegalCopyright=Copyright 2024;ProductName=TestApp;ProductVersion=2.5.0.0</VerInfo_Keys>
    </PropertyGroup>
    <ItemGroup>
        <BuildConfiguration Include="Debug">
            <Key>Cfg_1</Key>
        </BuildConfiguration>
    </ItemGroup>
</Project>
"#;

    const DPROJ_VERINFO_INDIVIDUAL: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Project xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
    <PropertyGroup>
        <MainSource>TestApp.dpr</MainSource>
        <Configuration Condition="'$(Configuration)'==''">Debug</Configuration>
        <Platform Condition="'$(Platform)'==''">Win32</Platform>
    </PropertyGroup>
    <PropertyGroup Condition="'$(Base)'!=''">
        <VerInfo_MajorVer>3</VerInfo_MajorVer>
        <VerInfo_MinorVer>6</VerInfo_MinorVer>
        <VerInfo_Release>1</VerInfo_Release>
        <VerInfo_Build>316</VerInfo_Build>
        <VerInfo_Locale>1033</VerInfo_Locale>
        <VerInfo_Keys>CompanyName=OldCo;FileVersion=3.6.1.316;ProductVersion=3.6.0.0</VerInfo_Keys>
    </PropertyGroup>
</Project>
"#;

    const DPROJ_VERINFO_DISABLED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Project xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
    <PropertyGroup>
        <MainSource>TestApp.dpr</MainSource>
    </PropertyGroup>
    <PropertyGroup Condition="'$(Base)'!=''">
        <VerInfo_IncludeVerInfo>false</VerInfo_IncludeVerInfo>
        <VerInfo_Keys>CompanyName=;FileVersion=1.0.0.0</VerInfo_Keys>
    </PropertyGroup>
</Project>
"#;

    const DPROJ_PACKAGE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Project xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
    <PropertyGroup>
        <MainSource>MyPackage.dpk</MainSource>
        <Configuration Condition="'$(Configuration)'==''">Release</Configuration>
        <Platform Condition="'$(Platform)'==''">Win64</Platform>
    </PropertyGroup>
</Project>
"#;

    fn parse(content: &str) -> ProjectSettings {
        DprojParser::new(content, "C:/proj", "TestApp").parse(None, None).unwrap()
    }

    // ==================== Active Configuration Tests ====================

    #[test]
    fn test_default_configuration_and_platform() {
        let settings = parse(DPROJ_BASIC);
        assert_eq!(settings.active_config, "Debug");
        assert_eq!(settings.active_platform, Some(Platform::Win32));
        assert_eq!(settings.main_source.as_deref(), Some("TestApp.dpr"));
    }

    #[test]
    fn test_override_config_and_platform() {
        let settings = DprojParser::new(DPROJ_BASIC, "C:/proj", "TestApp")
            .parse(Some("Release"), Some(Platform::Win64))
            .unwrap();
        assert_eq!(settings.active_config, "Release");
        assert_eq!(settings.active_platform, Some(Platform::Win64));
        // Release groups apply: optimizer on, no debug info flag
        assert!(settings.compiler_flags.contains(&"-$O+".to_string()));
        assert!(!settings.compiler_flags.contains(&"-$D+".to_string()));
        assert!(settings.defines.contains(&"RELEASE".to_string()));
        assert!(!settings.defines.contains(&"DEBUG".to_string()));
    }

    #[test]
    fn test_debug_flags_and_defines() {
        let settings = parse(DPROJ_BASIC);
        assert!(settings.compiler_flags.contains(&"-$D+".to_string()));
        assert!(settings.compiler_flags.contains(&"-$O-".to_string()));
        assert!(settings.defines.contains(&"BASEDEF".to_string()));
        assert!(settings.defines.contains(&"DEBUG".to_string()));
    }

    #[test]
    fn test_namespaces_accumulated() {
        let settings = parse(DPROJ_BASIC);
        assert_eq!(settings.namespace_prefixes, vec!["System", "Winapi", "Vcl"]);
    }

    // ==================== Path Resolution Tests ====================

    #[test]
    fn test_relative_search_path_anchored_at_project_dir() {
        let settings = parse(DPROJ_BASIC);
        assert_eq!(settings.unit_search_paths, vec!["C:/proj/../common"]);
    }

    #[test]
    fn test_output_dir_placeholders_substituted_not_stripped() {
        let settings = parse(DPROJ_BASIC);
        // The observed regression: stripping $(Platform)/$(Config) instead
        // of substituting them produced "./" output dirs.
        assert_eq!(settings.output_dir.as_deref(), Some("C:/proj/./Win32/Debug"));
    }

    #[test]
    fn test_bare_variable_reference_dropped() {
        let dproj = r#"<?xml version="1.0"?>
<Project xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
    <PropertyGroup Condition="'$(Base)'!=''">
        <DCC_UnitSearchPath>$(DCC_UnitSearchPath)</DCC_UnitSearchPath>
    </PropertyGroup>
</Project>
"#;
        let settings = parse(dproj);
        assert!(settings.unit_search_paths.is_empty());
    }

    // ==================== VerInfo Tests ====================

    #[test]
    fn test_version_from_keys() {
        let settings = parse(DPROJ_VERINFO_KEYS);
        let vi = settings.version_info.unwrap();
        assert_eq!((vi.major, vi.minor, vi.release, vi.build), (2, 5, 1, 42));
        assert_eq!(vi.locale, 1031);
        assert_eq!(vi.keys.get("CompanyName").map(String::as_str), Some("TestCo"));
        assert_eq!(
            vi.keys.get("LegalCopyright").map(String::as_str),
            Some("Copyright 2024")
        );
    }

    #[test]
    fn test_individual_fields_override_keys_version() {
        let settings = parse(DPROJ_VERINFO_INDIVIDUAL);
        let vi = settings.version_info.unwrap();
        assert_eq!((vi.major, vi.minor, vi.release, vi.build), (3, 6, 1, 316));
    }

    #[test]
    fn test_verinfo_disabled_returns_none() {
        let settings = parse(DPROJ_VERINFO_DISABLED);
        assert!(settings.version_info.is_none());
    }

    #[test]
    fn test_no_verinfo_returns_none() {
        let settings = parse(DPROJ_BASIC);
        assert!(settings.version_info.is_none());
    }

    #[test]
    fn test_msbuild_project_name_resolved_in_keys() {
        let dproj = DPROJ_VERINFO_KEYS
            .replace("FileDescription=Test Application", "FileDescription=$(MSBuildProjectName)");
        let settings = parse(&dproj);
        let vi = settings.version_info.unwrap();
        assert_eq!(vi.keys.get("FileDescription").map(String::as_str), Some("TestApp"));
    }

    // ==================== Package Tests ====================

    #[test]
    fn test_package_detection() {
        let settings = DprojParser::new(DPROJ_PACKAGE, "C:/proj", "MyPackage")
            .parse(None, None)
            .unwrap();
        assert!(settings.is_package());
        assert_eq!(settings.active_config, "Release");
        assert_eq!(settings.active_platform, Some(Platform::Win64));
    }

    #[test]
    fn test_invalid_xml_is_project_parse_error() {
        let err = DprojParser::new("<Project><unclosed>", "", "X")
            .parse(None, None)
            .unwrap_err();
        assert!(matches!(err, Error::ProjectParse(_)));
    }

    #[test]
    fn test_config_enum_round_trip() {
        let settings = parse(DPROJ_BASIC);
        assert_eq!(BuildConfig::parse(&settings.active_config), Some(BuildConfig::Debug));
    }
}
