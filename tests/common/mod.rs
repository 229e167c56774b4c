//! Common test utilities for dcbuild integration tests.
//!
//! Provides `TestEnv` for isolated test environments and helpers for
//! building fake toolchains (shell scripts standing in for dcc/cgrc) so
//! process-level behavior is testable without a Delphi installation.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
pub use tempfile::TempDir;

/// A test environment with an isolated project directory and a fake Delphi
/// root directory.
pub struct TestEnv {
    /// Project sources, build logs, descriptors
    pub project_dir: TempDir,
    /// Fake Delphi installation root (bin/dcc32.exe etc. go under bin/)
    pub root_dir: TempDir,
}

impl TestEnv {
    /// Create a new test environment with isolated directories.
    pub fn new() -> Self {
        let env = Self {
            project_dir: TempDir::new().unwrap(),
            root_dir: TempDir::new().unwrap(),
        };
        fs::create_dir_all(env.bin_dir()).unwrap();
        env
    }

    /// Get the path to the project directory.
    pub fn path(&self) -> &Path {
        self.project_dir.path()
    }

    /// Get the fake Delphi root directory.
    pub fn root(&self) -> &Path {
        self.root_dir.path()
    }

    /// Get the fake Delphi bin directory.
    pub fn bin_dir(&self) -> PathBuf {
        self.root_dir.path().join("bin")
    }

    /// Write a file into the project directory and return its path.
    pub fn write_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    /// Write a minimal config store pointing at the fake Delphi root.
    pub fn write_config(&self, name: &str) -> PathBuf {
        let content = format!(
            r#"[delphi]
version = "23.0"
root_path = "{root}"

[paths.system]

[paths.libraries]

[compiler.flags]
flags = ["--no-config"]

[compiler.namespaces]
prefixes = ["System", "Winapi"]
"#,
            root = self.root().display()
        );
        self.write_file(name, &content)
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Write an executable shell script. The body runs with the invocation's
/// working directory, so scripts can create artifacts in place. Unix only;
/// process-level tests are unix-gated.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

/// A minimal application .dproj with the given main source name.
pub fn sample_dproj(main_source: &str, platform: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<Project xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
    <PropertyGroup>
        <MainSource>{main_source}</MainSource>
        <Configuration Condition="'$(Configuration)'==''">Debug</Configuration>
        <Platform Condition="'$(Platform)'==''">{platform}</Platform>
        <ProjectGuid>{{00000000-0000-0000-0000-000000000000}}</ProjectGuid>
    </PropertyGroup>
    <PropertyGroup Condition="'$(Base)'!=''">
        <DCC_Namespace>System;Winapi;Vcl</DCC_Namespace>
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
"#
    )
}

/// A .dproj carrying version-resource metadata.
pub fn sample_dproj_with_verinfo(main_source: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<Project xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
    <PropertyGroup>
        <MainSource>{main_source}</MainSource>
        <Configuration Condition="'$(Configuration)'==''">Debug</Configuration>
        <Platform Condition="'$(Platform)'==''">Win32</Platform>
    </PropertyGroup>
    <PropertyGroup Condition="'$(Base)'!=''">
        <VerInfo_Locale>1033</VerInfo_Locale>
        <VerInfo_Keys>CompanyName=TestCo;FileVersion=1.2.3.4;ProductName=TestApp</VerInfo_Keys>
    </PropertyGroup>
    <ItemGroup>
        <BuildConfiguration Include="Debug">
            <Key>Cfg_1</Key>
        </BuildConfiguration>
    </ItemGroup>
</Project>
"#
    )
}
