//! TypeSpec compiler and .NET build toolchain.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, instrument};

use crate::domain::errors::BuildError;
use crate::domain::models::config::{ToolchainConfig, WorkspaceConfig};
use crate::domain::ports::{BuildOutput, BuildToolchain};

const OUTPUT_DIR_PLACEHOLDER: &str = "{output_dir}";

/// Runs `tsp compile` in the workspace root and `dotnet build` in the
/// generated project directory.
#[derive(Debug, Clone)]
pub struct TypeSpecToolchain {
    root: PathBuf,
    output_dir: PathBuf,
    helper_dir: PathBuf,
    csproj_template: String,
    nuget_config: String,
    toolchain: ToolchainConfig,
}

impl TypeSpecToolchain {
    pub fn new(workspace: &WorkspaceConfig, toolchain: &ToolchainConfig) -> Self {
        Self {
            root: workspace.root.clone(),
            output_dir: workspace.resolve(&workspace.output_dir),
            helper_dir: workspace.resolve(&workspace.helper_dir),
            csproj_template: workspace.csproj_template.clone(),
            nuget_config: workspace.nuget_config.clone(),
            toolchain: toolchain.clone(),
        }
    }

    fn compile_args(&self) -> Vec<String> {
        let output_dir = self.output_dir.to_string_lossy();
        self.toolchain
            .compile_args
            .iter()
            .map(|arg| arg.replace(OUTPUT_DIR_PLACEHOLDER, &output_dir))
            .collect()
    }

    /// First generated project file under the output directory.
    fn generated_project(&self) -> Result<PathBuf, BuildError> {
        find_first_with_extension(&self.output_dir, "csproj")?
            .ok_or_else(|| BuildError::ProjectFileNotFound(self.output_dir.clone()))
    }
}

#[async_trait]
impl BuildToolchain for TypeSpecToolchain {
    #[instrument(skip(self))]
    async fn compile(&self) -> Result<String, BuildError> {
        info!("compiling TypeSpec");
        let (status, stdout, stderr) =
            run(&self.toolchain.compile_program, &self.compile_args(), &self.root).await?;

        if status.success() {
            debug!("TypeSpec compiled cleanly");
            return Ok(String::new());
        }

        let diagnostics = join_output(&stdout, &stderr);
        Ok(if diagnostics.trim().is_empty() {
            format!("{} exited with {status}", self.toolchain.compile_program)
        } else {
            diagnostics
        })
    }

    #[instrument(skip(self))]
    async fn prepare_artifacts(&self) -> Result<(), BuildError> {
        let project = self.generated_project()?;
        let project_dir = project
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.output_dir.clone());

        let nuget = self.helper_dir.join(&self.nuget_config);
        if !nuget.exists() {
            return Err(BuildError::TemplateMissing(nuget));
        }
        tokio::fs::copy(&nuget, project_dir.join(&self.nuget_config)).await?;

        let template = self.helper_dir.join(&self.csproj_template);
        let content = tokio::fs::read_to_string(&template)
            .await
            .map_err(|_| BuildError::TemplateMissing(template.clone()))?;
        tokio::fs::write(&project, content).await?;

        debug!(project = %project.display(), "build templates applied");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn build(&self) -> Result<BuildOutput, BuildError> {
        let project = self.generated_project()?;
        let project_dir = project.parent().unwrap_or(self.output_dir.as_path());

        info!(dir = %project_dir.display(), "building generated SDK");
        let (status, stdout, stderr) =
            run(&self.toolchain.build_program, &self.toolchain.build_args, project_dir).await?;

        Ok(BuildOutput {
            raw_log: format!("{stdout}\n{stderr}"),
            success: status.success(),
        })
    }
}

async fn run(
    program: &str,
    args: &[String],
    dir: &Path,
) -> Result<(std::process::ExitStatus, String, String), BuildError> {
    debug!(program, ?args, dir = %dir.display(), "spawning");
    let output = Command::new(program)
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| BuildError::Spawn {
            program: program.to_string(),
            source,
        })?;

    Ok((
        output.status,
        String::from_utf8_lossy(&output.stdout).into_owned(),
        String::from_utf8_lossy(&output.stderr).into_owned(),
    ))
}

fn join_output(stdout: &str, stderr: &str) -> String {
    match (stdout.trim().is_empty(), stderr.trim().is_empty()) {
        (false, false) => format!("{stdout}\n{stderr}"),
        (false, true) => stdout.to_string(),
        _ => stderr.to_string(),
    }
}

/// Depth-first search in lexical order.
fn find_first_with_extension(dir: &Path, extension: &str) -> Result<Option<PathBuf>, BuildError> {
    if !dir.is_dir() {
        return Ok(None);
    }

    let mut entries = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort();

    for path in &entries {
        if path.is_file() && path.extension().is_some_and(|e| e == extension) {
            return Ok(Some(path.clone()));
        }
    }
    for path in entries.iter().filter(|p| p.is_dir()) {
        if let Some(found) = find_first_with_extension(path, extension)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn workspace(root: &Path) -> WorkspaceConfig {
        WorkspaceConfig {
            root: root.to_path_buf(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn prepare_artifacts_applies_templates() {
        let dir = tempfile::tempdir().unwrap();
        let project_dir = dir.path().join("final-output/src");
        fs::create_dir_all(&project_dir).unwrap();
        fs::write(project_dir.join("Azure.ResourceManager.Demo.csproj"), "<Project/>").unwrap();
        fs::create_dir_all(dir.path().join("helper")).unwrap();
        fs::write(dir.path().join("helper/Nuget.config"), "<configuration/>").unwrap();
        fs::write(
            dir.path().join("helper/Azure.ResourceManager.csproj"),
            "<Project Sdk=\"Microsoft.NET.Sdk\"/>",
        )
        .unwrap();

        let toolchain = TypeSpecToolchain::new(&workspace(dir.path()), &ToolchainConfig::default());
        toolchain.prepare_artifacts().await.unwrap();

        assert_eq!(
            fs::read_to_string(project_dir.join("Azure.ResourceManager.Demo.csproj")).unwrap(),
            "<Project Sdk=\"Microsoft.NET.Sdk\"/>"
        );
        assert!(project_dir.join("Nuget.config").exists());
    }

    #[tokio::test]
    async fn missing_project_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let toolchain = TypeSpecToolchain::new(&workspace(dir.path()), &ToolchainConfig::default());
        assert!(matches!(
            toolchain.build().await,
            Err(BuildError::ProjectFileNotFound(_))
        ));
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = ToolchainConfig {
            compile_program: "definitely-not-a-real-program-azc".to_string(),
            ..Default::default()
        };
        let toolchain = TypeSpecToolchain::new(&workspace(dir.path()), &config);
        assert!(matches!(toolchain.compile().await, Err(BuildError::Spawn { .. })));
    }

    #[test]
    fn compile_args_substitute_output_dir() {
        let toolchain =
            TypeSpecToolchain::new(&workspace(Path::new("/work")), &ToolchainConfig::default());
        assert_eq!(
            toolchain.compile_args(),
            vec!["tsp", "compile", "./src", "--output-dir", "/work/final-output"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn compile_failure_returns_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        let config = ToolchainConfig {
            compile_program: "sh".to_string(),
            compile_args: vec![
                "-c".to_string(),
                "echo 'client.tsp:2:1 - error unknown-identifier'; exit 1".to_string(),
            ],
            ..Default::default()
        };
        let toolchain = TypeSpecToolchain::new(&workspace(dir.path()), &config);
        let diagnostics = toolchain.compile().await.unwrap();
        assert!(diagnostics.contains("unknown-identifier"));

        let clean = TypeSpecToolchain::new(
            &workspace(dir.path()),
            &ToolchainConfig {
                compile_program: "sh".to_string(),
                compile_args: vec!["-c".to_string(), "echo compiled".to_string()],
                ..Default::default()
            },
        );
        assert_eq!(clean.compile().await.unwrap(), "");
    }
}
