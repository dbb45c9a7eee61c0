//! Configuration management for markr.
//!
//! Parses `markr.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories. Every setting has a
//! default, so running without a config file is the common case.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Example
//!
//! ```toml
//! [render]
//! format = "pdf"        # "pdf" (SVG converted by inkscape) or "eps"
//! dpi = 300
//! cache = true
//! work_dir = ".markr"
//!
//! [macros]
//! kinds = ["plantuml", "diagram"]
//!
//! [tools.plantuml]
//! command = ["plantuml", "-pipe", "-t{format}"]
//!
//! [tools.inkscape]
//! transport = "stream"
//! command = [
//!     "inkscape", "--export-dpi", "{dpi}",
//!     "--file", "/dev/stdin", "--export-pdf", "/dev/stdout",
//! ]
//!
//! [tools.pandoc]
//! options = ["--standalone", "--toc"]
//! ```
//!
//! ## Environment Variable Expansion
//!
//! Tool command lines support `~`, `${VAR}` and `${VAR:-default}` expansion.
//! Typesetter options are passed through untouched.

mod expand;

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "markr.toml";

/// Default diagram format.
const DEFAULT_FORMAT: &str = "pdf";

/// Default diagram resolution.
const DEFAULT_DPI: u32 = 300;

/// Upper bound accepted for `render.dpi`.
const MAX_DPI: u32 = 2400;

/// Diagram formats accepted by `render.format`.
const FORMATS: &[&str] = &["pdf", "eps"];

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override diagram format.
    pub format: Option<String>,
    /// Override diagram resolution.
    pub dpi: Option<u32>,
    /// Override artifact caching.
    pub cache: Option<bool>,
    /// Override keeping of temporary files.
    pub keep_temporaries: Option<bool>,
    /// Override the artifact directory.
    pub work_dir: Option<PathBuf>,
}

/// Application configuration.
#[derive(Debug, Default)]
pub struct Config {
    /// Rendering options.
    pub render: RenderConfig,
    /// Macro block options.
    pub macros: MacrosConfig,
    /// External tools.
    pub tools: ToolsConfig,
    /// Path to the config file, if one was loaded.
    pub config_path: Option<PathBuf>,
}

/// Rendering options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderConfig {
    /// Diagram format (`"pdf"` or `"eps"`).
    pub format: String,
    /// Resolution passed to diagram tools.
    pub dpi: u32,
    /// Whether rendered diagrams are reused across runs.
    pub cache: bool,
    /// Whether run-scoped temporary files are kept.
    pub keep_temporaries: bool,
    /// Directory holding rendered artifacts.
    pub work_dir: PathBuf,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            format: DEFAULT_FORMAT.to_owned(),
            dpi: DEFAULT_DPI,
            cache: false,
            keep_temporaries: false,
            work_dir: std::env::temp_dir(),
        }
    }
}

/// Macro block options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacrosConfig {
    /// Block kinds accepted after the `{{` opening delimiter.
    pub kinds: Vec<String>,
}

impl Default for MacrosConfig {
    fn default() -> Self {
        Self {
            kinds: vec!["plantuml".to_owned(), "diagram".to_owned()],
        }
    }
}

/// How a tool exchanges data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Input on stdin, output on stdout.
    Stream,
    /// Input and output through `{input}`/`{output}` files.
    File,
}

/// An external diagram tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolConfig {
    /// Program and arguments, with `{format}`, `{dpi}`, `{input}`, `{output}` placeholders.
    pub command: Vec<String>,
    /// Data transport.
    pub transport: Transport,
}

/// The document typesetter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypesetterConfig {
    /// Program and leading arguments.
    pub command: Vec<String>,
    /// Fixed formatting options, placed before `-o <output>`.
    pub options: Vec<String>,
}

/// External tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolsConfig {
    /// Diagram description renderer.
    pub plantuml: ToolConfig,
    /// SVG to PDF converter.
    pub inkscape: ToolConfig,
    /// Document typesetter.
    pub pandoc: TypesetterConfig,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            plantuml: ToolConfig {
                command: argv(&["plantuml", "-pipe", "-t{format}"]),
                transport: Transport::Stream,
            },
            inkscape: ToolConfig {
                command: argv(&[
                    "inkscape",
                    "--export-dpi={dpi}",
                    "--export-type=pdf",
                    "--export-filename={output}",
                    "{input}",
                ]),
                transport: Transport::File,
            },
            pandoc: TypesetterConfig {
                command: argv(&["pandoc"]),
                options: argv(&[
                    "--toc",
                    "--reference-links",
                    "--number-sections",
                    "--standalone",
                    "--pdf-engine=xelatex",
                    "-f",
                    "markdown-implicit_figures",
                    "-V",
                    "papersize=A4",
                    "-V",
                    "geometry=margin=2cm",
                    "-V",
                    "colorlinks",
                    "-V",
                    "urlcolor=blue",
                    "-V",
                    "toccolor=blue",
                ]),
            },
        }
    }
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|&part| part.to_owned()).collect()
}

/// Raw configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    render: RenderConfigRaw,
    macros: MacrosConfigRaw,
    tools: ToolsConfigRaw,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct RenderConfigRaw {
    format: Option<String>,
    dpi: Option<u32>,
    cache: Option<bool>,
    keep_temporaries: Option<bool>,
    work_dir: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct MacrosConfigRaw {
    kinds: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct ToolsConfigRaw {
    plantuml: ToolConfigRaw,
    inkscape: ToolConfigRaw,
    pandoc: TypesetterConfigRaw,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct ToolConfigRaw {
    command: Option<Vec<String>>,
    transport: Option<Transport>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct TypesetterConfigRaw {
    command: Option<Vec<String>>,
    options: Option<Vec<String>>,
}

impl ToolConfigRaw {
    /// Merge over `default`, expanding the command line.
    ///
    /// A transport given without a command applies to the default command.
    fn resolve(self, default: ToolConfig, field: &str) -> Result<ToolConfig, ConfigError> {
        let command = self.command.unwrap_or(default.command);
        Ok(ToolConfig {
            command: expand::expand_argv(&command, field)?,
            transport: self.transport.unwrap_or(default.transport),
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`tools.plantuml.command`").
        field: String,
        /// Error message.
        message: String,
    },
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `markr.toml` in current directory and parents,
    /// falling back to defaults.
    ///
    /// CLI settings are applied after loading, then the result is validated.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing or
    /// expansion fails, or the final configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::from_raw(ConfigFile::default(), Path::new("."))?
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text, resolving paths against `base`.
    ///
    /// # Errors
    ///
    /// Returns error if parsing or expansion fails. The result is not validated.
    pub fn from_toml(content: &str, base: &Path) -> Result<Self, ConfigError> {
        let raw: ConfigFile = toml::from_str(content)?;
        Self::from_raw(raw, base)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(format) = &settings.format {
            self.render.format.clone_from(format);
        }
        if let Some(dpi) = settings.dpi {
            self.render.dpi = dpi;
        }
        if let Some(cache) = settings.cache {
            self.render.cache = cache;
        }
        if let Some(keep) = settings.keep_temporaries {
            self.render.keep_temporaries = keep;
        }
        if let Some(work_dir) = &settings.work_dir {
            self.render.work_dir.clone_from(work_dir);
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config_dir = path.parent().unwrap_or(Path::new("."));
        let mut config = Self::from_toml(&content, config_dir)?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Merge raw values over defaults, expanding tool commands and resolving
    /// `work_dir` against `base`.
    fn from_raw(raw: ConfigFile, base: &Path) -> Result<Self, ConfigError> {
        let render_defaults = RenderConfig::default();
        let render = RenderConfig {
            format: raw.render.format.unwrap_or(render_defaults.format),
            dpi: raw.render.dpi.unwrap_or(render_defaults.dpi),
            cache: raw.render.cache.unwrap_or(render_defaults.cache),
            keep_temporaries: raw
                .render
                .keep_temporaries
                .unwrap_or(render_defaults.keep_temporaries),
            work_dir: match raw.render.work_dir {
                Some(dir) => base.join(expand::expand_env(&dir, "render.work_dir")?),
                None => render_defaults.work_dir,
            },
        };

        let macros = MacrosConfig {
            kinds: raw.macros.kinds.unwrap_or_else(|| MacrosConfig::default().kinds),
        };

        let defaults = ToolsConfig::default();
        let pandoc_command = raw.tools.pandoc.command.unwrap_or(defaults.pandoc.command);
        let tools = ToolsConfig {
            plantuml: raw
                .tools
                .plantuml
                .resolve(defaults.plantuml, "tools.plantuml.command")?,
            inkscape: raw
                .tools
                .inkscape
                .resolve(defaults.inkscape, "tools.inkscape.command")?,
            pandoc: TypesetterConfig {
                command: expand::expand_argv(&pandoc_command, "tools.pandoc.command")?,
                options: raw.tools.pandoc.options.unwrap_or(defaults.pandoc.options),
            },
        };

        Ok(Self {
            render,
            macros,
            tools,
            config_path: None,
        })
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_render()?;
        self.validate_macros()?;
        self.validate_tools()?;
        Ok(())
    }

    fn validate_render(&self) -> Result<(), ConfigError> {
        if !FORMATS.contains(&self.render.format.as_str()) {
            return Err(ConfigError::Validation(format!(
                "render.format must be one of {}, got {:?}",
                FORMATS.join(", "),
                self.render.format
            )));
        }
        let dpi = self.render.dpi;
        if dpi == 0 {
            return Err(ConfigError::Validation(
                "render.dpi must be greater than 0".to_owned(),
            ));
        }
        if dpi > MAX_DPI {
            return Err(ConfigError::Validation(format!(
                "render.dpi cannot exceed {MAX_DPI}"
            )));
        }
        Ok(())
    }

    fn validate_macros(&self) -> Result<(), ConfigError> {
        if self.macros.kinds.is_empty() {
            return Err(ConfigError::Validation(
                "macros.kinds cannot be empty".to_owned(),
            ));
        }
        if self.macros.kinds.iter().any(String::is_empty) {
            return Err(ConfigError::Validation(
                "macros.kinds cannot contain empty names".to_owned(),
            ));
        }
        Ok(())
    }

    fn validate_tools(&self) -> Result<(), ConfigError> {
        validate_tool(&self.tools.plantuml, "tools.plantuml")?;
        validate_tool(&self.tools.inkscape, "tools.inkscape")?;
        if self.tools.pandoc.command.is_empty() {
            return Err(ConfigError::Validation(
                "tools.pandoc.command cannot be empty".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Check a tool command against its transport.
fn validate_tool(tool: &ToolConfig, field: &str) -> Result<(), ConfigError> {
    if tool.command.is_empty() {
        return Err(ConfigError::Validation(format!(
            "{field}.command cannot be empty"
        )));
    }
    let mentions = |placeholder: &str| tool.command.iter().any(|arg| arg.contains(placeholder));
    match tool.transport {
        Transport::File => {
            for placeholder in ["{input}", "{output}"] {
                if !mentions(placeholder) {
                    return Err(ConfigError::Validation(format!(
                        "{field}.command must contain {placeholder} when transport is \"file\""
                    )));
                }
            }
        }
        Transport::Stream => {
            for placeholder in ["{input}", "{output}"] {
                if mentions(placeholder) {
                    return Err(ConfigError::Validation(format!(
                        "{field}.command cannot use {placeholder} when transport is \"stream\""
                    )));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(toml: &str) -> Config {
        Config::from_toml(toml, Path::new("/project")).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.render.format, "pdf");
        assert_eq!(config.render.dpi, 300);
        assert!(!config.render.cache);
        assert!(!config.render.keep_temporaries);
        assert_eq!(config.render.work_dir, std::env::temp_dir());
        assert_eq!(config.macros.kinds, vec!["plantuml", "diagram"]);
        assert_eq!(config.tools.plantuml.transport, Transport::Stream);
        assert_eq!(config.tools.inkscape.transport, Transport::File);
        assert_eq!(config.tools.pandoc.command, vec!["pandoc"]);
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_minimal_config() {
        let config = parse("");
        assert_eq!(config.render, RenderConfig::default());
        assert_eq!(config.macros, MacrosConfig::default());
        assert_eq!(config.tools.plantuml.command, vec!["plantuml", "-pipe", "-t{format}"]);
        assert_eq!(config.tools.pandoc, ToolsConfig::default().pandoc);
    }

    #[test]
    fn test_default_renderer_is_looked_up_on_path() {
        let config = parse("");
        let program = &config.tools.plantuml.command[0];
        assert_eq!(program, "plantuml");
        assert!(
            config
                .tools
                .plantuml
                .command
                .iter()
                .all(|arg| !arg.contains('/') && !arg.ends_with(".jar"))
        );
    }

    #[test]
    fn test_parse_render_config() {
        let config = parse(
            r#"
[render]
format = "eps"
dpi = 150
cache = true
keep_temporaries = true
work_dir = ".markr"
"#,
        );
        assert_eq!(config.render.format, "eps");
        assert_eq!(config.render.dpi, 150);
        assert!(config.render.cache);
        assert!(config.render.keep_temporaries);
        assert_eq!(config.render.work_dir, PathBuf::from("/project/.markr"));
    }

    #[test]
    fn test_absolute_work_dir_is_kept() {
        let config = parse("[render]\nwork_dir = \"/var/cache/markr\"\n");
        assert_eq!(config.render.work_dir, PathBuf::from("/var/cache/markr"));
    }

    #[test]
    fn test_transport_override_keeps_default_command() {
        let config = parse("[tools.inkscape]\ntransport = \"stream\"\n");
        assert_eq!(config.tools.inkscape.transport, Transport::Stream);
        assert_eq!(config.tools.inkscape.command, ToolsConfig::default().inkscape.command);
        // The default file-based command does not fit a stream transport.
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_parse_tools() {
        let config = parse(
            r#"
[tools.plantuml]
command = ["${MARKR_TEST_SURELY_UNSET_VAR:-plantuml}", "-pipe", "-t{format}"]

[tools.inkscape]
transport = "stream"
command = [
    "inkscape", "--export-dpi", "{dpi}",
    "--file", "/dev/stdin", "--export-pdf", "/dev/stdout",
]

[tools.pandoc]
command = ["/opt/pandoc/bin/pandoc"]
options = ["--standalone", "-V", "price=$5"]
"#,
        );
        assert_eq!(config.tools.plantuml.command, vec!["plantuml", "-pipe", "-t{format}"]);
        assert_eq!(config.tools.inkscape.transport, Transport::Stream);
        assert_eq!(config.tools.pandoc.command, vec!["/opt/pandoc/bin/pandoc"]);
        assert_eq!(config.tools.pandoc.options, vec!["--standalone", "-V", "price=$5"]);
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_macros() {
        let config = parse("[macros]\nkinds = [\"uml\"]\n");
        assert_eq!(config.macros.kinds, vec!["uml"]);
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let result = Config::from_toml("[render]\nformats = \"pdf\"\n", Path::new("."));
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_invalid_transport_is_rejected() {
        let result =
            Config::from_toml("[tools.plantuml]\ntransport = \"socket\"\n", Path::new("."));
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_cli_settings_override() {
        let mut config = parse("[render]\nformat = \"eps\"\ncache = true\n");
        config.apply_cli_settings(&CliSettings {
            format: Some("pdf".to_owned()),
            dpi: Some(600),
            cache: Some(false),
            keep_temporaries: Some(true),
            work_dir: Some(PathBuf::from("/tmp/out")),
        });
        assert_eq!(config.render.format, "pdf");
        assert_eq!(config.render.dpi, 600);
        assert!(!config.render.cache);
        assert!(config.render.keep_temporaries);
        assert_eq!(config.render.work_dir, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn test_cli_settings_none_keeps_values() {
        let mut config = parse("[render]\nformat = \"eps\"\ndpi = 72\n");
        config.apply_cli_settings(&CliSettings::default());
        assert_eq!(config.render.format, "eps");
        assert_eq!(config.render.dpi, 72);
    }

    #[test]
    fn test_validate_format() {
        let mut config = Config::default();
        config.render.format = "png".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("render.format"));
    }

    #[test]
    fn test_validate_dpi() {
        let mut config = Config::default();
        config.render.dpi = 0;
        assert!(config.validate().unwrap_err().to_string().contains("greater than 0"));
        config.render.dpi = MAX_DPI + 1;
        assert!(config.validate().unwrap_err().to_string().contains("cannot exceed"));
        config.render.dpi = MAX_DPI;
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_macros() {
        let mut config = Config::default();
        config.macros.kinds.clear();
        assert!(config.validate().is_err());
        config.macros.kinds = vec![String::new()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_file_transport_needs_placeholders() {
        let mut config = Config::default();
        config.tools.inkscape.command = vec!["inkscape".to_owned(), "{input}".to_owned()];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("{output}"));
    }

    #[test]
    fn test_validate_empty_commands() {
        let mut config = Config::default();
        config.tools.plantuml.command.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.tools.pandoc.command.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "[render]\ncache = true\nwork_dir = \"artifacts\"\n").unwrap();

        let config = Config::load(Some(&path), None).unwrap();
        assert!(config.render.cache);
        assert_eq!(config.render.work_dir, tmp.path().join("artifacts"));
        assert_eq!(config.config_path, Some(path));
    }

    #[test]
    fn test_load_applies_and_validates_cli_settings() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "").unwrap();

        let settings = CliSettings {
            dpi: Some(0),
            ..CliSettings::default()
        };
        let result = Config::load(Some(&path), Some(&settings));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Some(Path::new("/nonexistent/markr.toml")), None);
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }
}
