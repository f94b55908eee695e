//! Configuração do blueprint carregada a partir de `blueprint.toml`.
//!
//! A struct [`BlueprintConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `BLUEPRINT_PATH` tem precedência sobre o arquivo.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{BlueprintError, Result};

/// Nome do arquivo de configuração procurado no diretório de trabalho.
pub const CONFIG_FILE: &str = "blueprint.toml";

/// Configuração de nível superior carregada de `blueprint.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlueprintConfig {
    /// Caminho do documento do blueprint.
    #[serde(default = "default_blueprint_path")]
    pub blueprint_path: PathBuf,

    /// Orçamento de tentativas para itens criados com `add`.
    #[serde(default = "default_budget")]
    pub default_budget: u32,

    /// Orçamento de tentativas para sub-itens criados por `split`.
    #[serde(default = "default_budget")]
    pub split_budget: u32,

    /// Cria um commit git após cada mutação.
    #[serde(default)]
    pub git_commit: bool,

    /// Arquivo JSON-lines onde as mutações são registradas.
    #[serde(default)]
    pub audit_log: Option<PathBuf>,
}

// Valor padrão para o documento: "BLUEPRINT.md".
fn default_blueprint_path() -> PathBuf {
    PathBuf::from("BLUEPRINT.md")
}

// Valor padrão para orçamentos de tentativas: 50.
fn default_budget() -> u32 {
    50
}

impl Default for BlueprintConfig {
    fn default() -> Self {
        Self {
            blueprint_path: default_blueprint_path(),
            default_budget: default_budget(),
            split_budget: default_budget(),
            git_commit: false,
            audit_log: None,
        }
    }
}

impl BlueprintConfig {
    /// Carrega a configuração de `blueprint.toml` no diretório atual.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Carrega a configuração de `blueprint.toml` em `dir`.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            toml::from_str::<BlueprintConfig>(&contents)?
        } else {
            Self::default()
        };

        // Variável de ambiente tem precedência sobre o arquivo de configuração.
        if let Ok(blueprint) = std::env::var("BLUEPRINT_PATH")
            && !blueprint.is_empty()
        {
            config.blueprint_path = PathBuf::from(blueprint);
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.blueprint_path.as_os_str().is_empty() {
            return Err(BlueprintError::Config("blueprint_path must not be empty".into()));
        }
        if self.split_budget == 0 {
            return Err(BlueprintError::Config("split_budget must be at least 1".into()));
        }
        Ok(())
    }
}
