//! Integração com Git via libgit2 para commits automáticos do blueprint.
//!
//! O [`GitManager`] encapsula o stage dos arquivos do blueprint e a criação
//! de commits após cada mutação.

use git2::{Repository, Signature};
use std::path::{Path, PathBuf};

use crate::error::{BlueprintError, Result};

/// Gerenciador de operações Git usando a biblioteca libgit2.
pub struct GitManager {
    repo: Repository,
}

impl GitManager {
    /// Abre o repositório que contém `path`, subindo pelos diretórios pais.
    pub fn discover(path: &Path) -> Result<Self> {
        let start = if path.is_dir() {
            path.to_path_buf()
        } else {
            match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            }
        };
        let repo = Repository::discover(start)?;
        Ok(Self { repo })
    }

    /// Adiciona os arquivos fornecidos ao stage e cria um commit,
    /// retornando o hash curto.
    ///
    /// Somente os arquivos listados entram no commit; o restante da árvore
    /// de trabalho não é tocado.
    pub fn commit_files(&self, files: &[&Path], message: &str) -> Result<String> {
        let workdir = self
            .repo
            .workdir()
            .ok_or_else(|| BlueprintError::Config("git repository has no working tree".into()))?;
        let workdir = workdir.canonicalize()?;

        let mut index = self.repo.index()?;
        for file in files {
            let absolute = file.canonicalize()?;
            let relative = absolute.strip_prefix(&workdir).map_err(|_| {
                BlueprintError::Config(format!(
                    "{} is outside the repository {}",
                    absolute.display(),
                    workdir.display()
                ))
            })?;
            index.add_path(relative)?;
        }
        index.write()?;

        let tree_oid = index.write_tree()?;
        let tree = self.repo.find_tree(tree_oid)?;

        let sig = self
            .repo
            .signature()
            .or_else(|_| Signature::now("blueprint", "blueprint@localhost"))?;

        // Repositório sem commits ainda: o primeiro commit não tem pai.
        let parent = match self.repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(_) => None,
        };
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

        let commit_oid = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?;

        let short = &commit_oid.to_string()[..7];
        Ok(short.to_string())
    }

    /// Retorna a mensagem do commit em HEAD.
    pub fn head_message(&self) -> Result<String> {
        let commit = self.repo.head()?.peel_to_commit()?;
        Ok(commit.message().unwrap_or_default().to_string())
    }
}
