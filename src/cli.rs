//! Interface de linha de comando do blueprint baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (init, add, next,
//! advance, split, ...) e flags globais (--file, --commit, --json, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::blueprint::{Kind, Status};

/// Blueprint — rastreador de dependências para formalizações.
#[derive(Debug, Parser)]
#[command(name = "blueprint", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Documento do blueprint (padrão: `blueprint_path` da configuração).
    #[arg(long, short, global = true)]
    pub file: Option<PathBuf>,

    /// Cria um commit git após cada mutação.
    #[arg(long, global = true, default_value_t = false)]
    pub commit: bool,

    /// Imprime a saída como JSON.
    #[arg(long, global = true, default_value_t = false)]
    pub json: bool,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Tipo de item aceito pela CLI, mapeado para [`Kind`] internamente.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KindArg {
    Definition,
    Lemma,
    Theorem,
}

impl From<KindArg> for Kind {
    fn from(arg: KindArg) -> Self {
        match arg {
            KindArg::Definition => Kind::Definition,
            KindArg::Lemma => Kind::Lemma,
            KindArg::Theorem => Kind::Theorem,
        }
    }
}

/// Status aceito por `advance`, mapeado para [`Status`] internamente.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatusArg {
    Todo,
    Partial,
    Done,
    Hard,
}

impl From<StatusArg> for Status {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Todo => Status::Todo,
            StatusArg::Partial => Status::Partial,
            StatusArg::Done => Status::Done,
            StatusArg::Hard => Status::Hard,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Cria o documento do blueprint se ele ainda não existir.
    Init,

    /// Adiciona ou substitui um item; ao substituir, status e tentativas são mantidos.
    Add {
        /// Rótulo único do item.
        label: String,

        #[arg(long, value_enum, default_value = "lemma")]
        kind: KindArg,

        /// Rótulos dos quais o item depende (separados por vírgula).
        #[arg(long, value_delimiter = ',')]
        uses: Vec<String>,

        #[arg(long, default_value = "")]
        statement: String,

        #[arg(long, default_value = "")]
        proof: String,

        /// Arquivo onde a versão formal vive.
        #[arg(long = "location")]
        location: Option<String>,

        /// Orçamento de tentativas de um item novo (padrão: `default_budget`).
        #[arg(long)]
        budget: Option<u32>,

        /// Menor valor é escolhido primeiro.
        #[arg(long, default_value_t = 0)]
        priority: u32,
    },

    /// Mostra um item.
    Show { label: String },

    /// Lista todos os itens na ordem do documento.
    List,

    /// Mostra os itens elegíveis, o melhor primeiro.
    Next {
        /// Marca o melhor item elegível como `partial` atomicamente.
        #[arg(long, default_value_t = false)]
        claim: bool,
    },

    /// Lista os itens em ordem topológica.
    Order,

    /// Muda o status de um item.
    Advance {
        label: String,

        #[arg(value_enum)]
        status: StatusArg,

        /// Tentativas consumidas desde a última atualização.
        #[arg(long, default_value_t = 0)]
        attempts: u32,
    },

    /// Reabre um item `done`.
    Revert { label: String },

    /// Divide um item em uma cadeia de sub-itens.
    Split {
        label: String,

        /// Enunciado de um passo; repita para cada passo, em ordem.
        #[arg(long = "step", conflicts_with = "steps")]
        step: Vec<String>,

        /// Prova informal do passo na mesma posição.
        #[arg(long = "proof", requires = "step")]
        proof: Vec<String>,

        /// Arquivo JSON com uma lista de passos.
        #[arg(long)]
        steps: Option<PathBuf>,

        /// Orçamento dos novos passos (padrão: `split_budget`).
        #[arg(long)]
        budget: Option<u32>,
    },

    /// Valida o documento: formato, rótulos e ciclos.
    Validate,

    /// Mostra o resumo de status.
    Status,

    /// Mostra o histórico de mutações do log de auditoria.
    History,
}
