// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use freeflow_app::{PageKind, SortKey};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_PATH_ENV: &str = "FREEFLOW_CONFIG_PATH";

const CONFIG_VERSION: i64 = 1;
const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 1_000;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub view: View,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            storage: Storage::default(),
            view: View::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Storage {
    pub db_path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct View {
    pub default_page: Option<String>,
    pub default_sort: Option<String>,
    pub page_size: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Log {
    pub filter: Option<String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set {CONFIG_PATH_ENV} to the config file")
        })?;

        let app_dir = config_root.join(freeflow_db::APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is not versioned. Add `version = 1` and move values under [storage], [view], and [log]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1. Regenerate it with --print-example-config",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(db_path) = &self.storage.db_path {
            freeflow_db::validate_db_path(db_path)?;
        }

        if let Some(page) = &self.view.default_page
            && PageKind::parse(page).is_none()
        {
            bail!(
                "view.default_page in {} is {page:?}; use invoices, articles, or skills",
                path.display()
            );
        }

        if let Some(sort) = &self.view.default_sort
            && SortKey::parse(sort).is_none()
        {
            bail!(
                "view.default_sort in {} is {sort:?}; use date, amount, name, or status",
                path.display()
            );
        }

        if let Some(page_size) = self.view.page_size
            && !(1..=MAX_PAGE_SIZE).contains(&page_size)
        {
            bail!(
                "view.page_size in {} must be between 1 and {MAX_PAGE_SIZE}, got {page_size}",
                path.display()
            );
        }

        Ok(())
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.storage.db_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => freeflow_db::default_db_path(),
        }
    }

    pub fn default_page(&self) -> PageKind {
        self.view
            .default_page
            .as_deref()
            .and_then(PageKind::parse)
            .unwrap_or(PageKind::Invoices)
    }

    pub fn default_sort(&self) -> SortKey {
        self.view
            .default_sort
            .as_deref()
            .and_then(SortKey::parse)
            .unwrap_or_default()
    }

    pub fn page_size(&self) -> usize {
        self.view.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    pub fn log_filter(&self) -> Option<&str> {
        self.log
            .filter
            .as_deref()
            .map(str::trim)
            .filter(|filter| !filter.is_empty())
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# freeflow config\n# Place this file at: {}\n\nversion = 1\n\n[storage]\n# Optional. Default is platform data dir (for example ~/.local/share/freeflow/freeflow.db)\n# db_path = \"/absolute/path/to/freeflow.db\"\n\n[view]\n# invoices, articles, or skills\ndefault_page = \"invoices\"\n# date, amount, name, or status\ndefault_sort = \"date\"\npage_size = {DEFAULT_PAGE_SIZE}\n\n[log]\n# Overridden by FREEFLOW_LOG when set.\n# filter = \"freeflow=debug,info\"\n",
            path.display(),
        )
    }
}
