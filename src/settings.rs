use std::path::PathBuf;

use anyhow::Result;
use tokio::sync::RwLock;
use tracing::warn;

use crate::models::{AppConfig, PersistedAppConfig};

pub struct SettingsManager {
    path: PathBuf,
    data: RwLock<PersistedAppConfig>,
}

impl SettingsManager {
    pub async fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let initial = match tokio::fs::read(&path).await {
            Ok(bytes) if !bytes.is_empty() => {
                serde_json::from_slice::<PersistedAppConfig>(&bytes).unwrap_or_else(|e| {
                    warn!("配置文件无法解析，使用默认配置: {}", e);
                    PersistedAppConfig::default()
                })
            }
            _ => {
                let default = PersistedAppConfig::default();
                let json = serde_json::to_string_pretty(&default)?;
                tokio::fs::write(&path, json).await?;
                default
            }
        };

        Ok(Self {
            path,
            data: RwLock::new(initial),
        })
    }

    pub async fn get(&self) -> PersistedAppConfig {
        self.data.read().await.clone()
    }

    pub async fn update(&self, update: AppConfig) -> Result<PersistedAppConfig> {
        let mut current = self.data.write().await;
        // 在副本上修改，写入成功后才替换内存中的配置
        let mut config = current.clone();

        if let Some(value) = update.auto_save_scans {
            config.auto_save_scans = value;
        }
        if let Some(value) = update.high_quality_processing {
            config.high_quality_processing = value;
        }
        if let Some(days) = update.retention_days {
            config.retention_days = days;
        }
        if let Some(ui) = update.ui_settings {
            config.ui_settings = ui;
        }
        if let Some(database) = update.database {
            config.database = database;
        }

        self.save(&config).await?;
        *current = config.clone();
        Ok(config)
    }

    async fn save(&self, config: &PersistedAppConfig) -> Result<()> {
        let json = serde_json::to_string_pretty(config)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}
